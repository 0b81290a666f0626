//! SQL identifier safety.
//!
//! Table and column names cannot be parameter-bound, so every identifier that
//! ends up spliced into SQL text must first pass `is_safe_identifier`. Values
//! never take this path; they are always bound as parameters.

use crate::error::{CoreError, Result};

/// Check that a name is a non-empty, alphanumeric-or-underscore identifier.
pub fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote an identifier for SQL text, after checking it is safe.
pub fn quote_ident(name: &str) -> Result<String> {
    if !is_safe_identifier(name) {
        return Err(CoreError::UnsafeIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

/// Quote a schema-qualified table reference (`"schema"."table"`).
pub fn quote_qualified(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(table)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(is_safe_identifier("milling_tool_catalog"));
        assert!(is_safe_identifier("image_photo"));
        assert!(is_safe_identifier("col1"));
        assert!(is_safe_identifier("_private"));
    }

    #[test]
    fn rejects_injection_attempts() {
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("name; DROP TABLE users"));
        assert!(!is_safe_identifier("a\"b"));
        assert!(!is_safe_identifier("a.b"));
        assert!(!is_safe_identifier("a-b"));
        assert!(!is_safe_identifier("schema name"));
    }

    #[test]
    fn quoting_wraps_in_double_quotes() {
        assert_eq!(quote_ident("tools").unwrap(), "\"tools\"");
        assert_eq!(
            quote_qualified("public", "tools").unwrap(),
            "\"public\".\"tools\""
        );
        assert!(quote_ident("bad name").is_err());
    }
}
