//! Logical table registry and virtual-child resolution.
//!
//! A "virtual child" table is a logical name that maps onto a physical
//! parent table while hiding some of its columns; resolution follows the
//! child chain iteratively with a visited set so a misconfigured cycle
//! terminates instead of looping.

use crate::config::CatalogConfig;
use crate::error::{CoreError, Result};
use crate::ident::is_safe_identifier;
use std::collections::{BTreeSet, HashMap};

/// Column that records which logical (child) table a row belongs to.
pub const CHILD_TYPE_ID_COLUMN: &str = "table_type_id";

/// One registered logical table.
#[derive(Clone, Debug)]
pub struct TableEntry {
    /// Numeric table id used on the wire and in `table_type_id`.
    pub id: i32,
    pub name: String,
    /// Side table holding image slots for rows of this table.
    pub images_table: String,
    /// Foreign-key column in `images_table` referencing the base row.
    pub fk_column: String,
}

/// Mapping from a virtual child table to its parent.
#[derive(Clone, Debug)]
pub struct ChildTableSpec {
    pub parent: String,
    /// Columns of the parent hidden from this child.
    pub exclude: Vec<String>,
}

/// Result of resolving a logical table name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedTable {
    /// Physical base table.
    pub base: String,
    /// Union of excluded columns along the child chain.
    pub excluded: BTreeSet<String>,
}

/// Registry of logical tables, their image side tables, and child aliases.
#[derive(Clone, Debug)]
pub struct TableAliases {
    tables: Vec<TableEntry>,
    children: HashMap<String, ChildTableSpec>,
}

impl TableAliases {
    pub fn new(tables: Vec<TableEntry>, children: Vec<(String, ChildTableSpec)>) -> Result<Self> {
        for entry in &tables {
            for name in [&entry.name, &entry.images_table, &entry.fk_column] {
                if !is_safe_identifier(name) {
                    return Err(CoreError::UnsafeIdentifier(name.clone()));
                }
            }
        }
        for (child, spec) in &children {
            if !is_safe_identifier(child) {
                return Err(CoreError::UnsafeIdentifier(child.clone()));
            }
            if !is_safe_identifier(&spec.parent) {
                return Err(CoreError::UnsafeIdentifier(spec.parent.clone()));
            }
        }
        Ok(Self {
            tables,
            children: children.into_iter().collect(),
        })
    }

    /// Build the registry from catalog configuration.
    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        let tables = config
            .tables
            .iter()
            .map(|t| TableEntry {
                id: t.id,
                name: t.name.clone(),
                images_table: t.images_table.clone(),
                fk_column: t.fk_column.clone(),
            })
            .collect();
        let children = config
            .children
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    ChildTableSpec {
                        parent: c.parent.clone(),
                        exclude: c.exclude.clone(),
                    },
                )
            })
            .collect();
        Self::new(tables, children)
    }

    /// Resolve a logical name to its physical base table plus the union of
    /// excluded columns along the child chain.
    pub fn resolve(&self, name: &str) -> ResolvedTable {
        let mut base = name.to_string();
        let mut excluded = BTreeSet::new();
        let mut seen = BTreeSet::new();
        while let Some(spec) = self.children.get(&base) {
            if !seen.insert(base.clone()) {
                // Cycle in the child mapping; stop where we are.
                break;
            }
            excluded.extend(spec.exclude.iter().cloned());
            base = spec.parent.clone();
        }
        ResolvedTable { base, excluded }
    }

    /// Physical base table for a logical name.
    pub fn base_table(&self, name: &str) -> String {
        self.resolve(name).base
    }

    /// Numeric id for a logical table name.
    pub fn table_id(&self, name: &str) -> Option<i32> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.id)
    }

    /// Logical table name for a numeric id.
    pub fn table_name(&self, id: i32) -> Option<&str> {
        self.tables
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.name.as_str())
    }

    /// Registered entry for a base table name.
    pub fn entry(&self, base: &str) -> Option<&TableEntry> {
        self.tables.iter().find(|t| t.name == base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TableAliases {
        TableAliases::new(
            vec![
                TableEntry {
                    id: 1,
                    name: "milling_tool_catalog".into(),
                    images_table: "milling_tool_images".into(),
                    fk_column: "tool_id".into(),
                },
                TableEntry {
                    id: 1001,
                    name: "mills_catalog".into(),
                    images_table: "milling_tool_images".into(),
                    fk_column: "tool_id".into(),
                },
            ],
            vec![(
                "mills_catalog".into(),
                ChildTableSpec {
                    parent: "milling_tool_catalog".into(),
                    exclude: vec!["shank_type".into(), "insert_count".into()],
                },
            )],
        )
        .unwrap()
    }

    #[test]
    fn base_table_passes_through_unmapped_names() {
        let reg = registry();
        assert_eq!(reg.base_table("milling_tool_catalog"), "milling_tool_catalog");
        assert_eq!(reg.base_table("unknown"), "unknown");
    }

    #[test]
    fn child_resolves_to_parent_with_exclusions() {
        let reg = registry();
        let resolved = reg.resolve("mills_catalog");
        assert_eq!(resolved.base, "milling_tool_catalog");
        assert!(resolved.excluded.contains("shank_type"));
        assert!(resolved.excluded.contains("insert_count"));
    }

    #[test]
    fn chain_accumulates_exclusions() {
        let reg = TableAliases::new(
            vec![],
            vec![
                (
                    "grandchild".into(),
                    ChildTableSpec {
                        parent: "child".into(),
                        exclude: vec!["a".into()],
                    },
                ),
                (
                    "child".into(),
                    ChildTableSpec {
                        parent: "root".into(),
                        exclude: vec!["b".into()],
                    },
                ),
            ],
        )
        .unwrap();
        let resolved = reg.resolve("grandchild");
        assert_eq!(resolved.base, "root");
        assert_eq!(
            resolved.excluded,
            BTreeSet::from(["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn cyclic_mapping_terminates() {
        let reg = TableAliases::new(
            vec![],
            vec![
                (
                    "a".into(),
                    ChildTableSpec {
                        parent: "b".into(),
                        exclude: vec!["x".into()],
                    },
                ),
                (
                    "b".into(),
                    ChildTableSpec {
                        parent: "a".into(),
                        exclude: vec!["y".into()],
                    },
                ),
            ],
        )
        .unwrap();
        let resolved = reg.resolve("a");
        // Both exclusion lists are collected before the cycle is detected.
        assert!(resolved.excluded.contains("x"));
        assert!(resolved.excluded.contains("y"));
    }

    #[test]
    fn table_ids_round_trip() {
        let reg = registry();
        assert_eq!(reg.table_id("mills_catalog"), Some(1001));
        assert_eq!(reg.table_name(1), Some("milling_tool_catalog"));
        assert_eq!(reg.table_id("nope"), None);
    }

    #[test]
    fn rejects_unsafe_names() {
        let result = TableAliases::new(
            vec![TableEntry {
                id: 1,
                name: "bad name".into(),
                images_table: "imgs".into(),
                fk_column: "fk".into(),
            }],
            vec![],
        );
        assert!(matches!(result, Err(CoreError::UnsafeIdentifier(_))));
    }
}
