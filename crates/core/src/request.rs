//! Parsed request model for row writes, cell updates, and deletes.
//!
//! Requests arrive already parsed (HTTP controllers are a separate concern);
//! this module is the typed contract between those controllers and the
//! catalog coordinators.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared column type names that may carry image attachments.
pub const TYPE_IMAGE: &str = "Image";
pub const TYPE_IMAGE_WITH_LINK: &str = "ImageWithLink";

/// Column name prefix required for image slot columns.
pub const IMAGE_COLUMN_PREFIX: &str = "image_";

/// Check whether a declared column type accepts image attachments.
pub fn is_image_type(type_name: &str) -> bool {
    type_name == TYPE_IMAGE || type_name == TYPE_IMAGE_WITH_LINK
}

/// Role of an attachment within its image slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentRole {
    /// Full-size image.
    Image,
    /// Thumbnail variant.
    ImageSmall,
}

impl AttachmentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::ImageSmall => "image_small",
        }
    }

    /// Parse a role from its wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "image_small" => Some(Self::ImageSmall),
            _ => None,
        }
    }
}

/// One binary attachment carried by a write or update request.
///
/// Owned by the request for its lifetime; the bytes are never persisted
/// beyond the write attempt.
#[derive(Clone, Debug)]
pub struct AttachmentInput {
    /// Client-assigned id, used to correlate with planned uploads.
    pub id: String,
    /// Target column on the logical table (an `image_*` slot column).
    pub target_column: String,
    pub role: AttachmentRole,
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl AttachmentInput {
    /// File extension from the original filename, if any.
    pub fn extension(&self) -> Option<&str> {
        let dot = self.filename.rfind('.')?;
        let ext = &self.filename[dot + 1..];
        (!ext.is_empty()).then_some(ext)
    }
}

/// A scalar field value supplied by the client.
///
/// Only scalars are accepted; nested structures are rejected at parse time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Optional link metadata carried by `ImageWithLink` columns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLinkMeta {
    pub name: Option<String>,
    pub link: Option<String>,
}

/// Parsed request to create one catalog row plus its attachments.
#[derive(Clone, Debug, Default)]
pub struct WriteRequest {
    /// Logical table name (may be a virtual child).
    pub table: String,
    /// Non-attachment column values. `id` is ignored if present.
    pub fields: BTreeMap<String, FieldValue>,
    /// Client-declared column types, keyed by column name.
    pub types: BTreeMap<String, String>,
    /// Per-column link metadata for `ImageWithLink` columns.
    pub image_meta: BTreeMap<String, ImageLinkMeta>,
    pub attachments: Vec<AttachmentInput>,
}

/// Parsed request to update a single cell (and optionally its image slot).
#[derive(Clone, Debug, Default)]
pub struct CellUpdateRequest {
    pub table: String,
    pub row_id: i64,
    /// The one column this request targets.
    pub column: String,
    /// Scalar value for `column`; must contain no other keys.
    pub fields: BTreeMap<String, FieldValue>,
    pub types: BTreeMap<String, String>,
    pub image_meta: BTreeMap<String, ImageLinkMeta>,
    pub attachments: Vec<AttachmentInput>,
}

/// Parsed request to hard-delete one row and its attachments.
#[derive(Clone, Debug)]
pub struct DeleteRequest {
    pub table: String,
    pub row_id: i64,
}
