//! Core domain types and shared logic for the Lathe catalog service.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Parsed write/update/delete requests and attachment inputs
//! - Logical table registry with virtual-child resolution
//! - SQL identifier safety helpers
//! - Process configuration

pub mod config;
pub mod error;
pub mod ident;
pub mod request;
pub mod tables;

pub use config::{AppConfig, CatalogConfig, DatabaseConfig, PurgeConfig, StorageConfig};
pub use error::{CoreError, Result};
pub use ident::{is_safe_identifier, quote_ident};
pub use request::{
    AttachmentInput, AttachmentRole, CellUpdateRequest, DeleteRequest, FieldValue, ImageLinkMeta,
    WriteRequest,
};
pub use tables::{ChildTableSpec, ResolvedTable, TableAliases, TableEntry, CHILD_TYPE_ID_COLUMN};
