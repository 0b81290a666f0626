//! Plan-based orchestration of catalog row writes, cell updates, deletes,
//! and retention purges across a relational store and an object store.
//!
//! The two stores share no transaction mechanism; the coordinators make each
//! request behave as one atomic unit by executing an ordered plan (pre-upload
//! relational ops, uploads, post-upload relational ops) and compensating with
//! best-effort object deletes when anything fails before commit.

pub mod delete;
pub mod error;
pub mod image_slots;
pub mod plan;
pub mod planner;
pub mod purge;
pub mod schema_cache;
pub mod token_cache;
pub mod write;

pub use delete::{DeleteCoordinator, DeleteOutcome};
pub use error::{CatalogError, CatalogResult, StatusKind, ValidationError};
pub use image_slots::ImageSlotsPlanner;
pub use plan::{DbOp, DbOpKind, DeletePlan, DeleteWarning, ObjectRef, UploadOp, WritePlan};
pub use planner::{EntityPlanner, PlannerRegistry};
pub use purge::RetentionPurger;
pub use schema_cache::SchemaCache;
pub use token_cache::{Clock, SystemClock, TokenCache, TokenRecord};
pub use write::{WriteCoordinator, WriteOutcome};
