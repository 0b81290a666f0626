//! Storage backend implementations.

pub mod memory;
pub mod s3;

pub use memory::MemoryBackend;
pub use s3::S3Backend;
