//! # cloudbox-storage
//!
//! Storage backend implementations for Cloudbox: local filesystem
//! streaming and S3-compatible presigned URLs. An in-memory backend is
//! available behind the `mock` feature for tests.

pub mod manager;
pub mod providers;

pub use manager::connect;
