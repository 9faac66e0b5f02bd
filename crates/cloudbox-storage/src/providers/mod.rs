//! Storage backend implementations.

#[cfg(feature = "local")]
pub mod local;
#[cfg(feature = "mock")]
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "local")]
pub use local::LocalStorageBackend;
#[cfg(feature = "mock")]
pub use memory::MemoryStorageBackend;
#[cfg(feature = "s3")]
pub use s3::S3StorageBackend;
