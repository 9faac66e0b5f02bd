//! # cloudbox-service
//!
//! Business logic service layer for Cloudbox. Each service orchestrates
//! repositories, the storage backend, and the access policy to implement
//! one application-level use case.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod account;
pub mod context;
pub mod directory;
pub mod file;
pub mod quota;
pub mod sanitize;

pub use account::AccountService;
pub use context::RequestContext;
pub use directory::DirectoryService;
pub use file::{FileService, UploadService};
pub use quota::QuotaPolicy;
