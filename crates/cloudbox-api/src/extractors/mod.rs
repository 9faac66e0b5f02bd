//! Custom Axum extractors.

pub mod auth;
pub mod headers;
pub mod json;

pub use auth::{AuthUser, ServiceCaller};
pub use headers::{DirectoryNameHeader, UploadHeaders};
pub use json::JsonBody;
