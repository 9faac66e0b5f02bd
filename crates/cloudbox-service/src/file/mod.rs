//! File lifecycle and upload protocols.

pub mod limit;
pub mod service;
pub mod upload;

pub use limit::LimitedStream;
pub use service::{DEFAULT_CONTENT_TYPE, FileService, NewFile};
pub use upload::{DEFAULT_UPLOAD_NAME, InitiateUpload, InitiatedUpload, StreamUpload, UploadService};
