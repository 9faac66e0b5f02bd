//! Built-in job implementations.

pub mod upload_reaper;

pub use upload_reaper::{ReapReport, UploadReaper};
