//! # cloudbox-api
//!
//! HTTP API layer for Cloudbox built on Axum.
//!
//! Provides the REST endpoints, the bearer-token extractor, response
//! wrappers, CORS configuration, and the mapping from `AppError` to HTTP
//! status codes.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::build_app;
pub use error::ApiError;
pub use state::AppState;
