//! CORS layer configuration.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use cloudbox_core::config::CorsConfig;

/// Request headers the upload endpoints read.
const UPLOAD_HEADERS: [&str; 3] = ["filename", "filesize", "dirname"];

/// Builds a CORS tower layer from configuration.
pub fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new().allow_methods([
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ]);

    if config.allowed_origins.iter().any(|o| o == "*") {
        layer = layer.allow_origin(Any).allow_headers(Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        let mut headers = vec![
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ];
        headers.extend(UPLOAD_HEADERS.map(HeaderName::from_static));
        layer = layer.allow_origin(origins).allow_headers(headers);
    }

    layer.max_age(Duration::from_secs(config.max_age_seconds))
}
