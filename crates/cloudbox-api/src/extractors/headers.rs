//! Extractors for metadata that upload clients send as request headers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use cloudbox_core::error::AppError;

use crate::error::ApiError;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `filename`, `filesize` and `content-type` of a streamed upload.
#[derive(Debug, Clone)]
pub struct UploadHeaders {
    /// Requested file name, if any.
    pub filename: Option<String>,
    /// Declared byte count.
    pub filesize: u64,
    /// MIME type of the body.
    pub content_type: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for UploadHeaders {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let filesize = header_str(&parts.headers, "filesize")
            .ok_or_else(|| AppError::validation("The filesize header is required"))?
            .trim()
            .parse::<u64>()
            .map_err(|_| AppError::validation("The filesize header must be a byte count"))?;

        Ok(Self {
            filename: header_str(&parts.headers, "filename").map(str::to_string),
            filesize,
            content_type: header_str(&parts.headers, "content-type").map(str::to_string),
        })
    }
}

/// Optional `dirname` header of a directory create request.
#[derive(Debug, Clone)]
pub struct DirectoryNameHeader(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for DirectoryNameHeader {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(header_str(&parts.headers, "dirname").map(str::to_string)))
    }
}
