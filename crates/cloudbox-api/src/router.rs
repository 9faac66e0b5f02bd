//! Route definitions for the Cloudbox HTTP API.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

use crate::handlers;
use crate::state::AppState;

/// Build the router with every route and its state.
///
/// JSON routes are capped by `server.json_body_limit_bytes`; the streaming
/// upload routes have no body limit because the declared size is enforced
/// while the body is read.
pub fn build_router(state: AppState) -> Router {
    let json_limit = state.config.server.json_body_limit_bytes;

    Router::new()
        .merge(file_routes())
        .merge(directory_routes())
        .merge(user_routes())
        .merge(admin_routes())
        .layer(DefaultBodyLimit::max(json_limit))
        .merge(upload_routes())
        .merge(health_routes())
        .with_state(state)
}

/// Streaming uploads
fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/file/upload", post(handlers::file::stream_upload))
        .route(
            "/file/upload/{parent_dir_id}",
            post(handlers::file::stream_upload_into),
        )
        .layer(DefaultBodyLimit::disable())
}

/// Two-phase uploads, read, rename, delete
fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/file/initiate", post(handlers::file::initiate_upload))
        .route(
            "/file/initiate/{parent_dir_id}",
            post(handlers::file::initiate_upload_into),
        )
        .route(
            "/file/upload/complete/{id}",
            post(handlers::file::complete_upload),
        )
        .route(
            "/file/{id}",
            get(handlers::file::read_file)
                .patch(handlers::file::rename_file)
                .delete(handlers::file::delete_file),
        )
}

/// Directory tree
fn directory_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/directory",
            get(handlers::directory::list_root).post(handlers::directory::create_in_root),
        )
        .route(
            "/directory/{id}",
            get(handlers::directory::list_directory)
                .post(handlers::directory::create_directory)
                .patch(handlers::directory::rename_directory)
                .delete(handlers::directory::delete_directory),
        )
}

/// Account self-service
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/storage", get(handlers::user::storage_usage))
        .route("/user/register", post(handlers::user::register))
}

/// Administration
fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin/users/{id}", delete(handlers::admin::delete_user))
}

/// Health
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}
