//! Directory listing, create, rename and subtree delete handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use cloudbox_entity::directory::{Directory, DirectoryListing};

use crate::dto::request::RenameDirectoryRequest;
use crate::dto::response::{ApiResponse, MessageResponse};
use crate::error::ApiError;
use crate::extractors::{AuthUser, DirectoryNameHeader, JsonBody};
use crate::state::AppState;

/// GET /directory
pub async fn list_root(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<DirectoryListing>>, ApiError> {
    let listing = state.directory_service.list_children(&auth, None).await?;
    Ok(Json(ApiResponse::ok(listing)))
}

/// GET /directory/{id}
pub async fn list_directory(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DirectoryListing>>, ApiError> {
    let listing = state.directory_service.list_children(&auth, Some(id)).await?;
    Ok(Json(ApiResponse::ok(listing)))
}

/// POST /directory
pub async fn create_in_root(
    State(state): State<AppState>,
    auth: AuthUser,
    DirectoryNameHeader(name): DirectoryNameHeader,
) -> Result<(StatusCode, Json<ApiResponse<Directory>>), ApiError> {
    let dir = state
        .directory_service
        .create_directory(&auth, None, name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(dir))))
}

/// POST /directory/{parent_id}
pub async fn create_directory(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(parent_id): Path<Uuid>,
    DirectoryNameHeader(name): DirectoryNameHeader,
) -> Result<(StatusCode, Json<ApiResponse<Directory>>), ApiError> {
    let dir = state
        .directory_service
        .create_directory(&auth, Some(parent_id), name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(dir))))
}

/// PATCH /directory/{id}
pub async fn rename_directory(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(req): JsonBody<RenameDirectoryRequest>,
) -> Result<Json<ApiResponse<Directory>>, ApiError> {
    let dir = state
        .directory_service
        .rename_directory(&auth, id, req.new_dir_name.as_deref())
        .await?;
    Ok(Json(ApiResponse::ok(dir)))
}

/// DELETE /directory/{id}
pub async fn delete_directory(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.directory_service.delete_directory_subtree(&auth, id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse::new("Directory deleted"))))
}
