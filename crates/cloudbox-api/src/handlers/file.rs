//! File upload, read, rename and delete handlers.

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use futures::TryStreamExt;
use uuid::Uuid;

use cloudbox_core::error::AppError;
use cloudbox_core::traits::storage::{ByteStream, DownloadTarget};
use cloudbox_entity::file::File;
use cloudbox_service::file::{DEFAULT_CONTENT_TYPE, InitiateUpload, InitiatedUpload, StreamUpload};

use crate::dto::request::{ReadFileQuery, RenameFileRequest, validate};
use crate::dto::response::{ApiResponse, MessageResponse};
use crate::error::ApiError;
use crate::extractors::{AuthUser, JsonBody, UploadHeaders};
use crate::state::AppState;

/// POST /file/initiate
pub async fn initiate_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(req): JsonBody<InitiateUpload>,
) -> Result<Json<ApiResponse<InitiatedUpload>>, ApiError> {
    let initiated = state.upload_service.initiate(&auth, None, req).await?;
    Ok(Json(ApiResponse::ok(initiated)))
}

/// POST /file/initiate/{parent_dir_id}
pub async fn initiate_upload_into(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(parent_dir_id): Path<Uuid>,
    JsonBody(req): JsonBody<InitiateUpload>,
) -> Result<Json<ApiResponse<InitiatedUpload>>, ApiError> {
    let initiated = state
        .upload_service
        .initiate(&auth, Some(parent_dir_id), req)
        .await?;
    Ok(Json(ApiResponse::ok(initiated)))
}

/// POST /file/upload/complete/{id}
pub async fn complete_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<File>>, ApiError> {
    let file = state.upload_service.complete(&auth, id).await?;
    Ok(Json(ApiResponse::ok(file)))
}

/// POST /file/upload
pub async fn stream_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: UploadHeaders,
    body: Body,
) -> Result<(StatusCode, Json<ApiResponse<File>>), ApiError> {
    upload_into(&state, &auth, None, headers, body).await
}

/// POST /file/upload/{parent_dir_id}
pub async fn stream_upload_into(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(parent_dir_id): Path<Uuid>,
    headers: UploadHeaders,
    body: Body,
) -> Result<(StatusCode, Json<ApiResponse<File>>), ApiError> {
    upload_into(&state, &auth, Some(parent_dir_id), headers, body).await
}

async fn upload_into(
    state: &AppState,
    auth: &AuthUser,
    parent_dir_id: Option<Uuid>,
    headers: UploadHeaders,
    body: Body,
) -> Result<(StatusCode, Json<ApiResponse<File>>), ApiError> {
    let stream: ByteStream = Box::pin(body.into_data_stream().map_err(std::io::Error::other));
    let upload = StreamUpload {
        parent_dir_id,
        filename: headers.filename,
        declared_size: headers.filesize,
        content_type: headers.content_type,
    };

    let file = state.upload_service.stream_upload(auth, upload, stream).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(file))))
}

/// GET /file/{id}?action=download|inline
pub async fn read_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ReadFileQuery>,
) -> Result<Response, ApiError> {
    let disposition = query.disposition();
    let (file, target) = state.file_service.read_file(&auth, id, disposition).await?;

    match target {
        DownloadTarget::Redirect { url } => Ok(Redirect::temporary(&url).into_response()),
        DownloadTarget::Stream { stream, size } => {
            let content_type = file
                .content_type
                .as_deref()
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string();
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, size)
                .header(
                    header::CONTENT_DISPOSITION,
                    disposition.header_value(&file.name),
                )
                .body(Body::from_stream(stream))
                .map_err(|e| {
                    ApiError(AppError::internal(format!("Failed to build download response: {e}")))
                })
        }
    }
}

/// PATCH /file/{id}
pub async fn rename_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(req): JsonBody<RenameFileRequest>,
) -> Result<Json<ApiResponse<File>>, ApiError> {
    validate(&req)?;
    let file = state.file_service.rename_file(&auth, id, &req.new_filename).await?;
    Ok(Json(ApiResponse::ok(file)))
}

/// DELETE /file/{id}
pub async fn delete_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.file_service.delete_file(&auth, id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse::new("File deleted"))))
}
