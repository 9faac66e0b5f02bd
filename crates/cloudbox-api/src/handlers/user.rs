//! Account self-service handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use cloudbox_entity::user::StorageUsage;

use crate::dto::request::{RegisterRequest, validate};
use crate::dto::response::{ApiResponse, RegisteredResponse};
use crate::error::ApiError;
use crate::extractors::{AuthUser, JsonBody, ServiceCaller};
use crate::state::AppState;

/// GET /user/storage
pub async fn storage_usage(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<StorageUsage>>, ApiError> {
    let usage = state.account_service.usage(&auth).await?;
    Ok(Json(ApiResponse::ok(usage)))
}

/// POST /user/register
///
/// Only the identity service may call this, with a token granting the
/// registration scope.
pub async fn register(
    State(state): State<AppState>,
    ServiceCaller(caller): ServiceCaller,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegisteredResponse>>), ApiError> {
    validate(&req)?;
    let (user, root) = state.account_service.register(req.into()).await?;
    tracing::debug!(service = %caller.sub, user_id = %user.id, "Registration served");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(RegisteredResponse {
            user_id: user.id,
            root_dir_id: root.id,
            role: user.role.to_string(),
        })),
    ))
}
