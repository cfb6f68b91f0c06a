use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse, ApiResult};

pub async fn list_permissions(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let permissions = state.store.list_permissions()?;
    Ok(Json(ApiResponse::success(permissions)))
}

pub async fn get_permission(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let permission = state
        .store
        .get_permission(id)?
        .ok_or_else(|| ApiError::not_found("permission not found"))?;

    Ok(Json(ApiResponse::success(permission)))
}
