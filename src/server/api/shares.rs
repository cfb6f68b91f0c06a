use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::ShareRequest;
use crate::server::response::{ApiResponse, ApiResult};

pub async fn file_permissions(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let permissions = state.sharing.file_permissions(&auth.user, &id)?;
    Ok(Json(ApiResponse::success(permissions)))
}

pub async fn share_with_user(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(String, String)>,
    Json(req): Json<ShareRequest>,
) -> ApiResult<impl IntoResponse> {
    let share = state
        .sharing
        .share_with_user(&auth.user, &id, &user_id, req.access_level)?;
    Ok(Json(ApiResponse::success(share)))
}

pub async fn revoke_user(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    state.sharing.revoke_user_access(&auth.user, &id, &user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn share_with_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, group_id)): Path<(String, String)>,
    Json(req): Json<ShareRequest>,
) -> ApiResult<impl IntoResponse> {
    let share = state
        .sharing
        .share_with_group(&auth.user, &id, &group_id, req.access_level)?;
    Ok(Json(ApiResponse::success(share)))
}

pub async fn revoke_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, group_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    state.sharing.revoke_group_access(&auth.user, &id, &group_id)?;
    Ok(StatusCode::NO_CONTENT)
}
