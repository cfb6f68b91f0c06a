use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{LoginRequest, LoginResponse, MeResponse, RegisterRequest};
use crate::server::response::{ApiResponse, ApiResult};

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .identity
        .register(&req.login, &req.mail, &req.password, &req.display_name)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.identity.login(&req.login, &req.password)?;

    Ok(Json(ApiResponse::success(LoginResponse {
        token: outcome.token.token,
        expires_at: outcome.token.expires_at,
        user: outcome.user,
        permissions: outcome.permissions,
    })))
}

/// Permissions are recomputed rather than read from the token snapshot.
pub async fn me(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let permissions = state.identity.permissions_of(&auth.user)?;

    Ok(Json(ApiResponse::success(MeResponse {
        user: auth.user,
        permissions,
    })))
}
