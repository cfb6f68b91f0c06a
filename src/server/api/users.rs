use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{CreateUserRequest, ListUsersParams, UpdateUserRequest};
use crate::server::response::{
    ApiResponse, ApiResult, DEFAULT_PAGE_SIZE, PaginatedResponse, paginate,
};
use crate::service::{NewAccount, UserUpdate};
use crate::types::AccountType;

pub async fn list_users(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListUsersParams>,
) -> ApiResult<impl IntoResponse> {
    let cursor = params.cursor.as_deref().unwrap_or("");

    let users = state.identity.list_users(
        &auth.user,
        params.group_id.as_deref(),
        cursor,
        DEFAULT_PAGE_SIZE + 1,
    )?;

    let (users, next_cursor, has_more) =
        paginate(users, DEFAULT_PAGE_SIZE as usize, |u| u.id.clone());

    Ok(Json(PaginatedResponse::new(users, next_cursor, has_more)))
}

pub async fn create_user(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state.identity.create_user(
        &auth.user,
        NewAccount {
            login: req.login,
            mail: req.mail,
            password: req.password,
            display_name: req.display_name,
            account_type: req.account_type.unwrap_or(AccountType::User),
            role_id: req.role_id,
            group_id: req.group_id,
        },
    )?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

pub async fn get_user(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let user = state.identity.get_user(&auth.user, &id)?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn update_user(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state.identity.update_user(
        &auth.user,
        &id,
        UserUpdate {
            mail: req.mail,
            display_name: req.display_name,
            password: req.password,
            role_id: req.role_id,
            group_id: req.group_id,
        },
    )?;

    Ok(Json(ApiResponse::success(user)))
}

pub async fn delete_user(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.identity.delete_user(&auth.user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
