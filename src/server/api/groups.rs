use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{CreateGroupRequest, GroupTreeParams, UpdateGroupRequest};
use crate::server::response::{ApiResponse, ApiResult};
use crate::service::{GroupUpdate, NewGroup};

pub async fn list_groups(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let groups = state.groups.list()?;
    Ok(Json(ApiResponse::success(groups)))
}

pub async fn group_tree(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<GroupTreeParams>,
) -> ApiResult<impl IntoResponse> {
    let tree = state.groups.tree(params.id.as_deref())?;
    Ok(Json(ApiResponse::success(tree)))
}

pub async fn get_group(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let group = state.groups.get(&id)?;
    Ok(Json(ApiResponse::success(group)))
}

pub async fn create_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<impl IntoResponse> {
    let group = state.groups.create(
        &auth.user,
        NewGroup {
            name: req.name,
            description: req.description,
            parent_id: req.parent_id,
        },
    )?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(group))))
}

pub async fn update_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateGroupRequest>,
) -> ApiResult<impl IntoResponse> {
    let group = state.groups.update(
        &auth.user,
        &id,
        GroupUpdate {
            name: req.name,
            description: req.description,
            parent_id: req.parent_id,
        },
    )?;

    Ok(Json(ApiResponse::success(group)))
}

pub async fn delete_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.groups.delete(&auth.user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_member(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    state.groups.add_member(&auth.user, &id, &user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_member(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    state.groups.remove_member(&auth.user, &id, &user_id)?;
    Ok(StatusCode::NO_CONTENT)
}
