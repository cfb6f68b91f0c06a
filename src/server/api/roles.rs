use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{CreateRoleRequest, UpdateRoleRequest};
use crate::server::response::{ApiError, ApiResponse, ApiResult};
use crate::server::validation::validate_role_name;
use crate::types::{PermissionName, Role};

fn dedup(mut permissions: Vec<String>) -> Vec<String> {
    permissions.sort();
    permissions.dedup();
    permissions
}

pub async fn list_roles(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let roles = state.store.list_roles()?;
    Ok(Json(ApiResponse::success(roles)))
}

pub async fn get_role(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let role = state
        .store
        .get_role(&id)?
        .ok_or_else(|| ApiError::not_found("role not found"))?;

    Ok(Json(ApiResponse::success(role)))
}

pub async fn create_role(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRoleRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .authz
        .require(&auth.user.id, PermissionName::MANAGE_ROLES)?;

    let name = req.name.trim().to_string();
    validate_role_name(&name)?;

    let role = Role {
        id: Uuid::new_v4().to_string(),
        name,
        description: req.description,
        permissions: dedup(req.permissions),
        created_at: Utc::now(),
    };
    state.store.create_role(&role)?;

    tracing::info!("Created role {} ({})", role.name, role.id);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(role))))
}

pub async fn update_role(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .authz
        .require(&auth.user.id, PermissionName::MANAGE_ROLES)?;

    let mut role = state
        .store
        .get_role(&id)?
        .ok_or_else(|| ApiError::not_found("role not found"))?;

    if let Some(name) = req.name {
        let name = name.trim().to_string();
        validate_role_name(&name)?;
        role.name = name;
    }
    if let Some(description) = req.description {
        role.description = description;
    }
    if let Some(permissions) = req.permissions {
        role.permissions = dedup(permissions);
    }

    state.store.update_role(&role)?;

    Ok(Json(ApiResponse::success(role)))
}

/// Users holding the role keep their account and lose the role.
pub async fn delete_role(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state
        .authz
        .require(&auth.user.id, PermissionName::MANAGE_ROLES)?;

    if !state.store.delete_role(&id)? {
        return Err(ApiError::not_found("role not found"));
    }

    tracing::info!("Deleted role {id}");
    Ok(StatusCode::NO_CONTENT)
}
