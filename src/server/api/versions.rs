use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use super::files::{UploadForm, content_response};
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{NewVersionRequest, RenameVersionRequest, SetCurrentVersionRequest};
use crate::server::response::{ApiError, ApiResponse, ApiResult};

pub async fn list_versions(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let versions = state.files.list_versions(&auth.user, &id)?;
    Ok(Json(ApiResponse::success(versions)))
}

/// Copies the current version. An empty body picks the default name.
pub async fn create_version(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let req: NewVersionRequest = if body.is_empty() {
        NewVersionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))?
    };
    let name = req.name;
    let version = state
        .files
        .create_new_version(&auth.user, &id, name)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(version))))
}

pub async fn upload_version(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut form = UploadForm::read(multipart).await?;
    let content = form.take_content()?;

    let version = state
        .files
        .upload_version(&auth.user, &id, form.name, content)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(version))))
}

pub async fn set_current_version(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetCurrentVersionRequest>,
) -> ApiResult<impl IntoResponse> {
    let file = state
        .files
        .set_current_version(&auth.user, &id, &req.version_id)?;
    Ok(Json(ApiResponse::success(file)))
}

pub async fn rename_version(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RenameVersionRequest>,
) -> ApiResult<impl IntoResponse> {
    let version = state.files.rename_version(&auth.user, &id, &req.name)?;
    Ok(Json(ApiResponse::success(version)))
}

pub async fn delete_version(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.files.delete_version(&auth.user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_version(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let content = state.files.open_version_content(&auth.user, &id).await?;
    Ok(content_response(content))
}
