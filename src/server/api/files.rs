use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tokio_util::io::ReaderStream;

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{SearchParams, UpdateFileRequest};
use crate::server::response::{ApiError, ApiResponse, ApiResult};
use crate::service::{ContentStream, FileUpdate, NewFile};
use crate::types::FileKind;

/// Fields of an upload form. Only `file` is mandatory.
#[derive(Debug, Default)]
pub(super) struct UploadForm {
    pub file_name: Option<String>,
    pub content: Option<Bytes>,
    pub full_path: Option<String>,
    pub kind: Option<FileKind>,
    pub name: Option<String>,
}

impl UploadForm {
    pub(super) async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(field_name) = field.name().map(str::to_string) else {
                continue;
            };
            match field_name.as_str() {
                "file" => {
                    form.file_name = field.file_name().map(str::to_string);
                    form.content = Some(field.bytes().await?);
                }
                "full_path" => form.full_path = Some(field.text().await?),
                "type" => {
                    let raw = field.text().await?;
                    let kind = raw
                        .trim()
                        .parse::<FileKind>()
                        .map_err(ApiError::bad_request)?;
                    form.kind = Some(kind);
                }
                "name" => form.name = Some(field.text().await?),
                other => tracing::debug!("Ignoring multipart field {other}"),
            }
        }

        Ok(form)
    }

    pub(super) fn take_content(&mut self) -> ApiResult<Bytes> {
        self.content
            .take()
            .ok_or_else(|| ApiError::bad_request("multipart field 'file' is required"))
    }
}

/// Header-safe rendition of a file name for `Content-Disposition`.
fn disposition_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Streams blob content back to the client without buffering it.
pub(super) fn content_response(content: ContentStream) -> Response {
    let mime = mime_guess::from_path(&content.file_name).first_or_octet_stream();
    let disposition = format!(
        "attachment; filename=\"{}\"",
        disposition_name(&content.file_name)
    );
    let body = Body::from_stream(ReaderStream::new(content.reader));

    (
        [
            (CONTENT_TYPE, mime.to_string()),
            (CONTENT_DISPOSITION, disposition),
            (CONTENT_LENGTH, content.size.to_string()),
        ],
        body,
    )
        .into_response()
}

pub async fn list_files(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let files = state
        .files
        .list_owned(&auth.user, params.search.as_deref())?;
    Ok(Json(ApiResponse::success(files)))
}

pub async fn list_shared_files(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let files = state
        .sharing
        .shared_files(&auth.user.id, params.search.as_deref())?;
    Ok(Json(ApiResponse::success(files)))
}

pub async fn upload_file(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut form = UploadForm::read(multipart).await?;
    let content = form.take_content()?;

    let name = form
        .name
        .or(form.file_name)
        .ok_or_else(|| ApiError::bad_request("uploaded file has no name"))?;

    let file = state
        .files
        .create_file(
            &auth.user,
            NewFile {
                name,
                full_path: form.full_path.unwrap_or_default(),
                kind: form.kind.unwrap_or_default(),
            },
            content,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(file))))
}

pub async fn get_file(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let file = state.files.get_file(&auth.user, &id)?;
    Ok(Json(ApiResponse::success(file)))
}

pub async fn update_file(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFileRequest>,
) -> ApiResult<impl IntoResponse> {
    let file = state.files.update_file(
        &auth.user,
        &id,
        FileUpdate {
            name: req.name,
            full_path: req.full_path,
        },
    )?;
    Ok(Json(ApiResponse::success(file)))
}

pub async fn delete_file(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.files.delete_file(&auth.user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_file(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let content = state.files.open_content(&auth.user, &id).await?;
    Ok(content_response(content))
}
