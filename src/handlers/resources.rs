use axum::{
    Json,
    body::Body,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::instrument;
use uuid::Uuid;

use super::{authorize, load_course, required_text};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    extract::ApiPath,
    models::{ErrorBody, MessageResponse, NewResource, Resource, UploadResourceForm, User},
    policy::Operation,
    repository::Repository,
    storage::mime_for_extension,
};

/// Extensions accepted for course resources.
pub const ALLOWED_EXTENSIONS: [&str; 8] = ["pdf", "doc", "docx", "ppt", "pptx", "txt", "jpg", "png"];

/// Largest accepted resource file (2048 KiB).
pub const MAX_FILE_BYTES: usize = 2048 * 1024;

/// Lower-cased extension of a file name, if any.
pub(crate) fn file_extension(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .filter(|ext| !ext.is_empty())
}

/// Loads a resource together with the owner of its course.
async fn load_resource(repo: &dyn Repository, id: Uuid) -> ApiResult<(Resource, User)> {
    let resource = repo
        .get_resource(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Resource"))?;
    let (_, owner) = load_course(repo, resource.course_id).await?;
    Ok((resource, owner))
}

/// list_resources
///
/// [Authenticated Route] Resources of a course, newest first.
#[utoipa::path(
    get,
    path = "/courses/{id}/resources",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Resources of the course", body = [Resource]),
        (status = 403, description = "Not visible to the caller", body = ErrorBody),
        (status = 404, description = "Course Not Found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id, course_id = %course_id))]
pub async fn list_resources(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(course_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Resource>>> {
    let repo = state.repo.as_ref();
    let (_, owner) = load_course(repo, course_id).await?;
    authorize(&auth, &owner, Operation::Read)?;
    Ok(Json(repo.list_resources(course_id).await?))
}

/// upload_resource
///
/// [Authenticated Route] Owner-only multipart upload (`title`, `file`). The file is
/// stored under `resources/<uuid>.<ext>`; accepted extensions are listed in
/// `ALLOWED_EXTENSIONS` and the size is capped at `MAX_FILE_BYTES`.
#[utoipa::path(
    post,
    path = "/courses/{id}/resources",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body(content = UploadResourceForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Uploaded", body = Resource),
        (status = 400, description = "Invalid upload", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Course Not Found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id, course_id = %course_id))]
pub async fn upload_resource(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(course_id): ApiPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Resource>)> {
    let repo = state.repo.as_ref();
    let (_, owner) = load_course(repo, course_id).await?;
    authorize(&auth, &owner, Operation::CreateChild)?;

    let mut multipart = multipart.map_err(|rejection| ApiError::validation(rejection.body_text()))?;

    let mut title: Option<String> = None;
    let mut file: Option<(String, Bytes)> = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = Some(field.text().await?),
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                file = Some((file_name, field.bytes().await?));
            }
            _ => {}
        }
    }

    let title = required_text(title.as_deref().unwrap_or_default(), "title")?;
    let (file_name, body) = file.ok_or_else(|| ApiError::validation("The file field is required"))?;
    let ext = file_extension(&file_name)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            ApiError::validation(format!(
                "The file must be of type: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;
    if body.len() > MAX_FILE_BYTES {
        return Err(ApiError::validation(format!(
            "The file must not be greater than {} kilobytes",
            MAX_FILE_BYTES / 1024
        )));
    }

    let key = format!("resources/{}.{}", Uuid::new_v4(), ext);
    state
        .storage
        .put_object(&key, body, mime_for_extension(&ext))
        .await?;

    let resource = NewResource {
        title,
        file_url: key.clone(),
        uploaded_by: auth.id,
    };
    match repo.create_resource(course_id, resource).await {
        Ok(created) => {
            tracing::info!(resource_id = %created.id, key = %key, "resource uploaded");
            Ok((StatusCode::CREATED, Json(created)))
        }
        Err(e) => {
            if let Err(cleanup) = state.storage.delete_object(&key).await {
                tracing::error!(key = %key, error = %cleanup, "failed to remove unreferenced upload");
            }
            Err(e.into())
        }
    }
}

/// delete_resource
///
/// [Authenticated Route] Owner-only. The stored file is removed only when no other
/// resource (e.g. a duplicated copy) still references it.
#[utoipa::path(
    delete,
    path = "/resources/{id}",
    params(("id" = Uuid, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id, resource_id = %id))]
pub async fn delete_resource(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let repo = state.repo.as_ref();
    let (_, owner) = load_resource(repo, id).await?;
    authorize(&auth, &owner, Operation::Delete)?;

    if let Some(key) = repo.delete_resource(id).await? {
        if let Err(e) = state.storage.delete_object(&key).await {
            tracing::error!(key = %key, error = %e, "failed to delete stored file");
        }
    }
    Ok(Json(MessageResponse::new("Resource deleted successfully")))
}

/// download_resource
///
/// [Authenticated Route] Streams the file back inline, named after the resource title.
/// Peers need the owner's program only; the year is not checked.
#[utoipa::path(
    get,
    path = "/resources/{id}/download",
    params(("id" = Uuid, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "File content"),
        (status = 403, description = "Not visible to the caller", body = ErrorBody),
        (status = 404, description = "Resource or file not found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id, resource_id = %id))]
pub async fn download_resource(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Response> {
    let (resource, owner) = load_resource(state.repo.as_ref(), id).await?;
    authorize(&auth, &owner, Operation::Download)?;

    let object = state.storage.get_object(&resource.file_url).await?;
    let ext = file_extension(&resource.file_url).unwrap_or_default();
    let content_type = object
        .content_type
        .unwrap_or_else(|| mime_for_extension(&ext).to_string());

    let content_type = HeaderValue::from_str(&content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = content_disposition(&resource.title, &ext);

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(object.body),
    )
        .into_response())
}

/// `inline; filename="<title>.<ext>"`, with quotes and control characters removed
/// from the title.
pub(crate) fn content_disposition(title: &str, ext: &str) -> HeaderValue {
    let stem: String = title
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    let file_name = if ext.is_empty() {
        stem
    } else {
        format!("{stem}.{ext}")
    };
    HeaderValue::from_bytes(format!("inline; filename=\"{file_name}\"").as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static("inline"))
}
