//! HTTP handlers, one module per resource. Every handler resolves the caller through
//! `AuthUser`, loads the target entity, asks the visibility policy, and only then
//! touches the repository or the storage service.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{Course, CourseDetail, OwnerSummary, User},
    policy::{Operation, can_access},
    repository::Repository,
};

pub mod auth;
pub mod courses;
pub mod resources;
pub mod tasks;

/// Maximum length, in characters, of titles, names and profile attributes.
pub const MAX_TEXT_LEN: usize = 255;

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 6;

// --- Input normalization ---

/// Trimmed, non-empty, at most `MAX_TEXT_LEN` characters.
pub(crate) fn required_text(value: &str, field: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("The {field} field is required")));
    }
    bounded(trimmed, field)
}

/// Blank input collapses to `None`; anything else is trimmed and length-checked.
pub(crate) fn optional_text(value: Option<String>, field: &str) -> ApiResult<Option<String>> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(trimmed) => bounded(trimmed, field).map(Some),
    }
}

/// Like `optional_text` for long free text (descriptions): no length cap.
pub(crate) fn optional_free_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn bounded(value: &str, field: &str) -> ApiResult<String> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ApiError::validation(format!(
            "The {field} field must not exceed {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(value.to_string())
}

pub(crate) fn check_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "The password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// parse_deadline
///
/// Accepts a `YYYY-MM-DD` date and stores it as midnight of that day.
pub(crate) fn parse_deadline(raw: &str) -> ApiResult<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::validation("The deadline field is required"));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| ApiError::validation("The deadline must be a date in YYYY-MM-DD format"))
}

// --- Loading and authorization ---

/// Loads a course and its owner; 404 when either is missing.
pub(crate) async fn load_course(repo: &dyn Repository, id: Uuid) -> ApiResult<(Course, User)> {
    let course = repo
        .get_course(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;
    let owner = repo
        .get_user(course.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course owner"))?;
    Ok((course, owner))
}

/// Runs the visibility policy; 403 with the deny reason otherwise.
pub(crate) fn authorize(actor: &AuthUser, owner: &User, op: Operation) -> ApiResult<()> {
    can_access(actor.principal(), owner.principal(), op)
        .into_result()
        .map_err(|reason| {
            tracing::debug!(actor = %actor.id, owner = %owner.id, ?op, %reason, "access denied");
            ApiError::from(reason)
        })
}

/// Assembles a course with its tasks and resources, optionally with its owner summary.
pub(crate) async fn course_detail(
    repo: &dyn Repository,
    course: Course,
    owner: Option<&User>,
) -> ApiResult<CourseDetail> {
    Ok(CourseDetail {
        tasks: repo.list_tasks(course.id).await?,
        resources: repo.list_resources(course.id).await?,
        course,
        user: owner.map(OwnerSummary::from),
    })
}
