use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use super::{authorize, load_course, optional_free_text, parse_deadline, required_text};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        CalendarQuery, CreateTaskRequest, ErrorBody, MessageResponse, NewTask, Task, TaskChanges,
        TaskListQuery, TaskStatus, TaskWithCourse, UpcomingQuery, UpdateTaskRequest, User,
    },
    policy::Operation,
    reporting,
    repository::Repository,
};

/// Loads a task together with the owner of its course.
async fn load_task(repo: &dyn Repository, id: Uuid) -> ApiResult<(Task, User)> {
    let task = repo
        .get_task(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    let (_, owner) = load_course(repo, task.course_id).await?;
    Ok((task, owner))
}

/// list_tasks
///
/// [Authenticated Route] Tasks of one course, earliest deadline first.
#[utoipa::path(
    get,
    path = "/tasks",
    params(TaskListQuery),
    responses(
        (status = 200, description = "Tasks of the course", body = [Task]),
        (status = 400, description = "Missing course_id", body = ErrorBody),
        (status = 403, description = "Not visible to the caller", body = ErrorBody),
        (status = 404, description = "Course Not Found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn list_tasks(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TaskListQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let course_id = query
        .course_id
        .ok_or_else(|| ApiError::validation("The course_id parameter is required"))?;

    let repo = state.repo.as_ref();
    let (_, owner) = load_course(repo, course_id).await?;
    authorize(&auth, &owner, Operation::Read)?;
    Ok(Json(repo.list_tasks(course_id).await?))
}

/// create_task
///
/// [Authenticated Route] Owner-only. `deadline` is a `YYYY-MM-DD` date; `status`
/// defaults to `a_faire`.
#[utoipa::path(
    post,
    path = "/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Created", body = Task),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Course Not Found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn create_task(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let course_id = payload
        .course_id
        .ok_or_else(|| ApiError::validation("The course_id field is required"))?;

    let repo = state.repo.as_ref();
    let (_, owner) = load_course(repo, course_id).await?;
    authorize(&auth, &owner, Operation::CreateChild)?;

    let task = NewTask {
        title: required_text(&payload.title, "title")?,
        description: optional_free_text(payload.description),
        deadline: parse_deadline(&payload.deadline)?,
        status: payload.status.unwrap_or_default(),
    };

    let created = repo.create_task(course_id, task).await?;
    tracing::info!(task_id = %created.id, course_id = %course_id, "task created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// show_task
#[utoipa::path(
    get,
    path = "/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Found", body = Task),
        (status = 403, description = "Not visible to the caller", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id, task_id = %id))]
pub async fn show_task(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Task>> {
    let (task, owner) = load_task(state.repo.as_ref(), id).await?;
    authorize(&auth, &owner, Operation::Read)?;
    Ok(Json(task))
}

/// update_task
///
/// [Authenticated Route] Owner-only partial update.
#[utoipa::path(
    put,
    path = "/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Updated", body = Task),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id, task_id = %id))]
pub async fn update_task(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    let repo = state.repo.as_ref();
    let (_, owner) = load_task(repo, id).await?;
    authorize(&auth, &owner, Operation::Update)?;

    let changes = TaskChanges {
        title: payload
            .title
            .as_deref()
            .map(|title| required_text(title, "title"))
            .transpose()?,
        description: payload.description.map(optional_free_text),
        deadline: payload.deadline.as_deref().map(parse_deadline).transpose()?,
        status: payload.status,
    };

    let updated = repo
        .update_task(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    Ok(Json(updated))
}

/// delete_task
#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id, task_id = %id))]
pub async fn delete_task(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let repo = state.repo.as_ref();
    let (_, owner) = load_task(repo, id).await?;
    authorize(&auth, &owner, Operation::Delete)?;

    if !repo.delete_task(id).await? {
        return Err(ApiError::not_found("Task"));
    }
    Ok(Json(MessageResponse::new("Task deleted successfully")))
}

/// toggle_task
///
/// [Authenticated Route] Owner-only. Flips `a_faire` and `termine`.
#[utoipa::path(
    patch,
    path = "/tasks/{id}/toggle",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Toggled", body = Task),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id, task_id = %id))]
pub async fn toggle_task(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Task>> {
    let repo = state.repo.as_ref();
    let (task, owner) = load_task(repo, id).await?;
    authorize(&auth, &owner, Operation::Update)?;

    let changes = TaskChanges {
        status: Some(task.status.toggled()),
        ..TaskChanges::default()
    };
    let updated = repo
        .update_task(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    Ok(Json(updated))
}

/// upcoming_tasks
///
/// [Authenticated Route] Pending tasks of the caller's courses due within `days`
/// (default 7), earliest first.
#[utoipa::path(
    get,
    path = "/tasks/upcoming",
    params(UpcomingQuery),
    responses(
        (status = 200, description = "Upcoming tasks", body = [TaskWithCourse]),
        (status = 400, description = "Negative days", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn upcoming_tasks(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UpcomingQuery>,
) -> ApiResult<Json<Vec<TaskWithCourse>>> {
    let (from, to) = reporting::upcoming_window(Utc::now().naive_utc(), query.days)?;
    let tasks = state
        .repo
        .owner_tasks_due_between(auth.id, from, to, Some(TaskStatus::AFaire))
        .await?;
    Ok(Json(tasks))
}

/// calendar_tasks
///
/// [Authenticated Route] Every task of the caller's courses due in the given month.
#[utoipa::path(
    get,
    path = "/tasks/calendar",
    params(CalendarQuery),
    responses(
        (status = 200, description = "Tasks of the month", body = [TaskWithCourse]),
        (status = 400, description = "Missing or invalid month/year", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn calendar_tasks(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CalendarQuery>,
) -> ApiResult<Json<Vec<TaskWithCourse>>> {
    let (from, to) = reporting::month_window(query.month, query.year)?;
    let tasks = state
        .repo
        .owner_tasks_due_between(auth.id, from, to, None)
        .await?;
    Ok(Json(tasks))
}
