use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

use super::{authorize, course_detail, load_course, optional_free_text, optional_text, required_text};
use crate::{
    AppState,
    auth::AuthUser,
    duplication,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    models::{
        Course, CourseChanges, CourseDetail, CreateCourseRequest, DashboardStats, ErrorBody,
        MessageResponse, NewCourse, UpdateCourseRequest, User,
    },
    policy::{Operation, can_access},
    reporting,
};

/// list_courses
///
/// [Authenticated Route] The caller's own courses, newest first, each with its tasks
/// and resources.
#[utoipa::path(
    get,
    path = "/courses",
    responses((status = 200, description = "My courses", body = [CourseDetail]))
)]
#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn list_courses(auth: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Vec<CourseDetail>>> {
    let repo = state.repo.as_ref();
    let mut details = Vec::new();
    for course in repo.list_courses(auth.id).await? {
        details.push(course_detail(repo, course, None).await?);
    }
    Ok(Json(details))
}

/// create_course
///
/// [Authenticated Route] The course is owned by the caller.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Created", body = Course),
        (status = 400, description = "Invalid input", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn create_course(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateCourseRequest>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    let course = NewCourse {
        title: required_text(&payload.title, "title")?,
        description: optional_free_text(payload.description),
        category: optional_text(payload.category, "category")?,
    };
    let created = state.repo.create_course(auth.id, course).await?;
    tracing::info!(course_id = %created.id, "course created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// show_course
///
/// [Authenticated Route] A course with its tasks, resources and owner summary. Peers
/// see it when the `Read` policy allows.
#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Found", body = CourseDetail),
        (status = 403, description = "Not visible to the caller", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id, course_id = %id))]
pub async fn show_course(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<CourseDetail>> {
    let repo = state.repo.as_ref();
    let (course, owner) = load_course(repo, id).await?;
    authorize(&auth, &owner, Operation::Read)?;
    Ok(Json(course_detail(repo, course, Some(&owner)).await?))
}

/// update_course
///
/// [Authenticated Route] Owner-only partial update. Omitted fields are unchanged; a
/// blank description or category clears it.
#[utoipa::path(
    put,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Updated", body = Course),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id, course_id = %id))]
pub async fn update_course(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateCourseRequest>,
) -> ApiResult<Json<Course>> {
    let (_, owner) = load_course(state.repo.as_ref(), id).await?;
    authorize(&auth, &owner, Operation::Update)?;

    let changes = CourseChanges {
        title: payload
            .title
            .as_deref()
            .map(|title| required_text(title, "title"))
            .transpose()?,
        description: payload.description.map(optional_free_text),
        category: payload
            .category
            .map(|c| optional_text(c, "category"))
            .transpose()?,
    };

    let updated = state
        .repo
        .update_course(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;
    Ok(Json(updated))
}

/// delete_course
///
/// [Authenticated Route] Owner-only. Removes the course, its tasks and its resources,
/// then the stored files no other resource references (copies made by duplication
/// keep theirs).
#[utoipa::path(
    delete,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id, course_id = %id))]
pub async fn delete_course(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let (_, owner) = load_course(state.repo.as_ref(), id).await?;
    authorize(&auth, &owner, Operation::Delete)?;

    let orphaned = state.repo.delete_course(id).await?;
    for key in orphaned {
        // The rows are gone already; a leftover object is logged rather than failing the request.
        if let Err(e) = state.storage.delete_object(&key).await {
            tracing::error!(key = %key, error = %e, "failed to delete stored file");
        }
    }

    Ok(Json(MessageResponse::new("Course deleted successfully")))
}

/// course_stats
///
/// [Authenticated Route] Dashboard counters over the caller's own courses.
#[utoipa::path(
    get,
    path = "/courses/stats",
    responses((status = 200, description = "Dashboard statistics", body = DashboardStats))
)]
#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn course_stats(auth: AuthUser, State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    let courses = state.repo.list_courses(auth.id).await?;
    let tasks = state.repo.list_owner_tasks(auth.id).await?;
    Ok(Json(reporting::dashboard_stats(
        &courses,
        &tasks,
        Utc::now().naive_utc(),
    )))
}

/// shared_courses
///
/// [Authenticated Route] Peers' courses in program `filiere`, excluding the caller's,
/// filtered through the `Read` policy.
#[utoipa::path(
    get,
    path = "/courses/shared/{filiere}",
    params(("filiere" = String, Path, description = "Program")),
    responses((status = 200, description = "Shared courses", body = [CourseDetail]))
)]
#[instrument(skip_all, fields(user_id = %auth.id, filiere = %filiere))]
pub async fn shared_courses(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(filiere): ApiPath<String>,
) -> ApiResult<Json<Vec<CourseDetail>>> {
    shared_listing(&auth, &state, &filiere, None).await.map(Json)
}

/// shared_courses_by_year
///
/// [Authenticated Route] Same as `shared_courses`, restricted to year `annee`.
#[utoipa::path(
    get,
    path = "/courses/shared/{filiere}/{annee}",
    params(
        ("filiere" = String, Path, description = "Program"),
        ("annee" = String, Path, description = "Year")
    ),
    responses((status = 200, description = "Shared courses", body = [CourseDetail]))
)]
#[instrument(skip_all, fields(user_id = %auth.id, filiere = %filiere, annee = %annee))]
pub async fn shared_courses_by_year(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath((filiere, annee)): ApiPath<(String, String)>,
) -> ApiResult<Json<Vec<CourseDetail>>> {
    shared_listing(&auth, &state, &filiere, Some(&annee)).await.map(Json)
}

async fn shared_listing(
    auth: &AuthUser,
    state: &AppState,
    filiere: &str,
    annee: Option<&str>,
) -> ApiResult<Vec<CourseDetail>> {
    let repo = state.repo.as_ref();
    let courses = repo.list_courses_by_program(filiere, annee, auth.id).await?;

    let mut owners: HashMap<Uuid, User> = HashMap::new();
    let mut details = Vec::with_capacity(courses.len());
    for course in courses {
        if !owners.contains_key(&course.user_id) {
            let Some(owner) = repo.get_user(course.user_id).await? else {
                continue;
            };
            owners.insert(owner.id, owner);
        }
        let Some(owner) = owners.get(&course.user_id) else {
            continue;
        };
        if !can_access(auth.principal(), owner.principal(), Operation::Read).is_allowed() {
            continue;
        }
        details.push(course_detail(repo, course, Some(owner)).await?);
    }
    Ok(details)
}

/// duplicate_course
///
/// [Authenticated Route] Copies a peer's course, with its tasks (reset to `a_faire`)
/// and resources (sharing the stored files), into the caller's courses.
#[utoipa::path(
    post,
    path = "/courses/{id}/duplicate",
    params(("id" = Uuid, Path, description = "Source course ID")),
    responses(
        (status = 201, description = "Copy created", body = CourseDetail),
        (status = 400, description = "Own course or already duplicated", body = ErrorBody),
        (status = 403, description = "Not visible to the caller", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id, course_id = %id))]
pub async fn duplicate_course(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<(StatusCode, Json<CourseDetail>)> {
    let copy = duplication::duplicate_course(state.repo.as_ref(), auth.principal(), id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}
