use crate::{
    AppState,
    handlers::{auth, courses, resources, tasks},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
};

/// Request body cap on the upload route. Above the file limit itself, so an oversized
/// file is reported by the upload validation rather than cut off mid-stream.
const UPLOAD_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Authenticated Router Module
///
/// Every route here sits behind the `auth_middleware` layer applied in `create_router`.
/// Handlers still receive `AuthUser` and consult the visibility policy themselves for
/// owner-only and peer-visibility checks.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Session & Profile ---
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/user", put(auth::update_profile))
        // --- Courses ---
        // GET lists the caller's own courses; POST creates one owned by the caller.
        .route("/courses", get(courses::list_courses).post(courses::create_course))
        // Dashboard counters, scoped to the caller's courses.
        .route("/courses/stats", get(courses::course_stats))
        // Peers' courses in one program (and optionally one year).
        .route("/courses/shared/{filiere}", get(courses::shared_courses))
        .route(
            "/courses/shared/{filiere}/{annee}",
            get(courses::shared_courses_by_year),
        )
        .route(
            "/courses/{id}",
            get(courses::show_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        // Copies a visible peer course into the caller's list.
        .route("/courses/{id}/duplicate", post(courses::duplicate_course))
        // --- Tasks ---
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/tasks/upcoming", get(tasks::upcoming_tasks))
        .route("/tasks/calendar", get(tasks::calendar_tasks))
        .route(
            "/tasks/{id}",
            get(tasks::show_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/tasks/{id}/toggle", patch(tasks::toggle_task))
        // --- Resources ---
        .route(
            "/courses/{id}/resources",
            get(resources::list_resources)
                .post(resources::upload_resource)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/resources/{id}", delete(resources::delete_resource))
        .route("/resources/{id}/download", get(resources::download_resource))
}
