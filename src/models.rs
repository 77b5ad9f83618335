use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A registered student, stored in the `users` table. The password hash and the
/// token version never leave the server.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: String,
    /// Academic program (filière). Unset users never see peers' courses.
    pub filiere: Option<String>,
    /// Academic year within the program.
    pub annee: Option<String>,
    // Bumped on logout; tokens carrying an older version are rejected.
    #[serde(skip)]
    #[ts(skip)]
    pub token_version: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Course
///
/// A course owned by exactly one user (`user_id`, immutable after creation).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Course {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// TaskStatus
///
/// Closed two-value status, mirrored by the `task_status` Postgres enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
    Default,
)]
#[sqlx(type_name = "task_status")]
#[ts(export)]
pub enum TaskStatus {
    /// Todo.
    #[default]
    #[serde(rename = "a_faire")]
    #[sqlx(rename = "a_faire")]
    AFaire,
    /// Done.
    #[serde(rename = "termine")]
    #[sqlx(rename = "termine")]
    Termine,
}

impl TaskStatus {
    pub fn toggled(self) -> Self {
        match self {
            TaskStatus::AFaire => TaskStatus::Termine,
            TaskStatus::Termine => TaskStatus::AFaire,
        }
    }
}

/// Task
///
/// A deadline-bearing item of a course. The deadline is stored as midnight of
/// the submitted `YYYY-MM-DD` date.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Task {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub deadline: NaiveDateTime,
    pub status: TaskStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Resource
///
/// A file attached to a course. `file_url` is the opaque storage key; duplicated
/// courses share the key of the original upload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Resource {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub file_url: String,
    pub uploaded_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Response Schemas (Output) ---

/// OwnerSummary
///
/// Public projection of a course owner, embedded in shared and detail views.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct OwnerSummary {
    pub id: Uuid,
    pub name: String,
    pub filiere: Option<String>,
    pub annee: Option<String>,
}

impl From<&User> for OwnerSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            filiere: user.filiere.clone(),
            annee: user.annee.clone(),
        }
    }
}

/// CourseDetail
///
/// A course together with its tasks and resources. `user` is only present on
/// views that expose the owner (detail and shared listings).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub tasks: Vec<Task>,
    pub resources: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<OwnerSummary>,
}

/// CourseRef
///
/// Minimal course reference attached to upcoming and calendar entries.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct CourseRef {
    pub id: Uuid,
    pub title: String,
}

/// TaskWithCourse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TaskWithCourse {
    #[serde(flatten)]
    pub task: Task,
    pub course: CourseRef,
}

/// DashboardStats
///
/// Output schema of `GET /courses/stats`, computed over the caller's own courses.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct DashboardStats {
    pub total_courses: i64,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub pending_tasks: i64,
    /// Pending tasks due within the next seven days.
    pub upcoming_deadlines: i64,
    /// Percentage of completed tasks, one decimal. 0 when there are no tasks.
    pub completion_rate: f64,
    /// Course count per category; courses without a category are keyed by "".
    pub courses_by_category: BTreeMap<String, i64>,
}

/// AuthResponse
///
/// Returned by `/register` and `/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub message: String,
    pub user: User,
    pub token: String,
}

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// ErrorBody
///
/// Shape of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub error: String,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for `POST /register`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub filiere: Option<String>,
    pub annee: Option<String>,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Reads a field that is present in the payload as `Some`, keeping an explicit `null`
/// as `Some(None)`. Paired with `#[serde(default)]`, an omitted field stays `None`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// UpdateProfileRequest
///
/// Partial update of the caller's profile (`PUT /user`). Omitted fields are unchanged;
/// `filiere` and `annee` sent as `null` are cleared.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub filiere: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub annee: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// CreateCourseRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCourseRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// UpdateCourseRequest
///
/// Partial update payload (`PUT /courses/{id}`). `null` clears `description` or `category`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCourseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub category: Option<Option<String>>,
}

/// CreateTaskRequest
///
/// Input payload for `POST /tasks`. `deadline` is a `YYYY-MM-DD` date.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateTaskRequest {
    pub course_id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    #[schema(example = "2026-11-30")]
    pub deadline: String,
    pub status: Option<TaskStatus>,
}

/// UpdateTaskRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

/// UploadResourceForm
///
/// Multipart body of `POST /courses/{course}/resources`. Documentation only;
/// the handler reads the fields from the multipart stream.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadResourceForm {
    pub title: String,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

// --- Query Parameters ---

/// TaskListQuery
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
pub struct TaskListQuery {
    /// Course whose tasks are listed. Required.
    pub course_id: Option<Uuid>,
}

/// UpcomingQuery
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
pub struct UpcomingQuery {
    /// Look-ahead window in days (default 7).
    pub days: Option<i64>,
}

/// CalendarQuery
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
pub struct CalendarQuery {
    /// Month, 1 to 12. Required.
    pub month: Option<u32>,
    /// Four-digit year. Required.
    pub year: Option<i32>,
}

// --- Repository Inputs ---

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub filiere: Option<String>,
    pub annee: Option<String>,
}

/// Partial profile update. An outer `None` leaves the column unchanged; `Some(None)`
/// clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub filiere: Option<Option<String>>,
    pub annee: Option<Option<String>>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCourse {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CourseChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub deadline: NaiveDateTime,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub deadline: Option<NaiveDateTime>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone)]
pub struct NewResource {
    pub title: String,
    pub file_url: String,
    pub uploaded_by: Uuid,
}

/// A course and its children, inserted in one transaction.
#[derive(Debug, Clone)]
pub struct NewCourseTree {
    pub course: NewCourse,
    pub tasks: Vec<NewTask>,
    pub resources: Vec<NewResource>,
}
