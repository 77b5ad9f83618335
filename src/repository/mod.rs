use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Course, CourseChanges, CourseDetail, NewCourse, NewCourseTree, NewResource, NewTask,
    NewUser, Resource, Task, TaskChanges, TaskStatus, TaskWithCourse, User, UserChanges,
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepoError
#[derive(Debug, Error)]
pub enum RepoError {
    /// A uniqueness rule was violated (e.g. an email already registered).
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, so handlers never
/// know whether they talk to Postgres or to the in-memory store used by tests.
///
/// Authorization is not enforced here: every method does exactly what it says and the
/// handlers consult the visibility policy before calling it.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Fails with `RepoError::Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>>;
    /// Increments `token_version`, revoking every token issued so far.
    async fn bump_token_version(&self, id: Uuid) -> RepoResult<()>;

    // --- Courses ---
    /// Courses owned by `owner`, newest first.
    async fn list_courses(&self, owner: Uuid) -> RepoResult<Vec<Course>>;
    /// Courses whose owner is in `filiere` (and `annee`, when given), excluding the
    /// courses of `exclude_owner`. Newest first.
    async fn list_courses_by_program(
        &self,
        filiere: &str,
        annee: Option<&str>,
        exclude_owner: Uuid,
    ) -> RepoResult<Vec<Course>>;
    async fn get_course(&self, id: Uuid) -> RepoResult<Option<Course>>;
    async fn create_course(&self, owner: Uuid, course: NewCourse) -> RepoResult<Course>;
    async fn update_course(&self, id: Uuid, changes: CourseChanges) -> RepoResult<Option<Course>>;
    /// Deletes the course with its tasks and resources in one transaction and returns
    /// the storage keys no remaining resource references.
    async fn delete_course(&self, id: Uuid) -> RepoResult<Vec<String>>;
    /// Whether `owner` has a course whose title starts with `prefix`.
    async fn owns_course_with_title_prefix(&self, owner: Uuid, prefix: &str) -> RepoResult<bool>;
    /// Inserts a course and all of its children atomically.
    async fn insert_course_tree(&self, owner: Uuid, tree: NewCourseTree) -> RepoResult<CourseDetail>;

    // --- Tasks ---
    /// Tasks of a course, earliest deadline first.
    async fn list_tasks(&self, course_id: Uuid) -> RepoResult<Vec<Task>>;
    async fn get_task(&self, id: Uuid) -> RepoResult<Option<Task>>;
    async fn create_task(&self, course_id: Uuid, task: NewTask) -> RepoResult<Task>;
    async fn update_task(&self, id: Uuid, changes: TaskChanges) -> RepoResult<Option<Task>>;
    async fn delete_task(&self, id: Uuid) -> RepoResult<bool>;
    /// Every task of every course owned by `owner`.
    async fn list_owner_tasks(&self, owner: Uuid) -> RepoResult<Vec<Task>>;
    /// Tasks of `owner`'s courses with `from <= deadline <= to`, optionally restricted
    /// to one status, earliest deadline first.
    async fn owner_tasks_due_between(
        &self,
        owner: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
        status: Option<TaskStatus>,
    ) -> RepoResult<Vec<TaskWithCourse>>;

    // --- Resources ---
    /// Resources of a course, newest first.
    async fn list_resources(&self, course_id: Uuid) -> RepoResult<Vec<Resource>>;
    async fn get_resource(&self, id: Uuid) -> RepoResult<Option<Resource>>;
    async fn create_resource(&self, course_id: Uuid, resource: NewResource) -> RepoResult<Resource>;
    /// Deletes the row and returns its storage key when no other resource still
    /// references it.
    async fn delete_resource(&self, id: Uuid) -> RepoResult<Option<String>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Escapes `%`, `_` and `\` so `prefix` matches literally in a `LIKE` pattern.
pub(crate) fn like_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
