use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{RepoError, RepoResult, Repository, like_prefix_pattern};
use crate::models::{
    Course, CourseChanges, CourseDetail, CourseRef, NewCourse, NewCourseTree, NewResource,
    NewTask, NewUser, Resource, Task, TaskChanges, TaskStatus, TaskWithCourse, User, UserChanges,
};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, filiere, annee, token_version, created_at, updated_at";
const COURSE_COLUMNS: &str = "id, user_id, title, description, category, created_at, updated_at";
const TASK_COLUMNS: &str =
    "id, course_id, title, description, deadline, status, created_at, updated_at";
const RESOURCE_COLUMNS: &str =
    "id, course_id, title, file_url, uploaded_by, created_at, updated_at";

/// Task row joined with the title of its course.
#[derive(FromRow)]
struct TaskCourseRow {
    #[sqlx(flatten)]
    task: Task,
    course_title: String,
}

impl From<TaskCourseRow> for TaskWithCourse {
    fn from(row: TaskCourseRow) -> Self {
        let course = CourseRef {
            id: row.task.course_id,
            title: row.course_title,
        };
        Self {
            task: row.task,
            course,
        }
    }
}

/// Logs a failed query with the name of the repository operation before surfacing it.
fn db_error(op: &'static str) -> impl FnOnce(sqlx::Error) -> RepoError {
    move |e| {
        tracing::error!(operation = op, error = ?e, "database query failed");
        RepoError::Database(e)
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_course(
        tx: &mut Transaction<'_, Postgres>,
        owner: Uuid,
        course: &NewCourse,
    ) -> Result<Course, sqlx::Error> {
        sqlx::query_as::<_, Course>(&format!(
            "INSERT INTO courses (id, user_id, title, description, category) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {COURSE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.category)
        .fetch_one(&mut **tx)
        .await
    }

    async fn insert_task(
        tx: &mut Transaction<'_, Postgres>,
        course_id: Uuid,
        task: &NewTask,
    ) -> Result<Task, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (id, course_id, title, description, deadline, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TASK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.deadline)
        .bind(task.status)
        .fetch_one(&mut **tx)
        .await
    }

    async fn insert_resource(
        tx: &mut Transaction<'_, Postgres>,
        course_id: Uuid,
        resource: &NewResource,
    ) -> Result<Resource, sqlx::Error> {
        sqlx::query_as::<_, Resource>(&format!(
            "INSERT INTO resources (id, course_id, title, file_url, uploaded_by) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {RESOURCE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(&resource.title)
        .bind(&resource.file_url)
        .bind(resource.uploaded_by)
        .fetch_one(&mut **tx)
        .await
    }

    async fn is_referenced(
        tx: &mut Transaction<'_, Postgres>,
        file_url: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM resources WHERE file_url = $1)")
            .bind(file_url)
            .fetch_one(&mut **tx)
            .await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    /// create_user
    ///
    /// Maps the unique index on `users.email` to `RepoError::Conflict`.
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let result = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, name, email, password_hash, filiere, annee) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.filiere)
        .bind(&user.annee)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(created) => Ok(created),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                RepoError::Conflict("This email is already registered".to_string()),
            ),
            Err(e) => Err(db_error("create_user")(e)),
        }
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get_user"))
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_user_by_email"))
    }

    /// update_user
    ///
    /// `COALESCE` keeps omitted scalar fields; the boolean flags select whether the
    /// nullable profile attributes are replaced (possibly by NULL).
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                filiere = CASE WHEN $3 THEN $4 ELSE filiere END, \
                annee = CASE WHEN $5 THEN $6 ELSE annee END, \
                password_hash = COALESCE($7, password_hash), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(changes.filiere.is_some())
        .bind(changes.filiere.clone().flatten())
        .bind(changes.annee.is_some())
        .bind(changes.annee.clone().flatten())
        .bind(&changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update_user"))
    }

    async fn bump_token_version(&self, id: Uuid) -> RepoResult<()> {
        sqlx::query("UPDATE users SET token_version = token_version + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("bump_token_version"))?;
        Ok(())
    }

    // --- COURSES ---

    async fn list_courses(&self, owner: Uuid) -> RepoResult<Vec<Course>> {
        sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_courses"))
    }

    async fn list_courses_by_program(
        &self,
        filiere: &str,
        annee: Option<&str>,
        exclude_owner: Uuid,
    ) -> RepoResult<Vec<Course>> {
        sqlx::query_as::<_, Course>(
            r#"
            SELECT c.id, c.user_id, c.title, c.description, c.category, c.created_at, c.updated_at
            FROM courses c
            JOIN users u ON u.id = c.user_id
            WHERE u.filiere = $1
              AND ($2::text IS NULL OR u.annee = $2)
              AND c.user_id <> $3
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(filiere)
        .bind(annee)
        .bind(exclude_owner)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_courses_by_program"))
    }

    async fn get_course(&self, id: Uuid) -> RepoResult<Option<Course>> {
        sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get_course"))
    }

    async fn create_course(&self, owner: Uuid, course: NewCourse) -> RepoResult<Course> {
        sqlx::query_as::<_, Course>(&format!(
            "INSERT INTO courses (id, user_id, title, description, category) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {COURSE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.category)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create_course"))
    }

    async fn update_course(&self, id: Uuid, changes: CourseChanges) -> RepoResult<Option<Course>> {
        sqlx::query_as::<_, Course>(&format!(
            "UPDATE courses SET \
                title = COALESCE($2, title), \
                description = CASE WHEN $3 THEN $4 ELSE description END, \
                category = CASE WHEN $5 THEN $6 ELSE category END, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {COURSE_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.title)
        .bind(changes.description.is_some())
        .bind(changes.description.clone().flatten())
        .bind(changes.category.is_some())
        .bind(changes.category.clone().flatten())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update_course"))
    }

    /// delete_course
    ///
    /// Children first (the foreign keys do not cascade), then the course, then the
    /// orphan check on the storage keys the deleted resources pointed to.
    async fn delete_course(&self, id: Uuid) -> RepoResult<Vec<String>> {
        let mut tx = self.pool.begin().await.map_err(db_error("delete_course"))?;

        let keys = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT file_url FROM resources WHERE course_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("delete_course"))?;

        sqlx::query("DELETE FROM tasks WHERE course_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete_course"))?;
        sqlx::query("DELETE FROM resources WHERE course_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete_course"))?;
        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete_course"))?;

        let mut orphaned = Vec::with_capacity(keys.len());
        for key in keys {
            if !Self::is_referenced(&mut tx, &key)
                .await
                .map_err(db_error("delete_course"))?
            {
                orphaned.push(key);
            }
        }

        tx.commit().await.map_err(db_error("delete_course"))?;
        Ok(orphaned)
    }

    async fn owns_course_with_title_prefix(&self, owner: Uuid, prefix: &str) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (SELECT 1 FROM courses WHERE user_id = $1 AND title LIKE $2 ESCAPE '\')"#,
        )
        .bind(owner)
        .bind(like_prefix_pattern(prefix))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("owns_course_with_title_prefix"))
    }

    /// insert_course_tree
    ///
    /// One transaction: either the course and every copied child exist, or nothing does.
    async fn insert_course_tree(&self, owner: Uuid, tree: NewCourseTree) -> RepoResult<CourseDetail> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("insert_course_tree"))?;

        let course = Self::insert_course(&mut tx, owner, &tree.course)
            .await
            .map_err(db_error("insert_course_tree"))?;

        let mut tasks = Vec::with_capacity(tree.tasks.len());
        for task in &tree.tasks {
            tasks.push(
                Self::insert_task(&mut tx, course.id, task)
                    .await
                    .map_err(db_error("insert_course_tree"))?,
            );
        }

        let mut resources = Vec::with_capacity(tree.resources.len());
        for resource in &tree.resources {
            resources.push(
                Self::insert_resource(&mut tx, course.id, resource)
                    .await
                    .map_err(db_error("insert_course_tree"))?,
            );
        }

        tx.commit().await.map_err(db_error("insert_course_tree"))?;

        Ok(CourseDetail {
            course,
            tasks,
            resources,
            user: None,
        })
    }

    // --- TASKS ---

    async fn list_tasks(&self, course_id: Uuid) -> RepoResult<Vec<Task>> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE course_id = $1 ORDER BY deadline ASC, created_at ASC"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_tasks"))
    }

    async fn get_task(&self, id: Uuid) -> RepoResult<Option<Task>> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get_task"))
    }

    async fn create_task(&self, course_id: Uuid, task: NewTask) -> RepoResult<Task> {
        sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (id, course_id, title, description, deadline, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TASK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.deadline)
        .bind(task.status)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create_task"))
    }

    async fn update_task(&self, id: Uuid, changes: TaskChanges) -> RepoResult<Option<Task>> {
        sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks SET \
                title = COALESCE($2, title), \
                description = CASE WHEN $3 THEN $4 ELSE description END, \
                deadline = COALESCE($5, deadline), \
                status = COALESCE($6, status), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.title)
        .bind(changes.description.is_some())
        .bind(changes.description.clone().flatten())
        .bind(changes.deadline)
        .bind(changes.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update_task"))
    }

    async fn delete_task(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_task"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_owner_tasks(&self, owner: Uuid) -> RepoResult<Vec<Task>> {
        sqlx::query_as::<_, Task>(
            r#"
            SELECT t.id, t.course_id, t.title, t.description, t.deadline, t.status,
                   t.created_at, t.updated_at
            FROM tasks t
            JOIN courses c ON c.id = t.course_id
            WHERE c.user_id = $1
            ORDER BY t.deadline ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_owner_tasks"))
    }

    async fn owner_tasks_due_between(
        &self,
        owner: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
        status: Option<TaskStatus>,
    ) -> RepoResult<Vec<TaskWithCourse>> {
        let rows = sqlx::query_as::<_, TaskCourseRow>(
            r#"
            SELECT t.id, t.course_id, t.title, t.description, t.deadline, t.status,
                   t.created_at, t.updated_at, c.title AS course_title
            FROM tasks t
            JOIN courses c ON c.id = t.course_id
            WHERE c.user_id = $1
              AND t.deadline >= $2
              AND t.deadline <= $3
              AND ($4::task_status IS NULL OR t.status = $4)
            ORDER BY t.deadline ASC, t.created_at ASC
            "#,
        )
        .bind(owner)
        .bind(from)
        .bind(to)
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("owner_tasks_due_between"))?;

        Ok(rows.into_iter().map(TaskWithCourse::from).collect())
    }

    // --- RESOURCES ---

    async fn list_resources(&self, course_id: Uuid) -> RepoResult<Vec<Resource>> {
        sqlx::query_as::<_, Resource>(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE course_id = $1 ORDER BY created_at DESC"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_resources"))
    }

    async fn get_resource(&self, id: Uuid) -> RepoResult<Option<Resource>> {
        sqlx::query_as::<_, Resource>(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get_resource"))
    }

    async fn create_resource(&self, course_id: Uuid, resource: NewResource) -> RepoResult<Resource> {
        sqlx::query_as::<_, Resource>(&format!(
            "INSERT INTO resources (id, course_id, title, file_url, uploaded_by) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {RESOURCE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(&resource.title)
        .bind(&resource.file_url)
        .bind(resource.uploaded_by)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create_resource"))
    }

    async fn delete_resource(&self, id: Uuid) -> RepoResult<Option<String>> {
        let mut tx = self.pool.begin().await.map_err(db_error("delete_resource"))?;

        let deleted = sqlx::query_scalar::<_, String>(
            "DELETE FROM resources WHERE id = $1 RETURNING file_url",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("delete_resource"))?;

        let orphaned = match deleted {
            Some(key) => {
                let referenced = Self::is_referenced(&mut tx, &key)
                    .await
                    .map_err(db_error("delete_resource"))?;
                (!referenced).then_some(key)
            }
            None => None,
        };

        tx.commit().await.map_err(db_error("delete_resource"))?;
        Ok(orphaned)
    }
}
