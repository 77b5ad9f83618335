use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{RepoError, RepoResult, Repository};
use crate::models::{
    Course, CourseChanges, CourseDetail, CourseRef, NewCourse, NewCourseTree, NewResource,
    NewTask, NewUser, Resource, Task, TaskChanges, TaskStatus, TaskWithCourse, User, UserChanges,
};

#[derive(Default)]
struct Store {
    users: Vec<User>,
    courses: Vec<Course>,
    tasks: Vec<Task>,
    resources: Vec<Resource>,
}

impl Store {
    fn course_title(&self, id: Uuid) -> Option<&str> {
        self.courses
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.title.as_str())
    }

    fn owns(&self, owner: Uuid, course_id: Uuid) -> bool {
        self.courses
            .iter()
            .any(|c| c.id == course_id && c.user_id == owner)
    }

    fn is_referenced(&self, file_url: &str) -> bool {
        self.resources.iter().any(|r| r.file_url == file_url)
    }

    fn push_course(&mut self, owner: Uuid, course: NewCourse) -> Course {
        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            user_id: owner,
            title: course.title,
            description: course.description,
            category: course.category,
            created_at: now,
            updated_at: now,
        };
        self.courses.push(course.clone());
        course
    }

    fn push_task(&mut self, course_id: Uuid, task: NewTask) -> Task {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            course_id,
            title: task.title,
            description: task.description,
            deadline: task.deadline,
            status: task.status,
            created_at: now,
            updated_at: now,
        };
        self.tasks.push(task.clone());
        task
    }

    fn push_resource(&mut self, course_id: Uuid, resource: NewResource) -> Resource {
        let now = Utc::now();
        let resource = Resource {
            id: Uuid::new_v4(),
            course_id,
            title: resource.title,
            file_url: resource.file_url,
            uploaded_by: resource.uploaded_by,
            created_at: now,
            updated_at: now,
        };
        self.resources.push(resource.clone());
        resource
    }
}

// Newest first; later insertions win ties so equal timestamps keep a stable order.
fn newest_first<T>(items: Vec<T>, key: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut items: Vec<T> = items.into_iter().rev().collect();
    items.sort_by_key(|item| Reverse(key(item)));
    items
}

/// InMemoryRepository
///
/// A `Repository` kept in process memory with the same observable semantics as the
/// Postgres implementation. All tables live behind one mutex, which is never held
/// across an `.await`, so every method is atomic.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- USERS ---

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.store();
        if store.users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::Conflict(
                "This email is already registered".to_string(),
            ));
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            filiere: user.filiere,
            annee: user.annee,
            token_version: 0,
            created_at: now,
            updated_at: now,
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.store().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .store()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>> {
        let mut store = self.store();
        let Some(user) = store.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(filiere) = changes.filiere {
            user.filiere = filiere;
        }
        if let Some(annee) = changes.annee {
            user.annee = annee;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn bump_token_version(&self, id: Uuid) -> RepoResult<()> {
        if let Some(user) = self.store().users.iter_mut().find(|u| u.id == id) {
            user.token_version += 1;
        }
        Ok(())
    }

    // --- COURSES ---

    async fn list_courses(&self, owner: Uuid) -> RepoResult<Vec<Course>> {
        let store = self.store();
        let owned: Vec<Course> = store
            .courses
            .iter()
            .filter(|c| c.user_id == owner)
            .cloned()
            .collect();
        Ok(newest_first(owned, |c| c.created_at))
    }

    async fn list_courses_by_program(
        &self,
        filiere: &str,
        annee: Option<&str>,
        exclude_owner: Uuid,
    ) -> RepoResult<Vec<Course>> {
        let store = self.store();
        let owners: BTreeSet<Uuid> = store
            .users
            .iter()
            .filter(|u| u.filiere.as_deref() == Some(filiere))
            .filter(|u| annee.is_none() || u.annee.as_deref() == annee)
            .map(|u| u.id)
            .collect();
        let matching: Vec<Course> = store
            .courses
            .iter()
            .filter(|c| c.user_id != exclude_owner && owners.contains(&c.user_id))
            .cloned()
            .collect();
        Ok(newest_first(matching, |c| c.created_at))
    }

    async fn get_course(&self, id: Uuid) -> RepoResult<Option<Course>> {
        Ok(self.store().courses.iter().find(|c| c.id == id).cloned())
    }

    async fn create_course(&self, owner: Uuid, course: NewCourse) -> RepoResult<Course> {
        Ok(self.store().push_course(owner, course))
    }

    async fn update_course(&self, id: Uuid, changes: CourseChanges) -> RepoResult<Option<Course>> {
        let mut store = self.store();
        let Some(course) = store.courses.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            course.title = title;
        }
        if let Some(description) = changes.description {
            course.description = description;
        }
        if let Some(category) = changes.category {
            course.category = category;
        }
        course.updated_at = Utc::now();
        Ok(Some(course.clone()))
    }

    async fn delete_course(&self, id: Uuid) -> RepoResult<Vec<String>> {
        let mut store = self.store();
        let keys: BTreeSet<String> = store
            .resources
            .iter()
            .filter(|r| r.course_id == id)
            .map(|r| r.file_url.clone())
            .collect();

        store.tasks.retain(|t| t.course_id != id);
        store.resources.retain(|r| r.course_id != id);
        store.courses.retain(|c| c.id != id);

        Ok(keys
            .into_iter()
            .filter(|key| !store.is_referenced(key))
            .collect())
    }

    async fn owns_course_with_title_prefix(&self, owner: Uuid, prefix: &str) -> RepoResult<bool> {
        Ok(self
            .store()
            .courses
            .iter()
            .any(|c| c.user_id == owner && c.title.starts_with(prefix)))
    }

    async fn insert_course_tree(&self, owner: Uuid, tree: NewCourseTree) -> RepoResult<CourseDetail> {
        let mut store = self.store();
        let course = store.push_course(owner, tree.course);
        let tasks = tree
            .tasks
            .into_iter()
            .map(|task| store.push_task(course.id, task))
            .collect();
        let resources = tree
            .resources
            .into_iter()
            .map(|resource| store.push_resource(course.id, resource))
            .collect();
        Ok(CourseDetail {
            course,
            tasks,
            resources,
            user: None,
        })
    }

    // --- TASKS ---

    async fn list_tasks(&self, course_id: Uuid) -> RepoResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .store()
            .tasks
            .iter()
            .filter(|t| t.course_id == course_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.deadline);
        Ok(tasks)
    }

    async fn get_task(&self, id: Uuid) -> RepoResult<Option<Task>> {
        Ok(self.store().tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn create_task(&self, course_id: Uuid, task: NewTask) -> RepoResult<Task> {
        Ok(self.store().push_task(course_id, task))
    }

    async fn update_task(&self, id: Uuid, changes: TaskChanges) -> RepoResult<Option<Task>> {
        let mut store = self.store();
        let Some(task) = store.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            task.title = title;
        }
        if let Some(description) = changes.description {
            task.description = description;
        }
        if let Some(deadline) = changes.deadline {
            task.deadline = deadline;
        }
        if let Some(status) = changes.status {
            task.status = status;
        }
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store();
        let before = store.tasks.len();
        store.tasks.retain(|t| t.id != id);
        Ok(store.tasks.len() < before)
    }

    async fn list_owner_tasks(&self, owner: Uuid) -> RepoResult<Vec<Task>> {
        let store = self.store();
        let mut tasks: Vec<Task> = store
            .tasks
            .iter()
            .filter(|t| store.owns(owner, t.course_id))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.deadline);
        Ok(tasks)
    }

    async fn owner_tasks_due_between(
        &self,
        owner: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
        status: Option<TaskStatus>,
    ) -> RepoResult<Vec<TaskWithCourse>> {
        let store = self.store();
        let mut due: Vec<TaskWithCourse> = store
            .tasks
            .iter()
            .filter(|t| store.owns(owner, t.course_id))
            .filter(|t| t.deadline >= from && t.deadline <= to)
            .filter(|t| status.is_none_or(|s| t.status == s))
            .filter_map(|t| {
                let title = store.course_title(t.course_id)?;
                Some(TaskWithCourse {
                    task: t.clone(),
                    course: CourseRef {
                        id: t.course_id,
                        title: title.to_string(),
                    },
                })
            })
            .collect();
        due.sort_by_key(|entry| entry.task.deadline);
        Ok(due)
    }

    // --- RESOURCES ---

    async fn list_resources(&self, course_id: Uuid) -> RepoResult<Vec<Resource>> {
        let store = self.store();
        let attached: Vec<Resource> = store
            .resources
            .iter()
            .filter(|r| r.course_id == course_id)
            .cloned()
            .collect();
        Ok(newest_first(attached, |r| r.created_at))
    }

    async fn get_resource(&self, id: Uuid) -> RepoResult<Option<Resource>> {
        Ok(self.store().resources.iter().find(|r| r.id == id).cloned())
    }

    async fn create_resource(&self, course_id: Uuid, resource: NewResource) -> RepoResult<Resource> {
        Ok(self.store().push_resource(course_id, resource))
    }

    async fn delete_resource(&self, id: Uuid) -> RepoResult<Option<String>> {
        let mut store = self.store();
        let Some(position) = store.resources.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let removed = store.resources.remove(position);
        Ok((!store.is_referenced(&removed.file_url)).then_some(removed.file_url))
    }
}
