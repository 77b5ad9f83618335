use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{CourseDetail, NewCourse, NewCourseTree, NewResource, NewTask, TaskStatus},
    policy::{DenyReason, Operation, Principal, can_access},
    repository::{RepoError, Repository},
};

/// Appended to the title of a duplicated course.
pub const COPY_SUFFIX: &str = " (copie)";

/// DuplicationError
#[derive(Debug, Error)]
pub enum DuplicationError {
    #[error("Course not found")]
    NotFound,
    #[error("You already own this course")]
    AlreadyOwner,
    #[error(transparent)]
    Forbidden(DenyReason),
    #[error("You have already duplicated this course")]
    AlreadyDuplicated,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// copy_plan
///
/// Builds the rows of the copy of `source` owned by `actor`: the title gets the copy
/// suffix, every task restarts as `a_faire`, and every resource keeps the original
/// storage key while being attributed to `actor`.
pub fn copy_plan(source: &CourseDetail, actor: Uuid) -> NewCourseTree {
    NewCourseTree {
        course: NewCourse {
            title: format!("{}{}", source.course.title, COPY_SUFFIX),
            description: source.course.description.clone(),
            category: source.course.category.clone(),
        },
        tasks: source
            .tasks
            .iter()
            .map(|task| NewTask {
                title: task.title.clone(),
                description: task.description.clone(),
                deadline: task.deadline,
                status: TaskStatus::AFaire,
            })
            .collect(),
        resources: source
            .resources
            .iter()
            .map(|resource| NewResource {
                title: resource.title.clone(),
                file_url: resource.file_url.clone(),
                uploaded_by: actor,
            })
            .collect(),
    }
}

/// duplicate_course
///
/// Copies a peer's course into `actor`'s own course list.
///
/// Checks, in order: the source exists, `actor` does not own it, the `Read` policy allows
/// it, and `actor` owns no course whose title starts with the source title. The last
/// check is not atomic with the insert; two concurrent requests may both pass it.
pub async fn duplicate_course(
    repo: &dyn Repository,
    actor: Principal<'_>,
    source_id: Uuid,
) -> Result<CourseDetail, DuplicationError> {
    let course = repo
        .get_course(source_id)
        .await?
        .ok_or(DuplicationError::NotFound)?;

    if course.user_id == actor.id {
        return Err(DuplicationError::AlreadyOwner);
    }

    let owner = repo
        .get_user(course.user_id)
        .await?
        .ok_or(DuplicationError::NotFound)?;
    can_access(actor, owner.principal(), Operation::Read)
        .into_result()
        .map_err(DuplicationError::Forbidden)?;

    if repo
        .owns_course_with_title_prefix(actor.id, &course.title)
        .await?
    {
        return Err(DuplicationError::AlreadyDuplicated);
    }

    let source = CourseDetail {
        tasks: repo.list_tasks(course.id).await?,
        resources: repo.list_resources(course.id).await?,
        course,
        user: None,
    };

    let copy = repo
        .insert_course_tree(actor.id, copy_plan(&source, actor.id))
        .await?;
    tracing::info!(
        source_id = %source.course.id,
        copy_id = %copy.course.id,
        tasks = copy.tasks.len(),
        resources = copy.resources.len(),
        "course duplicated"
    );
    Ok(copy)
}
