use axum::{Json, extract::State, http::StatusCode};
use chrono::{Datelike, Duration, Utc};
use std::sync::Arc;
use studenthub::{
    AppConfig, AppState,
    auth::{AuthUser, hash_password},
    extract::{ApiJson, ApiPath, ApiQuery},
    handlers,
    models::{
        CalendarQuery, Course, CreateCourseRequest, CreateTaskRequest, LoginRequest, NewUser,
        RegisterRequest, Task, TaskListQuery, TaskStatus, UpcomingQuery, UpdateCourseRequest,
        UpdateProfileRequest, User,
    },
    repository::{InMemoryRepository, RepositoryState},
    storage::{MockStorageService, StorageState},
};
use tokio::test;
use uuid::Uuid;

// --- TEST UTILITIES ---

// Creates an AppState backed by the in-memory repository and the storage mock.
fn create_test_state() -> AppState {
    AppState::new(
        Arc::new(InMemoryRepository::new()) as RepositoryState,
        Arc::new(MockStorageService::new()) as StorageState,
        AppConfig::default(),
    )
}

async fn seed_user(state: &AppState, email: &str, filiere: Option<&str>, annee: Option<&str>) -> User {
    state
        .repo
        .create_user(NewUser {
            name: email.split('@').next().unwrap_or_default().to_string(),
            email: email.to_string(),
            password_hash: hash_password("secret123").unwrap(),
            filiere: filiere.map(str::to_string),
            annee: annee.map(str::to_string),
        })
        .await
        .unwrap()
}

fn auth_of(user: &User) -> AuthUser {
    AuthUser::from(user)
}

fn date_in(days: i64) -> String {
    (Utc::now().date_naive() + Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

async fn create_course(state: &AppState, owner: &User, title: &str, category: Option<&str>) -> Course {
    let payload = CreateCourseRequest {
        title: title.to_string(),
        description: Some("Notes de cours".to_string()),
        category: category.map(str::to_string),
    };
    let (status, Json(course)) =
        handlers::courses::create_course(auth_of(owner), State(state.clone()), ApiJson(payload))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    course
}

async fn create_task(state: &AppState, owner: &User, course_id: Uuid, title: &str, days: i64) -> Task {
    let payload = CreateTaskRequest {
        course_id: Some(course_id),
        title: title.to_string(),
        deadline: date_in(days),
        ..CreateTaskRequest::default()
    };
    let (_, Json(task)) =
        handlers::tasks::create_task(auth_of(owner), State(state.clone()), ApiJson(payload))
            .await
            .unwrap();
    task
}

// --- AUTH HANDLERS ---

#[test]
async fn test_register_success_and_duplicate_email() {
    let state = create_test_state();
    let payload = RegisterRequest {
        name: "  Awa Diop ".to_string(),
        email: "awa@univ.sn".to_string(),
        password: "secret123".to_string(),
        filiere: Some("Informatique".to_string()),
        annee: Some("".to_string()),
    };

    let (status, Json(body)) = handlers::auth::register(State(state.clone()), ApiJson(payload.clone()))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.user.name, "Awa Diop");
    // Blank optional input is stored as null.
    assert!(body.user.annee.is_none());
    assert!(!body.token.is_empty());

    let err = handlers::auth::register(State(state), ApiJson(payload))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(err.to_string(), "This email is already registered");
}

#[test]
async fn test_register_validation() {
    let state = create_test_state();

    let bad_email = RegisterRequest {
        name: "Awa".to_string(),
        email: "not-an-email".to_string(),
        password: "secret123".to_string(),
        ..RegisterRequest::default()
    };
    let err = handlers::auth::register(State(state.clone()), ApiJson(bad_email))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let short_password = RegisterRequest {
        name: "Awa".to_string(),
        email: "awa@univ.sn".to_string(),
        password: "12345".to_string(),
        ..RegisterRequest::default()
    };
    let err = handlers::auth::register(State(state.clone()), ApiJson(short_password))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let missing_name = RegisterRequest {
        email: "awa@univ.sn".to_string(),
        password: "secret123".to_string(),
        ..RegisterRequest::default()
    };
    let err = handlers::auth::register(State(state), ApiJson(missing_name))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "The name field is required");
}

#[test]
async fn test_login_success_and_invalid_credentials() {
    let state = create_test_state();
    let user = seed_user(&state, "login@univ.sn", None, None).await;

    let Json(body) = handlers::auth::login(
        State(state.clone()),
        ApiJson(LoginRequest {
            email: "login@univ.sn".to_string(),
            password: "secret123".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(body.user.id, user.id);

    let err = handlers::auth::login(
        State(state.clone()),
        ApiJson(LoginRequest {
            email: "login@univ.sn".to_string(),
            password: "wrong-password".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

    // Unknown email is indistinguishable from a wrong password.
    let unknown = handlers::auth::login(
        State(state),
        ApiJson(LoginRequest {
            email: "nobody@univ.sn".to_string(),
            password: "secret123".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(unknown.to_string(), err.to_string());
}

#[test]
async fn test_update_profile_clears_blank_fields() {
    let state = create_test_state();
    let user = seed_user(&state, "profile@univ.sn", Some("Informatique"), Some("L2")).await;

    let Json(updated) = handlers::auth::update_profile(
        auth_of(&user),
        State(state.clone()),
        ApiJson(UpdateProfileRequest {
            annee: Some(Some("  ".to_string())),
            filiere: Some(Some("Mathematiques".to_string())),
            ..UpdateProfileRequest::default()
        }),
    )
    .await
    .unwrap();

    assert_eq!(updated.filiere.as_deref(), Some("Mathematiques"));
    assert!(updated.annee.is_none());
    assert_eq!(updated.name, user.name);

    let err = handlers::auth::update_profile(
        auth_of(&user),
        State(state),
        ApiJson(UpdateProfileRequest {
            password: Some("123".to_string()),
            ..UpdateProfileRequest::default()
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

// --- COURSE HANDLERS ---

#[test]
async fn test_create_course_requires_title() {
    let state = create_test_state();
    let user = seed_user(&state, "owner@univ.sn", None, None).await;

    let err = handlers::courses::create_course(
        auth_of(&user),
        State(state),
        ApiJson(CreateCourseRequest {
            title: "   ".to_string(),
            ..CreateCourseRequest::default()
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[test]
async fn test_show_course_visibility() {
    let state = create_test_state();
    let owner = seed_user(&state, "x@univ.sn", Some("Informatique"), Some("L2")).await;
    let classmate = seed_user(&state, "y@univ.sn", Some("Informatique"), Some("L2")).await;
    let outsider = seed_user(&state, "z@univ.sn", Some("Mathematiques"), Some("L2")).await;
    let course = create_course(&state, &owner, "Algo", Some("Informatique")).await;

    let Json(detail) =
        handlers::courses::show_course(auth_of(&classmate), State(state.clone()), ApiPath(course.id))
            .await
            .unwrap();
    assert_eq!(detail.course.id, course.id);
    assert_eq!(detail.user.map(|u| u.id), Some(owner.id));

    let err = handlers::courses::show_course(auth_of(&outsider), State(state.clone()), ApiPath(course.id))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);

    let err = handlers::courses::show_course(auth_of(&owner), State(state), ApiPath(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[test]
async fn test_update_course_owner_only() {
    let state = create_test_state();
    let owner = seed_user(&state, "x@univ.sn", Some("Informatique"), Some("L2")).await;
    let classmate = seed_user(&state, "y@univ.sn", Some("Informatique"), Some("L2")).await;
    let course = create_course(&state, &owner, "Algo", Some("Informatique")).await;

    let err = handlers::courses::update_course(
        auth_of(&classmate),
        State(state.clone()),
        ApiPath(course.id),
        ApiJson(UpdateCourseRequest {
            title: Some("Hijacked".to_string()),
            ..UpdateCourseRequest::default()
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);

    let Json(updated) = handlers::courses::update_course(
        auth_of(&owner),
        State(state),
        ApiPath(course.id),
        ApiJson(UpdateCourseRequest {
            category: Some(Some("".to_string())),
            ..UpdateCourseRequest::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(updated.title, "Algo");
    assert!(updated.category.is_none());
    assert_eq!(updated.description.as_deref(), Some("Notes de cours"));
}

#[test]
async fn test_update_course_null_clears_fields() {
    let state = create_test_state();
    let owner = seed_user(&state, "x@univ.sn", Some("Informatique"), Some("L2")).await;
    let course = create_course(&state, &owner, "Algo", Some("Informatique")).await;

    let payload: UpdateCourseRequest =
        serde_json::from_str(r#"{"category":null,"description":null}"#).unwrap();
    let Json(updated) = handlers::courses::update_course(
        auth_of(&owner),
        State(state.clone()),
        ApiPath(course.id),
        ApiJson(payload),
    )
    .await
    .unwrap();
    assert_eq!(updated.title, "Algo");
    assert!(updated.category.is_none());
    assert!(updated.description.is_none());

    // An omitted field is left alone.
    let payload: UpdateCourseRequest = serde_json::from_str(r#"{"category":"Maths"}"#).unwrap();
    let Json(updated) = handlers::courses::update_course(
        auth_of(&owner),
        State(state),
        ApiPath(course.id),
        ApiJson(payload),
    )
    .await
    .unwrap();
    assert_eq!(updated.category.as_deref(), Some("Maths"));
    assert!(updated.description.is_none());
}

#[test]
async fn test_update_profile_null_leaves_program() {
    let state = create_test_state();
    let owner = seed_user(&state, "x@univ.sn", Some("Informatique"), Some("L2")).await;
    let classmate = seed_user(&state, "y@univ.sn", Some("Informatique"), Some("L2")).await;
    let course = create_course(&state, &owner, "Algo", None).await;

    let payload: UpdateProfileRequest = serde_json::from_str(r#"{"filiere":null}"#).unwrap();
    let Json(updated) =
        handlers::auth::update_profile(auth_of(&classmate), State(state.clone()), ApiJson(payload))
            .await
            .unwrap();
    assert!(updated.filiere.is_none());
    assert_eq!(updated.annee.as_deref(), Some("L2"));

    // Without a program the classmate no longer sees peer courses.
    let err = handlers::courses::show_course(auth_of(&updated), State(state), ApiPath(course.id))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);
}

#[test]
async fn test_course_stats_half_completed() {
    let state = create_test_state();
    let owner = seed_user(&state, "stats@univ.sn", None, None).await;
    let algo = create_course(&state, &owner, "Algo", Some("Informatique")).await;
    let analyse = create_course(&state, &owner, "Analyse", None).await;

    let t1 = create_task(&state, &owner, algo.id, "TP 1", 2).await;
    create_task(&state, &owner, algo.id, "TP 2", 30).await;
    let t3 = create_task(&state, &owner, analyse.id, "DM 1", 3).await;
    create_task(&state, &owner, analyse.id, "DM 2", 4).await;

    for id in [t1.id, t3.id] {
        let Json(toggled) = handlers::tasks::toggle_task(auth_of(&owner), State(state.clone()), ApiPath(id))
            .await
            .unwrap();
        assert_eq!(toggled.status, TaskStatus::Termine);
    }

    let Json(stats) = handlers::courses::course_stats(auth_of(&owner), State(state))
        .await
        .unwrap();
    assert_eq!(stats.total_courses, 2);
    assert_eq!(stats.total_tasks, 4);
    assert_eq!(stats.completed_tasks, 2);
    assert_eq!(stats.pending_tasks, 2);
    // DM 2 only: TP 2 is a month away.
    assert_eq!(stats.upcoming_deadlines, 1);
    assert_eq!(stats.completion_rate, 50.0);
    assert_eq!(stats.courses_by_category.get("Informatique"), Some(&1));
}

#[test]
async fn test_shared_courses_listing() {
    let state = create_test_state();
    let x = seed_user(&state, "x@univ.sn", Some("Informatique"), Some("L2")).await;
    let y = seed_user(&state, "y@univ.sn", Some("Informatique"), Some("L2")).await;
    let z = seed_user(&state, "z@univ.sn", Some("Mathematiques"), Some("L2")).await;
    let w = seed_user(&state, "w@univ.sn", Some("Informatique"), Some("L3")).await;
    create_course(&state, &x, "Algo", Some("Informatique")).await;

    let Json(seen_by_y) = handlers::courses::shared_courses(
        auth_of(&y),
        State(state.clone()),
        ApiPath("Informatique".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(seen_by_y.len(), 1);
    assert_eq!(seen_by_y[0].course.title, "Algo");
    assert_eq!(seen_by_y[0].user.as_ref().map(|u| u.id), Some(x.id));

    // Asking for another program's courses does not bypass the policy.
    let Json(seen_by_z) = handlers::courses::shared_courses(
        auth_of(&z),
        State(state.clone()),
        ApiPath("Informatique".to_string()),
    )
    .await
    .unwrap();
    assert!(seen_by_z.is_empty());

    let Json(seen_by_w) = handlers::courses::shared_courses(
        auth_of(&w),
        State(state.clone()),
        ApiPath("Informatique".to_string()),
    )
    .await
    .unwrap();
    assert!(seen_by_w.is_empty());

    // The owner never sees their own courses in the shared listing.
    let Json(seen_by_x) = handlers::courses::shared_courses_by_year(
        auth_of(&x),
        State(state),
        ApiPath(("Informatique".to_string(), "L2".to_string())),
    )
    .await
    .unwrap();
    assert!(seen_by_x.is_empty());
}

#[test]
async fn test_duplicate_course_flow() {
    let state = create_test_state();
    let x = seed_user(&state, "x@univ.sn", Some("Informatique"), Some("L2")).await;
    let y = seed_user(&state, "y@univ.sn", Some("Informatique"), Some("L2")).await;
    let z = seed_user(&state, "z@univ.sn", Some("Mathematiques"), Some("L2")).await;
    let algo = create_course(&state, &x, "Algo", Some("Informatique")).await;
    let done = create_task(&state, &x, algo.id, "TP 1", 5).await;
    create_task(&state, &x, algo.id, "TP 2", 9).await;
    handlers::tasks::toggle_task(auth_of(&x), State(state.clone()), ApiPath(done.id))
        .await
        .unwrap();

    let (status, Json(copy)) =
        handlers::courses::duplicate_course(auth_of(&y), State(state.clone()), ApiPath(algo.id))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(copy.course.title, "Algo (copie)");
    assert_eq!(copy.course.user_id, y.id);
    assert_ne!(copy.course.id, algo.id);
    assert_eq!(copy.tasks.len(), 2);
    assert!(copy.tasks.iter().all(|t| t.status == TaskStatus::AFaire));

    // The source is untouched.
    let Json(source_tasks) = handlers::tasks::list_tasks(
        auth_of(&x),
        State(state.clone()),
        ApiQuery(TaskListQuery {
            course_id: Some(algo.id),
        }),
    )
    .await
    .unwrap();
    assert!(source_tasks.iter().any(|t| t.status == TaskStatus::Termine));

    let again = handlers::courses::duplicate_course(auth_of(&y), State(state.clone()), ApiPath(algo.id))
        .await
        .unwrap_err();
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);

    let own = handlers::courses::duplicate_course(auth_of(&x), State(state.clone()), ApiPath(algo.id))
        .await
        .unwrap_err();
    assert_eq!(own.status(), StatusCode::BAD_REQUEST);

    let outsider = handlers::courses::duplicate_course(auth_of(&z), State(state.clone()), ApiPath(algo.id))
        .await
        .unwrap_err();
    assert_eq!(outsider.status(), StatusCode::FORBIDDEN);

    let missing = handlers::courses::duplicate_course(auth_of(&y), State(state), ApiPath(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[test]
async fn test_delete_course_cascades() {
    let state = create_test_state();
    let owner = seed_user(&state, "owner@univ.sn", None, None).await;
    let course = create_course(&state, &owner, "Algo", None).await;
    let task = create_task(&state, &owner, course.id, "TP 1", 2).await;

    handlers::courses::delete_course(auth_of(&owner), State(state.clone()), ApiPath(course.id))
        .await
        .unwrap();

    let err = handlers::tasks::list_tasks(
        auth_of(&owner),
        State(state.clone()),
        ApiQuery(TaskListQuery {
            course_id: Some(course.id),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
    assert!(state.repo.get_task(task.id).await.unwrap().is_none());
}

// --- TASK HANDLERS ---

#[test]
async fn test_create_task_validation_order() {
    let state = create_test_state();
    let owner = seed_user(&state, "owner@univ.sn", Some("Informatique"), None).await;
    let classmate = seed_user(&state, "peer@univ.sn", Some("Informatique"), None).await;
    let course = create_course(&state, &owner, "Algo", None).await;

    let missing_course = CreateTaskRequest {
        title: "TP".to_string(),
        deadline: date_in(1),
        ..CreateTaskRequest::default()
    };
    let err = handlers::tasks::create_task(auth_of(&owner), State(state.clone()), ApiJson(missing_course))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let bad_deadline = CreateTaskRequest {
        course_id: Some(course.id),
        title: "TP".to_string(),
        deadline: "30/11/2026".to_string(),
        ..CreateTaskRequest::default()
    };
    let err = handlers::tasks::create_task(auth_of(&owner), State(state.clone()), ApiJson(bad_deadline))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let unknown_course = CreateTaskRequest {
        course_id: Some(Uuid::new_v4()),
        title: "TP".to_string(),
        deadline: date_in(1),
        ..CreateTaskRequest::default()
    };
    let err = handlers::tasks::create_task(auth_of(&owner), State(state.clone()), ApiJson(unknown_course))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    let foreign = CreateTaskRequest {
        course_id: Some(course.id),
        title: "TP".to_string(),
        deadline: date_in(1),
        ..CreateTaskRequest::default()
    };
    let err = handlers::tasks::create_task(auth_of(&classmate), State(state.clone()), ApiJson(foreign))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);

    // Ownership is checked before the body.
    let foreign_invalid = CreateTaskRequest {
        course_id: Some(course.id),
        title: "  ".to_string(),
        deadline: "not-a-date".to_string(),
        ..CreateTaskRequest::default()
    };
    let err = handlers::tasks::create_task(auth_of(&classmate), State(state.clone()), ApiJson(foreign_invalid))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);

    let task = create_task(&state, &owner, course.id, "TP", 1).await;
    assert_eq!(task.status, TaskStatus::AFaire);
    assert_eq!(task.deadline.time(), chrono::NaiveTime::MIN);
}

#[test]
async fn test_list_tasks_requires_course_id() {
    let state = create_test_state();
    let owner = seed_user(&state, "owner@univ.sn", None, None).await;

    let err = handlers::tasks::list_tasks(
        auth_of(&owner),
        State(state),
        ApiQuery(TaskListQuery::default()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[test]
async fn test_toggle_and_delete_task_owner_only() {
    let state = create_test_state();
    let owner = seed_user(&state, "owner@univ.sn", Some("Informatique"), Some("L2")).await;
    let classmate = seed_user(&state, "peer@univ.sn", Some("Informatique"), Some("L2")).await;
    let course = create_course(&state, &owner, "Algo", None).await;
    let task = create_task(&state, &owner, course.id, "TP", 1).await;

    // Peers can read the task but not change it.
    let Json(seen) = handlers::tasks::show_task(auth_of(&classmate), State(state.clone()), ApiPath(task.id))
        .await
        .unwrap();
    assert_eq!(seen.id, task.id);

    let err = handlers::tasks::toggle_task(auth_of(&classmate), State(state.clone()), ApiPath(task.id))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);

    let err = handlers::tasks::delete_task(auth_of(&classmate), State(state.clone()), ApiPath(task.id))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);

    let Json(first) = handlers::tasks::toggle_task(auth_of(&owner), State(state.clone()), ApiPath(task.id))
        .await
        .unwrap();
    let Json(second) = handlers::tasks::toggle_task(auth_of(&owner), State(state.clone()), ApiPath(task.id))
        .await
        .unwrap();
    assert_eq!(first.status, TaskStatus::Termine);
    assert_eq!(second.status, TaskStatus::AFaire);

    handlers::tasks::delete_task(auth_of(&owner), State(state.clone()), ApiPath(task.id))
        .await
        .unwrap();
    let err = handlers::tasks::show_task(auth_of(&owner), State(state), ApiPath(task.id))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[test]
async fn test_upcoming_tasks_window() {
    let state = create_test_state();
    let owner = seed_user(&state, "owner@univ.sn", None, None).await;
    let course = create_course(&state, &owner, "Algo", None).await;
    create_task(&state, &owner, course.id, "Soon", 2).await;
    create_task(&state, &owner, course.id, "Later", 20).await;
    let done = create_task(&state, &owner, course.id, "Done", 1).await;
    handlers::tasks::toggle_task(auth_of(&owner), State(state.clone()), ApiPath(done.id))
        .await
        .unwrap();

    let Json(default_window) = handlers::tasks::upcoming_tasks(
        auth_of(&owner),
        State(state.clone()),
        ApiQuery(UpcomingQuery::default()),
    )
    .await
    .unwrap();
    assert_eq!(default_window.len(), 1);
    assert_eq!(default_window[0].task.title, "Soon");
    assert_eq!(default_window[0].course.title, "Algo");

    let Json(wide) = handlers::tasks::upcoming_tasks(
        auth_of(&owner),
        State(state.clone()),
        ApiQuery(UpcomingQuery { days: Some(30) }),
    )
    .await
    .unwrap();
    let titles: Vec<_> = wide.iter().map(|t| t.task.title.as_str()).collect();
    assert_eq!(titles, vec!["Soon", "Later"]);

    let err = handlers::tasks::upcoming_tasks(
        auth_of(&owner),
        State(state),
        ApiQuery(UpcomingQuery { days: Some(-1) }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[test]
async fn test_calendar_tasks_month() {
    let state = create_test_state();
    let owner = seed_user(&state, "owner@univ.sn", None, None).await;
    let course = create_course(&state, &owner, "Algo", None).await;
    let task = create_task(&state, &owner, course.id, "Exam", 0).await;

    let today = Utc::now().date_naive();
    let Json(month) = handlers::tasks::calendar_tasks(
        auth_of(&owner),
        State(state.clone()),
        ApiQuery(CalendarQuery {
            month: Some(today.month()),
            year: Some(today.year()),
        }),
    )
    .await
    .unwrap();
    assert!(month.iter().any(|t| t.task.id == task.id));

    let Json(other_year) = handlers::tasks::calendar_tasks(
        auth_of(&owner),
        State(state.clone()),
        ApiQuery(CalendarQuery {
            month: Some(today.month()),
            year: Some(today.year() - 1),
        }),
    )
    .await
    .unwrap();
    assert!(other_year.is_empty());

    let err = handlers::tasks::calendar_tasks(
        auth_of(&owner),
        State(state),
        ApiQuery(CalendarQuery {
            month: Some(13),
            year: Some(today.year()),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}
