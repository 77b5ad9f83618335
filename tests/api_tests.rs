use serde_json::{Value, json};
use std::sync::Arc;
use studenthub::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, create_router,
    models::{AuthResponse, Course, CourseDetail, DashboardStats, ErrorBody, Task, User},
    repository::RepositoryState,
    storage::StorageState,
};
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn register(&self, email: &str, filiere: &str, annee: &str) -> AuthResponse {
        let response = self
            .client
            .post(self.url("/register"))
            .json(&json!({
                "name": "Student",
                "email": email,
                "password": "secret123",
                "filiere": filiere,
                "annee": annee,
            }))
            .send()
            .await
            .expect("register request failed");
        assert_eq!(response.status(), 201);
        response.json().await.unwrap()
    }
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let storage = Arc::new(MockStorageService::new()) as StorageState;
    let state = AppState::new(repo, storage, AppConfig::default());
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    // Every response carries a correlation id.
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url("/api-docs/openapi.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let doc: Value = response.json().await.unwrap();
    assert!(doc["paths"].get("/courses/{id}/duplicate").is_some());
}

#[tokio::test]
async fn test_session_lifecycle() {
    let app = spawn_app().await;
    let registered = app.register("life@univ.sn", "Informatique", "L2").await;

    // Login
    let response = app
        .client
        .post(app.url("/login"))
        .json(&json!({ "email": "life@univ.sn", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let login: AuthResponse = response.json().await.unwrap();
    assert_eq!(login.user.id, registered.user.id);

    // Me
    let response = app
        .client
        .get(app.url("/me"))
        .bearer_auth(&login.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "life@univ.sn");
    assert!(body.get("password_hash").is_none());

    // Logout revokes every token issued so far, including the registration one.
    let response = app
        .client
        .post(app.url("/logout"))
        .bearer_auth(&login.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    for token in [&login.token, &registered.token] {
        let response = app
            .client
            .get(app.url("/me"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
    }

    // A fresh login works again.
    let response = app
        .client
        .post(app.url("/login"))
        .json(&json!({ "email": "life@univ.sn", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    let relogin: AuthResponse = response.json().await.unwrap();
    let response = app
        .client
        .get(app.url("/me"))
        .bearer_auth(&relogin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_course_and_task_lifecycle() {
    let app = spawn_app().await;
    let owner = app.register("owner@univ.sn", "Informatique", "L2").await;

    // Create
    let response = app
        .client
        .post(app.url("/courses"))
        .bearer_auth(&owner.token)
        .json(&json!({ "title": "Algo", "category": "Informatique" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let course: Course = response.json().await.unwrap();
    assert_eq!(course.user_id, owner.user.id);

    // Add a task
    let response = app
        .client
        .post(app.url("/tasks"))
        .bearer_auth(&owner.token)
        .json(&json!({ "course_id": course.id, "title": "TP 1", "deadline": "2030-01-15" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let task: Task = response.json().await.unwrap();

    // Toggle
    let response = app
        .client
        .patch(app.url(&format!("/tasks/{}/toggle", task.id)))
        .bearer_auth(&owner.token)
        .send()
        .await
        .unwrap();
    let toggled: Value = response.json().await.unwrap();
    assert_eq!(toggled["status"], "termine");

    // My courses embed tasks and resources.
    let response = app
        .client
        .get(app.url("/courses"))
        .bearer_auth(&owner.token)
        .send()
        .await
        .unwrap();
    let mine: Vec<CourseDetail> = response.json().await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].tasks.len(), 1);

    // Stats
    let response = app
        .client
        .get(app.url("/courses/stats"))
        .bearer_auth(&owner.token)
        .send()
        .await
        .unwrap();
    let stats: DashboardStats = response.json().await.unwrap();
    assert_eq!(stats.total_tasks, 1);
    assert_eq!(stats.completion_rate, 100.0);

    // Delete, then the tasks endpoint no longer knows the course.
    let response = app
        .client
        .delete(app.url(&format!("/courses/{}", course.id)))
        .bearer_auth(&owner.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = app
        .client
        .get(app.url(&format!("/tasks?course_id={}", course.id)))
        .bearer_auth(&owner.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_shared_course_between_classmates() {
    let app = spawn_app().await;
    let x = app.register("x@univ.sn", "Informatique", "L2").await;
    let y = app.register("y@univ.sn", "Informatique", "L2").await;
    let z = app.register("z@univ.sn", "Mathematiques", "L2").await;

    let response = app
        .client
        .post(app.url("/courses"))
        .bearer_auth(&x.token)
        .json(&json!({ "title": "Algo" }))
        .send()
        .await
        .unwrap();
    let course: Course = response.json().await.unwrap();

    let response = app
        .client
        .get(app.url("/courses/shared/Informatique"))
        .bearer_auth(&y.token)
        .send()
        .await
        .unwrap();
    let shared: Vec<CourseDetail> = response.json().await.unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].course.title, "Algo");
    let owner: &User = &x.user;
    assert_eq!(shared[0].user.as_ref().map(|u| u.id), Some(owner.id));

    let response = app
        .client
        .get(app.url("/courses/shared/Informatique"))
        .bearer_auth(&z.token)
        .send()
        .await
        .unwrap();
    let shared: Vec<CourseDetail> = response.json().await.unwrap();
    assert!(shared.is_empty());

    // Peers cannot modify the course.
    let response = app
        .client
        .put(app.url(&format!("/courses/{}", course.id)))
        .bearer_auth(&y.token)
        .json(&json!({ "title": "Mine" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let error: ErrorBody = response.json().await.unwrap();
    assert_eq!(error.error, "Only the owner can modify this course");
}

#[tokio::test]
async fn test_error_responses_are_json() {
    let app = spawn_app().await;
    let user = app.register("errors@univ.sn", "Informatique", "L2").await;

    // No token.
    let response = app.client.get(app.url("/courses")).send().await.unwrap();
    assert_eq!(response.status(), 401);
    let error: ErrorBody = response.json().await.unwrap();
    assert!(!error.error.is_empty());

    // Malformed id.
    let response = app
        .client
        .get(app.url("/courses/not-a-uuid"))
        .bearer_auth(&user.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let _: ErrorBody = response.json().await.unwrap();

    // Malformed JSON body.
    let response = app
        .client
        .post(app.url("/courses"))
        .bearer_auth(&user.token)
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let _: ErrorBody = response.json().await.unwrap();

    // Calendar without its parameters.
    let response = app
        .client
        .get(app.url("/tasks/calendar"))
        .bearer_auth(&user.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let error: ErrorBody = response.json().await.unwrap();
    assert_eq!(error.error, "month and year are required");
}
