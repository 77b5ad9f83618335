use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod repository;
pub mod storage;

// Domain workflows composed from the repository and the policy.
pub mod duplication;
pub mod reporting;

// Module for routing segregation (Public, Authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use auth::{JwtTokenIssuer, TokenState};
pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// Auto-generated OpenAPI document, aggregating every `#[utoipa::path]` handler and
/// `ToSchema` model. Served at `/api-docs/openapi.json` and browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register, handlers::auth::login, handlers::auth::logout,
        handlers::auth::me, handlers::auth::update_profile,
        handlers::courses::list_courses, handlers::courses::create_course,
        handlers::courses::show_course, handlers::courses::update_course,
        handlers::courses::delete_course, handlers::courses::course_stats,
        handlers::courses::shared_courses, handlers::courses::shared_courses_by_year,
        handlers::courses::duplicate_course,
        handlers::tasks::list_tasks, handlers::tasks::create_task, handlers::tasks::show_task,
        handlers::tasks::update_task, handlers::tasks::delete_task, handlers::tasks::toggle_task,
        handlers::tasks::upcoming_tasks, handlers::tasks::calendar_tasks,
        handlers::resources::list_resources, handlers::resources::upload_resource,
        handlers::resources::delete_resource, handlers::resources::download_resource
    ),
    components(
        schemas(
            models::User, models::Course, models::Task, models::TaskStatus, models::Resource,
            models::OwnerSummary, models::CourseDetail, models::CourseRef,
            models::TaskWithCourse, models::DashboardStats, models::AuthResponse,
            models::MessageResponse, models::ErrorBody, models::RegisterRequest,
            models::LoginRequest, models::UpdateProfileRequest, models::CreateCourseRequest,
            models::UpdateCourseRequest, models::CreateTaskRequest, models::UpdateTaskRequest,
            models::UploadResourceForm,
        )
    ),
    tags(
        (name = "studenthub", description = "StudentHub course, task and resource API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single, immutable container holding every service a request may need. Cloned
/// per request; each service sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: Postgres in production, in-memory in tests.
    pub repo: RepositoryState,
    /// Storage Layer: S3/MinIO in production, in-memory mock in tests.
    pub storage: StorageState,
    /// Session token issuance and verification.
    pub tokens: TokenState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Assembles the state with a JWT issuer derived from `config`.
    pub fn new(repo: RepositoryState, storage: StorageState, config: AppConfig) -> Self {
        let tokens = Arc::new(JwtTokenIssuer::from_config(&config)) as TokenState;
        Self {
            repo,
            storage,
            tokens,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// Let handlers and extractors pull single components out of the shared AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for TokenState {
    fn from_ref(app_state: &AppState) -> TokenState {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for the `authenticated_routes`. Extracting `AuthUser`
/// rejects the request with a 401 JSON error before any handler runs; on success the
/// resolved identity is stored in the request extensions, where the handler's own
/// `AuthUser` extractor picks it up without a second lookup.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and scoped middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: No middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: Protected by the `auth_middleware`.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, carrying the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Used by `TraceLayer` to build the request span: HTTP method, URI and the
/// `x-request-id` header, so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
