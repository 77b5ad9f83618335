use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Everything else in the API requires one.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and monitoring.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Creates an account and returns it with a first session token.
        .route("/register", post(handlers::auth::register))
        // POST /login
        // Exchanges email and password for a session token.
        .route("/login", post(handlers::auth::login))
}
