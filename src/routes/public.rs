use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints the gate lets through without inspecting any token, plus the
/// login/register pages, which are open to anonymous callers but bounce
/// authenticated ones to their dashboard.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // GET /home
        .route("/", get(handlers::home))
        .route("/home", get(handlers::home))
        // GET /health
        // Liveness probe including a database round trip.
        .route("/health", get(handlers::health))
        // GET /unauthorized
        // Landing page for requests whose role does not own the prefix.
        .route("/unauthorized", get(handlers::unauthorized_page))
        // GET /auth/login, GET /auth/register
        .route("/auth/login", get(handlers::login_page))
        .route("/auth/register", get(handlers::register_page))
        // POST /api/auth/login
        // Issues the session token and record.
        .route("/api/auth/login", post(handlers::login))
}
