use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Routes open to every authenticated role. They sit outside the role-gated
/// prefixes, so the gate only requires a live session.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET /api/auth/me
        .route("/api/auth/me", get(handlers::get_me))
        // POST /api/auth/logout
        // Deletes the current session record.
        .route("/api/auth/logout", post(handlers::logout))
        // PUT /api/auth/password
        // Changes the password and revokes every session of the user.
        .route("/api/auth/password", put(handlers::change_password))
}
