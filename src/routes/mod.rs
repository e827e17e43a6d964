/// Router Module Index
///
/// Routing segregated by access level. The access gate in front of the whole
/// router decides who reaches which module; the split here mirrors the gate's
/// route table so a path's module tells you its rule.

/// Routes reachable without a session (home, login, health, docs).
pub mod public;

/// Routes for any authenticated role (session management, profile).
pub mod authenticated;

/// Role portals, nested under their gated prefixes.
pub mod admin;
pub mod customer;
pub mod super_admin;
pub mod technician;

use crate::{AppState, auth::AuthUser, handlers};
use axum::{
    Router,
    extract::{OriginalUri, Path},
    routing::get,
};

/// Dashboard plus the given section pages, shared by every role portal.
fn portal_routes(sections: &'static [&'static str]) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::dashboard))
        .route(
            "/{section}",
            get(
                move |user: AuthUser, uri: OriginalUri, Path(section): Path<String>| async move {
                    handlers::section_page(sections, user, uri, section).await
                },
            ),
        )
}
