use crate::AppState;
use axum::Router;

/// Customer portal, mounted under `/customer`.
pub fn customer_routes() -> Router<AppState> {
    super::portal_routes(&["jobs", "amc", "pickups", "profile"])
}
