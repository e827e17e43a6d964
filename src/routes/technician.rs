use crate::AppState;
use axum::Router;

/// Technician portal, mounted under `/technician`: assigned jobs, parts
/// usage and pickup/drop runs.
pub fn technician_routes() -> Router<AppState> {
    super::portal_routes(&["jobs", "parts", "pickups", "profile"])
}
