use crate::AppState;
use axum::Router;

/// Admin Router Module
///
/// Company administrators run the day-to-day business of one tenant.
/// Mounted under `/admin`; the gate only lets the `admin` role through.
pub fn admin_routes() -> Router<AppState> {
    super::portal_routes(&[
        "customers",
        "technicians",
        "jobs",
        "leads",
        "parts",
        "sales",
        "amc",
        "pickups",
        "profile",
    ])
}
