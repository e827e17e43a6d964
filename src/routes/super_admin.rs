use crate::AppState;
use axum::Router;

/// Super Admin Router Module
///
/// Platform operators managing tenants. Mounted under `/super-admin`; the
/// gate only lets the `superadmin` role through.
pub fn super_admin_routes() -> Router<AppState> {
    super::portal_routes(&["companies", "profile"])
}
