use crate::{
    AppState,
    auth::{AuthUser, Role},
    models::{
        ChangePasswordRequest, HealthResponse, LoginRequest, LoginResponse, NewSession,
        PageResponse, UserProfile,
    },
};
use axum::{
    Json,
    extract::{OriginalUri, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::fmt::Display;

/// Shortest password accepted by the password change endpoint.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Titles of every portal section. Which sections a portal offers is decided
/// by its router.
const PORTAL_SECTIONS: &[(&str, &str)] = &[
    ("companies", "Companies"),
    ("customers", "Customers"),
    ("technicians", "Technicians"),
    ("jobs", "Jobs"),
    ("leads", "Leads"),
    ("parts", "Inventory Parts"),
    ("sales", "Sales"),
    ("amc", "AMC Contracts"),
    ("pickups", "Pickup & Drop"),
    ("profile", "Profile"),
];

fn internal_error<E: Display>(context: &'static str) -> impl FnOnce(E) -> StatusCode {
    move |e| {
        tracing::error!("{context}: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn verify_password(password: String, hash: String) -> Result<bool, StatusCode> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(internal_error("password verification task failed"))?
        .map_err(internal_error("stored password hash is unreadable"))
}

async fn hash_password(password: String, cost: u32) -> Result<String, StatusCode> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(internal_error("password hashing task failed"))?
        .map_err(internal_error("password hashing failed"))
}

fn page(path: &str, title: &str, role: Option<&Role>) -> Json<PageResponse> {
    Json(PageResponse {
        page: path.to_string(),
        title: title.to_string(),
        role: role.map(|r| r.to_string()),
    })
}

fn portal_title(role: &Role) -> &'static str {
    match role {
        Role::Admin => "Admin",
        Role::Technician => "Technician",
        Role::Customer => "Customer",
        Role::SuperAdmin => "Super Admin",
        Role::Unknown(_) => "Portal",
    }
}

// --- Session Lifecycle ---

/// login
///
/// [Public Route] Exchanges email and password for a session. On success a
/// session record is stored under the freshly signed token and the token is
/// set as an HTTP-only cookie.
///
/// Unknown email and wrong password both answer 401.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, StatusCode> {
    let credentials = state
        .repo
        .find_credentials_by_email(&payload.email)
        .await
        .map_err(internal_error("login lookup failed"))?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !verify_password(payload.password, credentials.password_hash).await? {
        tracing::info!(user_id = %credentials.user.id, "login rejected");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user = credentials.user;
    let ttl = state.config.session_ttl();
    let now = Utc::now();
    let expires_at = now + ttl;

    let token = state
        .gate
        .keys()
        .issue(user.id, now, expires_at)
        .map_err(internal_error("token signing failed"))?;

    state
        .repo
        .create_session(NewSession {
            token: token.clone(),
            user_id: user.id,
            expires_at,
        })
        .await
        .map_err(internal_error("session insert failed"))?;

    let routes = state.gate.routes();
    let redirect_to = routes
        .dashboard_for(&user.role)
        .unwrap_or(routes.unauthorized_path())
        .to_string();

    tracing::info!(user_id = %user.id, role = %user.role, "session started");

    let cookie = state.config.session_cookie().issue(&token, ttl);
    let body = LoginResponse {
        user: UserProfile::from(user),
        redirect_to,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// logout
///
/// [Authenticated Route] Deletes the current session record and clears the cookie.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Logged out"))
)]
pub async fn logout(
    user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    let cookie = state.config.session_cookie();
    if let Some(token) = cookie.read(&headers) {
        state
            .repo
            .delete_session(token)
            .await
            .map_err(internal_error("session delete failed"))?;
    }

    tracing::info!(user_id = %user.id, "session ended");
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie.clear())]).into_response())
}

/// change_password
///
/// [Authenticated Route] Replaces the caller's password after checking the
/// current one, then revokes all of the caller's sessions.
#[utoipa::path(
    put,
    path = "/api/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed, sessions revoked"),
        (status = 403, description = "Current password is wrong"),
        (status = 422, description = "New password too short")
    )
)]
pub async fn change_password(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Response, StatusCode> {
    if payload.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let credentials = state
        .repo
        .find_credentials_by_id(user.id)
        .await
        .map_err(internal_error("credential lookup failed"))?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !verify_password(payload.current_password, credentials.password_hash).await? {
        return Err(StatusCode::FORBIDDEN);
    }

    let new_hash = hash_password(payload.new_password, state.config.bcrypt_cost).await?;
    if !state
        .repo
        .update_password(user.id, &new_hash)
        .await
        .map_err(internal_error("password update failed"))?
    {
        return Err(StatusCode::NOT_FOUND);
    }

    let revoked = state
        .repo
        .delete_user_sessions(user.id)
        .await
        .map_err(internal_error("session revocation failed"))?;

    tracing::info!(user_id = %user.id, revoked, "password changed");
    let cookie = state.config.session_cookie();
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie.clear())]).into_response())
}

/// get_me
///
/// [Authenticated Route] The profile of the identity resolved by the gate.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 404, description = "User no longer exists")
    )
)]
pub async fn get_me(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, StatusCode> {
    match state
        .repo
        .get_user(user.id)
        .await
        .map_err(internal_error("profile lookup failed"))?
    {
        Some(found) => Ok(Json(UserProfile::from(found))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

// --- Portal Pages ---

/// dashboard
///
/// [Role Route] Landing page of a role portal. The gate has already checked
/// that the caller's role owns this prefix.
#[utoipa::path(
    get,
    path = "/{portal}/dashboard",
    params(("portal" = String, Path, description = "admin, technician, customer or super-admin")),
    responses((status = 200, description = "Dashboard", body = PageResponse))
)]
pub async fn dashboard(user: AuthUser, OriginalUri(uri): OriginalUri) -> Json<PageResponse> {
    let title = format!("{} Dashboard", portal_title(&user.role));
    page(uri.path(), &title, Some(&user.role))
}

/// section_page
///
/// [Role Route] A section of a role portal (jobs, leads, parts, ...). Each
/// portal passes the sections it offers; anything else is 404.
#[utoipa::path(
    get,
    path = "/{portal}/{section}",
    params(
        ("portal" = String, Path, description = "admin, technician, customer or super-admin"),
        ("section" = String, Path, description = "Portal section")
    ),
    responses(
        (status = 200, description = "Section", body = PageResponse),
        (status = 404, description = "Unknown section")
    )
)]
pub async fn section_page(
    sections: &[&str],
    user: AuthUser,
    OriginalUri(uri): OriginalUri,
    section: String,
) -> Result<Json<PageResponse>, StatusCode> {
    if !sections.contains(&section.as_str()) {
        return Err(StatusCode::NOT_FOUND);
    }
    let title = PORTAL_SECTIONS
        .iter()
        .find(|(slug, _)| *slug == section)
        .map(|(_, title)| *title)
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(page(uri.path(), title, Some(&user.role)))
}

#[utoipa::path(get, path = "/", responses((status = 200, description = "Page", body = PageResponse)))]
pub async fn home() -> Json<PageResponse> {
    page("/", "Home", None)
}

#[utoipa::path(get, path = "/auth/login", responses((status = 200, description = "Page", body = PageResponse)))]
pub async fn login_page() -> Json<PageResponse> {
    page("/auth/login", "Sign in", None)
}

#[utoipa::path(get, path = "/auth/register", responses((status = 200, description = "Page", body = PageResponse)))]
pub async fn register_page() -> Json<PageResponse> {
    page("/auth/register", "Register", None)
}

#[utoipa::path(get, path = "/unauthorized", responses((status = 200, description = "Page", body = PageResponse)))]
pub async fn unauthorized_page() -> Json<PageResponse> {
    page("/unauthorized", "Unauthorized", None)
}

/// health
///
/// [Public Route] Liveness plus a database round trip.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let timestamp = Utc::now();
    match state.repo.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                database: "ok".to_string(),
                timestamp,
            }),
        ),
        Err(e) => {
            tracing::error!("health check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded".to_string(),
                    database: "unavailable".to_string(),
                    timestamp,
                }),
            )
        }
    }
}
