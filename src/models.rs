use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Role;

// --- Identity & Session Records (Internal) ---

/// User
///
/// A portal account as resolved from the `users` table.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    // Tenant scope. Platform super admins belong to no company.
    pub company_id: Option<Uuid>,
    pub email: String,
    pub role: Role,
}

/// UserCredentials
///
/// A user together with the stored bcrypt hash. Only ever handled by the
/// login and password handlers; never serialized.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// SessionRecord
///
/// Server-side session row keyed by the token value, joined with the owning
/// user so the gate can resolve the role in a single lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: Uuid,
    pub role: Role,
    pub company_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
}

/// NewSession
///
/// Input for inserting a session record at login.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Input payload for POST /api/auth/login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[schema(example = "dispatch@acme-repairs.test")]
    pub email: String,
    pub password: String,
}

/// ChangePasswordRequest
///
/// Input payload for PUT /api/auth/password. A successful change revokes
/// every session of the user, including the current one.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// --- Output Schemas ---

/// UserProfile
///
/// Public view of an account (GET /api/auth/me, login response).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub email: String,
    pub role: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            company_id: user.company_id,
            email: user.email,
            role: user.role.into(),
        }
    }
}

/// LoginResponse
///
/// Returned alongside the session cookie. `redirect_to` is the dashboard of
/// the user's role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub redirect_to: String,
}

/// PageResponse
///
/// Descriptor returned by page routes. The frontend owns rendering; the
/// server only confirms the page and who is viewing it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PageResponse {
    pub page: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub role: Option<String>,
}

/// HealthResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
}
