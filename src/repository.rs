use crate::auth::Role;
use crate::models::{NewSession, SessionRecord, User, UserCredentials};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// Persistence contract for identities and session records. Handlers and the
/// access gate only see this trait, so tests swap in an in-memory store.
///
/// Every method reports store failures as `Err` instead of an empty result:
/// the gate must tell "no such session" apart from "could not look".
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Session Records ---
    /// Finds the session keyed by `token`, joined with its user's role and
    /// tenant. Expiry is not filtered here; the caller decides.
    async fn lookup_session(&self, token: &str) -> Result<Option<SessionRecord>, RepositoryError>;
    async fn create_session(&self, session: NewSession) -> Result<(), RepositoryError>;
    // Returns true if a row was removed.
    async fn delete_session(&self, token: &str) -> Result<bool, RepositoryError>;
    // Revokes every session of a user. Returns the number removed.
    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, RepositoryError>;

    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError>;
    async fn find_credentials_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<UserCredentials>, RepositoryError>;
    async fn update_password(&self, user_id: Uuid, password_hash: &str)
    -> Result<bool, RepositoryError>;

    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer held in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

// --- Row Types ---

#[derive(FromRow)]
struct SessionRow {
    token: String,
    user_id: Uuid,
    role: String,
    company_id: Option<Uuid>,
    expires_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            token: row.token,
            user_id: row.user_id,
            role: Role::from(row.role),
            company_id: row.company_id,
            expires_at: row.expires_at,
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    company_id: Option<Uuid>,
    email: String,
    role: String,
    password_hash: String,
}

impl From<UserRow> for UserCredentials {
    fn from(row: UserRow) -> Self {
        Self {
            user: User {
                id: row.id,
                company_id: row.company_id,
                email: row.email,
                role: Role::from(row.role),
            },
            password_hash: row.password_hash,
        }
    }
}

/// PostgresRepository
///
/// `Repository` backed by the shared `PgPool`. Expects
/// `users(id, company_id, email, password_hash, role)` and
/// `sessions(token, user_id, expires_at, created_at)`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, company_id, email, role, password_hash";

#[async_trait]
impl Repository for PostgresRepository {
    async fn lookup_session(&self, token: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT s.token, s.user_id, u.role, u.company_id, s.expires_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SessionRecord::from))
    }

    async fn create_session(&self, session: NewSession) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO sessions (token, user_id, expires_at, created_at) VALUES ($1, $2, $3, NOW())",
        )
        .bind(&session.token)
        .bind(session.user_id)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_session(&self, token: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.find_credentials_by_id(id).await?.map(|c| c.user))
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        // Emails are matched case-insensitively, as typed at the login form.
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(UserCredentials::from))
    }

    async fn find_credentials_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(UserCredentials::from))
    }

    async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
