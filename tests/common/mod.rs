#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use service_portal::{
    AppConfig, AppState,
    auth::{Role, TokenKeys},
    models::{NewSession, SessionRecord, User, UserCredentials},
    repository::{Repository, RepositoryError},
};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use uuid::Uuid;

pub const COMPANY_ID: Uuid = Uuid::from_u128(0xC0);
pub const PASSWORD: &str = "correct-horse-battery";

// --- In-memory Repository ---

/// Repository double backed by hash maps. Counts session lookups and can
/// simulate an unreachable database.
#[derive(Default)]
pub struct MockRepo {
    users: Mutex<HashMap<Uuid, UserCredentials>>,
    sessions: Mutex<HashMap<String, NewSession>>,
    store_down: AtomicBool,
    lookups: AtomicUsize,
}

impl MockRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user with `PASSWORD` and returns its id. Super admins get no
    /// company, everyone else belongs to `COMPANY_ID`.
    pub fn add_user(&self, role: Role, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        let company_id = match role {
            Role::SuperAdmin => None,
            _ => Some(COMPANY_ID),
        };
        let credentials = UserCredentials {
            user: User {
                id,
                company_id,
                email: email.to_string(),
                role,
            },
            password_hash: bcrypt::hash(PASSWORD, 4).unwrap(),
        };
        self.users.lock().unwrap().insert(id, credentials);
        id
    }

    pub fn insert_session(&self, token: &str, user_id: Uuid, expires_at: DateTime<Utc>) {
        self.sessions.lock().unwrap().insert(
            token.to_string(),
            NewSession {
                token: token.to_string(),
                user_id,
                expires_at,
            },
        );
    }

    /// Signs a token for `user_id` and stores its session record, both
    /// expiring after `ttl`.
    pub fn start_session(&self, keys: &TokenKeys, user_id: Uuid, ttl: Duration) -> String {
        let now = Utc::now();
        let token = keys.issue(user_id, now, now + ttl).unwrap();
        self.insert_session(&token, user_id, now + ttl);
        token
    }

    pub fn has_session(&self, token: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(token)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn password_hash(&self, user_id: Uuid) -> String {
        self.users.lock().unwrap()[&user_id].password_hash.clone()
    }

    pub fn set_store_down(&self, down: bool) {
        self.store_down.store(down, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check_store(&self) -> Result<(), RepositoryError> {
        if self.store_down.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn lookup_session(&self, token: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_store()?;

        let sessions = self.sessions.lock().unwrap();
        let users = self.users.lock().unwrap();
        Ok(sessions.get(token).and_then(|session| {
            users.get(&session.user_id).map(|c| SessionRecord {
                token: session.token.clone(),
                user_id: session.user_id,
                role: c.user.role.clone(),
                company_id: c.user.company_id,
                expires_at: session.expires_at,
            })
        }))
    }

    async fn create_session(&self, session: NewSession) -> Result<(), RepositoryError> {
        self.check_store()?;
        self.sessions
            .lock()
            .unwrap()
            .insert(session.token.clone(), session);
        Ok(())
    }

    async fn delete_session(&self, token: &str) -> Result<bool, RepositoryError> {
        self.check_store()?;
        Ok(self.sessions.lock().unwrap().remove(token).is_some())
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        self.check_store()?;
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        self.check_store()?;
        Ok(self.users.lock().unwrap().get(&id).map(|c| c.user.clone()))
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        self.check_store()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|c| c.user.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }

    async fn find_credentials_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        self.check_store()?;
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        self.check_store()?;
        match self.users.lock().unwrap().get_mut(&user_id) {
            Some(c) => {
                c.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check_store()
    }
}

// --- State Helpers ---

pub fn test_config() -> AppConfig {
    AppConfig::default()
}

/// Keys matching the secret of `test_config()`.
pub fn test_keys() -> TokenKeys {
    TokenKeys::new(&test_config().session_secret)
}

pub fn test_state(repo: Arc<MockRepo>) -> AppState {
    AppState::new(repo, test_config())
}

/// `Cookie` header value carrying `token` under the configured name.
pub fn session_cookie(token: &str) -> String {
    format!("{}={}", test_config().session_cookie, token)
}
