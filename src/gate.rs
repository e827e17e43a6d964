//! Access Gate
//!
//! One decision per inbound request: classify the path, authenticate the
//! session token, resolve the caller's role and check it against the
//! role-gated prefixes. Every failure resolves to a redirect; nothing in here
//! propagates an error to the router.

use std::{collections::HashMap, sync::Arc};

use axum::{
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};

use crate::{
    auth::{AuthUser, Role, SessionCookie, TokenError, TokenKeys},
    repository::{Repository, RepositoryError},
};

/// PathRule
///
/// A single entry of the route classification table. Prefixes match whole
/// path segments: `/admin` covers `/admin` and `/admin/jobs` but not
/// `/administrator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRule {
    Exact(String),
    Prefix(String),
}

impl PathRule {
    pub fn exact(path: &str) -> Self {
        PathRule::Exact(path.to_string())
    }

    pub fn prefix(path: &str) -> Self {
        PathRule::Prefix(normalize_prefix(path))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathRule::Exact(exact) => path == exact,
            PathRule::Prefix(prefix) => segment_prefix(prefix, path),
        }
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn segment_prefix(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// RouteTable
///
/// Static route classification, built once at startup and shared by every
/// request.
#[derive(Debug, Clone)]
pub struct RouteTable {
    public: Vec<PathRule>,
    auth_pages: Vec<PathRule>,
    gated: Vec<String>,
    allowed: HashMap<Role, Vec<String>>,
    dashboards: HashMap<Role, String>,
    login_path: String,
    unauthorized_path: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::portal()
    }
}

impl RouteTable {
    /// An empty table: nothing public, nothing gated.
    pub fn new(login_path: &str, unauthorized_path: &str) -> Self {
        Self {
            public: Vec::new(),
            auth_pages: Vec::new(),
            gated: Vec::new(),
            allowed: HashMap::new(),
            dashboards: HashMap::new(),
            login_path: login_path.to_string(),
            unauthorized_path: unauthorized_path.to_string(),
        }
    }

    /// The portal's classification: one gated prefix per role, each role
    /// confined to its own prefix.
    pub fn portal() -> Self {
        let mut table = Self::new("/auth/login", "/unauthorized")
            .with_public(PathRule::exact("/"))
            .with_public(PathRule::prefix("/home"))
            .with_public(PathRule::prefix("/health"))
            .with_public(PathRule::prefix("/unauthorized"))
            .with_public(PathRule::prefix("/api/public"))
            .with_public(PathRule::prefix("/api/auth/login"))
            .with_public(PathRule::prefix("/swagger-ui"))
            .with_public(PathRule::prefix("/api-docs"))
            .with_auth_page(PathRule::prefix("/auth/login"))
            .with_auth_page(PathRule::prefix("/auth/register"));

        for (role, prefix) in [
            (Role::Admin, "/admin"),
            (Role::Technician, "/technician"),
            (Role::Customer, "/customer"),
            (Role::SuperAdmin, "/super-admin"),
        ] {
            table = table
                .with_gated(prefix)
                .allow(role.clone(), prefix)
                .with_dashboard(role, &format!("{prefix}/dashboard"));
        }
        table
    }

    pub fn with_public(mut self, rule: PathRule) -> Self {
        self.public.push(rule);
        self
    }

    /// Login/register style pages: reachable without a session, but an
    /// authenticated caller is sent to its dashboard instead.
    pub fn with_auth_page(mut self, rule: PathRule) -> Self {
        self.auth_pages.push(rule);
        self
    }

    pub fn with_gated(mut self, prefix: &str) -> Self {
        self.gated.push(normalize_prefix(prefix));
        self
    }

    pub fn allow(mut self, role: Role, prefix: &str) -> Self {
        self.allowed
            .entry(role)
            .or_default()
            .push(normalize_prefix(prefix));
        self
    }

    pub fn with_dashboard(mut self, role: Role, path: &str) -> Self {
        self.dashboards.insert(role, path.to_string());
        self
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public.iter().any(|rule| rule.matches(path))
    }

    pub fn is_auth_page(&self, path: &str) -> bool {
        self.auth_pages.iter().any(|rule| rule.matches(path))
    }

    /// The role-gated prefix covering `path`, if any. The longest match wins
    /// so nested gated prefixes stay distinguishable.
    pub fn gated_prefix(&self, path: &str) -> Option<&str> {
        self.gated
            .iter()
            .filter(|prefix| segment_prefix(prefix, path))
            .max_by_key(|prefix| prefix.len())
            .map(String::as_str)
    }

    /// Prefixes `role` may reach. Roles without an entry get none.
    pub fn allowed_prefixes(&self, role: &Role) -> &[String] {
        self.allowed.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dashboard_for(&self, role: &Role) -> Option<&str> {
        self.dashboards.get(role).map(String::as_str)
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn unauthorized_path(&self) -> &str {
        &self.unauthorized_path
    }
}

/// GateDecision
///
/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Pass through. Carries the identity when the request was authenticated.
    Allow(Option<AuthUser>),
    Redirect(String),
    /// Redirect and expire the client's session cookie.
    RedirectAndClear(String),
}

impl GateDecision {
    /// Splits the decision into the identity to forward (`Ok`) or the
    /// redirect to answer with (`Err`).
    pub fn resolve(self, cookie: &SessionCookie) -> Result<Option<AuthUser>, Response> {
        match self {
            GateDecision::Allow(user) => Ok(user),
            GateDecision::Redirect(location) => Err(Redirect::to(&location).into_response()),
            GateDecision::RedirectAndClear(location) => {
                let mut response = Redirect::to(&location).into_response();
                response
                    .headers_mut()
                    .append(header::SET_COOKIE, cookie.clear());
                Err(response)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("no session token on a protected path")]
    MissingCredential,
    #[error("session token failed verification: {0}")]
    InvalidSignature(#[from] TokenError),
    #[error("session revoked or expired")]
    RevokedOrExpiredSession,
    #[error("role `{role}` may not access `{prefix}`")]
    InsufficientRole { role: Role, prefix: String },
    #[error("session store unavailable: {0}")]
    StoreUnavailable(#[from] RepositoryError),
}

impl GateError {
    /// Maps each failure to its redirect. Store failures are handled like a
    /// bad token so an outage never lets a request through.
    pub fn decision(&self, routes: &RouteTable) -> GateDecision {
        match self {
            GateError::MissingCredential => GateDecision::Redirect(routes.login_path().to_string()),
            GateError::InvalidSignature(_)
            | GateError::RevokedOrExpiredSession
            | GateError::StoreUnavailable(_) => {
                GateDecision::RedirectAndClear(routes.login_path().to_string())
            }
            GateError::InsufficientRole { .. } => {
                GateDecision::Redirect(routes.unauthorized_path().to_string())
            }
        }
    }
}

/// AccessGate
///
/// Holds the route table and token keys. Cheap to clone.
#[derive(Clone)]
pub struct AccessGate {
    routes: Arc<RouteTable>,
    keys: TokenKeys,
}

impl AccessGate {
    pub fn new(routes: RouteTable, keys: TokenKeys) -> Self {
        Self {
            routes: Arc::new(routes),
            keys,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    /// evaluate
    ///
    /// Decides the fate of a request to `path` carrying `token`. Performs at
    /// most one signature check and one store lookup; nothing is cached
    /// between calls.
    pub async fn evaluate(
        &self,
        path: &str,
        token: Option<&str>,
        store: &dyn Repository,
        now: DateTime<Utc>,
    ) -> GateDecision {
        // Public rules win over everything else, the token is never looked at.
        if self.routes.is_public(path) {
            return GateDecision::Allow(None);
        }

        let auth_page = self.routes.is_auth_page(path);
        let Some(token) = token else {
            if auth_page {
                return GateDecision::Allow(None);
            }
            return self.reject(path, GateError::MissingCredential);
        };

        let user = match self.authenticate(token, store, now).await {
            Ok(user) => user,
            Err(err) => return self.reject(path, err),
        };

        if auth_page {
            let target = self
                .routes
                .dashboard_for(&user.role)
                .unwrap_or(self.routes.unauthorized_path());
            tracing::debug!(path, role = %user.role, redirect = target, "authenticated user sent to dashboard");
            return GateDecision::Redirect(target.to_string());
        }

        if let Some(prefix) = self.routes.gated_prefix(path) {
            let permitted = self
                .routes
                .allowed_prefixes(&user.role)
                .iter()
                .any(|allowed| allowed == prefix);
            if !permitted {
                let err = GateError::InsufficientRole {
                    role: user.role.clone(),
                    prefix: prefix.to_string(),
                };
                return self.reject(path, err);
            }
        }

        tracing::debug!(path, user_id = %user.id, role = %user.role, "request allowed");
        GateDecision::Allow(Some(user))
    }

    async fn authenticate(
        &self,
        token: &str,
        store: &dyn Repository,
        now: DateTime<Utc>,
    ) -> Result<AuthUser, GateError> {
        let claims = self.keys.verify(token)?;

        let record = store
            .lookup_session(token)
            .await?
            .ok_or(GateError::RevokedOrExpiredSession)?;

        if record.expires_at <= now || record.user_id != claims.sub {
            return Err(GateError::RevokedOrExpiredSession);
        }

        Ok(AuthUser {
            id: record.user_id,
            role: record.role,
            company_id: record.company_id,
        })
    }

    fn reject(&self, path: &str, err: GateError) -> GateDecision {
        match &err {
            GateError::MissingCredential => tracing::debug!(path, "{err}"),
            GateError::StoreUnavailable(_) => tracing::error!(path, "{err}"),
            _ => tracing::warn!(path, "{err}"),
        }
        err.decision(&self.routes)
    }
}
