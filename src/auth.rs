use std::fmt;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role
///
/// Access-level classification of an authenticated identity. The database
/// stores the lowercase tag; anything this build does not recognise becomes
/// `Unknown` and is denied every role-gated prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Technician,
    Customer,
    SuperAdmin,
    Unknown(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Technician => "technician",
            Role::Customer => "customer",
            Role::SuperAdmin => "superadmin",
            Role::Unknown(tag) => tag,
        }
    }
}

impl From<&str> for Role {
    fn from(tag: &str) -> Self {
        match tag {
            "admin" => Role::Admin,
            "technician" => Role::Technician,
            "customer" => Role::Customer,
            "superadmin" => Role::SuperAdmin,
            other => Role::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(tag: String) -> Self {
        Role::from(tag.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims
///
/// Payload of a session token. The token itself is also the key of the
/// server-side session record, so `jti` keeps two logins within the same
/// second from producing the same token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user the session belongs to.
    pub sub: Uuid,
    /// Expiration time (seconds since epoch).
    pub exp: usize,
    /// Issued at (seconds since epoch).
    pub iat: usize,
    pub jti: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),
    #[error("token expiry is out of range")]
    InvalidExpiry,
}

/// TokenKeys
///
/// Signing and verification material derived once from the configured secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Signs a new session token for `user_id`, valid until `expires_at`.
    pub fn issue(
        &self,
        user_id: Uuid,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let iat = usize::try_from(issued_at.timestamp()).map_err(|_| TokenError::InvalidExpiry)?;
        let exp = usize::try_from(expires_at.timestamp()).map_err(|_| TokenError::InvalidExpiry)?;
        if exp <= iat {
            return Err(TokenError::InvalidExpiry);
        }

        let claims = Claims {
            sub: user_id,
            exp,
            iat,
            jti: Uuid::new_v4(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Checks the signature and expiry of `token` and returns its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

/// SessionCookie
///
/// Name and attributes of the cookie carrying the session token.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    secure: bool,
}

impl SessionCookie {
    pub fn new(name: &str, secure: bool) -> Self {
        Self {
            name: name.to_string(),
            secure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the token from the request's `Cookie` headers, if any.
    /// An empty value counts as absent.
    pub fn read<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// `Set-Cookie` value storing `token` for `max_age`.
    pub fn issue(&self, token: &str, max_age: chrono::Duration) -> HeaderValue {
        self.header(token, max_age.num_seconds().max(0))
    }

    /// `Set-Cookie` value that makes the client drop the session cookie.
    pub fn clear(&self) -> HeaderValue {
        self.header("", 0)
    }

    fn header(&self, value: &str, max_age: i64) -> HeaderValue {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.name, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        // Token values are base64url with dots, always valid header bytes.
        HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
    }
}

/// AuthUser
///
/// The identity resolved by the access gate for the current request. The gate
/// middleware stores it in the request extensions; handlers take it as an
/// argument.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
    /// Tenant the user belongs to. `None` for platform-level super admins.
    pub company_id: Option<Uuid>,
}

/// Rejects with 401 when the gate did not attach an identity, which only
/// happens if a handler needing one is mounted on a public path.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
