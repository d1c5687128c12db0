/**
 * Viewer Identity
 *
 * Session issuance lives elsewhere; this module only answers "who is the
 * current viewer, if anyone" for each request. The viewer comes from a bearer
 * JWT in the `Authorization` header, or from an `access_token` query
 * parameter for EventSource clients that cannot set headers.
 *
 * A missing, expired or malformed token yields an anonymous viewer rather
 * than an error; handlers that need a viewer call [`Viewer::require`].
 */

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{FromRef, FromRequestParts, Query};
use axum::http::{header::AUTHORIZATION, request::Parts};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::error::BackendError;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

/// Secret used to verify viewer tokens
#[derive(Clone)]
pub struct JwtSecret(Arc<str>);

impl JwtSecret {
    pub fn new(secret: &str) -> Self {
        Self(Arc::from(secret))
    }

    /// Create a token for `user_id`, valid for `ttl_secs`
    pub fn create_token(&self, user_id: Uuid, ttl_secs: u64) -> Result<String, jsonwebtoken::errors::Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let claims = Claims {
            sub: user_id.to_string(),
            exp: now + ttl_secs,
            iat: now,
        };

        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.0.as_bytes()))
    }

    /// Verify a token and return the viewer id it names
    pub fn verify(&self, token: &str) -> Option<Uuid> {
        let key = DecodingKey::from_secret(self.0.as_bytes());
        match decode::<Claims>(token, &key, &Validation::default()) {
            Ok(data) => Uuid::parse_str(&data.claims.sub).ok(),
            Err(e) => {
                tracing::debug!("[Auth] Rejected token: {}", e);
                None
            }
        }
    }
}

/// The current viewer, or `None` for anonymous requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer(pub Option<Uuid>);

impl Viewer {
    /// Viewer id, or `Unauthenticated`
    pub fn require(self) -> Result<Uuid, BackendError> {
        self.0.ok_or(BackendError::Unauthenticated)
    }

    pub fn id(self) -> Option<Uuid> {
        self.0
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

fn token_from_parts(parts: &Parts) -> Option<String> {
    if let Some(token) = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(query)| query.access_token)
}

impl<S> FromRequestParts<S> for Viewer
where
    JwtSecret: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let secret = JwtSecret::from_ref(state);
        Ok(Viewer(token_from_parts(parts).and_then(|token| secret.verify(&token))))
    }
}
