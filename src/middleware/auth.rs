//! Bearer-token authentication
//!
//! Tokens are HS256 JWTs issued by the identity provider. The `sub` claim is
//! the user's UUID; every ownership check in the services compares against it.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AppError, AppErrorKind, AuthError};
use crate::middleware::error::get_request_id_from_headers;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Verifies bearer tokens against the identity provider's signing secret
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false,
        }

        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!(error = %e, "bearer token rejected");
            AppError::new(AppErrorKind::Auth(AuthError::InvalidToken {
                reason: e.to_string(),
            }))
        })?;

        let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| {
            AppError::new(AppErrorKind::Auth(AuthError::InvalidToken {
                reason: "subject is not a UUID".to_string(),
            }))
        })?;

        Ok(AuthUser {
            user_id,
            email: data.claims.email,
        })
    }
}

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tag = |err: AppError| match get_request_id_from_headers(&parts.headers) {
            Some(request_id) => err.with_request_id(request_id),
            None => err,
        };
        let token = bearer_token(parts).ok_or_else(|| tag(AppError::unauthorized()))?;
        let verifier = Arc::<TokenVerifier>::from_ref(state);
        verifier.verify(token).map_err(tag)
    }
}
