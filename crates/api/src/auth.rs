//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs whose `sub` is the user ID. They are issued by
//! the identity provider in front of this service; [`JwtAuth::issue`]
//! exists for tooling and tests.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use list_common::config::AuthConfig;
use list_common::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// User ID given to unauthenticated requests when anonymous access is on.
pub const ANONYMOUS_USER_ID: &str = "anonymous";

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiry (Unix seconds).
    pub exp: i64,
}

/// The caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub anonymous: bool,
}

impl CurrentUser {
    fn anonymous() -> Self {
        Self {
            id: ANONYMOUS_USER_ID.to_string(),
            anonymous: true,
        }
    }
}

/// Token verifier.
#[derive(Clone)]
pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    allow_anonymous: bool,
}

impl JwtAuth {
    /// Build a verifier from configuration.
    pub fn new(config: &AuthConfig) -> AppResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(AppError::Config("auth.jwt_secret is required".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation: Validation::default(),
            allow_anonymous: config.allow_anonymous,
        })
    }

    /// Sign a token for `user_id` valid for `ttl`.
    pub fn issue(&self, user_id: &str, ttl: Duration) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "expired",
                    ErrorKind::InvalidSignature => "bad signature",
                    _ => "invalid",
                };
                debug!(reason, "Rejected bearer token");
                AppError::Unauthorized
            })
    }

    /// Resolve the caller from an `Authorization` header value.
    ///
    /// `Ok(None)` means no credentials were sent and anonymous access is
    /// off; a bad token is always an error.
    pub fn authenticate(&self, header: Option<&str>) -> AppResult<Option<CurrentUser>> {
        match header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) => {
                let claims = self.verify(token.trim())?;
                Ok(Some(CurrentUser {
                    id: claims.sub,
                    anonymous: false,
                }))
            }
            None if self.allow_anonymous => Ok(Some(CurrentUser::anonymous())),
            None => Ok(None),
        }
    }
}
