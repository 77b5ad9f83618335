use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{ApiError, ApiResult},
    models::User,
    policy::Principal,
    repository::RepositoryState,
};

/// Claims
///
/// Payload of a session token, signed with the server's HMAC secret.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (sub): the user's UUID.
    pub sub: Uuid,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
    /// Issuer (iss). Must match the configured issuer on verification.
    pub iss: String,
    /// The user's `token_version` at issue time. Logout bumps the stored version,
    /// which invalidates every token carrying an older one.
    pub ver: i32,
}

/// TokenError
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid or expired token")]
    Invalid,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// TokenIssuer
///
/// Contract of the session token lifecycle. The JWT implementation is used in every
/// environment; the trait keeps handlers independent of the token format.
pub trait TokenIssuer: Send + Sync {
    /// Issues a token for `user`, stamped with their current token version.
    fn issue_token(&self, user: &User) -> Result<String, TokenError>;

    /// Checks signature, issuer and expiry, and returns the claims.
    fn verify_token(&self, token: &str) -> Result<Claims, TokenError>;
}

/// TokenState
///
/// The concrete type used to share the token issuer across the application state.
pub type TokenState = Arc<dyn TokenIssuer>;

/// JwtTokenIssuer
///
/// HS256 JSON Web Tokens.
#[derive(Clone)]
pub struct JwtTokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtTokenIssuer {
    pub fn new(secret: &str, issuer: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, &config.jwt_issuer, config.jwt_ttl_minutes)
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue_token(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
            iss: self.issuer.clone(),
            ver: user.token_version,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        debug!(user_id = %user.id, "jwt signed");
        Ok(token)
    }

    fn verify_token(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            TokenError::Invalid
        })?;
        Ok(data.claims)
    }
}

// --- Credentials ---

/// hash_password
///
/// Argon2id PHC string with a fresh random salt.
pub fn hash_password(plain: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            ApiError::Internal(e.to_string())
        })
}

/// verify_password
///
/// A stored hash that cannot be parsed never verifies.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!(error = %e, "argon2 parse hash error");
            false
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles");
    }
    EMAIL_RE.is_match(email)
}

// --- Request identity ---

/// AuthUser
///
/// The resolved identity of an authenticated request: the user's id plus the profile
/// attributes the visibility policy needs.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub filiere: Option<String>,
    pub annee: Option<String>,
}

impl AuthUser {
    pub fn principal(&self) -> Principal<'_> {
        Principal::new(self.id, self.filiere.as_deref(), self.annee.as_deref())
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            filiere: user.filiere.clone(),
            annee: user.annee.clone(),
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Reuses the identity already resolved by `auth_middleware` for this request, if any.
/// 2. Reads the `Authorization: Bearer <token>` header.
/// 3. Verifies the token through the `TokenIssuer`.
/// 4. Loads the user, so a token of a vanished user is refused, and compares the
///    token version against the stored one (logout revocation).
///
/// Rejection: 401 `ApiError::Unauthorized` on any failure, 500 if the lookup fails.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(resolved) = parts.extensions.get::<AuthUser>() {
            return Ok(resolved.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let tokens = TokenState::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = tokens.verify_token(token).map_err(|e| {
            warn!("invalid or expired token");
            ApiError::from(e)
        })?;

        let user = repo
            .get_user(claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

        if user.token_version != claims.ver {
            warn!(user_id = %user.id, "revoked token presented");
            return Err(ApiError::Unauthorized(
                "Token has been revoked".to_string(),
            ));
        }

        Ok(AuthUser::from(&user))
    }
}
