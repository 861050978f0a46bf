//! JWT and password module.
//!
//! Handles token generation and validation, plus argon2 password hashing.
//!
//! Access and refresh tokens are signed with different secrets, so one can
//! never be accepted in place of the other even before `token_type` is
//! checked.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vidtube_core::SessionIdentity;

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,

    /// Token type ("access" or "refresh")
    pub token_type: String,

    /// Only on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Token errors.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Expected {expected} token")]
    WrongType { expected: &'static str },

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// JWT token manager.
pub struct JwtManager {
    access_secret: String,
    refresh_secret: String,
    access_lifetime_secs: i64,
    refresh_lifetime_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager.
    pub fn new(
        access_secret: impl Into<String>,
        access_lifetime_secs: i64,
        refresh_secret: impl Into<String>,
        refresh_lifetime_secs: i64,
    ) -> Self {
        JwtManager {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_lifetime_secs,
            refresh_lifetime_secs,
        }
    }

    pub fn access_lifetime_secs(&self) -> i64 {
        self.access_lifetime_secs
    }

    pub fn refresh_lifetime_secs(&self) -> i64 {
        self.refresh_lifetime_secs
    }

    /// Generate an access token carrying the user's profile claims.
    pub fn generate_access_token(&self, identity: &SessionIdentity) -> Result<String, JwtError> {
        let mut claims = new_claims(&identity.id, ACCESS, self.access_lifetime_secs);
        claims.username = Some(identity.username.clone());
        claims.email = Some(identity.email.clone());
        claims.full_name = Some(identity.full_name.clone());

        sign(&claims, &self.access_secret)
    }

    /// Generate a refresh token. It carries the user id only.
    pub fn generate_refresh_token(&self, user_id: &str) -> Result<String, JwtError> {
        let claims = new_claims(user_id, REFRESH, self.refresh_lifetime_secs);
        sign(&claims, &self.refresh_secret)
    }

    /// Validate that a token is an unexpired access token.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = verify(token, &self.access_secret)?;

        if claims.token_type != ACCESS {
            return Err(JwtError::WrongType { expected: ACCESS });
        }

        Ok(claims)
    }

    /// Validate that a token is an unexpired refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = verify(token, &self.refresh_secret)?;

        if claims.token_type != REFRESH {
            return Err(JwtError::WrongType { expected: REFRESH });
        }

        Ok(claims)
    }
}

fn new_claims(sub: &str, token_type: &str, lifetime_secs: i64) -> Claims {
    let now = Utc::now();
    let exp = now + Duration::seconds(lifetime_secs);

    Claims {
        sub: sub.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
        jti: Uuid::new_v4().to_string(),
        token_type: token_type.to_string(),
        username: None,
        email: None,
        full_name: None,
    }
}

fn sign(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::Signing(e.to_string()))
}

fn verify(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let token_data: TokenData<Claims> = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::Invalid(e.to_string()),
    })?;

    Ok(token_data.claims)
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// =============================================================================
// Passwords
// =============================================================================

/// Password hashing errors.
#[derive(Debug, thiserror::Error)]
#[error("Failed to hash password: {0}")]
pub struct PasswordError(String);

/// Hash a password with argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError(e.to_string()))
}

/// Check a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
