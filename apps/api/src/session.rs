//! # Session Token Manager
//!
//! Issues, rotates and revokes the access/refresh token pair bound to a user.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Session State (per user)                             │
//! │                                                                         │
//! │              issue (login)                                              │
//! │   ┌──────────┐ ──────────────► ┌──────────┐ ──┐                         │
//! │   │NoSession │                 │  Active  │   │ rotate (refresh-token)  │
//! │   │ (NULL)   │ ◄────────────── │ (r_n)    │ ◄─┘ r_n ──► r_n+1           │
//! │   └──────────┘   revoke        └──────────┘                             │
//! │                  (logout)                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rotation Checks (fail-fast, in order)
//! 1. token present and non-blank          → `MissingCredential`
//! 2. signature, expiry, `token_type`      → `InvalidCredential`
//! 3. the user still exists                → `UnknownIdentity`
//! 4. token equals the stored value        → `StaleCredential`
//!
//! The final write is a compare-and-swap against the presented token, so of
//! two concurrent rotations with the same token exactly one wins; the other
//! gets `StaleCredential`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::auth::JwtManager;
use vidtube_core::SessionIdentity;
use vidtube_db::{DbError, UserRepository};

// =============================================================================
// Store
// =============================================================================

/// Persistence the session manager needs: one nullable refresh token per user.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the user's claims and stored refresh token.
    async fn load_identity(&self, user_id: &str) -> Result<Option<SessionIdentity>, DbError>;

    /// Unconditionally stores `token` as the user's refresh token.
    async fn store_refresh_token(&self, user_id: &str, token: &str) -> Result<(), DbError>;

    /// Stores `new` only if the current value equals `expected`.
    async fn swap_refresh_token(
        &self,
        user_id: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, DbError>;

    /// Clears the stored refresh token. Missing users are not an error.
    async fn clear_refresh_token(&self, user_id: &str) -> Result<(), DbError>;
}

#[async_trait]
impl SessionStore for UserRepository {
    async fn load_identity(&self, user_id: &str) -> Result<Option<SessionIdentity>, DbError> {
        self.find_session_identity(user_id).await
    }

    async fn store_refresh_token(&self, user_id: &str, token: &str) -> Result<(), DbError> {
        self.set_refresh_token(user_id, Some(token)).await
    }

    async fn swap_refresh_token(
        &self,
        user_id: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, DbError> {
        UserRepository::swap_refresh_token(self, user_id, expected, new).await
    }

    async fn clear_refresh_token(&self, user_id: &str) -> Result<(), DbError> {
        match self.set_refresh_token(user_id, None).await {
            Err(DbError::NotFound { .. }) => Ok(()),
            other => other,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Session failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No refresh token was presented.
    #[error("Refresh token missing")]
    MissingCredential,

    /// Bad signature, expired, malformed, or not a refresh token.
    #[error("Refresh token failed verification")]
    InvalidCredential,

    /// The token verified but its user no longer exists.
    #[error("Refresh token names an unknown user")]
    UnknownIdentity,

    /// The token verified but is no longer the stored one.
    #[error("Refresh token is expired or used")]
    StaleCredential,

    /// Signing or persisting a new pair failed.
    #[error("Failed to issue credentials: {0}")]
    CredentialIssuance(String),

    /// Clearing the stored token failed.
    #[error("Failed to revoke session: {0}")]
    Revocation(String),
}

// =============================================================================
// Manager
// =============================================================================

/// A freshly minted token pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues, rotates and revokes sessions.
pub struct SessionTokenManager {
    jwt: Arc<JwtManager>,
    store: Arc<dyn SessionStore>,
}

impl SessionTokenManager {
    pub fn new(jwt: Arc<JwtManager>, store: Arc<dyn SessionStore>) -> Self {
        SessionTokenManager { jwt, store }
    }

    /// Mints a new pair for `user_id` and stores its refresh half,
    /// replacing any previous session.
    pub async fn issue(&self, user_id: &str) -> Result<CredentialPair, SessionError> {
        let identity = self
            .store
            .load_identity(user_id)
            .await
            .map_err(issuance_failed)?
            .ok_or_else(|| {
                SessionError::CredentialIssuance(format!("user {user_id} not found"))
            })?;

        let pair = self.mint(&identity)?;

        self.store
            .store_refresh_token(user_id, &pair.refresh_token)
            .await
            .map_err(issuance_failed)?;

        info!(user_id = %user_id, "Session issued");
        Ok(pair)
    }

    /// Exchanges a refresh token for a new pair. The presented token is
    /// single-use.
    pub async fn rotate(&self, presented: Option<&str>) -> Result<CredentialPair, SessionError> {
        let presented = presented
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::MissingCredential)?;

        let claims = self.jwt.validate_refresh_token(presented).map_err(|e| {
            debug!(error = %e, "Refresh token rejected");
            SessionError::InvalidCredential
        })?;

        let identity = self
            .store
            .load_identity(&claims.sub)
            .await
            .map_err(issuance_failed)?
            .ok_or(SessionError::UnknownIdentity)?;

        if identity.refresh_token.as_deref() != Some(presented) {
            warn!(user_id = %identity.id, "Stale refresh token presented");
            return Err(SessionError::StaleCredential);
        }

        let pair = self.mint(&identity)?;

        let swapped = self
            .store
            .swap_refresh_token(&identity.id, presented, &pair.refresh_token)
            .await
            .map_err(issuance_failed)?;

        if !swapped {
            warn!(user_id = %identity.id, "Lost refresh token rotation race");
            return Err(SessionError::StaleCredential);
        }

        info!(user_id = %identity.id, "Session rotated");
        Ok(pair)
    }

    /// Ends the user's session. Idempotent.
    pub async fn revoke(&self, user_id: &str) -> Result<(), SessionError> {
        self.store.clear_refresh_token(user_id).await.map_err(|e| {
            error!(user_id = %user_id, error = %e, "Failed to revoke session");
            SessionError::Revocation(e.to_string())
        })?;

        info!(user_id = %user_id, "Session revoked");
        Ok(())
    }

    fn mint(&self, identity: &SessionIdentity) -> Result<CredentialPair, SessionError> {
        let access_token = self
            .jwt
            .generate_access_token(identity)
            .map_err(|e| SessionError::CredentialIssuance(e.to_string()))?;
        let refresh_token = self
            .jwt
            .generate_refresh_token(&identity.id)
            .map_err(|e| SessionError::CredentialIssuance(e.to_string()))?;

        Ok(CredentialPair {
            access_token,
            refresh_token,
        })
    }
}

fn issuance_failed(err: DbError) -> SessionError {
    error!(error = %err, "Session store failure");
    SessionError::CredentialIssuance(err.to_string())
}

// =============================================================================
// Unit Tests
// =============================================================================
