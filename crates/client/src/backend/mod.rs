//! Hosted backend access.
//!
//! The campus backend is a managed service: Postgres behind a REST layer
//! with row-level security, a token-based auth subsystem, and realtime
//! auth events. This module defines the contract the session resolver
//! depends on ([`AuthBackend`]) and an HTTP implementation of it
//! ([`BackendClient`]).
//!
//! # Architecture
//!
//! - Email/password sign-in → access + refresh token → REST calls
//! - Tokens cached in memory, refreshed transparently when expired
//! - Auth state changes fanned out over a broadcast channel
//! - Role resolution is a two-step lookup: profile → role name

pub mod auth;
pub mod client;
pub mod events;
pub mod profiles;

pub use auth::AuthToken;
pub use client::BackendClient;
pub use events::AuthSubscription;
pub use profiles::RoleLookup;

use async_trait::async_trait;
use clubhub_core::UserId;
use thiserror::Error;

/// Message fragments the auth subsystem uses for dead refresh tokens.
const INVALID_REFRESH_PATTERNS: &[&str] = &["invalid refresh token", "refresh token not found"];

/// Errors that can occur when talking to the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Backend answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the backend.
        message: String,
    },

    /// Sign-in rejected (bad email/password).
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Refresh token is expired, revoked or unknown.
    #[error("Invalid refresh token: {0}")]
    InvalidRefreshToken(String),

    /// No session is available for an authenticated call.
    #[error("No session - sign-in required")]
    NoSession,

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl BackendError {
    /// Whether this error means the refresh credential is dead.
    ///
    /// Recognises the dedicated variant and any backend message carrying
    /// one of the auth subsystem's refresh-token failure phrases.
    #[must_use]
    pub fn is_invalid_refresh_token(&self) -> bool {
        match self {
            Self::InvalidRefreshToken(_) => true,
            Self::Api { message, .. } | Self::AuthenticationFailed(message) => {
                message_is_invalid_refresh(message)
            }
            _ => false,
        }
    }
}

/// Check a raw backend message for refresh-token failure phrases.
pub(crate) fn message_is_invalid_refresh(message: &str) -> bool {
    let lower = message.to_lowercase();
    INVALID_REFRESH_PATTERNS.iter().any(|p| lower.contains(p))
}

/// The client's cached view of a backend session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Authenticated user.
    pub user_id: UserId,
}

/// Operations the session resolver needs from the hosted backend.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Current session, refreshing the access token if needed.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::InvalidRefreshToken` if the cached refresh
    /// credential was rejected, or a transport error.
    async fn current_session(&self) -> Result<Option<Session>, BackendError>;

    /// Subscribe to auth state changes. Dropping the subscription
    /// unsubscribes.
    fn subscribe(&self) -> AuthSubscription;

    /// Resolve a user's role name via the profile and role relations.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport or decoding failures. A missing
    /// profile row is `Ok(RoleLookup::NotFound)`, not an error.
    async fn lookup_role(&self, user_id: &UserId) -> Result<RoleLookup, BackendError>;

    /// Drop cached credentials without contacting the backend.
    async fn sign_out_local(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_refresh_variant() {
        let err = BackendError::InvalidRefreshToken("revoked".to_string());
        assert!(err.is_invalid_refresh_token());
        assert_eq!(err.to_string(), "Invalid refresh token: revoked");
    }

    #[test]
    fn test_invalid_refresh_message_pattern() {
        let err = BackendError::Api {
            status: 400,
            message: "Invalid Refresh Token: Refresh Token Not Found".to_string(),
        };
        assert!(err.is_invalid_refresh_token());

        let err = BackendError::Api {
            status: 500,
            message: "upstream timeout".to_string(),
        };
        assert!(!err.is_invalid_refresh_token());
    }

    #[test]
    fn test_other_errors_are_not_refresh_failures() {
        assert!(!BackendError::NoSession.is_invalid_refresh_token());
        assert_eq!(
            BackendError::NoSession.to_string(),
            "No session - sign-in required"
        );
    }
}
