//! Auth events delivered by the backend's auth subsystem.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Kind of auth state change.
///
/// The backend may deliver `InitialSession`, `SignedIn` and `TokenRefreshed`
/// more than once for the same logical change; consumers must tolerate that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    /// Application start, before the auth subsystem has reported anything.
    InitialLoad,
    /// Cached session restored at startup.
    InitialSession,
    /// Interactive sign-in completed.
    SignedIn,
    /// Access token was refreshed.
    TokenRefreshed,
    /// Session ended, locally or remotely.
    SignedOut,
}

impl AuthEventKind {
    /// Whether this kind is known to be redelivered by the backend.
    #[must_use]
    pub const fn may_be_redelivered(self) -> bool {
        matches!(
            self,
            Self::InitialSession | Self::SignedIn | Self::TokenRefreshed
        )
    }
}

impl std::fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InitialLoad => "INITIAL_LOAD",
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::SignedOut => "SIGNED_OUT",
        };
        f.write_str(s)
    }
}

/// A single auth state change together with the session's user, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEvent {
    /// What happened.
    pub kind: AuthEventKind,
    /// User carried by the session snapshot attached to the event.
    pub user_id: Option<UserId>,
}

impl AuthEvent {
    /// Create an event.
    #[must_use]
    pub const fn new(kind: AuthEventKind, user_id: Option<UserId>) -> Self {
        Self { kind, user_id }
    }

    /// Application start event. Carries no session.
    #[must_use]
    pub const fn initial_load() -> Self {
        Self::new(AuthEventKind::InitialLoad, None)
    }

    /// Restored-session event.
    #[must_use]
    pub const fn initial_session(user_id: Option<UserId>) -> Self {
        Self::new(AuthEventKind::InitialSession, user_id)
    }

    /// Sign-in event.
    #[must_use]
    pub const fn signed_in(user_id: UserId) -> Self {
        Self::new(AuthEventKind::SignedIn, Some(user_id))
    }

    /// Token refresh event.
    #[must_use]
    pub const fn token_refreshed(user_id: UserId) -> Self {
        Self::new(AuthEventKind::TokenRefreshed, Some(user_id))
    }

    /// Sign-out event.
    #[must_use]
    pub const fn signed_out() -> Self {
        Self::new(AuthEventKind::SignedOut, None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_redelivered_kinds() {
        assert!(AuthEventKind::InitialSession.may_be_redelivered());
        assert!(AuthEventKind::SignedIn.may_be_redelivered());
        assert!(AuthEventKind::TokenRefreshed.may_be_redelivered());
        assert!(!AuthEventKind::InitialLoad.may_be_redelivered());
        assert!(!AuthEventKind::SignedOut.may_be_redelivered());
    }

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&AuthEventKind::TokenRefreshed).unwrap();
        assert_eq!(json, "\"TOKEN_REFRESHED\"");
        assert_eq!(AuthEventKind::TokenRefreshed.to_string(), "TOKEN_REFRESHED");

        let parsed: AuthEventKind = serde_json::from_str("\"INITIAL_SESSION\"").unwrap();
        assert_eq!(parsed, AuthEventKind::InitialSession);
    }

    #[test]
    fn test_constructors() {
        let event = AuthEvent::signed_in(UserId::new("u1"));
        assert_eq!(event.kind, AuthEventKind::SignedIn);
        assert_eq!(event.user_id, Some(UserId::new("u1")));
        assert_eq!(AuthEvent::signed_out().user_id, None);
    }
}
