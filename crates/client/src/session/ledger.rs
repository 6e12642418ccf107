//! Auth event de-duplication.
//!
//! The auth subsystem redelivers `INITIAL_SESSION`, `SIGNED_IN` and
//! `TOKEN_REFRESHED`. [`EventLedger`] is the transition function keyed by
//! (event class, user) that decides whether an event needs a resolution
//! pass. Classification and recording are separate so that an event the
//! resolver had to drop is not remembered as handled.

use clubhub_core::{AuthEvent, AuthEventKind, UserId};

/// What the resolver should do with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Clear everything.
    SignOut,
    /// Run a resolution pass.
    Resolve,
    /// Same event already handled for this user.
    Duplicate,
}

/// Dedup class of an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventClass {
    /// `INITIAL_SESSION` and `SIGNED_IN`: a session for this user exists.
    Established,
    /// `TOKEN_REFRESHED`
    Refreshed,
}

impl EventClass {
    /// Only kinds the backend redelivers are deduplicated.
    const fn of(kind: AuthEventKind) -> Option<Self> {
        if !kind.may_be_redelivered() {
            return None;
        }
        match kind {
            AuthEventKind::TokenRefreshed => Some(Self::Refreshed),
            _ => Some(Self::Established),
        }
    }
}

/// Last handled (event class, user) pair.
#[derive(Debug, Default)]
pub struct EventLedger {
    last: Option<(EventClass, UserId)>,
}

impl EventLedger {
    /// Create an empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Decide what `event` requires, without recording it.
    ///
    /// `SIGNED_OUT` always signs out. `INITIAL_LOAD` and events without a
    /// user always resolve. Everything else is a duplicate when the same
    /// class was the last event committed for the same user.
    #[must_use]
    pub fn classify(&self, event: &AuthEvent) -> Disposition {
        if event.kind == AuthEventKind::SignedOut {
            return Disposition::SignOut;
        }

        let (Some(class), Some(user_id)) = (EventClass::of(event.kind), event.user_id.as_ref())
        else {
            return Disposition::Resolve;
        };

        if self
            .last
            .as_ref()
            .is_some_and(|(c, u)| *c == class && u == user_id)
        {
            Disposition::Duplicate
        } else {
            Disposition::Resolve
        }
    }

    /// Record `event` as handled.
    ///
    /// `SIGNED_OUT` resets the ledger so the next sign-in is handled even
    /// for the same user.
    pub fn commit(&mut self, event: &AuthEvent) {
        if event.kind == AuthEventKind::SignedOut {
            self.last = None;
            return;
        }
        if let (Some(class), Some(user_id)) = (EventClass::of(event.kind), &event.user_id) {
            self.last = Some((class, user_id.clone()));
        }
    }

    /// Forget the last handled event.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
