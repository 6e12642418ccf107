//! In-memory backend and navigator for tests.
//!
//! Enabled for this crate's own tests and, through the `testing` feature,
//! for dependent crates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use clubhub_core::{AuthEvent, Route, UserId};

use crate::backend::events::AuthEventBus;
use crate::backend::{AuthBackend, AuthSubscription, BackendError, RoleLookup, Session};
use crate::session::Navigator;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted result of a single role lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedLookup {
    /// Profile and role rows exist.
    Found(String),
    /// Profile exists without a usable role reference.
    Unassigned,
    /// Profile row not visible yet.
    NotFound,
    /// Backend failure with the given message.
    Fail(String),
}

impl ScriptedLookup {
    fn into_result(self) -> Result<RoleLookup, BackendError> {
        match self {
            Self::Found(name) => Ok(RoleLookup::Found(name)),
            Self::Unassigned => Ok(RoleLookup::Unassigned),
            Self::NotFound => Ok(RoleLookup::NotFound),
            Self::Fail(message) => Err(BackendError::Api {
                status: 500,
                message,
            }),
        }
    }
}

/// How `current_session` should fail, if at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    /// Refresh credential rejected.
    InvalidRefreshToken,
    /// Any other backend error with the given message.
    Other(String),
}

/// Scriptable [`AuthBackend`].
///
/// Role lookups pop from a script; once the script is empty every lookup
/// returns the fallback (default `NotFound`).
#[derive(Debug)]
pub struct FakeBackend {
    session: Mutex<Option<UserId>>,
    session_failure: Mutex<Option<SessionFailure>>,
    lookups: Mutex<VecDeque<ScriptedLookup>>,
    fallback: Mutex<ScriptedLookup>,
    lookup_delay: Mutex<Duration>,
    events: AuthEventBus,
    session_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
    local_sign_outs: AtomicUsize,
}

impl FakeBackend {
    /// Backend with no session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
            session_failure: Mutex::new(None),
            lookups: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(ScriptedLookup::NotFound),
            lookup_delay: Mutex::new(Duration::ZERO),
            events: AuthEventBus::new(),
            session_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
            local_sign_outs: AtomicUsize::new(0),
        }
    }

    /// Backend with a session for `user_id`.
    #[must_use]
    pub fn with_session(user_id: &str) -> Self {
        let backend = Self::new();
        backend.set_session(Some(UserId::new(user_id)));
        backend
    }

    /// Replace the current session.
    pub fn set_session(&self, user_id: Option<UserId>) {
        *lock(&self.session) = user_id;
    }

    /// Make `current_session` fail until cleared with `None`.
    pub fn fail_session(&self, failure: Option<SessionFailure>) {
        *lock(&self.session_failure) = failure;
    }

    /// Queue role lookup results, consumed one per lookup.
    pub fn script_lookups(&self, results: impl IntoIterator<Item = ScriptedLookup>) {
        lock(&self.lookups).extend(results);
    }

    /// Result returned once the script is exhausted.
    pub fn set_fallback_lookup(&self, result: ScriptedLookup) {
        *lock(&self.fallback) = result;
    }

    /// Delay every role lookup by `delay`.
    pub fn set_lookup_delay(&self, delay: Duration) {
        *lock(&self.lookup_delay) = delay;
    }

    /// Set the session and publish `SIGNED_IN`.
    pub fn sign_in(&self, user_id: &str) {
        let user_id = UserId::new(user_id);
        self.set_session(Some(user_id.clone()));
        self.events.publish(AuthEvent::signed_in(user_id));
    }

    /// Publish an arbitrary event.
    pub fn publish(&self, event: AuthEvent) {
        self.events.publish(event);
    }

    /// Number of `current_session` calls.
    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    /// Number of `lookup_role` calls.
    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    /// Number of `sign_out_local` calls.
    pub fn local_sign_outs(&self) -> usize {
        self.local_sign_outs.load(Ordering::SeqCst)
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);

        let failure = lock(&self.session_failure).clone();
        match failure {
            Some(SessionFailure::InvalidRefreshToken) => Err(BackendError::InvalidRefreshToken(
                "Invalid Refresh Token: Refresh Token Not Found".to_string(),
            )),
            Some(SessionFailure::Other(message)) => Err(BackendError::Api {
                status: 503,
                message,
            }),
            None => Ok(lock(&self.session)
                .clone()
                .map(|user_id| Session { user_id })),
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    async fn lookup_role(&self, _user_id: &UserId) -> Result<RoleLookup, BackendError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.lookup_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let next = lock(&self.lookups).pop_front();
        next.unwrap_or_else(|| lock(&self.fallback).clone())
            .into_result()
    }

    async fn sign_out_local(&self) {
        self.local_sign_outs.fetch_add(1, Ordering::SeqCst);
        self.set_session(None);
        self.events.publish(AuthEvent::signed_out());
    }
}

/// [`Navigator`] that records every redirect.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    current: Mutex<Option<String>>,
    history: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    /// Navigator with no current path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigator already showing `path`.
    #[must_use]
    pub fn at(path: &str) -> Self {
        let navigator = Self::new();
        navigator.set_current_path(Some(path));
        navigator
    }

    /// Simulate the user moving to `path`.
    pub fn set_current_path(&self, path: Option<&str>) {
        *lock(&self.current) = path.map(str::to_owned);
    }

    /// Every route navigated to, oldest first.
    pub fn history(&self) -> Vec<Route> {
        lock(&self.history).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> Option<String> {
        lock(&self.current).clone()
    }

    fn navigate(&self, route: Route) {
        lock(&self.history).push(route);
        self.set_current_path(Some(route.path()));
    }
}
