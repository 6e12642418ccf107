//! Session-to-role resolution.
//!
//! [`SessionResolver`] keeps an in-memory `{user, role}` projection of the
//! backend's auth state and performs the role-based landing redirect.
//!
//! # Lifecycle
//!
//! ```text
//! Unresolved ──event──▶ Resolving ──▶ Resolved(user, role)
//!      ▲                   │  ▲              │
//!      └── no session ─────┘  └── event ─────┤
//!                                            ▼
//!                       SignedOut ◀── SIGNED_OUT / dead refresh token
//! ```
//!
//! # Guarantees
//!
//! - At most one resolution pass runs at a time. An event that needs a pass
//!   while one is running is dropped, not queued.
//! - Redelivered events for the same user do not trigger another pass.
//! - The landing redirect fires at most once per (user, role) pair, and
//!   never when the user is already on the landing route.
//! - Handlers never fail: every error path ends in a definite state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clubhub_core::{AuthEvent, ResolvedUser, Role, RoutedSessionKey, UserId};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::ledger::{Disposition, EventLedger};
use super::navigator::Navigator;
use crate::backend::{AuthBackend, AuthSubscription, BackendError, RoleLookup};
use crate::retry::{RetryPolicy, retry};

/// What consuming views render from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Resolved user, if signed in.
    pub user: Option<ResolvedUser>,
    /// True until the first resolution settles.
    pub loading: bool,
}

impl SessionView {
    const fn hydrating() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    const fn settled(user: Option<ResolvedUser>) -> Self {
        Self {
            user,
            loading: false,
        }
    }
}

/// Resolver state machine position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverPhase {
    /// Nothing resolved yet, or the last pass found no session.
    Unresolved,
    /// A resolution pass is running.
    Resolving,
    /// User and role are known.
    Resolved(ResolvedUser),
    /// Signed out by event or by dead-credential recovery.
    SignedOut,
}

/// Shared resolver handle.
///
/// Cheap to clone; every clone drives the same state. Create one at
/// startup and hand it to the UI layer.
#[derive(Clone)]
pub struct SessionResolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    backend: Arc<dyn AuthBackend>,
    navigator: Arc<dyn Navigator>,
    retry_policy: RetryPolicy,
    state: Mutex<ResolverState>,
    in_flight: AtomicBool,
    view: watch::Sender<SessionView>,
}

struct ResolverState {
    ledger: EventLedger,
    phase: ResolverPhase,
    routed: Option<RoutedSessionKey>,
    /// Bumped on every sign-out so passes started earlier can tell their
    /// result is stale.
    epoch: u64,
}

/// Result of the I/O half of a pass.
enum PassOutcome {
    NoSession,
    /// Session state unknown; the triggering event must not count as handled.
    Failed,
    Resolved(ResolvedUser),
    InvalidRefreshToken,
}

impl std::fmt::Debug for SessionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionResolver")
            .field("view", &*self.inner.view.borrow())
            .field("in_flight", &self.inner.in_flight.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SessionResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        navigator: Arc<dyn Navigator>,
        retry_policy: RetryPolicy,
    ) -> Self {
        let (view, _) = watch::channel(SessionView::hydrating());
        Self {
            inner: Arc::new(ResolverInner {
                backend,
                navigator,
                retry_policy,
                state: Mutex::new(ResolverState {
                    ledger: EventLedger::new(),
                    phase: ResolverPhase::Unresolved,
                    routed: None,
                    epoch: 0,
                }),
                in_flight: AtomicBool::new(false),
                view,
            }),
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Current view.
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.inner.view.borrow().clone()
    }

    /// Watch the view for changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.view.subscribe()
    }

    /// Current state machine position.
    pub async fn phase(&self) -> ResolverPhase {
        self.inner.state.lock().await.phase.clone()
    }

    /// Whether a resolution pass is running.
    #[must_use]
    pub fn is_resolving(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Event handling
    // =========================================================================

    /// Handle one auth event to completion.
    ///
    /// Never fails; errors are logged and folded into the resulting state.
    #[instrument(skip_all, fields(kind = %event.kind, user_id = ?event.user_id))]
    pub async fn on_auth_event(&self, event: AuthEvent) {
        if let Some(pass) = self.accept(event).await {
            pass.run().await;
        }
    }

    /// Apply the synchronous part of an event.
    ///
    /// Sign-outs take effect immediately. For events that need resolution,
    /// returns the pass to run, or `None` if the event is a duplicate or a
    /// pass is already running.
    pub async fn accept(&self, event: AuthEvent) -> Option<ResolutionPass> {
        let mut state = self.inner.state.lock().await;

        match state.ledger.classify(&event) {
            Disposition::SignOut => {
                state.ledger.commit(&event);
                self.clear(&mut state);
                info!("Signed out, session state cleared");
                None
            }
            Disposition::Duplicate => {
                debug!(kind = %event.kind, "Duplicate auth event ignored");
                None
            }
            Disposition::Resolve => {
                let Some(guard) = InFlightGuard::acquire(&self.inner) else {
                    debug!(kind = %event.kind, "Resolution already in flight, event dropped");
                    return None;
                };
                state.ledger.commit(&event);
                state.phase = ResolverPhase::Resolving;
                Some(ResolutionPass {
                    resolver: self.clone(),
                    epoch: state.epoch,
                    _guard: guard,
                })
            }
        }
    }

    /// Consume `subscription` in a background task.
    ///
    /// Events are accepted in delivery order; passes run in their own tasks
    /// so a slow role lookup does not hold up later events.
    pub fn listen(&self, mut subscription: AuthSubscription) -> JoinHandle<()> {
        let resolver = self.clone();
        tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                if let Some(pass) = resolver.accept(event).await {
                    tokio::spawn(pass.run());
                }
            }
            debug!("Auth event stream closed");
        })
    }

    /// Subscribe to the backend's auth events and consume them in the
    /// background.
    pub fn start(&self) -> JoinHandle<()> {
        self.listen(self.inner.backend.subscribe())
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    async fn resolve(&self) -> PassOutcome {
        let session = match self.inner.backend.current_session().await {
            Ok(session) => session,
            Err(e) if e.is_invalid_refresh_token() => return PassOutcome::InvalidRefreshToken,
            Err(e) => {
                warn!(error = %e, "Session fetch failed, treating as signed out");
                return PassOutcome::Failed;
            }
        };

        let Some(session) = session else {
            return PassOutcome::NoSession;
        };

        match self.resolve_role(&session.user_id).await {
            Some(role) => PassOutcome::Resolved(ResolvedUser::new(session.user_id, role)),
            None => PassOutcome::InvalidRefreshToken,
        }
    }

    /// Look up the user's role, retrying while the profile is not visible.
    ///
    /// Returns `None` only when the lookup revealed a dead refresh token.
    async fn resolve_role(&self, user_id: &UserId) -> Option<Role> {
        let backend: &dyn AuthBackend = self.inner.backend.as_ref();
        let not_found =
            |r: &Result<RoleLookup, BackendError>| matches!(r, Ok(RoleLookup::NotFound));
        let result = retry(
            &self.inner.retry_policy,
            move |_| backend.lookup_role(user_id),
            not_found,
        )
        .await;

        if result.exhausted(&self.inner.retry_policy, not_found) {
            info!(
                user_id = %user_id,
                attempts = result.attempts,
                "Profile not provisioned, using default role"
            );
        }

        let role = match result.value {
            Ok(RoleLookup::Found(name)) => {
                let role = Role::normalize(Some(&name));
                if role.as_str() != name {
                    debug!(role_name = %name, %role, "Role name normalized");
                }
                role
            }
            Ok(RoleLookup::Unassigned) => {
                debug!(user_id = %user_id, "Profile has no role, using default");
                Role::DEFAULT
            }
            Ok(RoleLookup::NotFound) => Role::DEFAULT,
            Err(e) if e.is_invalid_refresh_token() => return None,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Role lookup failed, using default role");
                Role::DEFAULT
            }
        };
        Some(role)
    }

    async fn finish(&self, epoch: u64, outcome: PassOutcome) {
        if matches!(outcome, PassOutcome::InvalidRefreshToken) {
            warn!("Refresh token rejected, signing out locally");
            self.inner.backend.sign_out_local().await;
            let mut state = self.inner.state.lock().await;
            state.ledger.reset();
            self.clear(&mut state);
            return;
        }

        let mut state = self.inner.state.lock().await;
        if state.epoch != epoch {
            debug!("Signed out during resolution, result discarded");
            return;
        }

        match outcome {
            PassOutcome::NoSession => {
                state.phase = ResolverPhase::Unresolved;
                self.inner.view.send_replace(SessionView::settled(None));
            }
            PassOutcome::Failed => {
                // Redelivery of the same event must resolve again.
                state.ledger.reset();
                state.phase = ResolverPhase::Unresolved;
                self.inner.view.send_replace(SessionView::settled(None));
            }
            PassOutcome::Resolved(user) => {
                info!(user_id = %user.user_id, role = %user.role, "Session resolved");
                state.phase = ResolverPhase::Resolved(user.clone());
                self.inner
                    .view
                    .send_replace(SessionView::settled(Some(user.clone())));
                self.redirect(&mut state, &user);
            }
            PassOutcome::InvalidRefreshToken => {}
        }
    }

    /// Navigate to the user's landing route unless already there or already
    /// redirected for this (user, role).
    fn redirect(&self, state: &mut ResolverState, user: &ResolvedUser) {
        let route = user.landing_route();
        let key = RoutedSessionKey::from(user);

        let on_route = self
            .inner
            .navigator
            .current_path()
            .is_some_and(|path| route.matches(&path));
        let already_routed = state.routed.as_ref() == Some(&key);

        if on_route || already_routed {
            debug!(%route, on_route, already_routed, "Redirect skipped");
        } else {
            info!(user_id = %user.user_id, %route, "Redirecting to landing route");
            self.inner.navigator.navigate(route);
        }
        state.routed = Some(key);
    }

    fn clear(&self, state: &mut ResolverState) {
        state.epoch += 1;
        state.routed = None;
        state.phase = ResolverPhase::SignedOut;
        self.inner.view.send_replace(SessionView::settled(None));
    }
}

/// A resolution pass that holds the in-flight slot.
///
/// Dropping it without running releases the slot.
#[must_use = "a pass does nothing unless run"]
pub struct ResolutionPass {
    resolver: SessionResolver,
    epoch: u64,
    _guard: InFlightGuard,
}

impl ResolutionPass {
    /// Fetch the session, resolve the role, publish and redirect.
    pub async fn run(self) {
        let outcome = self.resolver.resolve().await;
        self.resolver.finish(self.epoch, outcome).await;
    }
}

/// Releases the in-flight flag on drop.
struct InFlightGuard {
    inner: Arc<ResolverInner>,
}

impl InFlightGuard {
    fn acquire(inner: &Arc<ResolverInner>) -> Option<Self> {
        inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                inner: Arc::clone(inner),
            })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::SeqCst);
    }
}
