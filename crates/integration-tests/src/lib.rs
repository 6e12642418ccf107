//! Integration tests for ClubHub.
//!
//! # Running Tests
//!
//! ```bash
//! # Resolver properties against the in-memory backend
//! cargo test -p clubhub-integration-tests
//!
//! # Live backend checks (needs CLUBHUB_* credentials in the environment)
//! cargo test -p clubhub-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `session_resolver` - Resolver behavior over a scripted backend
//! - `live_backend` - Sign-in and role lookup against a real project

use std::sync::Arc;
use std::time::Duration;

use clubhub_client::testing::{FakeBackend, RecordingNavigator};
use clubhub_client::{RetryPolicy, SessionResolver, SessionView};

/// A resolver wired to a scripted backend and a recording navigator.
pub struct TestContext {
    pub backend: Arc<FakeBackend>,
    pub navigator: Arc<RecordingNavigator>,
    pub resolver: SessionResolver,
}

impl TestContext {
    /// Context with the default role lookup policy.
    #[must_use]
    pub fn new(backend: FakeBackend) -> Self {
        Self::with_policy(backend, RecordingNavigator::at("/login"), RetryPolicy::role_lookup())
    }

    /// Context with an explicit navigator and policy.
    #[must_use]
    pub fn with_policy(
        backend: FakeBackend,
        navigator: RecordingNavigator,
        policy: RetryPolicy,
    ) -> Self {
        let backend = Arc::new(backend);
        let navigator = Arc::new(navigator);
        let resolver = SessionResolver::new(backend.clone(), navigator.clone(), policy);
        Self {
            backend,
            navigator,
            resolver,
        }
    }

    /// Wait until the view satisfies `predicate`.
    ///
    /// # Panics
    ///
    /// Panics if the view does not get there within `timeout`.
    pub async fn wait_for_view(
        &self,
        timeout: Duration,
        predicate: impl FnMut(&SessionView) -> bool,
    ) -> SessionView {
        let mut rx = self.resolver.subscribe();
        let result = tokio::time::timeout(timeout, rx.wait_for(predicate)).await;
        match result {
            Ok(Ok(view)) => view.clone(),
            Ok(Err(_)) => panic!("resolver dropped"),
            Err(_) => panic!("view did not settle within {timeout:?}"),
        }
    }
}
