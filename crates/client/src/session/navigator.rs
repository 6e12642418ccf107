//! Navigation seam between the resolver and the UI layer.

use clubhub_core::Route;

/// Performs role-based redirects on behalf of the resolver.
///
/// Implemented by the UI shell; the resolver only asks where the user is
/// and tells it where to go.
pub trait Navigator: Send + Sync {
    /// Path currently displayed, if known.
    fn current_path(&self) -> Option<String>;

    /// Replace the current screen with `route`.
    fn navigate(&self, route: Route);
}

/// Navigator that never moves anywhere. Useful for headless callers that
/// only care about the resolved user.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn current_path(&self) -> Option<String> {
        None
    }

    fn navigate(&self, route: Route) {
        tracing::debug!(%route, "Navigation ignored");
    }
}
