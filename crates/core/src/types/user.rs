//! Resolved identities.

use serde::{Deserialize, Serialize};

use super::id::UserId;
use super::role::Role;
use super::route::Route;

/// A signed-in user whose role has been looked up.
///
/// Pure derived state: rebuilt from the session on every auth event and
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedUser {
    /// Backend user identifier.
    pub user_id: UserId,
    /// Role resolved from the profile relation.
    pub role: Role,
}

impl ResolvedUser {
    /// Create a resolved user.
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Landing route for this user.
    #[must_use]
    pub const fn landing_route(&self) -> Route {
        Route::for_role(self.role)
    }
}

/// The (user, role) pair an automatic redirect has already fired for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutedSessionKey {
    /// Backend user identifier.
    pub user_id: UserId,
    /// Role the redirect was computed from.
    pub role: Role,
}

impl From<&ResolvedUser> for RoutedSessionKey {
    fn from(user: &ResolvedUser) -> Self {
        Self {
            user_id: user.user_id.clone(),
            role: user.role,
        }
    }
}
