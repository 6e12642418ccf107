//! Landing routes per role.

use serde::{Deserialize, Serialize};

use super::role::Role;

/// Role-specific landing screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Student dashboard.
    StudentHome,
    /// Faculty dashboard, also used by admins.
    FacultyHome,
    /// Club president dashboard.
    PresidentHome,
}

impl Route {
    /// Landing route for a role.
    #[must_use]
    pub const fn for_role(role: Role) -> Self {
        match role {
            Role::Student => Self::StudentHome,
            // Admins land on the faculty dashboard; there is no admin screen.
            Role::Faculty | Role::Admin => Self::FacultyHome,
            Role::President => Self::PresidentHome,
        }
    }

    /// Navigation path of the route.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::StudentHome => "/student",
            Self::FacultyHome => "/faculty",
            Self::PresidentHome => "/president",
        }
    }

    /// Whether `path` is this route or a page below it.
    ///
    /// Matching is per path segment, so `/faculty/events` is on the faculty
    /// route but `/faculty-lounge` is not.
    #[must_use]
    pub fn matches(self, path: &str) -> bool {
        path.strip_prefix(self.path())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}
