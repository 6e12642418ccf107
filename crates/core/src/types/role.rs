//! Application roles.
//!
//! The backend stores role names as plain text in its role relation. Anything
//! the client does not recognise is treated as the default role rather than
//! an error, so a misconfigured row can never lock a user out of the app.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by the strict [`Role`] parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

/// Permission level of a campus user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular club member.
    Student,
    /// Faculty advisor.
    Faculty,
    /// Club president.
    President,
    /// Campus-wide administrator.
    Admin,
}

impl Role {
    /// Role assigned when nothing better is known.
    pub const DEFAULT: Self = Self::Student;

    /// All roles, in ascending privilege order.
    pub const ALL: [Self; 4] = [Self::Student, Self::Faculty, Self::President, Self::Admin];

    /// Backend name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Faculty => "faculty",
            Self::President => "president",
            Self::Admin => "admin",
        }
    }

    /// Map a role name from the backend onto a role.
    ///
    /// Missing, empty and unrecognised names all become [`Role::DEFAULT`].
    /// Matching ignores case and surrounding whitespace.
    #[must_use]
    pub fn normalize(name: Option<&str>) -> Self {
        name.and_then(|n| n.trim().to_ascii_lowercase().parse().ok())
            .unwrap_or(Self::DEFAULT)
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "faculty" => Ok(Self::Faculty),
            "president" => Ok(Self::President),
            "admin" => Ok(Self::Admin),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_is_strict() {
        assert_eq!("faculty".parse::<Role>().unwrap(), Role::Faculty);
        assert_eq!(
            "Faculty".parse::<Role>(),
            Err(RoleParseError("Faculty".to_string()))
        );
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_normalize_known_names() {
        assert_eq!(Role::normalize(Some("president")), Role::President);
        assert_eq!(Role::normalize(Some("  ADMIN ")), Role::Admin);
    }

    #[test]
    fn test_normalize_falls_back_to_default() {
        assert_eq!(Role::normalize(None), Role::Student);
        assert_eq!(Role::normalize(Some("")), Role::Student);
        assert_eq!(Role::normalize(Some("dean")), Role::Student);
    }

    #[test]
    fn test_display_matches_backend_names() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::President).unwrap(),
            "\"president\""
        );
    }
}
