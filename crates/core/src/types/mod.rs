//! Core types for ClubHub.
//!
//! This module provides type-safe wrappers for the session domain.

pub mod email;
pub mod event;
pub mod id;
pub mod role;
pub mod route;
pub mod user;

pub use email::{Email, EmailError};
pub use event::{AuthEvent, AuthEventKind};
pub use id::*;
pub use role::{Role, RoleParseError};
pub use route::Route;
pub use user::{ResolvedUser, RoutedSessionKey};
