//! ClubHub client library.
//!
//! Thin client over the hosted campus backend. Permission checks,
//! uniqueness and joins all happen server-side; this crate signs users in,
//! keeps their session fresh and works out which role they hold.
//!
//! # Modules
//!
//! - [`backend`] - Auth/data contract and its HTTP implementation
//! - [`session`] - Session resolver state machine
//! - [`retry`] - Fixed-schedule retry combinator
//! - [`config`] - Environment configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod retry;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{AuthBackend, BackendClient, BackendError};
pub use config::{BackendConfig, ClientConfig, ConfigError};
pub use retry::RetryPolicy;
pub use session::{Navigator, ResolverPhase, SessionResolver, SessionView};
