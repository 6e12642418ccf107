//! Authenticated-session lifecycle.
//!
//! Turns the backend's stream of auth events into a resolved
//! `{user, role}` pair and a one-time landing redirect.

mod ledger;
mod navigator;
mod resolver;

pub use ledger::{Disposition, EventLedger};
pub use navigator::{Navigator, NoopNavigator};
pub use resolver::{ResolutionPass, ResolverPhase, SessionResolver, SessionView};
