//! ClubHub Core - Shared domain types.
//!
//! This crate provides the types shared by every ClubHub component:
//! - `client` - Backend client and session resolver
//! - `cli` - Command-line tool for signing in against a live backend
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async
//! runtime. Anything that talks to the hosted backend lives in `client`.
//!
//! # Modules
//!
//! - [`types`] - Identifiers, roles, auth events, resolved users and routes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
