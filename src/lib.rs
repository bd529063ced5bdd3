//! Users, session tokens and uptime-check definitions over a flat JSON
//! document store.
//!
//! Provides:
//! - User registration, lookup, partial update and cascading delete
//! - Session tokens (login, lookup, extension, logout) with absolute expiry
//! - Check definitions owned by users, capped by a per-user quota
//! - File, SQLite and in-memory document store backends
//!
//! ## Design Decisions
//! - The store offers single-document operations only. Cross-collection
//!   consistency (`User.checks` vs `Check.userPhone`) is maintained by
//!   [`resources::links`], which reports half-finished operations as
//!   [`resources::links::ReconciliationTask`]s instead of hiding them.
//! - Configuration is an immutable [`config::Config`] built once at startup
//!   and handed to every component explicitly.

pub mod auth;
pub mod config;
pub mod gateway;
pub mod models;
pub mod resources;
pub mod store;
pub mod validation;

pub use config::Config;
pub use gateway::{build_router, run_gateway, AppState};
