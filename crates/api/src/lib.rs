//! Triage API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! seeding) so integration tooling and the binary entrypoint can both
//! access them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod seed;
pub mod state;
