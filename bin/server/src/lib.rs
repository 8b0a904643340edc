//! realmgate HTTP server.
//!
//! Exposes the OAuth2 session endpoints under `/auth` and the policy-guarded
//! administration of realms, providers, users, daemons and API keys.

pub mod admin;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;

pub use app::{build_router, build_state};
