//! Core identifiers and utilities for realmgate.
//!
//! This crate provides the foundational ID types, error handling, and the
//! identifier generator shared by the authorization and session crates.

pub mod error;
pub mod generate;
pub mod id;

pub use error::Result;
pub use generate::{IdGenerationError, IdGenerator, RandomIdGenerator};
pub use id::{ApiKeyId, DaemonId, ParseIdError, ProviderId, RealmId, UserId};
