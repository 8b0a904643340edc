//! Role-based authorization for realmgate administrative resources.
//!
//! Decisions are pure: an [`Actor`] asks to perform an [`Operation`] on a
//! [`ResourceRef`] and the [`Policy`] either allows it or returns
//! [`AccessDenied`]. There is no boolean form of the check, so a denial
//! cannot be ignored by accident.

mod error;
mod policy;
mod types;

pub use error::AccessDenied;
pub use policy::{Policy, ProviderScope, Rule};
pub use types::{Actor, Operation, ResourceKind, ResourceRef, SystemRole, UnknownRole};
