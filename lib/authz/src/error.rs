//! Authorization error types.

use crate::types::{Actor, Operation, ResourceRef};
use std::fmt;

/// A policy denial.
///
/// Carries the actor, operation and target so callers can write an audit
/// record without re-deriving the decision inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDenied {
    /// The caller that was denied.
    pub actor: Actor,
    /// The operation that was attempted.
    pub operation: Operation,
    /// The resource the operation targeted.
    pub target: ResourceRef,
}

impl fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} may not {} {}",
            self.actor, self.operation, self.target
        )
    }
}

impl std::error::Error for AccessDenied {}
