//! Realm (tenant) records.

use realmgate_core::RealmId;
use serde::{Deserialize, Serialize};

/// A tenant boundary owning providers, users and daemons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Realm {
    pub id: RealmId,
    /// Short unique code used in provider links (`appCode`).
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
}

impl Realm {
    /// Creates an enabled realm with a fresh ID.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: RealmId::new(),
            code: code.into(),
            name: name.into(),
            description: String::new(),
            enabled: true,
        }
    }
}
