//! Daemon records: non-interactive principals authenticating with API keys.

use crate::api_key::ApiKey;
use realmgate_core::{DaemonId, RealmId};
use serde::{Deserialize, Serialize};

/// A non-interactive principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Daemon {
    pub id: DaemonId,
    pub realm_id: RealmId,
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

impl Daemon {
    /// Creates an enabled daemon with a fresh ID and no API keys.
    #[must_use]
    pub fn new(realm_id: RealmId, code: impl Into<String>) -> Self {
        Self {
            id: DaemonId::new(),
            realm_id,
            code: code.into(),
            name: String::new(),
            enabled: true,
            api_keys: Vec::new(),
        }
    }
}
