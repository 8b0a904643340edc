//! Authorization types: roles, actors, operations and resource references.

use realmgate_core::{RealmId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// System role carried by an actor, ordered by privilege.
///
/// - `None`: authenticated but granted nothing
/// - `User`: scoped to its own realm and its own user record
/// - `Manager`: scoped to exactly one realm
/// - `Admin`: unscoped
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SystemRole {
    #[default]
    None,
    User,
    Manager,
    Admin,
}

impl SystemRole {
    /// Every role, lowest privilege first.
    pub const ALL: [SystemRole; 4] = [Self::None, Self::User, Self::Manager, Self::Admin];

    /// Returns the wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::User => "user",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for SystemRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "user" => Ok(Self::User),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The authenticated caller of one request.
///
/// Actors are built per request from a verified session cookie (or the
/// local-admin bootstrap) and are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The caller's user record, absent for the local admin.
    pub user_id: Option<UserId>,
    /// The caller's realm, absent for the local admin.
    pub realm_id: Option<RealmId>,
    /// The caller's role.
    pub role: SystemRole,
}

impl Actor {
    /// Creates an actor for a user of a realm.
    #[must_use]
    pub fn new(user_id: UserId, realm_id: RealmId, role: SystemRole) -> Self {
        Self {
            user_id: Some(user_id),
            realm_id: Some(realm_id),
            role,
        }
    }

    /// The bootstrap administrator, not tied to any realm or user record.
    ///
    /// Only reachable when the local-admin bootstrap is enabled in configuration.
    #[must_use]
    pub const fn local_admin() -> Self {
        Self {
            user_id: None,
            realm_id: None,
            role: SystemRole::Admin,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.role)?;
        if let Some(user_id) = self.user_id {
            write!(f, " {user_id}")?;
        }
        if let Some(realm_id) = self.realm_id {
            write!(f, " in {realm_id}")?;
        }
        Ok(())
    }
}

/// Operations the policy engine decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Every operation.
    pub const ALL: [Operation; 5] = [
        Self::List,
        Self::Get,
        Self::Create,
        Self::Update,
        Self::Delete,
    ];

    /// Returns true for operations that change state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }

    /// Returns the operation name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Administrative resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Realm,
    Provider,
    User,
    Daemon,
    ApiKey,
}

impl ResourceKind {
    /// Every resource kind.
    pub const ALL: [ResourceKind; 5] = [
        Self::Realm,
        Self::Provider,
        Self::User,
        Self::Daemon,
        Self::ApiKey,
    ];

    /// Returns the resource kind name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realm => "realm",
            Self::Provider => "provider",
            Self::User => "user",
            Self::Daemon => "daemon",
            Self::ApiKey => "api_key",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resource instance (or collection) an operation targets.
///
/// `realm_id` is the realm that owns the target; for a realm it is the
/// realm itself, for a create it is the realm named in the payload. It is
/// `None` only for the collection of all realms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    /// The kind of resource.
    pub kind: ResourceKind,
    /// The owning realm.
    pub realm_id: Option<RealmId>,
    /// The user record the target is, for user resources.
    pub user_id: Option<UserId>,
    /// Identifier of the instance, for audit logging.
    pub id: Option<String>,
}

impl ResourceRef {
    /// Creates a reference to a resource collection within a realm.
    #[must_use]
    pub fn collection(kind: ResourceKind, realm_id: RealmId) -> Self {
        Self {
            kind,
            realm_id: Some(realm_id),
            user_id: None,
            id: None,
        }
    }

    /// Creates a reference to a resource instance within a realm.
    #[must_use]
    pub fn instance(kind: ResourceKind, realm_id: RealmId, id: impl Into<String>) -> Self {
        Self {
            kind,
            realm_id: Some(realm_id),
            user_id: None,
            id: Some(id.into()),
        }
    }

    /// The collection of every realm.
    #[must_use]
    pub fn realms() -> Self {
        Self {
            kind: ResourceKind::Realm,
            realm_id: None,
            user_id: None,
            id: None,
        }
    }

    /// A single realm.
    #[must_use]
    pub fn realm(realm_id: RealmId) -> Self {
        Self::instance(ResourceKind::Realm, realm_id, realm_id.to_string())
    }

    /// A single user record.
    #[must_use]
    pub fn user(realm_id: RealmId, user_id: UserId) -> Self {
        Self {
            kind: ResourceKind::User,
            realm_id: Some(realm_id),
            user_id: Some(user_id),
            id: Some(user_id.to_string()),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.id, self.realm_id) {
            (Some(id), _) => write!(f, "{}:{}", self.kind, id),
            (None, Some(realm_id)) => write!(f, "{}s of {}", self.kind, realm_id),
            (None, None) => write!(f, "all {}s", self.kind),
        }
    }
}
