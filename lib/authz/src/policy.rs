//! Role-based policy engine for administrative resources.
//!
//! Every decision goes through a rule table: the actor's role together with
//! the resource kind and operation select a [`Rule`], and the rule is then
//! evaluated against the actor and target scopes. The table is an exhaustive
//! `match`, so adding a role, kind or operation fails to compile until the
//! table covers it.

use crate::error::AccessDenied;
use crate::types::{Actor, Operation, ResourceKind, ResourceRef, SystemRole};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How providers are scoped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderScope {
    /// Providers belong to a realm and its managers administer them.
    #[default]
    Realm,
    /// Only admins may change providers; managers may still read those of
    /// their own realm.
    Global,
}

/// The scoping requirement a role has for one (resource, operation) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Never allowed.
    Deny,
    /// Always allowed.
    Allow,
    /// Allowed when the target belongs to the actor's realm.
    SameRealm,
    /// Allowed when the target is the actor's own user record.
    SelfOnly,
}

/// The authorization policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Policy {
    provider_scope: ProviderScope,
}

impl Policy {
    /// Creates a policy with the given provider scoping.
    #[must_use]
    pub fn new(provider_scope: ProviderScope) -> Self {
        Self { provider_scope }
    }

    /// Returns the provider scoping in force.
    #[must_use]
    pub fn provider_scope(&self) -> ProviderScope {
        self.provider_scope
    }

    /// Looks up the rule for a role on a resource kind and operation.
    #[must_use]
    pub fn rule(&self, role: SystemRole, kind: ResourceKind, operation: Operation) -> Rule {
        match role {
            SystemRole::None => Rule::Deny,
            SystemRole::Admin => Rule::Allow,
            SystemRole::Manager => self.manager_rule(kind, operation),
            SystemRole::User => match (kind, operation) {
                (ResourceKind::User, Operation::Get | Operation::Update) => Rule::SelfOnly,
                _ => Rule::Deny,
            },
        }
    }

    fn manager_rule(&self, kind: ResourceKind, operation: Operation) -> Rule {
        match (kind, operation) {
            (ResourceKind::Realm, Operation::Get | Operation::Update) => Rule::SameRealm,
            (ResourceKind::Realm, Operation::List | Operation::Create | Operation::Delete) => {
                Rule::Deny
            }
            (ResourceKind::Provider, op) => match self.provider_scope {
                ProviderScope::Realm => Rule::SameRealm,
                ProviderScope::Global if op.is_mutation() => Rule::Deny,
                ProviderScope::Global => Rule::SameRealm,
            },
            (ResourceKind::User | ResourceKind::Daemon | ResourceKind::ApiKey, _) => {
                Rule::SameRealm
            }
        }
    }

    /// Decides whether `actor` may perform `operation` on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessDenied`] when the policy does not allow the operation.
    pub fn authorize(
        &self,
        actor: &Actor,
        operation: Operation,
        target: &ResourceRef,
    ) -> Result<(), AccessDenied> {
        let rule = self.rule(actor.role, target.kind, operation);
        let allowed = match rule {
            Rule::Deny => false,
            Rule::Allow => true,
            Rule::SameRealm => same_realm(actor, target),
            Rule::SelfOnly => {
                same_realm(actor, target)
                    && actor.user_id.is_some()
                    && actor.user_id == target.user_id
            }
        };

        if allowed {
            return Ok(());
        }

        debug!(%actor, %operation, %target, ?rule, "access denied");
        Err(AccessDenied {
            actor: *actor,
            operation,
            target: target.clone(),
        })
    }
}

fn same_realm(actor: &Actor, target: &ResourceRef) -> bool {
    actor.realm_id.is_some() && actor.realm_id == target.realm_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use realmgate_core::{RealmId, UserId};

    fn targets(realm_id: RealmId, user_id: UserId) -> Vec<ResourceRef> {
        let mut targets = vec![ResourceRef::realms(), ResourceRef::realm(realm_id)];
        for kind in ResourceKind::ALL {
            targets.push(ResourceRef::collection(kind, realm_id));
            targets.push(ResourceRef::instance(kind, realm_id, "x"));
        }
        targets.push(ResourceRef::user(realm_id, user_id));
        targets
    }

    fn scopes() -> Vec<(Actor, RealmId, UserId)> {
        // (actor, a realm, a user) covering own / foreign realm and own / foreign user
        let realm = RealmId::new();
        let other_realm = RealmId::new();
        let me = UserId::new();
        let someone = UserId::new();
        let mut scopes = Vec::new();
        for role in SystemRole::ALL {
            let actor = Actor::new(me, realm, role);
            scopes.push((actor, realm, me));
            scopes.push((actor, realm, someone));
            scopes.push((actor, other_realm, me));
            scopes.push((actor, other_realm, someone));
            scopes.push((
                Actor {
                    user_id: None,
                    realm_id: None,
                    role,
                },
                realm,
                me,
            ));
        }
        scopes
    }

    fn both_policies() -> [Policy; 2] {
        [
            Policy::new(ProviderScope::Realm),
            Policy::new(ProviderScope::Global),
        ]
    }

    #[test]
    fn every_combination_is_decided() {
        for policy in both_policies() {
            for (actor, realm_id, user_id) in scopes() {
                for target in targets(realm_id, user_id) {
                    for op in Operation::ALL {
                        match policy.authorize(&actor, op, &target) {
                            Ok(()) => {}
                            Err(denied) => {
                                assert_eq!(denied.actor, actor);
                                assert_eq!(denied.operation, op);
                                assert_eq!(denied.target, target);
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn role_none_is_always_denied() {
        for policy in both_policies() {
            for (actor, realm_id, user_id) in scopes() {
                let actor = Actor {
                    role: SystemRole::None,
                    ..actor
                };
                for target in targets(realm_id, user_id) {
                    for op in Operation::ALL {
                        assert!(policy.authorize(&actor, op, &target).is_err());
                    }
                }
            }
        }
    }

    #[test]
    fn admin_is_never_denied() {
        for policy in both_policies() {
            for (actor, realm_id, user_id) in scopes() {
                let actor = Actor {
                    role: SystemRole::Admin,
                    ..actor
                };
                for target in targets(realm_id, user_id) {
                    for op in Operation::ALL {
                        assert!(policy.authorize(&actor, op, &target).is_ok());
                    }
                }
            }
        }
    }

    #[test]
    fn user_may_only_read_and_update_itself() {
        let policy = Policy::default();
        let realm_id = RealmId::new();
        let me = UserId::new();
        let actor = Actor::new(me, realm_id, SystemRole::User);

        for op in Operation::ALL {
            let own = policy.authorize(&actor, op, &ResourceRef::user(realm_id, me));
            let expected = matches!(op, Operation::Get | Operation::Update);
            assert_eq!(own.is_ok(), expected, "{op} on self");

            let other = policy.authorize(&actor, op, &ResourceRef::user(realm_id, UserId::new()));
            assert!(other.is_err(), "{op} on another user");

            let foreign = policy.authorize(&actor, op, &ResourceRef::user(RealmId::new(), me));
            assert!(foreign.is_err(), "{op} on same id in another realm");
        }
    }

    #[test]
    fn user_is_denied_every_other_resource() {
        let policy = Policy::default();
        let realm_id = RealmId::new();
        let actor = Actor::new(UserId::new(), realm_id, SystemRole::User);
        for kind in [
            ResourceKind::Realm,
            ResourceKind::Provider,
            ResourceKind::Daemon,
            ResourceKind::ApiKey,
        ] {
            for op in Operation::ALL {
                let target = ResourceRef::instance(kind, realm_id, "x");
                assert!(policy.authorize(&actor, op, &target).is_err());
            }
        }
    }

    #[test]
    fn manager_is_confined_to_its_realm() {
        let policy = Policy::default();
        let realm_id = RealmId::new();
        let actor = Actor::new(UserId::new(), realm_id, SystemRole::Manager);
        for kind in [
            ResourceKind::Provider,
            ResourceKind::User,
            ResourceKind::Daemon,
            ResourceKind::ApiKey,
        ] {
            for op in Operation::ALL {
                let own = ResourceRef::collection(kind, realm_id);
                let foreign = ResourceRef::collection(kind, RealmId::new());
                assert!(policy.authorize(&actor, op, &own).is_ok(), "{op} {kind}");
                assert!(policy.authorize(&actor, op, &foreign).is_err(), "{op} {kind}");
            }
        }
    }

    #[test]
    fn manager_reads_and_updates_only_its_own_realm() {
        let policy = Policy::default();
        let realm_id = RealmId::new();
        let actor = Actor::new(UserId::new(), realm_id, SystemRole::Manager);

        let own = ResourceRef::realm(realm_id);
        assert!(policy.authorize(&actor, Operation::Get, &own).is_ok());
        assert!(policy.authorize(&actor, Operation::Update, &own).is_ok());
        assert!(policy.authorize(&actor, Operation::Delete, &own).is_err());
        assert!(policy.authorize(&actor, Operation::Create, &own).is_err());
        assert!(
            policy
                .authorize(&actor, Operation::List, &ResourceRef::realms())
                .is_err()
        );
        let foreign = ResourceRef::realm(RealmId::new());
        assert!(policy.authorize(&actor, Operation::Get, &foreign).is_err());
    }

    #[test]
    fn manager_cannot_mutate_global_providers() {
        let policy = Policy::new(ProviderScope::Global);
        let realm_id = RealmId::new();
        let actor = Actor::new(UserId::new(), realm_id, SystemRole::Manager);
        let target = ResourceRef::instance(ResourceKind::Provider, realm_id, "google");

        for op in Operation::ALL {
            let decision = policy.authorize(&actor, op, &target);
            assert_eq!(decision.is_ok(), !op.is_mutation(), "{op}");
        }
    }

    #[test]
    fn manager_cannot_read_foreign_global_providers() {
        let policy = Policy::new(ProviderScope::Global);
        let actor = Actor::new(UserId::new(), RealmId::new(), SystemRole::Manager);
        let foreign = RealmId::new();

        for target in [
            ResourceRef::collection(ResourceKind::Provider, foreign),
            ResourceRef::instance(ResourceKind::Provider, foreign, "google"),
        ] {
            for op in Operation::ALL {
                assert!(policy.authorize(&actor, op, &target).is_err(), "{op} {target}");
            }
        }
    }

    #[test]
    fn unscoped_manager_is_denied() {
        let policy = Policy::default();
        let actor = Actor {
            user_id: None,
            realm_id: None,
            role: SystemRole::Manager,
        };
        let target = ResourceRef {
            kind: ResourceKind::User,
            realm_id: None,
            user_id: None,
            id: None,
        };
        assert!(policy.authorize(&actor, Operation::List, &target).is_err());
    }

    #[test]
    fn provider_scope_deserializes_lowercase() {
        let scope: ProviderScope = serde_json::from_str("\"global\"").expect("deserialize");
        assert_eq!(scope, ProviderScope::Global);
    }
}
