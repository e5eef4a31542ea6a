//! Resource policies: resource + action → permission token → authorizer.
//!
//! Action names are resolved through a [`PolicyTable`] built once at startup.
//! Before the table is consulted, the [`SelfRule`] lets an actor view and
//! update its own record.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use portcullis_core::ActorId;

use crate::{Ability, Actor, AuthorizationDecision, Authorizer, PermissionToken, ResourceNamespace};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("unknown policy action '{0}'")]
    UnknownAction(String),
}

/// Policy actions callers can ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    ViewAny,
    View,
    Create,
    Update,
    Delete,
    ForceDelete,
    Restore,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::ViewAny,
        Action::View,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::ForceDelete,
        Action::Restore,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::ViewAny => "viewAny",
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::ForceDelete => "forceDelete",
            Action::Restore => "restore",
        }
    }

    fn snake_name(&self) -> &'static str {
        match self {
            Action::ViewAny => "view_any",
            Action::ForceDelete => "force_delete",
            other => other.name(),
        }
    }

    fn index(&self) -> usize {
        match self {
            Action::ViewAny => 0,
            Action::View => 1,
            Action::Create => 2,
            Action::Update => 3,
            Action::Delete => 4,
            Action::ForceDelete => 5,
            Action::Restore => 6,
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Derives the token an action requires on a namespace.
pub type TokenResolver = fn(&ResourceNamespace) -> PermissionToken;

fn view_any_token(ns: &ResourceNamespace) -> PermissionToken {
    ns.token(Ability::ViewAny)
}

fn view_token(ns: &ResourceNamespace) -> PermissionToken {
    ns.token(Ability::View)
}

fn create_token(ns: &ResourceNamespace) -> PermissionToken {
    ns.token(Ability::Create)
}

fn update_token(ns: &ResourceNamespace) -> PermissionToken {
    ns.token(Ability::Update)
}

fn delete_token(ns: &ResourceNamespace) -> PermissionToken {
    ns.token(Ability::Delete)
}

// forceDelete is guarded by the force_update token, not a force_delete one.
fn force_delete_token(ns: &ResourceNamespace) -> PermissionToken {
    ns.token(Ability::ForceUpdate)
}

fn restore_token(ns: &ResourceNamespace) -> PermissionToken {
    ns.token(Ability::Restore)
}

/// Action name → token resolver dispatch table.
///
/// Every [`Action`] always has a resolver; [`PolicyTable::set_resolver`]
/// replaces one but can never remove it.
#[derive(Clone)]
pub struct PolicyTable {
    resolvers: [TokenResolver; 7],
    names: HashMap<&'static str, Action>,
}

impl PolicyTable {
    pub fn standard() -> Self {
        let mut names = HashMap::with_capacity(Action::ALL.len() * 2);
        for action in Action::ALL {
            names.insert(action.name(), action);
            names.insert(action.snake_name(), action);
        }

        Self {
            resolvers: [
                view_any_token as TokenResolver,
                view_token,
                create_token,
                update_token,
                delete_token,
                force_delete_token,
                restore_token,
            ],
            names,
        }
    }

    pub fn set_resolver(&mut self, action: Action, resolver: TokenResolver) {
        self.resolvers[action.index()] = resolver;
    }

    /// Look an action up by its camelCase or snake_case name.
    pub fn action_named(&self, name: &str) -> Result<Action, PolicyError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| PolicyError::UnknownAction(name.to_string()))
    }

    pub fn token(&self, action: Action, namespace: &ResourceNamespace) -> PermissionToken {
        (self.resolvers[action.index()])(namespace)
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl core::fmt::Debug for PolicyTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PolicyTable")
            .field("names", &self.names.len())
            .finish()
    }
}

/// What a policy check is about. Built per check, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub namespace: ResourceNamespace,
    pub action: Action,
    /// The actor whose own record is the target, if the target is an actor record.
    pub subject: Option<ActorId>,
}

impl ResourceDescriptor {
    pub fn new(namespace: ResourceNamespace, action: Action) -> Self {
        Self {
            namespace,
            action,
            subject: None,
        }
    }

    pub fn for_record_of(mut self, subject: ActorId) -> Self {
        self.subject = Some(subject);
        self
    }
}

/// Active actors may always view and update their own record in the actor
/// namespace.
#[derive(Debug, Clone)]
pub struct SelfRule {
    namespace: ResourceNamespace,
}

impl SelfRule {
    pub fn for_namespace(namespace: ResourceNamespace) -> Self {
        Self { namespace }
    }

    pub fn applies(&self, descriptor: &ResourceDescriptor, actor: Option<&Actor>) -> bool {
        let Some(actor) = actor else {
            return false;
        };
        actor.is_active()
            && descriptor.namespace.slug() == self.namespace.slug()
            && matches!(descriptor.action, Action::View | Action::Update)
            && descriptor.subject == Some(actor.id)
    }
}

impl Default for SelfRule {
    fn default() -> Self {
        Self::for_namespace(ResourceNamespace::USERS)
    }
}

pub struct PolicyResolver {
    authorizer: Arc<Authorizer>,
    table: PolicyTable,
    self_rule: SelfRule,
}

impl PolicyResolver {
    pub fn new(authorizer: Arc<Authorizer>) -> Self {
        Self::with_table(authorizer, PolicyTable::standard())
    }

    pub fn with_table(authorizer: Arc<Authorizer>, table: PolicyTable) -> Self {
        Self {
            authorizer,
            table,
            self_rule: SelfRule::default(),
        }
    }

    pub fn with_self_rule(mut self, self_rule: SelfRule) -> Self {
        self.self_rule = self_rule;
        self
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    pub fn token_for(&self, descriptor: &ResourceDescriptor) -> PermissionToken {
        self.table.token(descriptor.action, &descriptor.namespace)
    }

    pub fn resolve(&self, descriptor: &ResourceDescriptor, actor: Option<&Actor>) -> AuthorizationDecision {
        if self.self_rule.applies(descriptor, actor) {
            tracing::trace!(
                namespace = %descriptor.namespace,
                action = %descriptor.action,
                "self rule grants access to own record"
            );
            return AuthorizationDecision::Allowed;
        }

        let token = self.token_for(descriptor);
        self.authorizer.authorize(actor, &token)
    }

    /// Resolve by action name (`viewAny`, `force_delete`, ...).
    pub fn resolve_named(
        &self,
        namespace: &ResourceNamespace,
        action: &str,
        actor: Option<&Actor>,
        subject: Option<ActorId>,
    ) -> Result<AuthorizationDecision, PolicyError> {
        let action = self.table.action_named(action)?;
        let descriptor = ResourceDescriptor {
            namespace: namespace.clone(),
            action,
            subject,
        };
        Ok(self.resolve(&descriptor, actor))
    }

    fn can(&self, action: Action, actor: Option<&Actor>, namespace: &ResourceNamespace) -> bool {
        self.resolve(&ResourceDescriptor::new(namespace.clone(), action), actor)
            .is_allowed()
    }

    pub fn can_view_any(&self, actor: Option<&Actor>, namespace: &ResourceNamespace) -> bool {
        self.can(Action::ViewAny, actor, namespace)
    }

    pub fn can_view(&self, actor: Option<&Actor>, namespace: &ResourceNamespace) -> bool {
        self.can(Action::View, actor, namespace)
    }

    pub fn can_create(&self, actor: Option<&Actor>, namespace: &ResourceNamespace) -> bool {
        self.can(Action::Create, actor, namespace)
    }

    pub fn can_update(&self, actor: Option<&Actor>, namespace: &ResourceNamespace) -> bool {
        self.can(Action::Update, actor, namespace)
    }

    pub fn can_delete(&self, actor: Option<&Actor>, namespace: &ResourceNamespace) -> bool {
        self.can(Action::Delete, actor, namespace)
    }

    pub fn can_force_delete(&self, actor: Option<&Actor>, namespace: &ResourceNamespace) -> bool {
        self.can(Action::ForceDelete, actor, namespace)
    }

    pub fn can_restore(&self, actor: Option<&Actor>, namespace: &ResourceNamespace) -> bool {
        self.can(Action::Restore, actor, namespace)
    }
}
