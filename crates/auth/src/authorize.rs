use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;

use portcullis_core::ActorId;

use crate::{Actor, AuthorizationDecision, Denial, DenialKind, PermissionToken, RoleStore, StoreError};

/// Decides whether an actor holds a permission token.
///
/// - No IO beyond the injected [`RoleStore`]
/// - No caching: role membership is read on every call
/// - No panics
pub struct Authorizer {
    roles: Arc<dyn RoleStore>,
    public: HashSet<PermissionToken>,
}

impl Authorizer {
    pub fn new(roles: Arc<dyn RoleStore>) -> Self {
        Self {
            roles,
            public: HashSet::new(),
        }
    }

    /// Mark tokens as public: granted to everyone, authenticated or not.
    pub fn with_public_tokens(mut self, tokens: impl IntoIterator<Item = PermissionToken>) -> Self {
        self.public.extend(tokens);
        self
    }

    pub fn is_public(&self, token: &PermissionToken) -> bool {
        self.public.contains(token)
    }

    pub fn role_store(&self) -> &Arc<dyn RoleStore> {
        &self.roles
    }

    pub fn authorize(&self, actor: Option<&Actor>, token: &PermissionToken) -> AuthorizationDecision {
        if self.is_public(token) {
            return AuthorizationDecision::Allowed;
        }

        let Some(actor) = actor else {
            return Denial::Unauthenticated.into();
        };
        if !actor.is_active() {
            return Denial::account_not_active(actor.status).into();
        }

        match self.holds(actor, token) {
            Ok(true) => AuthorizationDecision::Allowed,
            Ok(false) => Denial::MissingPermission(token.clone()).into(),
            Err(err) => unavailable(actor.id, err),
        }
    }

    pub fn is_super_admin(&self, actor: &Actor) -> Result<bool, StoreError> {
        self.roles.is_super_admin(actor)
    }

    /// Union of the actor's role tokens and its explicit grants.
    pub fn effective_tokens(&self, actor: &Actor) -> Result<BTreeSet<PermissionToken>, StoreError> {
        let mut tokens: BTreeSet<PermissionToken> = actor.permissions.iter().cloned().collect();
        for role in self.roles.roles_for_actor(actor)? {
            tokens.extend(role.permissions().iter().cloned());
        }
        Ok(tokens)
    }

    fn holds(&self, actor: &Actor, token: &PermissionToken) -> Result<bool, StoreError> {
        if self.roles.is_super_admin(actor)? {
            tracing::trace!(actor_id = %actor.id, %token, "super-admin bypass");
            return Ok(true);
        }
        if actor.holds_directly(token) {
            return Ok(true);
        }
        Ok(self
            .roles
            .roles_for_actor(actor)?
            .iter()
            .any(|role| role.has_permission(token)))
    }

    /// Explain why [`Authorizer::authorize`] reaches its decision.
    ///
    /// The `granted` flag is always the outcome of `authorize` itself.
    pub fn explain(&self, actor: Option<&Actor>, token: &PermissionToken) -> AuthorizationExplanation {
        let decision = self.authorize(actor, token);
        let granted = decision.is_allowed();
        let denial = decision.denial().map(Denial::kind);

        let Some(actor) = actor else {
            let reason = if granted {
                format!("'{token}' is public")
            } else {
                "no authenticated actor".to_string()
            };
            return AuthorizationExplanation {
                required_permission: token.to_string(),
                granted,
                reason,
                actor: None,
                denial,
                granting_roles: Vec::new(),
            };
        };

        let state = match self.actor_state(actor) {
            Ok(state) => state,
            Err(err) => {
                return AuthorizationExplanation {
                    required_permission: token.to_string(),
                    granted,
                    reason: err.to_string(),
                    actor: None,
                    denial,
                    granting_roles: Vec::new(),
                };
            }
        };

        let granting_roles: Vec<String> = self
            .roles
            .roles_for_actor(actor)
            .unwrap_or_default()
            .iter()
            .filter(|role| role.has_permission(token))
            .map(|role| role.id.to_string())
            .collect();

        let reason = if self.is_public(token) {
            format!("'{token}' is public")
        } else if !actor.is_active() {
            format!("account is {}", actor.status)
        } else if state.is_super_admin {
            "actor holds the super-admin role".to_string()
        } else if actor.holds_directly(token) {
            format!("'{token}' is granted directly to the actor")
        } else if !granting_roles.is_empty() {
            format!("'{token}' is granted by role(s) {}", granting_roles.join(", "))
        } else {
            match decision.denial() {
                Some(denial) => denial.to_string(),
                None => format!("'{token}' granted"),
            }
        };

        AuthorizationExplanation {
            required_permission: token.to_string(),
            granted,
            reason,
            actor: Some(state),
            denial,
            granting_roles,
        }
    }

    fn actor_state(&self, actor: &Actor) -> Result<ActorState, StoreError> {
        let resolved = self.roles.roles_for_actor(actor)?;
        let dangling_roles = actor
            .roles
            .iter()
            .filter(|id| !resolved.iter().any(|r| &r.id == *id))
            .map(|id| id.to_string())
            .collect();

        Ok(ActorState {
            actor_id: actor.id,
            roles: resolved.iter().map(|r| r.id.to_string()).collect(),
            dangling_roles,
            effective_permissions: self
                .effective_tokens(actor)?
                .iter()
                .map(|t| t.to_string())
                .collect(),
            is_super_admin: self.roles.is_super_admin(actor)?,
        })
    }
}

fn unavailable(actor_id: ActorId, err: StoreError) -> AuthorizationDecision {
    tracing::error!(%actor_id, error = %err, "role store failure during authorization");
    Denial::Unavailable(err.to_string()).into()
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    pub actor: Option<ActorState>,
    pub denial: Option<DenialKind>,
    /// Held roles whose token set contains the required permission.
    pub granting_roles: Vec<String>,
}

/// The actor as the authorizer sees it.
#[derive(Debug, Clone, Serialize)]
pub struct ActorState {
    pub actor_id: ActorId,
    pub roles: Vec<String>,
    /// Assigned role ids that name no stored role.
    pub dangling_roles: Vec<String>,
    pub effective_permissions: Vec<String>,
    pub is_super_admin: bool,
}
