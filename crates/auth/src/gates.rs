//! The five standard gates.

use std::sync::Arc;

use crate::chain::{ActorResolution, Gate, GateContext, Stage};
use crate::{
    Ability, AuthorizationDecision, Authorizer, Denial, ModuleRegistry, PermissionToken,
    ResourceNamespace, RoleStore,
};

/// Establishes that an actor context exists and is allowed to act at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityCheck;

impl Gate for SecurityCheck {
    fn stage(&self) -> Stage {
        Stage::Security
    }

    fn check(&self, ctx: &GateContext<'_>) -> AuthorizationDecision {
        match ctx.actor {
            ActorResolution::Unavailable(reason) => Denial::Unavailable(reason.clone()).into(),
            ActorResolution::Anonymous if ctx.route.is_public => AuthorizationDecision::Allowed,
            ActorResolution::Anonymous => Denial::Unauthenticated.into(),
            ActorResolution::Resolved(actor) if !actor.is_active() => {
                Denial::account_not_active(actor.status).into()
            }
            ActorResolution::Resolved(_) => AuthorizationDecision::Allowed,
        }
    }
}

/// Requires one of the route's declared roles, if it declares any.
pub struct RouteRoleCheck {
    roles: Arc<dyn RoleStore>,
}

impl RouteRoleCheck {
    pub fn new(roles: Arc<dyn RoleStore>) -> Self {
        Self { roles }
    }
}

impl Gate for RouteRoleCheck {
    fn stage(&self) -> Stage {
        Stage::RouteRoles
    }

    fn check(&self, ctx: &GateContext<'_>) -> AuthorizationDecision {
        let required = &ctx.route.required_roles;
        if required.is_empty() {
            return AuthorizationDecision::Allowed;
        }
        let Some(actor) = ctx.actor() else {
            return Denial::Unauthenticated.into();
        };

        let held = self
            .roles
            .is_super_admin(actor)
            .and_then(|bypass| {
                if bypass {
                    return Ok(true);
                }
                // Only roles that still exist count.
                let resolved = self.roles.roles_for_actor(actor)?;
                Ok(resolved.iter().any(|role| required.contains(&role.id)))
            });

        match held {
            Ok(true) => AuthorizationDecision::Allowed,
            Ok(false) => Denial::RoleMismatch {
                required: required.iter().cloned().collect(),
            }
            .into(),
            Err(err) => Denial::Unavailable(err.to_string()).into(),
        }
    }
}

/// Coarse access to the module a route belongs to.
///
/// Public-facing routes only need the module to be installed and enabled.
/// Control-panel routes additionally need at least one token in one of the
/// module's namespaces.
pub struct ModuleAccessCheck {
    modules: Arc<ModuleRegistry>,
    authorizer: Arc<Authorizer>,
}

impl ModuleAccessCheck {
    pub fn new(modules: Arc<ModuleRegistry>, authorizer: Arc<Authorizer>) -> Self {
        Self {
            modules,
            authorizer,
        }
    }
}

impl Gate for ModuleAccessCheck {
    fn stage(&self) -> Stage {
        Stage::ModuleAccess
    }

    fn check(&self, ctx: &GateContext<'_>) -> AuthorizationDecision {
        let Some(slug) = &ctx.route.module else {
            return AuthorizationDecision::Allowed;
        };
        let denied = || AuthorizationDecision::from(Denial::ModuleAccessDenied(slug.clone()));

        let module = match self.modules.get(slug) {
            Some(module) if module.enabled => module,
            _ => return denied(),
        };
        if !ctx.route.control_panel || ctx.route.is_public {
            return AuthorizationDecision::Allowed;
        }

        let Some(actor) = ctx.actor() else {
            return Denial::Unauthenticated.into();
        };
        let has_access = self.authorizer.is_super_admin(actor).and_then(|bypass| {
            if bypass {
                return Ok(true);
            }
            let tokens = self.authorizer.effective_tokens(actor)?;
            Ok(tokens.iter().any(|t| module.owns(t.namespace())))
        });

        match has_access {
            Ok(true) => AuthorizationDecision::Allowed,
            Ok(false) => denied(),
            Err(err) => Denial::Unavailable(err.to_string()).into(),
        }
    }
}

/// Entry to the administrative control panel.
pub struct ControlPanelAccessCheck {
    authorizer: Arc<Authorizer>,
    access_token: PermissionToken,
}

impl ControlPanelAccessCheck {
    pub const DEFAULT_NAMESPACE: &'static str = "control_panel";

    /// Uses `control_panel.view` as the access token.
    pub fn new(authorizer: Arc<Authorizer>) -> Self {
        Self::with_token(
            authorizer,
            ResourceNamespace::trusted(Self::DEFAULT_NAMESPACE).token(Ability::View),
        )
    }

    pub fn with_token(authorizer: Arc<Authorizer>, access_token: PermissionToken) -> Self {
        Self {
            authorizer,
            access_token,
        }
    }

    pub fn access_token(&self) -> &PermissionToken {
        &self.access_token
    }
}

impl Gate for ControlPanelAccessCheck {
    fn stage(&self) -> Stage {
        Stage::ControlPanel
    }

    fn check(&self, ctx: &GateContext<'_>) -> AuthorizationDecision {
        if !ctx.route.control_panel || ctx.route.is_public {
            return AuthorizationDecision::Allowed;
        }
        match self.authorizer.authorize(ctx.actor(), &self.access_token) {
            AuthorizationDecision::Denied(Denial::MissingPermission(_)) => Denial::ControlPanelDenied.into(),
            other => other,
        }
    }
}

/// Fine-grained check of the route's declared permission token.
pub struct RoutePermissionCheck {
    authorizer: Arc<Authorizer>,
}

impl RoutePermissionCheck {
    pub fn new(authorizer: Arc<Authorizer>) -> Self {
        Self { authorizer }
    }
}

impl Gate for RoutePermissionCheck {
    fn stage(&self) -> Stage {
        Stage::RoutePermission
    }

    fn check(&self, ctx: &GateContext<'_>) -> AuthorizationDecision {
        match &ctx.route.required_permission {
            Some(token) => self.authorizer.authorize(ctx.actor(), token),
            None => AuthorizationDecision::Allowed,
        }
    }
}
