//! The ordered gate sequence applied to every inbound request.
//!
//! Gates run strictly in [`Stage`] order. The first denial ends evaluation;
//! later gates are never invoked. Later gates may assume what earlier ones
//! established (e.g. an active actor once the security gate passed on a
//! non-public route).

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use portcullis_core::RequestId;

use crate::gates::{
    ControlPanelAccessCheck, ModuleAccessCheck, RoutePermissionCheck, RouteRoleCheck, SecurityCheck,
};
use crate::{Actor, AuthorizationDecision, Authorizer, DenialKind, ModuleRegistry, RouteDeclaration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Security,
    RouteRoles,
    ModuleAccess,
    ControlPanel,
    RoutePermission,
}

impl Stage {
    pub const ORDER: [Stage; 5] = [
        Stage::Security,
        Stage::RouteRoles,
        Stage::ModuleAccess,
        Stage::ControlPanel,
        Stage::RoutePermission,
    ];
}

impl core::fmt::Display for Stage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Stage::Security => "security",
            Stage::RouteRoles => "route_roles",
            Stage::ModuleAccess => "module_access",
            Stage::ControlPanel => "control_panel",
            Stage::RoutePermission => "route_permission",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("no gate registered for stage '{0}'")]
    MissingStage(Stage),

    #[error("more than one gate registered for stage '{0}'")]
    DuplicateStage(Stage),
}

/// Outcome of looking up the current actor at request start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorResolution {
    Resolved(Actor),
    Anonymous,
    /// The actor provider failed or timed out.
    Unavailable(String),
}

impl ActorResolution {
    pub fn actor(&self) -> Option<&Actor> {
        match self {
            ActorResolution::Resolved(actor) => Some(actor),
            _ => None,
        }
    }
}

/// Everything a gate may look at. Read-only for the request's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub request_id: RequestId,
    pub actor: &'a ActorResolution,
    pub route: &'a RouteDeclaration,
}

impl<'a> GateContext<'a> {
    pub fn new(request_id: RequestId, actor: &'a ActorResolution, route: &'a RouteDeclaration) -> Self {
        Self {
            request_id,
            actor,
            route,
        }
    }

    pub fn actor(&self) -> Option<&'a Actor> {
        self.actor.actor()
    }
}

pub trait Gate: Send + Sync {
    fn stage(&self) -> Stage;

    fn check(&self, ctx: &GateContext<'_>) -> AuthorizationDecision;
}

pub struct MiddlewareChain {
    gates: Vec<Box<dyn Gate>>,
}

impl MiddlewareChain {
    pub fn builder() -> ChainBuilder {
        ChainBuilder::default()
    }

    /// The five standard gates wired to shared collaborators.
    pub fn standard(authorizer: Arc<Authorizer>, modules: Arc<ModuleRegistry>) -> Self {
        Self {
            gates: vec![
                Box::new(SecurityCheck),
                Box::new(RouteRoleCheck::new(authorizer.role_store().clone())),
                Box::new(ModuleAccessCheck::new(modules, authorizer.clone())),
                Box::new(ControlPanelAccessCheck::new(authorizer.clone())),
                Box::new(RoutePermissionCheck::new(authorizer)),
            ],
        }
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.gates.iter().map(|g| g.stage()).collect()
    }

    pub fn evaluate(&self, ctx: &GateContext<'_>) -> AuthorizationDecision {
        for gate in &self.gates {
            let decision = gate.check(ctx);
            if let AuthorizationDecision::Denied(denial) = &decision {
                let stage = gate.stage();
                if denial.kind() == DenialKind::Unavailable {
                    tracing::error!(
                        request_id = %ctx.request_id,
                        route = %ctx.route.name,
                        %stage,
                        reason = %denial,
                        "request denied: data source unavailable"
                    );
                } else {
                    tracing::debug!(
                        request_id = %ctx.request_id,
                        route = %ctx.route.name,
                        %stage,
                        code = denial.code(),
                        reason = %denial,
                        "request denied"
                    );
                }
                return decision;
            }
        }
        AuthorizationDecision::Allowed
    }
}

impl core::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("stages", &self.stages())
            .finish()
    }
}

/// Assembles a chain from exactly one gate per stage.
#[derive(Default)]
pub struct ChainBuilder {
    gates: Vec<Box<dyn Gate>>,
}

impl ChainBuilder {
    pub fn gate(mut self, gate: impl Gate + 'static) -> Self {
        self.gates.push(Box::new(gate));
        self
    }

    pub fn build(mut self) -> Result<MiddlewareChain, ChainError> {
        self.gates.sort_by_key(|g| g.stage());
        for pair in self.gates.windows(2) {
            if pair[0].stage() == pair[1].stage() {
                return Err(ChainError::DuplicateStage(pair[0].stage()));
            }
        }
        for stage in Stage::ORDER {
            if !self.gates.iter().any(|g| g.stage() == stage) {
                return Err(ChainError::MissingStage(stage));
            }
        }
        Ok(MiddlewareChain { gates: self.gates })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use portcullis_core::ActorId;

    use super::*;
    use crate::{
        Denial, PermissionToken, Role, RoleId, RoleSnapshot, RouteDeclaration, RouteTable,
    };

    /// Records every invocation and answers with a fixed decision.
    struct Spy {
        stage: Stage,
        decision: AuthorizationDecision,
        calls: Arc<AtomicUsize>,
        log: Arc<Mutex<Vec<Stage>>>,
    }

    impl Gate for Spy {
        fn stage(&self) -> Stage {
            self.stage
        }

        fn check(&self, _ctx: &GateContext<'_>) -> AuthorizationDecision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(self.stage);
            self.decision.clone()
        }
    }

    fn token(raw: &str) -> PermissionToken {
        PermissionToken::parse(raw).unwrap()
    }

    fn fixtures() -> (Arc<Authorizer>, Arc<ModuleRegistry>, RouteTable) {
        let now = Utc::now();
        let roles = vec![
            Role::new(RoleId::new("admin"), "Admin", now).unwrap().as_super_admin(),
            Role::new(RoleId::new("manager"), "Manager", now)
                .unwrap()
                .with_permissions([token("control_panel.view"), token("users.view_any")]),
            Role::new(RoleId::new("viewer"), "Viewer", now)
                .unwrap()
                .with_permissions([token("users.view")]),
            Role::new(RoleId::new("editor"), "Editor", now)
                .unwrap()
                .with_permissions([token("control_panel.view"), token("users.view")]),
        ];
        let authorizer = Arc::new(Authorizer::new(Arc::new(RoleSnapshot::new(roles).unwrap())));
        let modules = Arc::new(ModuleRegistry::standard());
        let routes = RouteTable::users_module(&modules).unwrap();
        (authorizer, modules, routes)
    }

    fn actor(role: &'static str) -> ActorResolution {
        ActorResolution::Resolved(Actor::new(ActorId::new(), role).with_role(RoleId::new(role)))
    }

    fn run(chain: &MiddlewareChain, actor: &ActorResolution, route: &RouteDeclaration) -> AuthorizationDecision {
        chain.evaluate(&GateContext::new(RequestId::new(), actor, route))
    }

    #[test]
    fn standard_chain_runs_in_stage_order() {
        let (authorizer, modules, _) = fixtures();
        let chain = MiddlewareChain::standard(authorizer, modules);
        assert_eq!(chain.stages(), Stage::ORDER.to_vec());
    }

    #[test]
    fn unauthenticated_private_route_is_denied_at_security() {
        let (authorizer, modules, routes) = fixtures();
        let chain = MiddlewareChain::standard(authorizer, modules);
        let decision = run(&chain, &ActorResolution::Anonymous, routes.get("users.self").unwrap());

        let denial = decision.denial().unwrap();
        assert_eq!(denial, &Denial::Unauthenticated);
        assert_eq!(denial.status_intent().as_u16(), 401);
    }

    #[test]
    fn public_routes_pass_without_an_actor() {
        let (authorizer, modules, routes) = fixtures();
        let chain = MiddlewareChain::standard(authorizer, modules);
        for name in ["users.view", "users.login", "admin.login"] {
            assert!(run(&chain, &ActorResolution::Anonymous, routes.get(name).unwrap()).is_allowed());
        }
    }

    #[test]
    fn each_gate_yields_its_own_denial() {
        let (authorizer, modules, routes) = fixtures();
        let chain = MiddlewareChain::standard(authorizer, modules);

        // No token in the users module at all.
        let stranger = ActorResolution::Resolved(Actor::new(ActorId::new(), "stranger"));
        assert_eq!(
            run(&chain, &stranger, routes.get("admin.home").unwrap()).denial().map(Denial::kind),
            Some(DenialKind::ModuleAccessDenied)
        );

        // Module token but no control panel token.
        assert_eq!(
            run(&chain, &actor("viewer"), routes.get("admin.home").unwrap())
                .denial()
                .map(Denial::kind),
            Some(DenialKind::ControlPanelDenied)
        );

        // Control panel access but not users.view_any.
        assert_eq!(
            run(&chain, &actor("editor"), routes.get("admin.users.index").unwrap()),
            AuthorizationDecision::Denied(Denial::MissingPermission(token("users.view_any")))
        );

        assert!(run(&chain, &actor("manager"), routes.get("admin.users.index").unwrap()).is_allowed());
        assert!(run(&chain, &actor("admin"), routes.get("admin.roles.index").unwrap()).is_allowed());
    }

    #[test]
    fn role_denial_short_circuits_the_permission_gate() {
        let (authorizer, modules, _) = fixtures();
        let permission_calls = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));

        let chain = MiddlewareChain::builder()
            .gate(Spy {
                stage: Stage::RoutePermission,
                decision: AuthorizationDecision::Allowed,
                calls: permission_calls.clone(),
                log: log.clone(),
            })
            .gate(SecurityCheck)
            .gate(RouteRoleCheck::new(authorizer.role_store().clone()))
            .gate(ModuleAccessCheck::new(modules, authorizer.clone()))
            .gate(ControlPanelAccessCheck::new(authorizer))
            .build()
            .unwrap();

        let route = RouteDeclaration::new("reports", "reports")
            .unwrap()
            .requires_role(RoleId::new("admin"));
        let decision = run(&chain, &actor("viewer"), &route);

        assert_eq!(decision.denial().map(Denial::kind), Some(DenialKind::RoleMismatch));
        assert_eq!(permission_calls.load(Ordering::SeqCst), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn builder_orders_gates_by_stage() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut builder = MiddlewareChain::builder();
        for stage in Stage::ORDER.iter().rev() {
            builder = builder.gate(Spy {
                stage: *stage,
                decision: AuthorizationDecision::Allowed,
                calls: calls.clone(),
                log: log.clone(),
            });
        }
        let chain = builder.build().unwrap();

        let route = RouteDeclaration::new("x", "x").unwrap();
        assert!(run(&chain, &ActorResolution::Anonymous, &route).is_allowed());
        assert_eq!(*log.lock().unwrap(), Stage::ORDER.to_vec());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn first_denial_stops_evaluation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut builder = MiddlewareChain::builder();
        for stage in Stage::ORDER {
            let decision = if stage == Stage::ModuleAccess {
                Denial::ModuleAccessDenied(crate::ModuleSlug::new("users")).into()
            } else {
                AuthorizationDecision::Allowed
            };
            builder = builder.gate(Spy {
                stage,
                decision,
                calls: calls.clone(),
                log: log.clone(),
            });
        }
        let chain = builder.build().unwrap();

        let route = RouteDeclaration::new("x", "x").unwrap();
        let decision = run(&chain, &ActorResolution::Anonymous, &route);
        assert_eq!(decision.denial().map(Denial::kind), Some(DenialKind::ModuleAccessDenied));
        assert_eq!(
            *log.lock().unwrap(),
            vec![Stage::Security, Stage::RouteRoles, Stage::ModuleAccess]
        );
    }

    #[test]
    fn builder_rejects_missing_and_duplicate_stages() {
        let err = MiddlewareChain::builder().gate(SecurityCheck).build().unwrap_err();
        assert_eq!(err, ChainError::MissingStage(Stage::RouteRoles));

        let err = MiddlewareChain::builder()
            .gate(SecurityCheck)
            .gate(SecurityCheck)
            .build()
            .unwrap_err();
        assert_eq!(err, ChainError::DuplicateStage(Stage::Security));
    }

    #[test]
    fn unavailable_actor_is_denied_with_unavailable() {
        let (authorizer, modules, routes) = fixtures();
        let chain = MiddlewareChain::standard(authorizer, modules);
        let resolution = ActorResolution::Unavailable("timed out".to_string());
        let decision = run(&chain, &resolution, routes.get("users.view").unwrap());
        assert_eq!(decision.denial().map(Denial::kind), Some(DenialKind::Unavailable));
    }
}
