//! `portcullis-auth`: identity, roles and the request authorization pipeline.
//!
//! No HTTP and no storage: role data and the current actor are handed in by
//! the caller, and every check returns an [`AuthorizationDecision`].

pub mod actor;
pub mod authorize;
pub mod chain;
pub mod decision;
pub mod events;
pub mod gates;
pub mod modules;
pub mod permissions;
pub mod policy;
pub mod roles;
pub mod routes;
pub mod store;

pub use actor::{Actor, ActorStatus};
pub use authorize::{ActorState, AuthorizationExplanation, Authorizer};
pub use chain::{ActorResolution, ChainBuilder, ChainError, Gate, GateContext, MiddlewareChain, Stage};
pub use decision::{AuthorizationDecision, Denial, DenialKind, StatusIntent};
pub use events::AuthEvent;
pub use gates::{
    ControlPanelAccessCheck, ModuleAccessCheck, RoutePermissionCheck, RouteRoleCheck, SecurityCheck,
};
pub use modules::{Module, ModuleRegistry, ModuleSlug, RegistryError};
pub use permissions::{Ability, PermissionToken, ResourceNamespace, TokenError};
pub use policy::{Action, PolicyError, PolicyResolver, PolicyTable, ResourceDescriptor, SelfRule, TokenResolver};
pub use roles::{Role, RoleError, RoleId};
pub use routes::{RouteDeclaration, RouteError, RouteMatch, RoutePattern, RouteSummary, RouteTable, RouteTableBuilder};
pub use store::{RoleRegistry, RoleSnapshot, RoleStore, StoreError};
