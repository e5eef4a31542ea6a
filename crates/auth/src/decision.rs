//! Authorization outcomes.
//!
//! A denial is a normal result, not a fault: every gate and every policy check
//! returns an [`AuthorizationDecision`].

use serde::Serialize;
use thiserror::Error;

use crate::{ActorStatus, ModuleSlug, PermissionToken, RoleId};

/// HTTP-style status the web layer should render for a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusIntent {
    Unauthorized,
    Forbidden,
}

impl StatusIntent {
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusIntent::Unauthorized => 401,
            StatusIntent::Forbidden => 403,
        }
    }
}

/// Machine-readable category of a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    Unauthenticated,
    SecurityCheckFailed,
    RoleMismatch,
    ModuleAccessDenied,
    ControlPanelDenied,
    MissingPermission,
    Unavailable,
}

impl DenialKind {
    pub fn code(&self) -> &'static str {
        match self {
            DenialKind::Unauthenticated => "unauthenticated",
            DenialKind::SecurityCheckFailed => "security_check_failed",
            DenialKind::RoleMismatch => "role_mismatch",
            DenialKind::ModuleAccessDenied => "module_access_denied",
            DenialKind::ControlPanelDenied => "control_panel_denied",
            DenialKind::MissingPermission => "missing_permission",
            DenialKind::Unavailable => "unavailable",
        }
    }

    pub fn status_intent(&self) -> StatusIntent {
        match self {
            DenialKind::Unauthenticated => StatusIntent::Unauthorized,
            _ => StatusIntent::Forbidden,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Denial {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("security check failed: {0}")]
    SecurityCheckFailed(String),

    #[error("role mismatch: requires one of [{}]", join_roles(.required))]
    RoleMismatch { required: Vec<RoleId> },

    #[error("no access to module '{0}'")]
    ModuleAccessDenied(ModuleSlug),

    #[error("no control panel access")]
    ControlPanelDenied,

    #[error("missing permission: {0}")]
    MissingPermission(PermissionToken),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

fn join_roles(roles: &[RoleId]) -> String {
    roles.iter().map(RoleId::as_str).collect::<Vec<_>>().join(", ")
}

impl Denial {
    /// Denial for an actor whose account may not act.
    pub fn account_not_active(status: ActorStatus) -> Self {
        Denial::SecurityCheckFailed(format!("account is {status}"))
    }

    pub fn kind(&self) -> DenialKind {
        match self {
            Denial::Unauthenticated => DenialKind::Unauthenticated,
            Denial::SecurityCheckFailed(_) => DenialKind::SecurityCheckFailed,
            Denial::RoleMismatch { .. } => DenialKind::RoleMismatch,
            Denial::ModuleAccessDenied(_) => DenialKind::ModuleAccessDenied,
            Denial::ControlPanelDenied => DenialKind::ControlPanelDenied,
            Denial::MissingPermission(_) => DenialKind::MissingPermission,
            Denial::Unavailable(_) => DenialKind::Unavailable,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    pub fn status_intent(&self) -> StatusIntent {
        self.kind().status_intent()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationDecision {
    Allowed,
    Denied(Denial),
}

impl AuthorizationDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthorizationDecision::Allowed)
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            AuthorizationDecision::Allowed => None,
            AuthorizationDecision::Denied(denial) => Some(denial),
        }
    }
}

impl From<Denial> for AuthorizationDecision {
    fn from(value: Denial) -> Self {
        AuthorizationDecision::Denied(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unauthenticated_maps_to_401() {
        assert_eq!(Denial::Unauthenticated.status_intent().as_u16(), 401);
        assert_eq!(Denial::ControlPanelDenied.status_intent().as_u16(), 403);
        assert_eq!(Denial::Unavailable("timeout".into()).status_intent().as_u16(), 403);
        assert_eq!(
            Denial::RoleMismatch { required: vec![RoleId::new("admin")] }
                .status_intent()
                .as_u16(),
            403
        );
    }

    #[test]
    fn messages_name_what_was_missing() {
        let token = PermissionToken::parse("articles.force_update").unwrap();
        assert_eq!(
            Denial::MissingPermission(token).to_string(),
            "missing permission: articles.force_update"
        );
        assert_eq!(
            Denial::RoleMismatch {
                required: vec![RoleId::new("admin"), RoleId::new("editor")]
            }
            .to_string(),
            "role mismatch: requires one of [admin, editor]"
        );
    }

    #[test]
    fn inactive_accounts_fail_the_security_check() {
        let denial = Denial::account_not_active(ActorStatus::Disabled);
        assert_eq!(denial.kind(), DenialKind::SecurityCheckFailed);
        assert_eq!(denial.to_string(), "security check failed: account is disabled");
    }

    #[test]
    fn codes_are_snake_case_and_match_serde() {
        let json = serde_json::to_value(DenialKind::ModuleAccessDenied).unwrap();
        assert_eq!(json, serde_json::json!("module_access_denied"));
        assert_eq!(DenialKind::ModuleAccessDenied.code(), "module_access_denied");
    }
}
