//! The authenticated principal as seen by the authorization core.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use portcullis_core::{ActorId, Entity};

use crate::{PermissionToken, RoleId};

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActorStatus {
    /// Active and allowed to act.
    #[default]
    Active,
    /// Registered but not yet activated.
    Inactive,
    /// Disabled by an administrator.
    Disabled,
}

impl core::fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ActorStatus::Active => write!(f, "active"),
            ActorStatus::Inactive => write!(f, "inactive"),
            ActorStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// An authenticated actor.
///
/// Owned by the authentication subsystem. The authorization core only reads
/// it, and never assumes that every id in `roles` still names an existing role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub roles: BTreeSet<RoleId>,
    /// Tokens granted directly to this actor, in addition to its roles.
    #[serde(default)]
    pub permissions: Vec<PermissionToken>,
    #[serde(default)]
    pub status: ActorStatus,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
}

impl Actor {
    pub fn new(id: ActorId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: String::new(),
            display_name: String::new(),
            roles: BTreeSet::new(),
            permissions: Vec::new(),
            status: ActorStatus::Active,
            last_active_at: None,
        }
    }

    pub fn with_role(mut self, role: RoleId) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn with_permission(mut self, token: PermissionToken) -> Self {
        self.grant_permission(token);
        self
    }

    pub fn with_status(mut self, status: ActorStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ActorStatus::Active
    }

    /// Activate a pending registration. Disabled accounts stay disabled.
    pub fn activate(&mut self) -> bool {
        if self.status != ActorStatus::Inactive {
            return false;
        }
        self.status = ActorStatus::Active;
        true
    }

    pub fn assign_role(&mut self, role: RoleId) -> bool {
        self.roles.insert(role)
    }

    pub fn revoke_role(&mut self, role: &RoleId) -> bool {
        self.roles.remove(role)
    }

    pub fn grant_permission(&mut self, token: PermissionToken) -> bool {
        if self.permissions.contains(&token) {
            return false;
        }
        self.permissions.push(token);
        true
    }

    pub fn holds_directly(&self, token: &PermissionToken) -> bool {
        self.permissions.contains(token)
    }

    /// Record activity; timestamps never move backwards.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        match self.last_active_at {
            Some(prev) if prev >= at => {}
            _ => self.last_active_at = Some(at),
        }
    }
}

impl Entity for Actor {
    type Id = ActorId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn new_actor_is_active_with_no_roles() {
        let actor = Actor::new(ActorId::new(), "alice");
        assert!(actor.is_active());
        assert!(actor.roles.is_empty());
        assert!(actor.last_active_at.is_none());
    }

    #[test]
    fn assign_and_revoke_role() {
        let mut actor = Actor::new(ActorId::new(), "bob");
        assert!(actor.assign_role(RoleId::new("editor")));
        assert!(!actor.assign_role(RoleId::new("editor")));
        assert!(actor.revoke_role(&RoleId::new("editor")));
        assert!(actor.roles.is_empty());
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut actor = Actor::new(ActorId::new(), "carol");
        let now = Utc::now();
        actor.touch(now);
        actor.touch(now - Duration::minutes(5));
        assert_eq!(actor.last_active_at, Some(now));

        let later = now + Duration::minutes(1);
        actor.touch(later);
        assert_eq!(actor.last_active_at, Some(later));
    }

    #[test]
    fn disabled_and_inactive_actors_are_not_active() {
        let actor = Actor::new(ActorId::new(), "dave").with_status(ActorStatus::Disabled);
        assert!(!actor.is_active());
        let actor = actor.with_status(ActorStatus::Inactive);
        assert!(!actor.is_active());
    }

    #[test]
    fn activation_only_lifts_pending_accounts() {
        let mut pending = Actor::new(ActorId::new(), "erin").with_status(ActorStatus::Inactive);
        assert!(pending.activate());
        assert!(pending.is_active());
        assert!(!pending.activate());

        let mut disabled = Actor::new(ActorId::new(), "fred").with_status(ActorStatus::Disabled);
        assert!(!disabled.activate());
        assert_eq!(disabled.status, ActorStatus::Disabled);
    }
}
