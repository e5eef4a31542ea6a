//! Read-only role lookups.
//!
//! The core never edits roles. Administrative edits happen elsewhere and are
//! published by swapping in a whole new [`RoleSnapshot`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use portcullis_core::index_by_id;

use crate::{Actor, Role, RoleError, RoleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("role '{0}' not found")]
    NotFound(RoleId),

    #[error("role store unavailable: {0}")]
    Unavailable(String),
}

/// Read contract used by the authorizer and the gates.
///
/// Implementations must be safe for concurrent reads.
pub trait RoleStore: Send + Sync {
    fn find_role(&self, id: &RoleId) -> Result<Arc<Role>, StoreError>;

    /// Resolve the actor's role ids. Ids naming no stored role are dropped.
    fn roles_for_actor(&self, actor: &Actor) -> Result<Vec<Arc<Role>>, StoreError>;

    fn is_super_admin(&self, actor: &Actor) -> Result<bool, StoreError>;
}

/// Immutable set of roles, indexed by id.
#[derive(Debug, Default)]
pub struct RoleSnapshot {
    roles: Vec<Arc<Role>>,
    index: HashMap<RoleId, usize>,
    super_admin: Option<RoleId>,
}

impl RoleSnapshot {
    /// Build a snapshot.
    ///
    /// If several roles carry `is_super_admin`, the one with the earliest
    /// `created_at` is designated; ties go to the earlier position in `roles`.
    /// The others keep their flag but confer no bypass.
    pub fn new(roles: Vec<Role>) -> Result<Self, RoleError> {
        let index = index_by_id(&roles).map_err(RoleError::DuplicateRole)?;

        let flagged: Vec<&Role> = roles.iter().filter(|r| r.is_super_admin).collect();
        // min_by_key keeps the first of equal keys, which gives the positional tie-break.
        let super_admin = flagged.iter().min_by_key(|r| r.created_at).map(|r| r.id.clone());
        if flagged.len() > 1 {
            tracing::warn!(
                designated = ?super_admin.as_ref().map(RoleId::as_str),
                flagged = flagged.len(),
                "multiple roles flagged as super-admin; only the first created confers the bypass"
            );
        }

        Ok(Self {
            roles: roles.into_iter().map(Arc::new).collect(),
            index,
            super_admin,
        })
    }

    pub fn super_admin_role(&self) -> Option<&RoleId> {
        self.super_admin.as_ref()
    }

    pub fn roles(&self) -> &[Arc<Role>] {
        &self.roles
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    fn get(&self, id: &RoleId) -> Option<&Arc<Role>> {
        self.index.get(id).and_then(|pos| self.roles.get(*pos))
    }
}

impl RoleStore for RoleSnapshot {
    fn find_role(&self, id: &RoleId) -> Result<Arc<Role>, StoreError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn roles_for_actor(&self, actor: &Actor) -> Result<Vec<Arc<Role>>, StoreError> {
        let mut resolved = Vec::with_capacity(actor.roles.len());
        for id in &actor.roles {
            match self.get(id) {
                Some(role) => resolved.push(role.clone()),
                None => tracing::trace!(actor_id = %actor.id, role = %id, "dropping dangling role reference"),
            }
        }
        Ok(resolved)
    }

    fn is_super_admin(&self, actor: &Actor) -> Result<bool, StoreError> {
        Ok(match &self.super_admin {
            Some(id) => actor.roles.contains(id),
            None => false,
        })
    }
}

/// Live role store: the current snapshot behind a lock, replaced atomically.
///
/// Reads before the first [`RoleRegistry::replace`] fail with
/// [`StoreError::Unavailable`].
#[derive(Debug, Default)]
pub struct RoleRegistry {
    current: RwLock<Option<Arc<RoleSnapshot>>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: RoleSnapshot) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(snapshot))),
        }
    }

    pub fn replace(&self, snapshot: RoleSnapshot) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Arc::new(snapshot));
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn snapshot(&self) -> Result<Arc<RoleSnapshot>, StoreError> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| StoreError::Unavailable("roles not loaded".to_string()))
    }
}

impl RoleStore for RoleRegistry {
    fn find_role(&self, id: &RoleId) -> Result<Arc<Role>, StoreError> {
        self.snapshot()?.find_role(id)
    }

    fn roles_for_actor(&self, actor: &Actor) -> Result<Vec<Arc<Role>>, StoreError> {
        self.snapshot()?.roles_for_actor(actor)
    }

    fn is_super_admin(&self, actor: &Actor) -> Result<bool, StoreError> {
        self.snapshot()?.is_super_admin(actor)
    }
}
