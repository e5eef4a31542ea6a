//! JSON seed data for the in-memory directory and role source.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use portcullis_auth::{Actor, PermissionToken, Role};
use portcullis_core::ActorId;

use crate::context::SessionToken;

/// Initial roles, actors and open sessions.
///
/// ```json
/// {
///   "roles": [{ "id": "admin", "name": "Admin", "is_super_admin": true,
///               "created_at": "2024-01-01T00:00:00Z" }],
///   "actors": [{ "id": "0190...", "username": "alice", "roles": ["admin"] }],
///   "sessions": [{ "token": "alice-session", "actor_id": "0190..." }]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub actors: Vec<Actor>,
    #[serde(default)]
    pub sessions: Vec<SeedSession>,
    /// Tokens every caller holds, signed in or not.
    #[serde(default)]
    pub public_permissions: Vec<PermissionToken>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedSession {
    pub token: SessionToken,
    pub actor_id: ActorId,
}

impl Seed {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid seed file {}", path.display()))
    }
}
