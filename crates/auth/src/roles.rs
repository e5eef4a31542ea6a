use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use portcullis_core::Entity;

use crate::PermissionToken;

/// Role identifier used for RBAC (e.g. `admin`, `editor`).
///
/// Unique and immutable once the role exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(Cow<'static, str>);

impl RoleId {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleError {
    #[error("duplicate role '{0}'")]
    DuplicateRole(RoleId),

    #[error("role id must not be empty")]
    EmptyId,
}

/// A named role and the permission tokens it grants.
///
/// # Invariants
/// - `permissions` never contains the same token twice (insertion order is kept).
/// - `is_super_admin` only confers a bypass if this role is the one designated
///   by the role store (see [`crate::RoleSnapshot`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(deserialize_with = "deserialize_permissions", default)]
    permissions: Vec<PermissionToken>,
    #[serde(default)]
    pub is_super_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn new(id: RoleId, name: impl Into<String>, created_at: DateTime<Utc>) -> Result<Self, RoleError> {
        if id.as_str().is_empty() {
            return Err(RoleError::EmptyId);
        }
        Ok(Self {
            id,
            name: name.into(),
            permissions: Vec::new(),
            is_super_admin: false,
            created_at,
        })
    }

    pub fn with_permissions(mut self, tokens: impl IntoIterator<Item = PermissionToken>) -> Self {
        for token in tokens {
            self.grant(token);
        }
        self
    }

    pub fn as_super_admin(mut self) -> Self {
        self.is_super_admin = true;
        self
    }

    /// Grant a token. Returns `false` if the role already held it.
    pub fn grant(&mut self, token: PermissionToken) -> bool {
        if self.permissions.contains(&token) {
            return false;
        }
        self.permissions.push(token);
        true
    }

    /// Revoke a token. Returns `false` if the role did not hold it.
    pub fn revoke(&mut self, token: &PermissionToken) -> bool {
        let before = self.permissions.len();
        self.permissions.retain(|t| t != token);
        before != self.permissions.len()
    }

    pub fn permissions(&self) -> &[PermissionToken] {
        &self.permissions
    }

    pub fn has_permission(&self, token: &PermissionToken) -> bool {
        self.permissions.contains(token)
    }
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn deserialize_permissions<'de, D>(deserializer: D) -> Result<Vec<PermissionToken>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<PermissionToken>::deserialize(deserializer)?;
    let mut out: Vec<PermissionToken> = Vec::with_capacity(raw.len());
    for token in raw {
        if !out.contains(&token) {
            out.push(token);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(raw: &str) -> PermissionToken {
        PermissionToken::parse(raw).unwrap()
    }

    #[test]
    fn grant_keeps_tokens_unique_and_ordered() {
        let mut role = Role::new(RoleId::new("editor"), "Editor", Utc::now()).unwrap();
        assert!(role.grant(token("articles.view")));
        assert!(role.grant(token("articles.update")));
        assert!(!role.grant(token("articles.view")));

        let rendered: Vec<String> = role.permissions().iter().map(|t| t.to_string()).collect();
        assert_eq!(rendered, vec!["articles.view", "articles.update"]);
    }

    #[test]
    fn revoke_removes_only_the_given_token() {
        let mut role = Role::new(RoleId::new("editor"), "Editor", Utc::now())
            .unwrap()
            .with_permissions([token("articles.view"), token("articles.update")]);

        assert!(role.revoke(&token("articles.view")));
        assert!(!role.revoke(&token("articles.view")));
        assert!(role.has_permission(&token("articles.update")));
    }

    #[test]
    fn empty_role_id_is_rejected() {
        assert_eq!(
            Role::new(RoleId::new(""), "Nobody", Utc::now()).unwrap_err(),
            RoleError::EmptyId
        );
    }

    #[test]
    fn deserializing_drops_duplicate_tokens() {
        let role: Role = serde_json::from_value(serde_json::json!({
            "id": "editor",
            "name": "Editor",
            "permissions": ["articles.view", "articles.view", "articles.update"],
            "created_at": "2024-01-01T00:00:00Z",
        }))
        .unwrap();

        assert_eq!(role.permissions().len(), 2);
        assert!(!role.is_super_admin);
    }
}
