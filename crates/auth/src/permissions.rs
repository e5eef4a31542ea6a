//! Hierarchical permission tokens (`<resource namespace>.<action suffix>`).

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("resource namespace is empty")]
    EmptyNamespace,

    #[error("invalid resource namespace '{0}'")]
    InvalidNamespace(String),

    #[error("permission token '{0}' has no action suffix")]
    MissingSuffix(String),

    #[error("unknown permission suffix '{0}'")]
    UnknownSuffix(String),
}

/// Namespace of a resource (a stream slug), optionally qualified by the addon
/// that owns it.
///
/// Accepted forms:
/// - `users`
/// - `anomaly.module.users::users`
///
/// Slugs never contain dots, so a token can always be split at its last `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceNamespace(Cow<'static, str>);

impl ResourceNamespace {
    /// The users stream of the users module.
    pub const USERS: Self = Self::trusted("users");
    pub const ROLES: Self = Self::trusted("roles");

    pub fn parse(raw: impl Into<Cow<'static, str>>) -> Result<Self, TokenError> {
        let raw = raw.into();
        validate_namespace(&raw)?;
        Ok(Self(raw))
    }

    /// Construct from a literal that is known to be valid.
    pub(crate) const fn trusted(raw: &'static str) -> Self {
        Self(Cow::Borrowed(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The addon qualifier (`anomaly.module.users`), if any.
    pub fn addon(&self) -> Option<&str> {
        self.0.split_once("::").map(|(addon, _)| addon)
    }

    /// The bare resource slug.
    pub fn slug(&self) -> &str {
        match self.0.split_once("::") {
            Some((_, slug)) => slug,
            None => &self.0,
        }
    }

    pub fn token(&self, ability: Ability) -> PermissionToken {
        PermissionToken::new(self.clone(), ability)
    }
}

fn validate_namespace(raw: &str) -> Result<(), TokenError> {
    if raw.is_empty() {
        return Err(TokenError::EmptyNamespace);
    }

    let segment_ok = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    };

    let (addon, slug) = match raw.split_once("::") {
        Some((addon, slug)) => (Some(addon), slug),
        None => (None, raw),
    };

    if !segment_ok(slug) {
        return Err(TokenError::InvalidNamespace(raw.to_string()));
    }
    if let Some(addon) = addon {
        if !addon.split('.').all(segment_ok) {
            return Err(TokenError::InvalidNamespace(raw.to_string()));
        }
    }
    Ok(())
}

impl TryFrom<String> for ResourceNamespace {
    type Error = TokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ResourceNamespace> for String {
    fn from(value: ResourceNamespace) -> Self {
        value.0.into_owned()
    }
}

impl core::str::FromStr for ResourceNamespace {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.to_string())
    }
}

impl core::fmt::Display for ResourceNamespace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed action-suffix vocabulary of permission tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    ViewAny,
    View,
    Create,
    Update,
    ForceUpdate,
    Delete,
    Restore,
}

impl Ability {
    pub const ALL: [Ability; 7] = [
        Ability::ViewAny,
        Ability::View,
        Ability::Create,
        Ability::Update,
        Ability::ForceUpdate,
        Ability::Delete,
        Ability::Restore,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            Ability::ViewAny => "view_any",
            Ability::View => "view",
            Ability::Create => "create",
            Ability::Update => "update",
            Ability::ForceUpdate => "force_update",
            Ability::Delete => "delete",
            Ability::Restore => "restore",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.suffix() == suffix)
    }
}

impl core::fmt::Display for Ability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Permission identifier, e.g. `users.view_any`.
///
/// Equality is exact: two tokens are equal iff they render to the same string.
/// There is no wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionToken {
    namespace: ResourceNamespace,
    ability: Ability,
}

impl PermissionToken {
    pub fn new(namespace: ResourceNamespace, ability: Ability) -> Self {
        Self { namespace, ability }
    }

    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let (namespace, suffix) = raw
            .rsplit_once('.')
            .ok_or_else(|| TokenError::MissingSuffix(raw.to_string()))?;
        let ability = Ability::from_suffix(suffix)
            .ok_or_else(|| TokenError::UnknownSuffix(suffix.to_string()))?;
        Ok(Self {
            namespace: ResourceNamespace::parse(namespace.to_string())?,
            ability,
        })
    }

    pub fn namespace(&self) -> &ResourceNamespace {
        &self.namespace
    }

    pub fn ability(&self) -> Ability {
        self.ability
    }
}

impl TryFrom<String> for PermissionToken {
    type Error = TokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PermissionToken> for String {
    fn from(value: PermissionToken) -> Self {
        value.to_string()
    }
}

impl core::str::FromStr for PermissionToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl core::fmt::Display for PermissionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.namespace, self.ability)
    }
}
