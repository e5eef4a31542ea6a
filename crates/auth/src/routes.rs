//! Route declarations consumed by the middleware chain.
//!
//! Each route may require a role set, a permission token, or neither, and is
//! scoped to a module and (optionally) to the control panel. Tables are
//! validated when built; a bad declaration never reaches request time.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use crate::{Ability, ModuleRegistry, ModuleSlug, PermissionToken, ResourceNamespace, RoleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("invalid route pattern '{0}'")]
    InvalidPattern(String),

    #[error("route '{0}' declared twice")]
    DuplicateName(String),

    #[error("route '{route}' requires '{token}' but no module owns namespace '{namespace}'")]
    UnknownNamespace {
        route: String,
        token: PermissionToken,
        namespace: ResourceNamespace,
    },

    #[error("route '{route}' belongs to unknown module '{module}'")]
    UnknownModule { route: String, module: ModuleSlug },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `{name}` or a literal prefix followed by `{name}` (`@{username}`).
    Param { prefix: String, name: String },
}

/// A `/`-separated path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let invalid = || RouteError::InvalidPattern(raw.to_string());
        let mut segments = Vec::new();

        for part in raw.trim_matches('/').split('/').filter(|s| !s.is_empty()) {
            match part.find('{') {
                None => {
                    if part.contains('}') {
                        return Err(invalid());
                    }
                    segments.push(Segment::Literal(part.to_string()));
                }
                Some(open) => {
                    let name = part[open + 1..].strip_suffix('}').ok_or_else(invalid)?;
                    if name.is_empty() || name.contains(['{', '}']) || part[..open].contains('}') {
                        return Err(invalid());
                    }
                    segments.push(Segment::Param {
                        prefix: part[..open].to_string(),
                        name: name.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            raw: raw.trim_matches('/').to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a request path, returning captured parameters.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param { prefix, name } => {
                    let value = part.strip_prefix(prefix.as_str())?;
                    if value.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), value.to_string());
                }
            }
        }
        Some(params)
    }
}

/// One declared route and its access requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDeclaration {
    pub name: String,
    pub pattern: RoutePattern,
    pub module: Option<ModuleSlug>,
    pub required_roles: BTreeSet<RoleId>,
    pub required_permission: Option<PermissionToken>,
    pub is_public: bool,
    /// Served inside the administrative control panel.
    pub control_panel: bool,
}

impl RouteDeclaration {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, RouteError> {
        Ok(Self {
            name: name.into(),
            pattern: RoutePattern::parse(pattern)?,
            module: None,
            required_roles: BTreeSet::new(),
            required_permission: None,
            is_public: false,
            control_panel: false,
        })
    }

    pub fn in_module(mut self, module: ModuleSlug) -> Self {
        self.module = Some(module);
        self
    }

    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    pub fn control_panel(mut self) -> Self {
        self.control_panel = true;
        self
    }

    pub fn requires_role(mut self, role: RoleId) -> Self {
        self.required_roles.insert(role);
        self
    }

    pub fn requires_permission(mut self, token: PermissionToken) -> Self {
        self.required_permission = Some(token);
        self
    }
}

/// A matched route plus the captured path parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub route: &'a RouteDeclaration,
    pub params: HashMap<String, String>,
}

/// Serializable summary of a route, for admin listings.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub name: String,
    pub pattern: String,
    pub module: Option<String>,
    pub required_roles: Vec<String>,
    pub required_permission: Option<String>,
    pub is_public: bool,
    pub control_panel: bool,
}

impl From<&RouteDeclaration> for RouteSummary {
    fn from(route: &RouteDeclaration) -> Self {
        Self {
            name: route.name.clone(),
            pattern: route.pattern.as_str().to_string(),
            module: route.module.as_ref().map(|m| m.to_string()),
            required_roles: route.required_roles.iter().map(|r| r.to_string()).collect(),
            required_permission: route.required_permission.as_ref().map(|t| t.to_string()),
            is_public: route.is_public,
            control_panel: route.control_panel,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteDeclaration>,
}

#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    routes: Vec<RouteDeclaration>,
}

impl RouteTableBuilder {
    pub fn route(mut self, route: RouteDeclaration) -> Self {
        self.routes.push(route);
        self
    }

    /// Validate every declaration against the installed modules.
    pub fn build(self, modules: &ModuleRegistry) -> Result<RouteTable, RouteError> {
        let mut names = HashSet::new();
        for route in &self.routes {
            if !names.insert(route.name.as_str()) {
                return Err(RouteError::DuplicateName(route.name.clone()));
            }
            if let Some(module) = &route.module {
                if modules.get(module).is_none() {
                    return Err(RouteError::UnknownModule {
                        route: route.name.clone(),
                        module: module.clone(),
                    });
                }
            }
            if let Some(token) = &route.required_permission {
                if !modules.knows_namespace(token.namespace()) {
                    return Err(RouteError::UnknownNamespace {
                        route: route.name.clone(),
                        token: token.clone(),
                        namespace: token.namespace().clone(),
                    });
                }
            }
        }
        Ok(RouteTable {
            routes: self.routes,
        })
    }
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// Routes served by the users module.
    pub fn users_module(modules: &ModuleRegistry) -> Result<Self, RouteError> {
        let users = ModuleSlug::new("users");
        let route = |name: &str, pattern: &str| -> Result<RouteDeclaration, RouteError> {
            Ok(RouteDeclaration::new(name, pattern)?.in_module(users.clone()))
        };

        Self::builder()
            .route(route("users.self", "users/self")?)
            .route(route("users.view", "@{username}")?.public())
            .route(route("users.login", "login")?.public())
            .route(route("users.logout", "logout")?.public())
            .route(route("users.register", "register")?.public())
            .route(route("users.activate", "users/activate")?.public())
            .route(route("users.reset", "users/password/reset")?.public())
            .route(route("users.forgot", "users/password/forgot")?.public())
            .route(route("auth.login", "auth/login")?.public())
            .route(route("auth.logout", "auth/logout")?.public())
            .route(route("admin.login", "admin/login")?.public().control_panel())
            .route(route("admin.logout", "admin/logout")?.public().control_panel())
            .route(route("admin.home", "admin")?.control_panel())
            .route(
                route("admin.users.index", "admin/users")?
                    .control_panel()
                    .requires_permission(ResourceNamespace::USERS.token(Ability::ViewAny)),
            )
            .route(route("admin.users.show", "admin/users/{id}")?.control_panel())
            .route(
                route("admin.roles.index", "admin/roles")?
                    .control_panel()
                    .requires_permission(ResourceNamespace::ROLES.token(Ability::ViewAny)),
            )
            .route(route("admin.routes.index", "admin/routes")?.control_panel())
            .route(
                route("admin.policy.explain", "admin/policy/explain")?
                    .control_panel()
                    .requires_permission(ResourceNamespace::USERS.token(Ability::ViewAny)),
            )
            .route(route("admin.policy.check", "admin/policy/{namespace}/{action}")?.control_panel())
            .build(modules)
    }

    /// First declared route matching `path`.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.iter().find_map(|route| {
            route
                .pattern
                .matches(path)
                .map(|params| RouteMatch { route, params })
        })
    }

    pub fn get(&self, name: &str) -> Option<&RouteDeclaration> {
        self.routes.iter().find(|r| r.name == name)
    }

    pub fn routes(&self) -> &[RouteDeclaration] {
        &self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_match_literals_and_params() {
        let pattern = RoutePattern::parse("admin/users/{id}").unwrap();
        let params = pattern.matches("/admin/users/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert!(pattern.matches("/admin/users").is_none());
        assert!(pattern.matches("/admin/roles/42").is_none());
    }

    #[test]
    fn prefixed_params_require_the_prefix() {
        let pattern = RoutePattern::parse("@{username}").unwrap();
        assert_eq!(
            pattern.matches("/@alice").unwrap().get("username").map(String::as_str),
            Some("alice")
        );
        assert!(pattern.matches("/alice").is_none());
        assert!(pattern.matches("/@").is_none());
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert!(RoutePattern::parse("users/{").is_err());
        assert!(RoutePattern::parse("users/{}").is_err());
        assert!(RoutePattern::parse("users/}x").is_err());
    }

    #[test]
    fn users_module_table_is_valid() {
        let table = RouteTable::users_module(&ModuleRegistry::standard()).unwrap();

        let matched = table.match_path("/users/self").unwrap();
        assert_eq!(matched.route.name, "users.self");
        assert!(!matched.route.is_public);

        let profile = table.match_path("/@alice").unwrap();
        assert_eq!(profile.route.name, "users.view");
        assert!(profile.route.is_public);

        // Literal routes declared first win over parameterised ones.
        assert_eq!(
            table.match_path("/admin/policy/explain").unwrap().route.name,
            "admin.policy.explain"
        );

        for name in ["admin.users.index", "admin.policy.explain"] {
            let declared = table.get(name).unwrap();
            assert_eq!(
                declared.required_permission.as_ref().map(|t| t.to_string()).as_deref(),
                Some("users.view_any"),
                "{name}"
            );
        }
        assert!(table.match_path("/nowhere").is_none());
    }

    #[test]
    fn summaries_render_declarations_as_strings() {
        let table = RouteTable::users_module(&ModuleRegistry::standard()).unwrap();
        let summary = RouteSummary::from(table.get("admin.roles.index").unwrap());
        assert_eq!(summary.pattern, "admin/roles");
        assert_eq!(summary.module.as_deref(), Some("users"));
        assert_eq!(summary.required_permission.as_deref(), Some("roles.view_any"));
        assert!(summary.control_panel);
        assert!(!summary.is_public);
    }

    #[test]
    fn unknown_permission_namespace_fails_at_build_time() {
        let route = RouteDeclaration::new("articles.index", "articles")
            .unwrap()
            .requires_permission(PermissionToken::parse("articles.view_any").unwrap());
        let err = RouteTable::builder()
            .route(route)
            .build(&ModuleRegistry::standard())
            .unwrap_err();
        assert!(matches!(err, RouteError::UnknownNamespace { .. }));
    }

    #[test]
    fn unknown_module_and_duplicate_names_fail() {
        let modules = ModuleRegistry::standard();
        let err = RouteTable::builder()
            .route(RouteDeclaration::new("x", "x").unwrap().in_module(ModuleSlug::new("blog")))
            .build(&modules)
            .unwrap_err();
        assert!(matches!(err, RouteError::UnknownModule { .. }));

        let err = RouteTable::builder()
            .route(RouteDeclaration::new("x", "x").unwrap())
            .route(RouteDeclaration::new("x", "y").unwrap())
            .build(&modules)
            .unwrap_err();
        assert_eq!(err, RouteError::DuplicateName("x".to_string()));
    }
}
