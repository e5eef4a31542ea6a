//! Addon modules and the resource namespaces they own.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ResourceNamespace;

/// Module (addon) identifier, e.g. `users`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleSlug(Cow<'static, str>);

impl ModuleSlug {
    pub fn new(slug: impl Into<Cow<'static, str>>) -> Self {
        Self(slug.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ModuleSlug {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("module '{0}' registered twice")]
    DuplicateModule(ModuleSlug),

    #[error("namespace '{namespace}' already belongs to module '{owner}'")]
    NamespaceClaimed {
        namespace: ResourceNamespace,
        owner: ModuleSlug,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub slug: ModuleSlug,
    pub name: String,
    pub namespaces: Vec<ResourceNamespace>,
    pub enabled: bool,
}

impl Module {
    pub fn new(slug: ModuleSlug, name: impl Into<String>) -> Self {
        Self {
            slug,
            name: name.into(),
            namespaces: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_namespace(mut self, namespace: ResourceNamespace) -> Self {
        if !self.namespaces.contains(&namespace) {
            self.namespaces.push(namespace);
        }
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn owns(&self, namespace: &ResourceNamespace) -> bool {
        self.namespaces.contains(namespace)
    }
}

/// Installed modules. Built once at startup, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<ModuleSlug, Module>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The users module with its `users` and `roles` streams.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.modules.insert(
            ModuleSlug::new("users"),
            Module::new(ModuleSlug::new("users"), "Users")
                .with_namespace(ResourceNamespace::USERS)
                .with_namespace(ResourceNamespace::ROLES),
        );
        registry
    }

    pub fn register(&mut self, module: Module) -> Result<(), RegistryError> {
        if self.modules.contains_key(&module.slug) {
            return Err(RegistryError::DuplicateModule(module.slug));
        }
        for namespace in &module.namespaces {
            if let Some(owner) = self.owner_of(namespace) {
                return Err(RegistryError::NamespaceClaimed {
                    namespace: namespace.clone(),
                    owner: owner.slug.clone(),
                });
            }
        }
        self.modules.insert(module.slug.clone(), module);
        Ok(())
    }

    pub fn with_module(mut self, module: Module) -> Result<Self, RegistryError> {
        self.register(module)?;
        Ok(self)
    }

    pub fn get(&self, slug: &ModuleSlug) -> Option<&Module> {
        self.modules.get(slug)
    }

    pub fn owner_of(&self, namespace: &ResourceNamespace) -> Option<&Module> {
        self.modules.values().find(|m| m.owns(namespace))
    }

    pub fn knows_namespace(&self, namespace: &ResourceNamespace) -> bool {
        self.owner_of(namespace).is_some()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Module> {
        self.modules.values().filter(|m| m.enabled)
    }
}
