use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use portcullis_auth::{
    Authorizer, MiddlewareChain, ModuleRegistry, PolicyResolver, RoleRegistry, RoleStore,
    RouteError, RouteTable,
};
use portcullis_core::{index_by_id, ActorId};

use crate::config::ApiConfig;
use crate::directory::{
    refresh_roles, spawn_role_refresher, ActorProvider, InMemoryActorDirectory, InMemoryRoleSource,
    RoleSource, SourceError,
};
use crate::seed::Seed;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("route table: {0}")]
    Routes(#[from] RouteError),

    #[error("initial role load: {0}")]
    Roles(#[from] SourceError),

    #[error("seed lists actor {0} twice")]
    DuplicateActor(ActorId),
}

/// Everything the router and the gate middleware share.
pub struct Services {
    pub directory: Arc<InMemoryActorDirectory>,
    pub actor_provider: Arc<dyn ActorProvider>,
    pub role_registry: Arc<RoleRegistry>,
    pub role_source: Arc<dyn RoleSource>,
    pub modules: Arc<ModuleRegistry>,
    pub authorizer: Arc<Authorizer>,
    pub policy: Arc<PolicyResolver>,
    pub routes: Arc<RouteTable>,
    pub chain: Arc<MiddlewareChain>,
    pub lookup_timeout: Duration,
    pub role_refresh: Duration,
}

impl Services {
    /// Wire the in-memory directory and role source from `seed` and perform
    /// the first role load.
    pub async fn bootstrap(config: &ApiConfig, seed: Seed) -> Result<Self, BootstrapError> {
        index_by_id(&seed.actors).map_err(BootstrapError::DuplicateActor)?;
        let directory = Arc::new(InMemoryActorDirectory::new());
        for actor in seed.actors {
            directory.upsert(actor);
        }
        for session in seed.sessions {
            directory.open_session(session.token, session.actor_id);
        }

        let role_source = Arc::new(InMemoryRoleSource::new(seed.roles));
        let role_registry = Arc::new(RoleRegistry::new());
        let loaded = refresh_roles(&role_registry, role_source.as_ref(), config.lookup_timeout).await?;
        tracing::info!(roles = loaded, "role snapshot loaded");

        let modules = Arc::new(ModuleRegistry::standard());
        let routes = RouteTable::users_module(&modules).inspect_err(|err| {
            tracing::error!(error = %err, "route table rejected");
        })?;

        let store: Arc<dyn RoleStore> = role_registry.clone();
        let authorizer =
            Arc::new(Authorizer::new(store).with_public_tokens(seed.public_permissions));
        let policy = Arc::new(PolicyResolver::new(authorizer.clone()));
        let chain = Arc::new(MiddlewareChain::standard(authorizer.clone(), modules.clone()));

        Ok(Self {
            actor_provider: directory.clone(),
            directory,
            role_registry,
            role_source,
            modules,
            authorizer,
            policy,
            routes: Arc::new(routes),
            chain,
            lookup_timeout: config.lookup_timeout,
            role_refresh: config.role_refresh,
        })
    }

    /// Start reloading roles from the role source in the background.
    pub fn spawn_role_refresher(&self) -> tokio::task::JoinHandle<()> {
        spawn_role_refresher(
            self.role_registry.clone(),
            self.role_source.clone(),
            self.role_refresh,
            self.lookup_timeout,
        )
    }
}

impl core::fmt::Debug for Services {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Services")
            .field("routes", &self.routes.routes().len())
            .field("chain", &self.chain)
            .field("lookup_timeout", &self.lookup_timeout)
            .field("role_refresh", &self.role_refresh)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use portcullis_auth::Actor;

    use super::*;

    #[tokio::test]
    async fn duplicate_seed_actors_abort_bootstrap() {
        let alice = Actor::new(ActorId::new(), "alice");
        let seed = Seed {
            actors: vec![alice.clone(), alice.clone()],
            ..Seed::default()
        };

        let err = Services::bootstrap(&ApiConfig::default(), seed).await.unwrap_err();
        assert!(matches!(err, BootstrapError::DuplicateActor(id) if id == alice.id));
    }
}
