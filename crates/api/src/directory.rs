//! Data sources behind the authorization core: who is the current actor, and
//! which roles exist.
//!
//! Both are treated as possibly remote. Every lookup runs under a timeout and a
//! failure becomes an `Unavailable` outcome instead of hanging the request.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use portcullis_auth::{Actor, ActorResolution, AuthEvent, Role, RoleRegistry, RoleSnapshot};
use portcullis_core::ActorId;

use crate::context::{ActivationCode, SessionToken};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("data source failure: {0}")]
    Backend(String),

    #[error("invalid role data: {0}")]
    InvalidRoles(String),
}

/// Supplies the actor behind a session at request start.
#[async_trait]
pub trait ActorProvider: Send + Sync {
    async fn current_actor(&self, session: &SessionToken) -> Result<Option<Actor>, SourceError>;
}

/// Supplies role definitions.
#[async_trait]
pub trait RoleSource: Send + Sync {
    async fn load_roles(&self) -> Result<Vec<Role>, SourceError>;
}

/// Resolve the current actor under `timeout`.
///
/// No session means anonymous; provider errors and timeouts mean unavailable.
pub async fn resolve_actor(
    provider: &dyn ActorProvider,
    session: Option<&SessionToken>,
    timeout: Duration,
) -> ActorResolution {
    let Some(session) = session else {
        return ActorResolution::Anonymous;
    };

    match tokio::time::timeout(timeout, provider.current_actor(session)).await {
        Ok(Ok(Some(actor))) => ActorResolution::Resolved(actor),
        Ok(Ok(None)) => ActorResolution::Anonymous,
        Ok(Err(err)) => {
            tracing::error!(error = %err, "actor provider failed");
            ActorResolution::Unavailable(err.to_string())
        }
        Err(_) => {
            let err = SourceError::Timeout(timeout);
            tracing::error!(error = %err, "actor provider timed out");
            ActorResolution::Unavailable(err.to_string())
        }
    }
}

/// Load roles from `source` under `timeout` and publish them to `registry`.
///
/// On failure the registry keeps serving its previous snapshot.
pub async fn refresh_roles(
    registry: &RoleRegistry,
    source: &dyn RoleSource,
    timeout: Duration,
) -> Result<usize, SourceError> {
    let roles = tokio::time::timeout(timeout, source.load_roles())
        .await
        .map_err(|_| SourceError::Timeout(timeout))??;
    let snapshot = RoleSnapshot::new(roles).map_err(|e| SourceError::InvalidRoles(e.to_string()))?;
    let count = snapshot.len();
    registry.replace(snapshot);
    Ok(count)
}

/// Periodically reload roles until the returned handle is aborted.
pub fn spawn_role_refresher(
    registry: Arc<RoleRegistry>,
    source: Arc<dyn RoleSource>,
    interval: Duration,
    timeout: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match refresh_roles(&registry, source.as_ref(), timeout).await {
                Ok(count) => tracing::debug!(roles = count, "role snapshot refreshed"),
                Err(err) => tracing::error!(error = %err, "role refresh failed; keeping previous snapshot"),
            }
        }
    })
}

/// In-memory role source; role edits replace the whole set.
#[derive(Debug, Default)]
pub struct InMemoryRoleSource {
    roles: RwLock<Vec<Role>>,
}

impl InMemoryRoleSource {
    pub fn new(roles: Vec<Role>) -> Self {
        Self {
            roles: RwLock::new(roles),
        }
    }

    pub fn set_roles(&self, roles: Vec<Role>) {
        *self.roles.write().unwrap_or_else(PoisonError::into_inner) = roles;
    }
}

#[async_trait]
impl RoleSource for InMemoryRoleSource {
    async fn load_roles(&self) -> Result<Vec<Role>, SourceError> {
        Ok(self
            .roles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    actors: HashMap<ActorId, Actor>,
    sessions: HashMap<SessionToken, ActorId>,
    activations: HashMap<ActivationCode, ActorId>,
}

/// In-memory actor records and sessions.
#[derive(Debug, Default)]
pub struct InMemoryActorDirectory {
    inner: RwLock<DirectoryState>,
}

impl InMemoryActorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, actor: Actor) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.actors.insert(actor.id, actor);
    }

    pub fn open_session(&self, token: SessionToken, actor_id: ActorId) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.sessions.insert(token, actor_id);
    }

    pub fn end_session(&self, token: &SessionToken) -> bool {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.sessions.remove(token).is_some()
    }

    /// Issue an activation code for a pending registration.
    pub fn issue_activation(&self, actor_id: ActorId) -> ActivationCode {
        let code = ActivationCode::generate();
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.activations.insert(code.clone(), actor_id);
        code
    }

    /// Consume an activation code. Each code works once.
    pub fn redeem_activation(&self, code: &ActivationCode) -> Option<ActorId> {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.activations.remove(code)
    }

    pub fn get(&self, id: &ActorId) -> Option<Actor> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.actors.get(id).cloned()
    }

    pub fn find_by_username(&self, username: &str) -> Option<Actor> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.actors.values().find(|a| a.username == username).cloned()
    }

    /// All actors, ordered by username.
    pub fn all(&self) -> Vec<Actor> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut actors: Vec<Actor> = state.actors.values().cloned().collect();
        actors.sort_by(|a, b| a.username.cmp(&b.username));
        actors
    }

    /// Apply an event from the authentication flows.
    pub fn apply(&self, event: &AuthEvent) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match event {
            AuthEvent::LoggedIn { actor_id, .. } => match state.actors.get_mut(actor_id) {
                Some(actor) => event.apply_to(actor),
                None => tracing::warn!(%actor_id, "login event for unknown actor"),
            },
            AuthEvent::Registered { .. } => {
                if let Some(actor) = event.registered_actor() {
                    if state.actors.contains_key(&actor.id) {
                        tracing::warn!(actor_id = %actor.id, "registration for existing actor ignored");
                    } else {
                        state.actors.insert(actor.id, actor);
                    }
                }
            }
            AuthEvent::Activated { actor_id, .. } => match state.actors.get_mut(actor_id) {
                Some(actor) => {
                    if actor.activate() {
                        tracing::info!(%actor_id, "account activated");
                    } else {
                        tracing::warn!(%actor_id, status = %actor.status, "activation ignored");
                    }
                }
                None => tracing::warn!(%actor_id, "activation event for unknown actor"),
            },
            AuthEvent::LoginFailed { username, .. } => {
                tracing::info!(%username, "login failed");
            }
        }
    }
}

#[async_trait]
impl ActorProvider for InMemoryActorDirectory {
    async fn current_actor(&self, session: &SessionToken) -> Result<Option<Actor>, SourceError> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .sessions
            .get(session)
            .and_then(|id| state.actors.get(id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use portcullis_auth::{ActorStatus, RoleId, RoleStore};

    use super::*;

    struct Stalled;

    #[async_trait]
    impl ActorProvider for Stalled {
        async fn current_actor(&self, _session: &SessionToken) -> Result<Option<Actor>, SourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
    }

    #[async_trait]
    impl RoleSource for Stalled {
        async fn load_roles(&self) -> Result<Vec<Role>, SourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    struct Broken;

    #[async_trait]
    impl ActorProvider for Broken {
        async fn current_actor(&self, _session: &SessionToken) -> Result<Option<Actor>, SourceError> {
            Err(SourceError::Backend("connection refused".into()))
        }
    }

    fn role(id: &'static str) -> Role {
        Role::new(RoleId::new(id), id, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn missing_session_is_anonymous() {
        let directory = InMemoryActorDirectory::new();
        let resolution = resolve_actor(&directory, None, Duration::from_millis(50)).await;
        assert_eq!(resolution, ActorResolution::Anonymous);

        let unknown = SessionToken::new("nope");
        let resolution = resolve_actor(&directory, Some(&unknown), Duration::from_millis(50)).await;
        assert_eq!(resolution, ActorResolution::Anonymous);
    }

    #[tokio::test]
    async fn sessions_resolve_to_actors() {
        let directory = InMemoryActorDirectory::new();
        let actor = Actor::new(ActorId::new(), "alice");
        directory.upsert(actor.clone());
        directory.open_session(SessionToken::new("s1"), actor.id);

        let resolution =
            resolve_actor(&directory, Some(&SessionToken::new("s1")), Duration::from_millis(50)).await;
        assert_eq!(resolution, ActorResolution::Resolved(actor));

        assert!(directory.end_session(&SessionToken::new("s1")));
        let resolution =
            resolve_actor(&directory, Some(&SessionToken::new("s1")), Duration::from_millis(50)).await;
        assert_eq!(resolution, ActorResolution::Anonymous);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_as_unavailable() {
        let resolution =
            resolve_actor(&Stalled, Some(&SessionToken::new("s")), Duration::from_millis(50)).await;
        assert!(matches!(resolution, ActorResolution::Unavailable(_)));
    }

    #[tokio::test]
    async fn provider_errors_are_unavailable() {
        let resolution =
            resolve_actor(&Broken, Some(&SessionToken::new("s")), Duration::from_millis(50)).await;
        assert_eq!(
            resolution,
            ActorResolution::Unavailable("data source failure: connection refused".to_string())
        );
    }

    #[tokio::test]
    async fn refresh_publishes_a_new_snapshot() {
        let registry = RoleRegistry::new();
        let source = InMemoryRoleSource::new(vec![role("editor")]);

        assert_eq!(refresh_roles(&registry, &source, Duration::from_millis(50)).await, Ok(1));
        assert!(registry.find_role(&RoleId::new("editor")).is_ok());

        source.set_roles(vec![role("editor"), role("admin")]);
        assert_eq!(refresh_roles(&registry, &source, Duration::from_millis(50)).await, Ok(2));
        assert!(registry.find_role(&RoleId::new("admin")).is_ok());
    }

    #[tokio::test]
    async fn invalid_role_data_keeps_the_previous_snapshot() {
        let registry = RoleRegistry::new();
        let source = InMemoryRoleSource::new(vec![role("editor")]);
        refresh_roles(&registry, &source, Duration::from_millis(50)).await.unwrap();

        source.set_roles(vec![role("dup"), role("dup")]);
        let err = refresh_roles(&registry, &source, Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidRoles(_)));
        assert!(registry.find_role(&RoleId::new("editor")).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_role_source_times_out() {
        let registry = RoleRegistry::new();
        let err = refresh_roles(&registry, &Stalled, Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err, SourceError::Timeout(Duration::from_millis(50)));
        assert!(!registry.is_loaded());
    }

    #[test]
    fn login_event_touches_last_active_and_registration_inserts_inactive() {
        let directory = InMemoryActorDirectory::new();
        let newcomer = Actor::new(ActorId::new(), "bob");
        directory.apply(&AuthEvent::Registered {
            actor: newcomer.clone(),
            occurred_at: Utc::now(),
        });
        assert_eq!(directory.get(&newcomer.id).unwrap().status, ActorStatus::Inactive);

        let at = Utc::now();
        directory.apply(&AuthEvent::LoggedIn {
            actor_id: newcomer.id,
            occurred_at: at,
        });
        assert_eq!(directory.get(&newcomer.id).unwrap().last_active_at, Some(at));
        assert_eq!(directory.find_by_username("bob").map(|a| a.id), Some(newcomer.id));
    }

    #[test]
    fn activation_codes_activate_once() {
        let directory = InMemoryActorDirectory::new();
        let newcomer = Actor::new(ActorId::new(), "bob");
        directory.apply(&AuthEvent::Registered {
            actor: newcomer.clone(),
            occurred_at: Utc::now(),
        });
        let code = directory.issue_activation(newcomer.id);

        assert_eq!(directory.redeem_activation(&code), Some(newcomer.id));
        assert_eq!(directory.redeem_activation(&code), None);
        assert_eq!(directory.redeem_activation(&ActivationCode::new("guess")), None);

        directory.apply(&AuthEvent::Activated {
            actor_id: newcomer.id,
            occurred_at: Utc::now(),
        });
        assert!(directory.get(&newcomer.id).unwrap().is_active());
    }

    #[test]
    fn activation_does_not_reenable_disabled_accounts() {
        let directory = InMemoryActorDirectory::new();
        let banned = Actor::new(ActorId::new(), "mallory").with_status(ActorStatus::Disabled);
        directory.upsert(banned.clone());

        directory.apply(&AuthEvent::Activated {
            actor_id: banned.id,
            occurred_at: Utc::now(),
        });
        assert_eq!(directory.get(&banned.id).unwrap().status, ActorStatus::Disabled);
    }
}
