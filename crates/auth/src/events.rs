//! Events emitted by the external authentication flows.
//!
//! Login, registration and password flows live outside this crate. They
//! report what happened through [`AuthEvent`], and whoever owns actor records
//! applies the event with [`AuthEvent::apply_to`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use portcullis_core::ActorId;

use crate::{Actor, ActorStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    LoggedIn {
        actor_id: ActorId,
        occurred_at: DateTime<Utc>,
    },
    LoginFailed {
        username: String,
        occurred_at: DateTime<Utc>,
    },
    Registered {
        actor: Actor,
        occurred_at: DateTime<Utc>,
    },
    Activated {
        actor_id: ActorId,
        occurred_at: DateTime<Utc>,
    },
}

impl AuthEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            AuthEvent::LoggedIn { .. } => "auth.logged_in",
            AuthEvent::LoginFailed { .. } => "auth.login_failed",
            AuthEvent::Registered { .. } => "auth.registered",
            AuthEvent::Activated { .. } => "auth.activated",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AuthEvent::LoggedIn { occurred_at, .. }
            | AuthEvent::LoginFailed { occurred_at, .. }
            | AuthEvent::Registered { occurred_at, .. }
            | AuthEvent::Activated { occurred_at, .. } => *occurred_at,
        }
    }

    /// The actor this event is about, when it names one.
    pub fn actor_id(&self) -> Option<ActorId> {
        match self {
            AuthEvent::LoggedIn { actor_id, .. } | AuthEvent::Activated { actor_id, .. } => {
                Some(*actor_id)
            }
            AuthEvent::Registered { actor, .. } => Some(actor.id),
            AuthEvent::LoginFailed { .. } => None,
        }
    }

    /// Apply the event to an existing actor record.
    ///
    /// A login touches the last-active timestamp and an activation lifts a
    /// pending registration. Registration is handled by
    /// [`AuthEvent::registered_actor`] instead.
    pub fn apply_to(&self, actor: &mut Actor) {
        match self {
            AuthEvent::LoggedIn { occurred_at, .. } => actor.touch(*occurred_at),
            AuthEvent::Activated { .. } => {
                actor.activate();
            }
            AuthEvent::LoginFailed { .. } | AuthEvent::Registered { .. } => {}
        }
    }

    /// The new actor record for a registration: inactive until activated.
    pub fn registered_actor(&self) -> Option<Actor> {
        match self {
            AuthEvent::Registered { actor, .. } => {
                let mut actor = actor.clone();
                actor.status = ActorStatus::Inactive;
                Some(actor)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_touches_last_active() {
        let mut actor = Actor::new(ActorId::new(), "alice");
        let at = Utc::now();
        let event = AuthEvent::LoggedIn {
            actor_id: actor.id,
            occurred_at: at,
        };

        event.apply_to(&mut actor);
        assert_eq!(actor.last_active_at, Some(at));
        assert_eq!(event.event_type(), "auth.logged_in");
    }

    #[test]
    fn registration_yields_an_inactive_actor() {
        let actor = Actor::new(ActorId::new(), "bob");
        let event = AuthEvent::Registered {
            actor: actor.clone(),
            occurred_at: Utc::now(),
        };

        let registered = event.registered_actor().unwrap();
        assert_eq!(registered.id, actor.id);
        assert_eq!(registered.status, ActorStatus::Inactive);
        assert_eq!(event.actor_id(), Some(actor.id));
    }

    #[test]
    fn activation_lifts_a_pending_registration() {
        let actor = Actor::new(ActorId::new(), "bob");
        let mut pending = AuthEvent::Registered {
            actor: actor.clone(),
            occurred_at: Utc::now(),
        }
        .registered_actor()
        .unwrap();

        let event = AuthEvent::Activated {
            actor_id: actor.id,
            occurred_at: Utc::now(),
        };
        event.apply_to(&mut pending);
        assert!(pending.is_active());
        assert_eq!(event.event_type(), "auth.activated");
        assert_eq!(event.actor_id(), Some(actor.id));

        let mut disabled = actor.with_status(ActorStatus::Disabled);
        event.apply_to(&mut disabled);
        assert_eq!(disabled.status, ActorStatus::Disabled);
    }

    #[test]
    fn failed_logins_name_no_actor() {
        let event = AuthEvent::LoginFailed {
            username: "mallory".into(),
            occurred_at: Utc::now(),
        };
        assert!(event.actor_id().is_none());
        assert!(event.registered_actor().is_none());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "login_failed");
    }
}
