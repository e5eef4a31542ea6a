use serde::{Deserialize, Serialize};

use uuid::Uuid;

use portcullis_auth::Actor;
use portcullis_core::RequestId;

/// Opaque session credential presented as a bearer token.
///
/// Issuing and expiring sessions belongs to the host's authentication layer;
/// this is only the lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Single-use code that activates a pending registration.
///
/// The host delivers it to the registrant out of band.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationCode(String);

impl ActivationCode {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Request-scoped actor context, inserted by the gate middleware once the
/// chain allowed the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    request_id: RequestId,
    session: Option<SessionToken>,
    actor: Option<Actor>,
}

impl ActorContext {
    pub fn new(request_id: RequestId, session: Option<SessionToken>, actor: Option<Actor>) -> Self {
        Self {
            request_id,
            session,
            actor,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn session(&self) -> Option<&SessionToken> {
        self.session.as_ref()
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }
}
