//! Front-end users routes: own account, public profiles, registration,
//! activation and logout.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use portcullis_auth::{Actor, AuthEvent};
use portcullis_core::{ActorId, DomainError};

use crate::app::{errors, services::Services};
use crate::context::{ActivationCode, ActorContext};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct Registration {
    pub actor: Actor,
    pub activation_code: ActivationCode,
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub code: ActivationCode,
}

#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: ActorId,
    pub username: String,
    pub display_name: String,
}

pub fn router() -> Router {
    Router::new()
        .route("/users/self", get(current_actor))
        .route("/:handle", get(public_profile))
        .route("/register", post(register))
        .route("/users/activate", post(activate))
        .route("/logout", post(logout))
        .route("/auth/logout", post(logout))
}

/// GET /users/self
pub async fn current_actor(Extension(ctx): Extension<ActorContext>) -> axum::response::Response {
    match ctx.actor() {
        Some(actor) => (StatusCode::OK, Json(actor.clone())).into_response(),
        None => errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "authentication required"),
    }
}

/// GET /@{username}
pub async fn public_profile(
    Extension(services): Extension<Arc<Services>>,
    Path(handle): Path<String>,
) -> axum::response::Response {
    let Some(username) = handle.strip_prefix('@') else {
        return errors::domain_error_response(DomainError::not_found());
    };

    match services.directory.find_by_username(username) {
        Some(actor) if actor.is_active() => Json(PublicProfile {
            id: actor.id,
            username: actor.username,
            display_name: actor.display_name,
        })
        .into_response(),
        _ => errors::domain_error_response(DomainError::not_found()),
    }
}

/// POST /register
///
/// The new account starts inactive. The response carries the activation code
/// for the host to deliver.
pub async fn register(
    Extension(services): Extension<Arc<Services>>,
    Json(body): Json<RegisterRequest>,
) -> axum::response::Response {
    let username = body.username.trim();
    if username.is_empty() {
        return errors::domain_error_response(DomainError::validation("username is required"));
    }
    if services.directory.find_by_username(username).is_some() {
        return errors::json_error(StatusCode::CONFLICT, "conflict", "username is taken");
    }

    let mut actor = Actor::new(ActorId::new(), username);
    actor.email = body.email;
    actor.display_name = body.display_name;
    let id = actor.id;
    services.directory.apply(&AuthEvent::Registered {
        actor,
        occurred_at: Utc::now(),
    });

    let Some(actor) = services.directory.get(&id) else {
        return errors::domain_error_response(DomainError::not_found());
    };
    let activation_code = services.directory.issue_activation(id);
    (StatusCode::CREATED, Json(Registration { actor, activation_code })).into_response()
}

/// POST /users/activate
pub async fn activate(
    Extension(services): Extension<Arc<Services>>,
    Json(body): Json<ActivateRequest>,
) -> axum::response::Response {
    let Some(actor_id) = services.directory.redeem_activation(&body.code) else {
        return errors::domain_error_response(DomainError::not_found());
    };

    services.directory.apply(&AuthEvent::Activated {
        actor_id,
        occurred_at: Utc::now(),
    });

    match services.directory.get(&actor_id) {
        Some(actor) if actor.is_active() => Json(actor).into_response(),
        Some(actor) => errors::json_error(
            StatusCode::CONFLICT,
            "conflict",
            format!("account is {}", actor.status),
        ),
        None => errors::domain_error_response(DomainError::not_found()),
    }
}

/// POST /logout, /auth/logout, /admin/logout
pub async fn logout(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
) -> StatusCode {
    if let Some(session) = ctx.session() {
        if services.directory.end_session(session) {
            tracing::info!(request_id = %ctx.request_id(), "session ended");
        }
    }
    StatusCode::NO_CONTENT
}
