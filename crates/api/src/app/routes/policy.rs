//! Authorization audit endpoints: "would this actor be allowed, and why?"

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use portcullis_auth::{Actor, PermissionToken, ResourceNamespace};
use portcullis_core::{ActorId, DomainError};

use crate::app::{errors, services::Services};
use crate::context::ActorContext;

// ─────────────────────────────────────────────────────────────────────────────
// Query Parameters
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub permission: String,
    /// Explain for another actor instead of the caller.
    pub actor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    /// Owner of the record the action targets.
    pub subject: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/admin/policy/explain", get(explain))
        .route("/admin/policy/:namespace/:action", get(check))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/policy/explain?permission=users.view_any[&actor_id=...]
///
/// Guarded by `users.view_any` in the route table.
pub async fn explain(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Query(query): Query<ExplainQuery>,
) -> axum::response::Response {
    let token: PermissionToken = match query.permission.parse() {
        Ok(token) => token,
        Err(e) => return errors::token_error_response(e),
    };

    let target: Option<Actor> = match query.actor_id.as_deref() {
        None => ctx.actor().cloned(),
        Some(raw) => match parse_actor_id(raw) {
            Ok(id) => match services.directory.get(&id) {
                Some(actor) => Some(actor),
                None => return errors::domain_error_response(DomainError::not_found()),
            },
            Err(res) => return res,
        },
    };

    let explanation = services.authorizer.explain(target.as_ref(), &token);
    (StatusCode::OK, Json(explanation)).into_response()
}

/// GET /admin/policy/:namespace/:action[?subject=<actor id>]
///
/// Evaluates a policy action for the caller, e.g. `users/forceDelete`.
pub async fn check(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path((namespace, action)): Path<(String, String)>,
    Query(query): Query<CheckQuery>,
) -> axum::response::Response {
    let namespace = match ResourceNamespace::parse(namespace) {
        Ok(ns) => ns,
        Err(e) => return errors::token_error_response(e),
    };
    let subject = match query.subject.as_deref().map(parse_actor_id).transpose() {
        Ok(subject) => subject,
        Err(res) => return res,
    };

    let policy = &services.policy;
    let decision = match policy.resolve_named(&namespace, &action, ctx.actor(), subject) {
        Ok(decision) => decision,
        Err(e) => return errors::policy_error_response(e),
    };
    let token = policy
        .table()
        .action_named(&action)
        .map(|a| policy.table().token(a, &namespace).to_string())
        .ok();

    Json(json!({
        "allowed": decision.is_allowed(),
        "token": token,
        "denial": decision.denial().map(|d| d.code()),
    }))
    .into_response()
}

fn parse_actor_id(raw: &str) -> Result<ActorId, axum::response::Response> {
    raw.parse::<ActorId>().map_err(errors::domain_error_response)
}
