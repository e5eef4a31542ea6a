//! Control-panel routes of the users module.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use portcullis_auth::{
    Action, AuthorizationDecision, ResourceDescriptor, ResourceNamespace, Role, RouteSummary,
};
use portcullis_core::{ActorId, DomainError};

use crate::app::routes::users;
use crate::app::{errors, services::Services};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/admin", get(home))
        .route("/admin/logout", post(users::logout))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id", get(show_user))
        .route("/admin/roles", get(list_roles))
        .route("/admin/routes", get(list_routes))
}

/// GET /admin
pub async fn home(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
) -> axum::response::Response {
    let modules: Vec<_> = services
        .modules
        .enabled()
        .map(|m| json!({ "slug": m.slug, "name": m.name }))
        .collect();

    Json(json!({
        "actor": ctx.actor().map(|a| a.username.clone()),
        "modules": modules,
    }))
    .into_response()
}

/// GET /admin/users
pub async fn list_users(Extension(services): Extension<Arc<Services>>) -> axum::response::Response {
    Json(json!({ "users": services.directory.all() })).into_response()
}

/// GET /admin/users/:id
///
/// Actors may always view their own record; anyone else needs `users.view`.
pub async fn show_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ActorId = match id.parse() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_response(e),
    };

    let descriptor = ResourceDescriptor::new(ResourceNamespace::USERS, Action::View).for_record_of(id);
    if let AuthorizationDecision::Denied(denial) = services.policy.resolve(&descriptor, ctx.actor()) {
        return errors::denial_response(&denial);
    }

    match services.directory.get(&id) {
        Some(actor) => Json(actor).into_response(),
        None => errors::domain_error_response(DomainError::not_found()),
    }
}

/// GET /admin/roles
pub async fn list_roles(Extension(services): Extension<Arc<Services>>) -> axum::response::Response {
    let snapshot = match services.role_registry.snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => return errors::store_error_response(e),
    };
    let roles: Vec<&Role> = snapshot.roles().iter().map(|r| &**r).collect();

    Json(json!({
        "roles": roles,
        "super_admin_role": snapshot.super_admin_role(),
    }))
    .into_response()
}

/// GET /admin/routes
pub async fn list_routes(Extension(services): Extension<Arc<Services>>) -> axum::response::Response {
    let routes: Vec<RouteSummary> = services.routes.routes().iter().map(RouteSummary::from).collect();
    Json(json!({ "routes": routes })).into_response()
}
