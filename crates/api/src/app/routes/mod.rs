use axum::Router;

pub mod admin;
pub mod policy;
pub mod system;
pub mod users;

/// Router for every path declared in the users-module route table.
///
/// `login` style routes are declared for gating only; credential checks belong
/// to the host's authentication service, which mounts its own handlers.
pub fn router() -> Router {
    Router::new()
        .merge(users::router())
        .merge(admin::router())
        .merge(policy::router())
}
