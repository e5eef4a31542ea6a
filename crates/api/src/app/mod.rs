//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: the authorization core and its in-memory data sources
//! - `routes/`: HTTP handlers, one file per area
//! - `errors.rs`: consistent JSON error and denial responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<Services>) -> Router {
    let gate_state = middleware::GateState {
        services: services.clone(),
    };

    // Every declared route runs the gate chain before its handler.
    let gated = routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                gate_state,
                middleware::authorize_request,
            ))
            .layer(Extension(services)),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(gated)
}

pub use services::Services;
