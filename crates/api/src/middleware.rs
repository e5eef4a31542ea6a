use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use portcullis_auth::{AuthorizationDecision, GateContext};
use portcullis_core::RequestId;

use crate::app::errors;
use crate::app::services::Services;
use crate::context::{ActorContext, SessionToken};
use crate::directory::resolve_actor;

#[derive(Clone)]
pub struct GateState {
    pub services: Arc<Services>,
}

/// Run the gate chain for requests that hit a declared route.
///
/// Paths outside the route table pass through untouched. Allowed requests
/// carry an [`ActorContext`] extension; denied ones never reach a handler.
pub async fn authorize_request(
    State(state): State<GateState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let services = &state.services;
    let Some(matched) = services.routes.match_path(req.uri().path()) else {
        return next.run(req).await;
    };
    let route = matched.route;

    let request_id = RequestId::new();
    let session = extract_bearer(req.headers()).map(SessionToken::new);
    let resolution = resolve_actor(
        services.actor_provider.as_ref(),
        session.as_ref(),
        services.lookup_timeout,
    )
    .await;

    let decision = services
        .chain
        .evaluate(&GateContext::new(request_id, &resolution, route));
    if let AuthorizationDecision::Denied(denial) = decision {
        return errors::denial_response(&denial);
    }

    tracing::debug!(%request_id, route = %route.name, "request allowed");
    req.extensions_mut().insert(ActorContext::new(
        request_id,
        session,
        resolution.actor().cloned(),
    ));

    next.run(req).await
}

/// The bearer credential, if the request carries a well-formed one.
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let token = header.to_str().ok()?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn extracts_bearer_tokens() {
        assert_eq!(extract_bearer(&headers("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(&headers("Bearer  abc ")), Some("abc"));
    }

    #[test]
    fn ignores_missing_or_foreign_credentials() {
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
        assert_eq!(extract_bearer(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(extract_bearer(&headers("Bearer ")), None);
    }
}
