use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use portcullis_auth::{Denial, PolicyError, StoreError, TokenError};
use portcullis_core::DomainError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Render a denial as `{"error": <code>, "message": <reason>}` with its
/// status intent (401 or 403).
pub fn denial_response(denial: &Denial) -> axum::response::Response {
    let status =
        StatusCode::from_u16(denial.status_intent().as_u16()).unwrap_or(StatusCode::FORBIDDEN);
    json_error(status, denial.code(), denial.to_string())
}

pub fn domain_error_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
    }
}

pub fn store_error_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(id) => json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("role not found: {id}"),
        ),
        StoreError::Unavailable(reason) => denial_response(&Denial::Unavailable(reason)),
    }
}

pub fn policy_error_response(err: PolicyError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "unknown_action", err.to_string())
}

pub fn token_error_response(err: TokenError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_permission", err.to_string())
}

#[cfg(test)]
mod tests {
    use portcullis_auth::RoleId;

    use super::*;

    #[test]
    fn unauthenticated_renders_401() {
        let res = denial_response(&Denial::Unauthenticated);
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn every_other_denial_renders_403() {
        let denials = [
            Denial::SecurityCheckFailed("account is disabled".into()),
            Denial::RoleMismatch {
                required: vec![RoleId::new("admin")],
            },
            Denial::ControlPanelDenied,
            Denial::Unavailable("timeout".into()),
        ];
        for denial in denials {
            assert_eq!(denial_response(&denial).status(), StatusCode::FORBIDDEN);
        }
    }

    #[test]
    fn unavailable_store_is_a_denial() {
        let res = store_error_response(StoreError::Unavailable("not loaded".into()));
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
}
