use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::responses::JsonResponse;
use crate::tenancy::{ActionKind, TenancyError};

pub fn tenancy_error_response(err: &TenancyError) -> Response {
    match err {
        TenancyError::Unauthenticated => {
            JsonResponse::error_with_code(StatusCode::UNAUTHORIZED, "Not signed in", "unauthenticated")
                .into_response()
        }
        TenancyError::NoTenantContext { user_id } => {
            error!(%user_id, "request reached a handler without a tenant");
            JsonResponse::error_with_code(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not load your workspace",
                "no_tenant_context",
            )
            .into_response()
        }
        TenancyError::QuotaExceeded { action, limit, .. } => match action {
            ActionKind::Generation => JsonResponse::payment_required_with_code(
                &format!(
                    "Free plan includes {limit} generations per month. Upgrade to PRO to keep going."
                ),
                "quota_exceeded",
            )
            .into_response(),
            ActionKind::ProjectCount => JsonResponse::payment_required_with_code(
                &format!("Free plan includes {limit} projects. Upgrade to PRO for unlimited projects."),
                "project_limit_reached",
            )
            .into_response(),
        },
        TenancyError::Forbidden { action, .. } => {
            JsonResponse::forbidden_with_code(&format!("Only owners and admins can {action}"), "forbidden")
                .into_response()
        }
        TenancyError::RateLimited { retry_after_secs } => {
            let mut response = JsonResponse::error_with_code(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please wait a moment and try again.",
                "rate_limited",
            )
            .into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
            response
        }
        TenancyError::NotFound(what) => JsonResponse::error_with_code(
            StatusCode::NOT_FOUND,
            &format!("{what} not found"),
            "not_found",
        )
        .into_response(),
        TenancyError::InvalidInput(msg) => {
            JsonResponse::error_with_code(StatusCode::BAD_REQUEST, msg, "invalid_input").into_response()
        }
        TenancyError::SignatureInvalid => JsonResponse::error_with_code(
            StatusCode::BAD_REQUEST,
            "Invalid webhook signature",
            "invalid_signature",
        )
        .into_response(),
        TenancyError::UpstreamProvider(msg) => {
            error!(%msg, "upstream provider call failed");
            JsonResponse::error_with_code(
                StatusCode::BAD_GATEWAY,
                "Payment provider is unavailable. Please try again.",
                "upstream_error",
            )
            .into_response()
        }
        TenancyError::Persistence(err) => {
            error!(?err, "database error");
            JsonResponse::error_with_code(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong",
                "persistence_error",
            )
            .into_response()
        }
    }
}

impl IntoResponse for TenancyError {
    fn into_response(self) -> Response {
        tenancy_error_response(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::organization::MembershipRole;
    use crate::responses::JsonResponse;
    use crate::tenancy::Permission;

    async fn code_of(resp: Response) -> Option<String> {
        let body = axum::body::to_bytes(resp.into_body(), 4096).await.unwrap();
        serde_json::from_slice::<JsonResponse>(&body).unwrap().code
    }

    #[tokio::test]
    async fn quota_codes_depend_on_action() {
        let generation = tenancy_error_response(&TenancyError::QuotaExceeded {
            action: ActionKind::Generation,
            limit: 10,
            remaining: 0,
        });
        assert_eq!(generation.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(code_of(generation).await.as_deref(), Some("quota_exceeded"));

        let projects = tenancy_error_response(&TenancyError::QuotaExceeded {
            action: ActionKind::ProjectCount,
            limit: 3,
            remaining: 0,
        });
        assert_eq!(projects.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(code_of(projects).await.as_deref(), Some("project_limit_reached"));
    }

    #[tokio::test]
    async fn rate_limit_sets_retry_after() {
        let resp = tenancy_error_response(&TenancyError::RateLimited { retry_after_secs: 2 });
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get(RETRY_AFTER).unwrap(), "2");
    }

    #[tokio::test]
    async fn statuses_follow_variant() {
        let cases = [
            (TenancyError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (
                TenancyError::Forbidden {
                    action: Permission::ManageBilling,
                    role: MembershipRole::Member,
                },
                StatusCode::FORBIDDEN,
            ),
            (TenancyError::NotFound("project"), StatusCode::NOT_FOUND),
            (TenancyError::SignatureInvalid, StatusCode::BAD_REQUEST),
            (
                TenancyError::UpstreamProvider("down".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                TenancyError::Persistence(sqlx::Error::PoolTimedOut),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(tenancy_error_response(&err).status(), status, "{err}");
        }
    }
}
