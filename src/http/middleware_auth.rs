//! Bearer token authentication middleware for protected API routes.

use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::context::AppContext;

/// Verify the `Authorization: Bearer` header and stash the token claims as
/// a request extension. Rejects with 401 and a pointer at the protected
/// resource metadata so discovery-capable clients can bootstrap themselves.
pub async fn require_bearer(
    State(state): State<AppContext>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let claims = token.and_then(|token| state.auth_server.verify_access_token(token));

    match claims {
        Some(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        None => {
            let www_authenticate = format!(
                "Bearer resource_metadata=\"{}/.well-known/oauth-protected-resource\"",
                state.config.external_base
            );
            (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, www_authenticate)],
                Json(json!({
                    "error": "invalid_token",
                    "error_description": "Missing or invalid access token"
                })),
            )
                .into_response()
        }
    }
}
