//! Handles GET /api/session - introspection of the presented access token.

use axum::{Extension, Json};
use serde_json::{Value, json};

use crate::oauth::jwt::Claims;

/// Return the authenticated session derived from the bearer token.
/// GET /api/session - Requires a valid access token.
pub async fn handle_session(Extension(claims): Extension<Claims>) -> Json<Value> {
    Json(json!({
        "sub": claims.sub,
        "iss": claims.iss,
        "scope": claims.scope,
        "expires_at": claims.exp,
    }))
}
