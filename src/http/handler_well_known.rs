//! Handles OAuth 2.0 well-known discovery endpoints - authorization server
//! metadata and protected resource metadata.

use axum::{extract::State, response::Json};
use serde_json::{Value, json};

use super::context::AppContext;

/// OAuth 2.0 Protected Resource Metadata handler
/// GET /.well-known/oauth-protected-resource
pub async fn oauth_protected_resource_handler(State(state): State<AppContext>) -> Json<Value> {
    let metadata = json!({
        "resource": state.config.external_base,
        "authorization_servers": [state.config.external_base],
        "scopes_supported": [state.config.oauth_scope],
        "bearer_methods_supported": ["header"]
    });

    Json(metadata)
}

/// OAuth 2.0 Authorization Server Metadata handler
/// GET /.well-known/oauth-authorization-server
///
/// Returns metadata about this authorization server as specified by RFC 8414.
pub async fn oauth_authorization_server_handler(State(state): State<AppContext>) -> Json<Value> {
    let metadata = json!({
        "issuer": state.config.external_base,
        "authorization_endpoint": format!("{}/authorize", state.config.external_base),
        "token_endpoint": format!("{}/token", state.config.external_base),
        "registration_endpoint": format!("{}/register", state.config.external_base),
        "scopes_supported": [state.config.oauth_scope],
        "response_types_supported": ["code"],
        "response_modes_supported": ["query"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "token_endpoint_auth_methods_supported": ["client_secret_post", "none"],
        "code_challenge_methods_supported": ["S256"]
    });

    Json(metadata)
}
