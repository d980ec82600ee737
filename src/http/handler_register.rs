//! Handles POST /register - OAuth 2.0 Dynamic Client Registration (RFC 7591)

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use super::context::AppContext;
use crate::errors::OAuthError;
use crate::oauth::types::{ClientRegistrationRequest, ClientRegistrationResponse};

/// Register a new OAuth client.
/// POST /register - Returns generated credentials with 201 Created.
pub async fn handle_register(
    State(state): State<AppContext>,
    Json(request): Json<ClientRegistrationRequest>,
) -> Result<(StatusCode, Json<ClientRegistrationResponse>), (StatusCode, Json<Value>)> {
    match state.auth_server.register_client(request).await {
        Ok(response) => Ok((StatusCode::CREATED, Json(response))),
        Err(e) => {
            let status = match e {
                OAuthError::InvalidClientMetadata(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let error_response = json!({
                "error": e.error_code(),
                "error_description": e.to_string()
            });
            Err((status, Json(error_response)))
        }
    }
}
