//! Handles POST /token - exchanges authorization codes and refresh tokens
//! for signed JWTs.

use axum::{Form, Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use super::context::AppContext;
use crate::errors::OAuthError;
use crate::oauth::types::{TokenForm, TokenResponse};

/// Handle OAuth token requests.
/// POST /token - Dispatches on grant_type (authorization_code, refresh_token).
pub async fn handle_token(
    State(state): State<AppContext>,
    Form(form): Form<TokenForm>,
) -> Result<Json<TokenResponse>, (StatusCode, Json<Value>)> {
    match state.auth_server.token(form).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            let status = match e {
                OAuthError::InvalidClient(_) => StatusCode::UNAUTHORIZED,
                OAuthError::InvalidGrant(_)
                | OAuthError::InvalidRequest(_)
                | OAuthError::UnsupportedGrantType(_) => StatusCode::BAD_REQUEST,
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
