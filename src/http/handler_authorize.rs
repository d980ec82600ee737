//! Handles GET /authorize - validates the client request and redirects the
//! user agent to the identity provider.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
};
use serde_json::{Value, json};

use super::context::AppContext;
use crate::errors::OAuthError;
use crate::oauth::types::AuthorizeQuery;

/// Start an authorization flow.
/// GET /authorize - Redirects to the identity provider on success.
///
/// Validation failures are reported directly to the user agent; the
/// redirect URI is never trusted before it has been matched against the
/// registration, so errors are not relayed to it.
pub async fn handle_authorize(
    State(state): State<AppContext>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Redirect, (StatusCode, Json<Value>)> {
    match state.auth_server.authorize(query).await {
        Ok(url) => Ok(Redirect::to(&url)),
        Err(e) => {
            let status = match e {
                OAuthError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            let error_response = json!({
                "error": e.error_code(),
                "error_description": e.to_string()
            });
            Err((status, Json(error_response)))
        }
    }
}
