//! Handles the two external provider callbacks: GET /oauth/callback for the
//! identity hop and GET /downstream/callback for the delegated-credential hop.
//!
//! These endpoints face the user's browser mid-login, so failures render a
//! short plain page rather than an OAuth JSON error.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use super::context::AppContext;
use crate::errors::OAuthError;
use crate::oauth::types::CallbackQuery;

/// Identity provider callback.
/// GET /oauth/callback - Completes the first hop and either redirects to the
/// downstream consent page or back to the client with an authorization code.
pub async fn handle_identity_callback(
    State(state): State<AppContext>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    match state.auth_server.identity_callback(query).await {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => render_callback_error(e),
    }
}

/// Downstream provider callback.
/// GET /downstream/callback - Persists the delegated credential and resumes
/// the parked client flow.
pub async fn handle_downstream_callback(
    State(state): State<AppContext>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    match state.auth_server.downstream_callback(query).await {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => render_callback_error(e),
    }
}

fn render_callback_error(error: OAuthError) -> Response {
    let (status, message) = match error {
        OAuthError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        OAuthError::InvalidState => (
            StatusCode::BAD_REQUEST,
            "Invalid or expired state parameter. Please restart the login.".to_string(),
        ),
        OAuthError::AccessDenied(msg) => (StatusCode::FORBIDDEN, format!("Access denied: {msg}")),
        OAuthError::UpstreamFailure(msg) => (StatusCode::BAD_GATEWAY, msg),
        other => {
            tracing::error!(error = %other, "callback failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong completing the login.".to_string(),
            )
        }
    };
    (status, message).into_response()
}
