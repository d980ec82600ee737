//! OAuth 2.1 core types and data structures.
//!
//! Defines the registration, flow-state, and token-exchange shapes used by
//! the chained broker, plus opaque token generation helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dynamically registered OAuth client (RFC 7591).
///
/// Created once by DCR, never mutated, lives for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: String,
    pub client_name: Option<String>,
    /// Registered redirect URIs; authorize requests must exact-match one
    pub redirect_uris: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// In-flight authorization state parked while the user is at the
/// identity provider. Keyed by the opaque state minted at `/authorize`;
/// consumed exactly once at the identity callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingIdentityFlow {
    pub client_id: String,
    pub redirect_uri: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    /// The client's original state, echoed back on the final redirect
    pub original_state: String,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
}

/// Same as [`PendingIdentityFlow`] plus the email already verified by the
/// identity hop. Keyed by a second opaque state for the downstream redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingDownstreamFlow {
    pub client_id: String,
    pub redirect_uri: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub original_state: String,
    pub scope: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// An issued, not-yet-redeemed authorization code.
///
/// Single-use: the store removes it atomically with the read that
/// validates it, so a second redemption always sees "not found".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Client Registration Request (RFC 7591)
#[derive(Debug, Deserialize)]
pub struct ClientRegistrationRequest {
    pub redirect_uris: Option<Vec<String>>,
    pub client_name: Option<String>,
}

/// Client Registration Response (RFC 7591)
#[derive(Debug, Serialize)]
pub struct ClientRegistrationResponse {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
    pub client_name: String,
    pub token_endpoint_auth_method: String,
}

/// Query parameters for the authorization endpoint.
///
/// Everything is optional at the wire level so validation can produce the
/// distinct OAuth error for each missing or malformed parameter.
#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub scope: Option<String>,
}

/// Query parameters delivered by either external provider callback
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Form data for the token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Token Response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub scope: String,
}

/// Token response body returned by an external provider's token endpoint
#[derive(Debug, Deserialize)]
pub struct ProviderTokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub id_token: Option<String>,
    pub token_type: Option<String>,
}

/// Generate an unguessable hex token from `bytes` random bytes.
pub fn generate_random(bytes: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Generate a client identifier (16 random bytes, hex)
pub fn generate_client_id() -> String {
    generate_random(16)
}

/// Generate a client secret (32 random bytes, hex)
pub fn generate_client_secret() -> String {
    generate_random(32)
}

/// Generate an opaque flow state token
pub fn generate_state() -> String {
    generate_random(16)
}

/// Generate an authorization code
pub fn generate_code() -> String {
    generate_random(32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_unique_hex() {
        let a = generate_code();
        let b = generate_code();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(generate_client_id().len(), 32);
        assert_eq!(generate_state().len(), 32);
    }

    #[test]
    fn test_token_response_omits_absent_refresh_token() {
        let response = TokenResponse {
            access_token: "abc".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            refresh_token: None,
            scope: "api".to_string(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("refresh_token").is_none());
        assert_eq!(value["token_type"], "Bearer");
    }
}
