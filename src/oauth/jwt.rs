//! Compact HMAC-SHA256 JWT codec.
//!
//! Tokens are three base64url segments: header `{alg:"HS256",typ:"JWT"}`,
//! claims, and an HMAC-SHA256 signature over `header.payload`. HS256 is the
//! only accepted algorithm; there is no `alg` negotiation, which rules out
//! algorithm-confusion attacks by construction. Token validity is entirely
//! recomputed from the signature and `exp` — nothing is stored server-side.

use base64::prelude::*;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::OAuthError;

type HmacSha256 = Hmac<Sha256>;

/// Whether a token was minted for bearer use or refresh use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Claim set carried by issued tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Verified email of the authenticated user
    pub sub: String,
    /// This server's external base URL
    pub iss: String,
    /// Issued-at, seconds since epoch
    pub iat: i64,
    /// Expiry, seconds since epoch
    pub exp: i64,
    pub scope: String,
    #[serde(rename = "type")]
    pub token_use: TokenUse,
}

fn encode_segment(bytes: &[u8]) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

fn hmac_sha256(secret: &str, signing_input: &str) -> Vec<u8> {
    // HMAC accepts keys of any length, so new_from_slice cannot fail
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(signing_input.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Sign a claim set into a compact HS256 JWT.
pub fn sign(claims: &Claims, secret: &str) -> Result<String, OAuthError> {
    let header = serde_json::json!({"alg": "HS256", "typ": "JWT"});
    let header_b64 = encode_segment(
        serde_json::to_vec(&header)
            .map_err(|e| OAuthError::ServerError(format!("header serialization: {e}")))?
            .as_slice(),
    );
    let payload_b64 = encode_segment(
        serde_json::to_vec(claims)
            .map_err(|e| OAuthError::ServerError(format!("claims serialization: {e}")))?
            .as_slice(),
    );

    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = hmac_sha256(secret, &signing_input);
    Ok(format!("{signing_input}.{}", encode_segment(&signature)))
}

/// Verify a compact JWT and return its claims.
///
/// Returns `None` for anything other than a well-formed, correctly signed,
/// unexpired token. The signature comparison is constant-time.
pub fn verify(token: &str, secret: &str) -> Option<Claims> {
    let mut parts = token.split('.');
    let (header_b64, payload_b64, signature_b64) =
        (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let signing_input = format!("{header_b64}.{payload_b64}");
    let expected = hmac_sha256(secret, &signing_input);
    let provided = BASE64_URL_SAFE_NO_PAD.decode(signature_b64).ok()?;
    if expected.ct_eq(&provided).unwrap_u8() != 1 {
        return None;
    }

    let payload = BASE64_URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let claims: Claims = serde_json::from_slice(&payload).ok()?;
    if claims.exp < Utc::now().timestamp() {
        return None;
    }
    Some(claims)
}

/// Decode a JWT payload segment without verifying the signature.
///
/// Used only for the identity provider's id_token, which arrives over a
/// direct confidential server-to-server exchange immediately after the code
/// swap. That channel is the trust boundary; the assertion is accepted as-is.
pub fn decode_unverified_payload(token: &str) -> Option<serde_json::Value> {
    let payload_b64 = token.split('.').nth(1)?;
    let payload = BASE64_URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    serde_json::from_slice(&payload).ok()
}
