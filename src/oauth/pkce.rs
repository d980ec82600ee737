//! PKCE S256 verifier-to-challenge validation (RFC 7636).

use base64::prelude::*;
use sha2::{Digest, Sha256};

/// The only code challenge method this server accepts.
pub const CHALLENGE_METHOD_S256: &str = "S256";

/// Compute the S256 challenge for a verifier.
pub fn challenge_s256(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    BASE64_URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Whether `base64url(sha256(verifier))` matches the stored challenge.
pub fn verify_s256(verifier: &str, challenge: &str) -> bool {
    challenge_s256(verifier) == challenge
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = challenge_s256(verifier);
        assert!(verify_s256(verifier, &challenge));
    }

    #[test]
    fn test_rfc7636_appendix_b_vector() {
        assert_eq!(
            challenge_s256("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_wrong_verifier_rejected() {
        let challenge = challenge_s256("correct-verifier");
        assert!(!verify_s256("wrong-verifier", &challenge));
        assert!(!verify_s256("", &challenge));
        // The raw verifier is never a valid challenge (plain method rejected)
        assert!(!verify_s256("correct-verifier", "correct-verifier"));
    }
}
