//! Optional signed-token auth. The hub never validates credentials itself
//! (that's the HTTP edge's job, out of scope); all we do here is decode an
//! already-issued lightweight session token into a `userId`, the same
//! base64url-payload-plus-HMAC-SHA256-signature scheme used for other
//! short-lived session tokens in this corpus. Absence of a secret or a
//! token just means a guest session.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct AuthVerifier {
    secret: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "exp")]
    expires_at_ms: i64,
}

impl AuthVerifier {
    pub fn new(secret: Option<String>) -> Self {
        AuthVerifier {
            secret: secret.map(String::into_bytes),
        }
    }

    pub fn disabled() -> Self {
        AuthVerifier { secret: None }
    }

    /// Decodes `<payload>.<signature>`, both base64url. Returns `None` on
    /// any failure (bad shape, bad signature, expired) rather than an
    /// error — an invalid token degrades to a guest session, it never
    /// blocks the connection.
    pub fn verify(&self, token: &str) -> Option<String> {
        let secret = self.secret.as_ref()?;
        let (payload_b64, sig_b64) = token.split_once('.')?;

        let mut mac = HmacSha256::new_from_slice(secret).ok()?;
        mac.update(payload_b64.as_bytes());
        let expected_sig = mac.finalize().into_bytes();
        let given_sig = B64.decode(sig_b64).ok()?;
        if given_sig.len() != expected_sig.len() || given_sig != expected_sig.as_slice() {
            return None;
        }

        let payload_json = B64.decode(payload_b64).ok()?;
        let payload: TokenPayload = serde_json::from_slice(&payload_json).ok()?;
        if payload.expires_at_ms < crate::clock::now_ms() {
            return None;
        }
        Some(payload.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], user_id: &str, expires_at_ms: i64) -> String {
        let payload = serde_json::json!({ "userId": user_id, "exp": expires_at_ms });
        let payload_b64 = B64.encode(serde_json::to_vec(&payload).unwrap());
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(payload_b64.as_bytes());
        let sig_b64 = B64.encode(mac.finalize().into_bytes());
        format!("{payload_b64}.{sig_b64}")
    }

    #[test]
    fn verifies_well_formed_token() {
        let verifier = AuthVerifier::new(Some("shh".to_string()));
        let token = sign(b"shh", "user-42", crate::clock::now_ms() + 60_000);
        assert_eq!(verifier.verify(&token), Some("user-42".to_string()));
    }

    #[test]
    fn rejects_wrong_secret() {
        let verifier = AuthVerifier::new(Some("shh".to_string()));
        let token = sign(b"different", "user-42", crate::clock::now_ms() + 60_000);
        assert_eq!(verifier.verify(&token), None);
    }

    #[test]
    fn rejects_expired_token() {
        let verifier = AuthVerifier::new(Some("shh".to_string()));
        let token = sign(b"shh", "user-42", crate::clock::now_ms() - 1);
        assert_eq!(verifier.verify(&token), None);
    }

    #[test]
    fn disabled_verifier_never_authenticates() {
        let verifier = AuthVerifier::disabled();
        let token = sign(b"whatever", "user-42", crate::clock::now_ms() + 60_000);
        assert_eq!(verifier.verify(&token), None);
    }

    #[test]
    fn malformed_token_is_rejected_not_panicked() {
        let verifier = AuthVerifier::new(Some("shh".to_string()));
        assert_eq!(verifier.verify("not-a-token"), None);
        assert_eq!(verifier.verify(""), None);
    }
}
