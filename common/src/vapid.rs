//! VAPID (RFC 8292): identifies this server to push services with a
//! short-lived ES256 token.

use anyhow::{anyhow, ensure, Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use serde_json::json;
use std::fmt;

pub const DEFAULT_VAPID_SUBJECT: &str = "mailto:you@example.com";

/// Push services refuse tokens that expire more than 24 hours out.
pub const TOKEN_LIFETIME_SECONDS: i64 = 12 * 60 * 60;

/// VAPID key pair plus the contact claim sent to push services.
#[derive(Clone)]
pub struct VapidCredentials {
    signing_key: SigningKey,
    /// Unpadded base64url of the uncompressed public point.
    public_key: String,
    subject: String,
}

impl VapidCredentials {
    /// Keys are base64url, padded or not: a 65-byte uncompressed P-256 point
    /// and the matching 32-byte scalar.
    pub fn new(public_key: &str, private_key: &str, subject: Option<&str>) -> Result<Self> {
        let public_bytes =
            decode_base64url(public_key).context("Invalid base64url for VAPID public key")?;
        ensure!(
            public_bytes.len() == 65 && public_bytes[0] == 0x04,
            "VAPID public key must be a 65-byte uncompressed P-256 point"
        );

        let private_bytes =
            decode_base64url(private_key).context("Invalid base64url for VAPID private key")?;
        ensure!(
            private_bytes.len() == 32,
            "VAPID private key must be a 32-byte P-256 scalar, got {} bytes",
            private_bytes.len()
        );

        let signing_key = SigningKey::from_slice(&private_bytes)
            .map_err(|e| anyhow!("Invalid VAPID private key: {e}"))?;
        let derived = signing_key.verifying_key().to_encoded_point(false);
        ensure!(
            derived.as_bytes() == public_bytes.as_slice(),
            "VAPID public key does not belong to the private key"
        );

        Ok(VapidCredentials {
            signing_key,
            public_key: URL_SAFE_NO_PAD.encode(derived.as_bytes()),
            subject: subject
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_VAPID_SUBJECT)
                .to_string(),
        })
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// `Authorization` header for a push to `endpoint`, with `now` in unix seconds.
    pub fn authorization(&self, endpoint: &str, now: i64) -> Result<String> {
        let endpoint = reqwest::Url::parse(endpoint).context("Invalid push endpoint")?;
        let audience = endpoint.origin().ascii_serialization();
        ensure!(audience != "null", "Push endpoint has no origin");

        let header = URL_SAFE_NO_PAD.encode(json!({ "typ": "JWT", "alg": "ES256" }).to_string());
        let claims = URL_SAFE_NO_PAD.encode(
            json!({
                "aud": audience,
                "exp": now + TOKEN_LIFETIME_SECONDS,
                "sub": self.subject,
            })
            .to_string(),
        );

        let signing_input = format!("{header}.{claims}");
        let signature: Signature = self.signing_key.sign(signing_input.as_bytes());
        let token = format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        );

        Ok(format!("vapid t={token}, k={}", self.public_key))
    }
}

impl fmt::Debug for VapidCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VapidCredentials")
            .field("public_key", &self.public_key)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

pub(crate) fn decode_base64url(value: &str) -> Result<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(value.trim().trim_end_matches('='))?)
}
