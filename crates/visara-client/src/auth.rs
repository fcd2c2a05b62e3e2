//! Short-lived HS256 token minting for API requests.
//!
//! Every request carries a freshly signed JWT so clock drift never leaves a
//! long-running client holding an expired token. The API key rides in both
//! the `kid` header and the `sub` claim.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use visara_core::defaults::{JWT_ISSUER, JWT_TTL_SECS};
use visara_core::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize)]
struct Header<'a> {
    alg: &'static str,
    typ: &'static str,
    kid: &'a str,
}

#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    iat: i64,
    exp: i64,
    iss: &'static str,
}

/// Signs request tokens from an API key/secret pair.
#[derive(Clone)]
pub struct TokenSigner {
    api_key: String,
    api_secret: String,
}

impl TokenSigner {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Mint a token valid from now for [`JWT_TTL_SECS`] seconds.
    pub fn sign(&self) -> Result<String> {
        self.sign_at(Utc::now().timestamp())
    }

    fn sign_at(&self, issued_at: i64) -> Result<String> {
        let header = Header {
            alg: "HS256",
            typ: "JWT",
            kid: &self.api_key,
        };
        let claims = Claims {
            sub: &self.api_key,
            iat: issued_at,
            exp: issued_at + JWT_TTL_SECS,
            iss: JWT_ISSUER,
        };

        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| Error::Auth(format!("HMAC key setup failed: {e}")))?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}
