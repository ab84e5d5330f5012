//! Private channel authentication.
//!
//! A private subscribe carries `apiKey`, `nonce` and `signature`, where the
//! signature is HMAC-SHA256 over `apiKey=<key>,nonce=<nonce>,channel=<channel>`
//! keyed by the API secret, encoded as uppercase hex.
//!
//! Security notes:
//! - The secret is held in `Zeroizing` and never logged.
//! - The nonce is the current Unix time in seconds, taken fresh per call.

use crate::error::{WsError, WsResult};
use crate::message::AuthPayload;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// API key and secret for private channels.
pub struct Credentials {
    api_key: String,
    api_secret: Zeroizing<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: Zeroizing::new(api_secret.into()),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Build the string that gets signed.
pub fn signing_message(api_key: &str, channel: &str, nonce: u64) -> String {
    format!("apiKey={api_key},nonce={nonce},channel={channel}")
}

/// Compute the uppercase hex signature for a channel.
///
/// Pure: the same inputs always give the same output. Fails only when the
/// key or secret is empty.
pub fn sign(secret: &str, api_key: &str, channel: &str, nonce: u64) -> WsResult<String> {
    if secret.is_empty() || api_key.is_empty() {
        return Err(WsError::MissingCredentials(channel.to_string()));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WsError::Signing(e.to_string()))?;
    mac.update(signing_message(api_key, channel, nonce).as_bytes());

    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}

/// Signs private subscribe requests with optional credentials.
#[derive(Debug, Default)]
pub struct Signer {
    credentials: Option<Credentials>,
}

impl Signer {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self { credentials }
    }

    /// Check whether credentials are configured.
    pub fn has_credentials(&self) -> bool {
        self.credentials
            .as_ref()
            .is_some_and(|c| !c.api_key.is_empty() && !c.api_secret.is_empty())
    }

    /// Build the auth block for `channel` with a fresh nonce.
    pub fn authenticate(&self, channel: &str) -> WsResult<AuthPayload> {
        let nonce = current_nonce();
        self.authenticate_with_nonce(channel, nonce)
    }

    /// Build the auth block for `channel` with an explicit nonce.
    pub fn authenticate_with_nonce(&self, channel: &str, nonce: u64) -> WsResult<AuthPayload> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| WsError::MissingCredentials(channel.to_string()))?;

        let signature = sign(&creds.api_secret, &creds.api_key, channel, nonce)?;

        Ok(AuthPayload {
            api_key: creds.api_key.clone(),
            nonce: nonce.to_string(),
            signature,
        })
    }
}

/// Current Unix time in whole seconds.
pub fn current_nonce() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
