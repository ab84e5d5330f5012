//! WebSocket message types.
//!
//! Every frame is a JSON object with single-letter keys:
//! `m` (method, outbound), `n` (channel name), `o` (payload or auth block)
//! and `e` (event marker, inbound).

use ir_core::ChannelName;
use serde::{Deserialize, Serialize};

// ============================================================================
// Outbound
// ============================================================================

/// Authentication block attached to a private subscribe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthPayload {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    /// Unix seconds, sent as a string.
    pub nonce: String,
    /// Uppercase hex HMAC-SHA256.
    pub signature: String,
}

/// Subscribe/unsubscribe request.
#[derive(Debug, Clone, Serialize)]
pub struct WsRequest {
    #[serde(rename = "m")]
    pub method: String,
    #[serde(rename = "n")]
    pub channel: String,
    #[serde(rename = "o", skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthPayload>,
}

impl WsRequest {
    /// Create a subscribe request, signed when `auth` is present.
    pub fn subscribe(channel: &ChannelName, auth: Option<AuthPayload>) -> Self {
        Self {
            method: "subscribe".to_string(),
            channel: channel.to_string(),
            auth,
        }
    }

    /// Create an unsubscribe request.
    pub fn unsubscribe(channel: &ChannelName) -> Self {
        Self {
            method: "unsubscribe".to_string(),
            channel: channel.to_string(),
            auth: None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// Inbound data frame: `{"e": <event?>, "n": <channel>, "o": <payload>}`.
///
/// All fields are optional at the parse boundary; the router decides what a
/// missing field means.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "e", default)]
    pub event: Option<String>,
    #[serde(rename = "n", default)]
    pub channel: Option<String>,
    #[serde(rename = "o", default)]
    pub payload: Option<serde_json::Value>,
}

impl InboundFrame {
    /// Parse a text frame.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Check if the server marked this frame as an error.
    pub fn is_error(&self) -> bool {
        self.event.as_deref() == Some("error")
    }

    /// Human-readable error text for error frames.
    pub fn error_message(&self) -> String {
        match &self.payload {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "Unknown error".to_string(),
        }
    }

    /// Channel name, if present and non-empty.
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref().filter(|c| !c.is_empty())
    }

    /// Payload, if present and not null.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref().filter(|p| !p.is_null())
    }
}
