//! Client configuration.

use crate::error::{ClientError, ClientResult};
use ir_ws::{ConnectionConfig, Credentials, SweeperConfig};
use serde::Deserialize;
use std::path::Path;

pub const API_KEY_ENV: &str = "IR_API_KEY";
pub const API_SECRET_ENV: &str = "IR_API_SECRET";

/// Client configuration. Every field has a default, so an empty TOML file
/// is a valid public-only configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket endpoint.
    pub ws_url: String,
    /// API key for private channels.
    pub api_key: Option<String>,
    /// API secret for private channels.
    pub api_secret: Option<String>,
    /// Subscriptions not refreshed within this window are dropped (ms).
    pub subscription_ttl_ms: u64,
    /// Time between expiry sweeps (ms).
    pub sweep_interval_ms: u64,
    /// Fixed delay before reconnecting (ms).
    pub reconnect_delay_ms: u64,
    /// Outbound frame queue capacity.
    pub outbound_buffer: usize,
}

fn default_ws_url() -> String {
    "wss://ws.independentreserve.com/v2".to_string()
}

fn default_subscription_ttl_ms() -> u64 {
    300_000
}

fn default_sweep_interval_ms() -> u64 {
    60_000
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_outbound_buffer() -> usize {
    100
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_key: None,
            api_secret: None,
            subscription_ttl_ms: default_subscription_ttl_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("ws_url", &self.ws_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("subscription_ttl_ms", &self.subscription_ttl_ms)
            .field("sweep_interval_ms", &self.sweep_interval_ms)
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("outbound_buffer", &self.outbound_buffer)
            .finish()
    }
}

impl ClientConfig {
    /// Load from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ClientError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ClientResult<Self> {
        toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("Failed to parse config: {e}")))
    }

    /// Overlay `IR_API_KEY` / `IR_API_SECRET` when set.
    pub fn with_env_credentials(self) -> Self {
        self.with_credentials_from(|name| std::env::var(name).ok())
    }

    /// Overlay credentials from `lookup`; unset or empty values are ignored.
    pub fn with_credentials_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(secret) = lookup(API_SECRET_ENV).filter(|v| !v.is_empty()) {
            self.api_secret = Some(secret);
        }
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> ClientResult<()> {
        if self.ws_url.trim().is_empty() {
            return Err(ClientError::Config("ws_url must not be empty".to_string()));
        }
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(ClientError::Config(format!(
                "ws_url must be a ws:// or wss:// URL: {}",
                self.ws_url
            )));
        }
        for (name, value) in [
            ("subscription_ttl_ms", self.subscription_ttl_ms),
            ("sweep_interval_ms", self.sweep_interval_ms),
            ("reconnect_delay_ms", self.reconnect_delay_ms),
        ] {
            if value == 0 {
                return Err(ClientError::Config(format!("{name} must be positive")));
            }
        }
        if self.outbound_buffer == 0 {
            return Err(ClientError::Config(
                "outbound_buffer must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Credentials for private channels, when both key and secret are set.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(Credentials::new(key.clone(), secret.clone()))
            }
            _ => None,
        }
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.ws_url.clone(),
            reconnect_delay_ms: self.reconnect_delay_ms,
            outbound_buffer: self.outbound_buffer,
        }
    }

    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig {
            ttl_ms: self.subscription_ttl_ms,
            interval_ms: self.sweep_interval_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.ws_url, "wss://ws.independentreserve.com/v2");
        assert_eq!(config.subscription_ttl_ms, 300_000);
        assert_eq!(config.sweep_interval_ms, 60_000);
        assert_eq!(config.reconnect_delay_ms, 5_000);
        assert!(config.credentials().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = ClientConfig::from_toml("").unwrap();
        assert_eq!(config.ws_url, ClientConfig::default().ws_url);
    }

    #[test]
    fn test_partial_toml() {
        let config = ClientConfig::from_toml(
            r#"
            ws_url = "ws://localhost:9000"
            subscription_ttl_ms = 1000
            api_key = "key"
            api_secret = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.ws_url, "ws://localhost:9000");
        assert_eq!(config.subscription_ttl_ms, 1000);
        assert_eq!(config.sweep_interval_ms, 60_000);
        assert_eq!(config.credentials().unwrap().api_key(), "key");

        let sweeper = config.sweeper_config();
        assert_eq!(sweeper.ttl_ms, 1000);
        assert_eq!(config.connection_config().url, "ws://localhost:9000");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            ClientConfig::from_toml("subscription_ttl_ms = \"soon\""),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ClientConfig::from_file("/nonexistent/ir-stream.toml"),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            ClientConfig {
                ws_url: String::new(),
                ..Default::default()
            },
            ClientConfig {
                ws_url: "https://example.com".to_string(),
                ..Default::default()
            },
            ClientConfig {
                sweep_interval_ms: 0,
                ..Default::default()
            },
            ClientConfig {
                outbound_buffer: 0,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn test_env_credentials_overlay() {
        let config = ClientConfig::default().with_credentials_from(|name| match name {
            API_KEY_ENV => Some("env-key".to_string()),
            API_SECRET_ENV => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.api_key.as_deref(), Some("env-key"));
        assert!(config.api_secret.is_none());
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = ClientConfig {
            api_key: Some("key".to_string()),
            api_secret: Some("super-secret".to_string()),
            ..Default::default()
        };
        let out = format!("{config:?}");
        assert!(out.contains("<redacted>"));
        assert!(!out.contains("super-secret"));
    }
}
