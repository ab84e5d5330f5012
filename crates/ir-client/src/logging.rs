//! Logging setup for the `ir-stream` binary and embedding applications.

use crate::error::{ClientError, ClientResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,ir_ws=debug,ir_feed=debug,ir_client=debug";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, fields flattened.
    Json,
    /// Compact human-readable lines.
    Compact,
}

impl LogFormat {
    /// `RUST_ENV=production` selects JSON.
    pub fn from_env() -> Self {
        Self::for_environment(std::env::var("RUST_ENV").ok().as_deref())
    }

    fn for_environment(env: Option<&str>) -> Self {
        match env {
            Some("production") => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Install the global subscriber using `RUST_ENV` to pick the format.
///
/// `RUST_LOG` overrides the default filter. Fails if a subscriber is
/// already installed.
pub fn init_logging() -> ClientResult<()> {
    init_logging_with(LogFormat::from_env())
}

pub fn init_logging_with(format: LogFormat) -> ClientResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().flatten_event(true))
            .try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };

    result.map_err(|e| ClientError::Logging(e.to_string()))
}
