//! Streaming market data client for Independent Reserve.
//!
//! Keeps one WebSocket connection alive, tracks which channels are wanted,
//! expires the ones nobody asks for, and serves the latest payload per
//! channel and instrument from memory:
//! - `MarketDataClient`: subscribe/unsubscribe and latest-value reads
//! - `ClientConfig`: TOML configuration with environment credentials
//! - `init_logging`: tracing subscriber setup

pub mod client;
pub mod config;
pub mod error;
pub mod logging;

pub use client::MarketDataClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use logging::{init_logging, init_logging_with, LogFormat};
pub use ir_ws::{ConnectionState, SendOutcome};
