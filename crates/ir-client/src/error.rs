//! Client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] ir_ws::WsError),

    #[error("Invalid channel: {0}")]
    Channel(#[from] ir_core::CoreError),

    #[error("Logging error: {0}")]
    Logging(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
