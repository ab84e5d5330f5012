//! Feed error types.

use ir_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid payload: {0}")]
    Core(#[from] CoreError),

    #[error("Unsupported payload for {0} channel")]
    Unsupported(&'static str),
}

pub type FeedResult<T> = Result<T, FeedError>;
