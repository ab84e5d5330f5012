//! WebSocket write handle for sending messages.
//!
//! All writes go through one bounded channel drained by the connection's
//! message loop, so the socket has a single writer. Each queued frame
//! carries a oneshot that the loop completes once the frame has been
//! written (or failed), which is what "confirmed send" means here.

use crate::connection::ConnectionState;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Outbound text frame with its write acknowledgement.
#[derive(Debug)]
pub struct WsOutbound {
    pub text: String,
    pub ack: oneshot::Sender<Result<(), SendError>>,
}

/// Error type for send operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Not connected; nothing was written.
    NotConnected,
    /// Channel closed (message loop gone or shutting down).
    ChannelClosed,
    /// The socket write itself failed.
    Transport(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::ChannelClosed => write!(f, "channel closed"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl std::error::Error for SendError {}

/// Write handle for sending messages to WebSocket.
///
/// Cheap to clone and reconnect-safe: it never touches the socket
/// directly.
#[derive(Clone)]
pub struct WsWriteHandle {
    tx: mpsc::Sender<WsOutbound>,
    state: Arc<RwLock<ConnectionState>>,
}

impl WsWriteHandle {
    pub fn new(tx: mpsc::Sender<WsOutbound>, state: Arc<RwLock<ConnectionState>>) -> Self {
        Self { tx, state }
    }

    /// Send a text frame and wait until it has been written.
    ///
    /// # Errors
    ///
    /// - `SendError::NotConnected`: connection is not up (checked before queueing,
    ///   or reported by the loop if the connection dropped while queued)
    /// - `SendError::ChannelClosed`: the message loop is gone
    /// - `SendError::Transport`: the socket write failed
    pub async fn send_text(&self, text: String) -> Result<(), SendError> {
        if !self.is_connected() {
            return Err(SendError::NotConnected);
        }

        let (ack, done) = oneshot::channel();
        self.tx
            .send(WsOutbound { text, ack })
            .await
            .map_err(|_| SendError::ChannelClosed)?;
        debug!("Frame queued for sending");

        done.await.map_err(|_| SendError::ChannelClosed)?
    }

    /// Check if connected and the loop is still receiving.
    pub fn is_connected(&self) -> bool {
        let state = *self.state.read();
        state == ConnectionState::Connected && !self.tx.is_closed()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
