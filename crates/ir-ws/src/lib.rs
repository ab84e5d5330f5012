//! WebSocket client for the Independent Reserve streaming API.
//!
//! Provides:
//! - Connection lifecycle with fixed-delay reconnection
//! - Subscription registry with TTL-based de-duplication
//! - Replay of active subscriptions after every reconnect
//! - HMAC-SHA256 signing of private channel subscriptions
//! - Periodic expiry of subscriptions nobody refreshed

pub mod connection;
pub mod error;
pub mod message;
pub mod signer;
pub mod subscription;
pub mod sweeper;
pub mod ws_write_handle;

pub use connection::{
    ConnectionConfig, ConnectionManager, ConnectionState, FrameHandler, SendOutcome,
};
pub use error::{WsError, WsResult};
pub use message::{AuthPayload, InboundFrame, WsRequest};
pub use signer::{current_nonce, sign, signing_message, Credentials, Signer};
pub use subscription::{EntryState, SubscribeAction, SubscriptionEntry, SubscriptionRegistry};
pub use sweeper::{ExpirySweeper, SweepReport, SweeperConfig};
pub use ws_write_handle::{SendError, WsOutbound, WsWriteHandle};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
