//! WebSocket connection manager.
//!
//! Handles connection lifecycle, fixed-delay reconnection, and replay of
//! every active subscription after each (re)connect. Inbound frames are
//! parsed here and handed to a [`FrameHandler`]; malformed frames are logged
//! and dropped without touching the connection.

use crate::error::{WsError, WsResult};
use crate::message::{InboundFrame, WsRequest};
use crate::signer::Signer;
use crate::subscription::{SubscribeAction, SubscriptionRegistry};
use crate::ws_write_handle::{SendError, WsOutbound, WsWriteHandle};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, StreamExt};
use ir_core::ChannelName;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Longest slice of a malformed frame echoed into logs.
const MAX_LOGGED_FRAME: usize = 256;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Fixed delay between a disconnect and the next attempt.
    pub reconnect_delay_ms: u64,
    /// Capacity of the outbound frame queue.
    pub outbound_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_delay_ms: 5000,
            outbound_buffer: 100,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal: `shutdown()` was called.
    Stopped,
}

/// Result of a subscribe/unsubscribe call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame written and the registry updated.
    Sent,
    /// Registry said the frame is redundant (and refreshed it).
    Skipped,
    /// No live connection; nothing sent, registry left as it was.
    NotConnected,
}

/// Receives every well-formed inbound frame from the read loop.
pub trait FrameHandler: Send + Sync {
    fn handle_frame(&self, frame: InboundFrame);
}

impl<F> FrameHandler for F
where
    F: Fn(InboundFrame) + Send + Sync,
{
    fn handle_frame(&self, frame: InboundFrame) {
        self(frame)
    }
}

/// WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    registry: Arc<SubscriptionRegistry>,
    signer: Signer,
    handler: Arc<dyn FrameHandler>,
    /// Set while `connect()` is driving the loop.
    running: AtomicBool,
    /// Successful connections so far.
    connection_count: AtomicU64,
    write_handle: WsWriteHandle,
    /// Outbound frame receiver (consumed by message loop).
    outbound_rx: Arc<TokioMutex<mpsc::Receiver<WsOutbound>>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        registry: Arc<SubscriptionRegistry>,
        signer: Signer,
        handler: Arc<dyn FrameHandler>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer.max(1));
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        Self {
            write_handle: WsWriteHandle::new(outbound_tx, state.clone()),
            config,
            state,
            registry,
            signer,
            handler,
            running: AtomicBool::new(false),
            connection_count: AtomicU64::new(0),
            outbound_rx: Arc::new(TokioMutex::new(outbound_rx)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a write handle for sending raw frames.
    pub fn write_handle(&self) -> WsWriteHandle {
        self.write_handle.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.write_handle.is_connected()
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Number of successful connections (1 after the first connect).
    pub fn connection_count(&self) -> u64 {
        self.connection_count.load(Ordering::Relaxed)
    }

    /// Signal graceful shutdown.
    ///
    /// The message loop sends a Close frame and exits, the reconnect loop
    /// stops at its next check, and the state becomes `Stopped`.
    pub fn shutdown(&self) {
        info!("ConnectionManager shutdown requested");
        self.shutdown_token.cancel();
        *self.state.write() = ConnectionState::Stopped;
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Token cancelled by `shutdown()`, for tasks that share this lifetime.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Connect and run the read loop until `shutdown()`.
    ///
    /// Transport faults never surface here: they are logged and retried
    /// after `reconnect_delay_ms`. A second call while running returns
    /// immediately; a call after shutdown returns `WsError::Stopped`.
    pub async fn connect(&self) -> WsResult<()> {
        if self.is_shutdown() {
            return Err(WsError::Stopped);
        }
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Connect loop already running");
            return Ok(());
        }

        self.connect_with_retry().await;
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn connect_with_retry(&self) {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);

        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                self.set_state(ConnectionState::Stopped);
                return;
            }

            self.set_state(ConnectionState::Connecting);

            match self.try_connect().await {
                Ok(()) => info!("WebSocket connection closed"),
                Err(e @ (WsError::ConnectionClosed { .. } | WsError::Tungstenite(_))) => {
                    warn!(error = %e, "WebSocket connection lost")
                }
                Err(e) => error!(error = %e, "Unexpected WebSocket failure"),
            }

            self.set_state(ConnectionState::Disconnected);
            self.drain_outbound();

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                self.set_state(ConnectionState::Stopped);
                return;
            }

            warn!(delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during reconnect delay, exiting");
                    self.set_state(ConnectionState::Stopped);
                    return;
                }
            }

            self.drain_outbound();
        }
    }

    async fn try_connect(&self) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to WebSocket");

        let (ws_stream, _response) =
            connect_async_tls_with_config(&self.config.url, None, true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        self.set_state(ConnectionState::Connected);
        let count = self.connection_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!(connection = count, "WebSocket connected");

        self.replay_subscriptions(&mut write).await;
        self.message_loop(&mut write, &mut read).await
    }

    async fn message_loop(&self, write: &mut WsSink, read: &mut WsSource) -> WsResult<()> {
        loop {
            let outbound_recv = async { self.outbound_rx.lock().await.recv().await };

            tokio::select! {
                biased;

                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(error = %e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "WebSocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Ok(());
                        }
                    }
                }

                outbound = outbound_recv => {
                    if let Some(WsOutbound { text, ack }) = outbound {
                        match write.send(Message::Text(text)).await {
                            Ok(()) => {
                                let _ = ack.send(Ok(()));
                            }
                            Err(e) => {
                                let _ = ack.send(Err(SendError::Transport(e.to_string())));
                                return Err(e.into());
                            }
                        }
                    }
                }
            }
        }
    }

    fn handle_text_message(&self, text: &str) {
        match InboundFrame::parse(text) {
            Ok(frame) => self.handler.handle_frame(frame),
            Err(e) => {
                let raw: String = text.chars().take(MAX_LOGGED_FRAME).collect();
                warn!(error = %e, %raw, "Dropping malformed frame");
            }
        }
    }

    /// Resubscribe every active channel on a fresh connection.
    ///
    /// Private channels get a freshly signed auth block. A channel that
    /// cannot be signed is skipped; a write failure aborts the rest of the
    /// replay. The registry is never modified here.
    async fn replay_subscriptions<S>(&self, write: &mut S) -> usize
    where
        S: Sink<Message, Error = tungstenite::Error> + Unpin,
    {
        let channels = self.registry.list_active();
        if channels.is_empty() {
            return 0;
        }

        info!(count = channels.len(), "Resubscribing to active channels");
        let mut sent = 0;

        for channel in &channels {
            let text = match self.subscribe_frame(channel) {
                Ok(text) => text,
                Err(e) => {
                    error!(%channel, error = %e, "Skipping resubscribe");
                    continue;
                }
            };

            if let Err(e) = write.send(Message::Text(text)).await {
                warn!(%channel, error = %e, "Resubscribe failed, aborting replay");
                break;
            }
            sent += 1;
            debug!(%channel, "Resubscribed");
        }

        info!(sent, total = channels.len(), "Replay finished");
        sent
    }

    /// Build a subscribe frame, signing it for private channels.
    fn subscribe_frame(&self, channel: &ChannelName) -> WsResult<String> {
        let auth = if channel.is_private() {
            Some(self.signer.authenticate(channel.as_str())?)
        } else {
            None
        };
        Ok(WsRequest::subscribe(channel, auth).to_json()?)
    }

    /// Subscribe to `channel` unless the registry says it is redundant.
    ///
    /// The registry is consulted first, so a redundant call refreshes the
    /// channel even while disconnected. A frame that would be sent returns
    /// `NotConnected` (not an error) when there is no live socket.
    ///
    /// # Errors
    ///
    /// - `WsError::MissingCredentials`: private channel without key/secret
    /// - `WsError::SendFailed`: the socket write failed
    pub async fn send_subscribe(&self, channel: &ChannelName) -> WsResult<SendOutcome> {
        if self.registry.request_subscribe(channel) == SubscribeAction::Skip {
            return Ok(SendOutcome::Skipped);
        }

        if !self.is_connected() {
            self.registry.abort_subscribe(channel);
            debug!(%channel, "Not connected, subscribe deferred");
            return Ok(SendOutcome::NotConnected);
        }

        let text = match self.subscribe_frame(channel) {
            Ok(text) => text,
            Err(e) => {
                self.registry.abort_subscribe(channel);
                error!(%channel, error = %e, "Subscribe abandoned");
                return Err(e);
            }
        };

        match self.write_handle.send_text(text).await {
            Ok(()) => {
                self.registry.confirm_subscribe(channel);
                Ok(SendOutcome::Sent)
            }
            Err(SendError::NotConnected) => {
                self.registry.abort_subscribe(channel);
                Ok(SendOutcome::NotConnected)
            }
            Err(e) => {
                self.registry.abort_subscribe(channel);
                warn!(%channel, error = %e, "Subscribe send failed");
                Err(WsError::SendFailed(e.to_string()))
            }
        }
    }

    /// Unsubscribe from `channel` if the registry has it active.
    ///
    /// The registry entry is removed only after the frame is written, so a
    /// failed unsubscribe is retried by the next sweep.
    pub async fn send_unsubscribe(&self, channel: &ChannelName) -> WsResult<SendOutcome> {
        if !self.is_connected() {
            debug!(%channel, "Not connected, unsubscribe deferred");
            return Ok(SendOutcome::NotConnected);
        }

        if self.registry.request_unsubscribe(channel) == SubscribeAction::Skip {
            return Ok(SendOutcome::Skipped);
        }

        let text = match WsRequest::unsubscribe(channel).to_json() {
            Ok(text) => text,
            Err(e) => {
                self.registry.abort_unsubscribe(channel);
                return Err(e.into());
            }
        };

        match self.write_handle.send_text(text).await {
            Ok(()) => {
                self.registry.confirm_unsubscribe(channel);
                Ok(SendOutcome::Sent)
            }
            Err(SendError::NotConnected) => {
                self.registry.abort_unsubscribe(channel);
                Ok(SendOutcome::NotConnected)
            }
            Err(e) => {
                self.registry.abort_unsubscribe(channel);
                warn!(%channel, error = %e, "Unsubscribe send failed");
                Err(WsError::SendFailed(e.to_string()))
            }
        }
    }

    /// Fail every frame still queued from a connection that is gone.
    fn drain_outbound(&self) {
        let Ok(mut rx) = self.outbound_rx.try_lock() else {
            return;
        };
        let mut drained = 0usize;
        while let Ok(msg) = rx.try_recv() {
            let _ = msg.ack.send(Err(SendError::NotConnected));
            drained += 1;
        }
        if drained > 0 {
            debug!(drained, "Dropped queued frames after disconnect");
        }
    }

    #[cfg(test)]
    pub(crate) fn force_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    #[cfg(test)]
    pub(crate) async fn next_outbound(&self) -> Option<WsOutbound> {
        self.outbound_rx.lock().await.recv().await
    }

    fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.state.write();
        if *state == ConnectionState::Stopped && new_state != ConnectionState::Stopped {
            return;
        }
        *state = new_state;
    }
}
