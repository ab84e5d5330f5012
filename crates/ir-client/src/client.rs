//! Collaborator-facing market data client.
//!
//! Wires the subscription registry, connection manager, router, cache and
//! expiry sweeper together. Callers only "ensure subscribed" and "read the
//! latest value"; everything else runs in background tasks.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use ir_core::{Balance, ChannelName, OrderBook, RecentTrades, Ticker};
use ir_feed::{MarketDataCache, MessageRouter, RouterStats};
use ir_ws::{
    ConnectionManager, ConnectionState, ExpirySweeper, FrameHandler, SendOutcome, Signer,
    SubscriptionRegistry, WsError,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Streaming market data client.
pub struct MarketDataClient {
    registry: Arc<SubscriptionRegistry>,
    cache: Arc<MarketDataCache>,
    router: Arc<MessageRouter>,
    manager: Arc<ConnectionManager>,
    sweeper: Arc<ExpirySweeper>,
    /// Connection and sweeper tasks, set by `connect()`.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MarketDataClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;

        let credentials = config.credentials();
        if credentials.is_none() {
            info!("No API credentials configured, private channels unavailable");
        }

        let registry = Arc::new(SubscriptionRegistry::new(Duration::from_millis(
            config.subscription_ttl_ms,
        )));
        let cache = Arc::new(MarketDataCache::new());
        let router = Arc::new(MessageRouter::new(cache.clone()));
        let handler: Arc<dyn FrameHandler> = router.clone();
        let manager = Arc::new(ConnectionManager::new(
            config.connection_config(),
            registry.clone(),
            Signer::new(credentials),
            handler,
        ));
        let sweeper = Arc::new(ExpirySweeper::new(config.sweeper_config(), manager.clone()));

        Ok(Self {
            registry,
            cache,
            router,
            manager,
            sweeper,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Start the connection loop and the expiry sweeper.
    ///
    /// Returns once the tasks are spawned; the connection comes up in the
    /// background. Calling it again while running does nothing.
    pub fn connect(&self) -> ClientResult<()> {
        if self.manager.is_shutdown() {
            return Err(WsError::Stopped.into());
        }

        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return Ok(());
        }

        let manager = self.manager.clone();
        tasks.push(tokio::spawn(async move {
            match manager.connect().await {
                Ok(()) | Err(WsError::Stopped) => {}
                Err(e) => error!(error = %e, "WebSocket connection loop failed"),
            }
        }));

        let sweeper = self.sweeper.clone();
        tasks.push(tokio::spawn(async move {
            sweeper.run().await;
        }));

        info!("Market data client started");
        Ok(())
    }

    /// Wait until the socket is up, or `timeout` elapses.
    pub async fn wait_until_connected(&self, timeout: Duration) -> bool {
        let poll = async {
            while !self.manager.is_connected() {
                if self.manager.is_shutdown() {
                    return false;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            true
        };
        tokio::time::timeout(timeout, poll).await.unwrap_or(false)
    }

    /// Stop the client for good.
    ///
    /// Background loops exit at their next check; the registry and cache
    /// are emptied immediately.
    pub fn stop(&self) {
        info!("Stopping market data client");
        self.manager.shutdown();
        self.registry.clear();
        self.cache.clear();
    }

    /// Wait for the background tasks to finish after `stop()`.
    pub async fn join(&self) {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Channels the server should currently have active.
    pub fn active_subscriptions(&self) -> Vec<ChannelName> {
        self.registry.list_active()
    }

    pub fn router_stats(&self) -> &RouterStats {
        self.router.stats()
    }

    /// Number of successful connections so far.
    pub fn connection_count(&self) -> u64 {
        self.manager.connection_count()
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub async fn subscribe_ticker(
        &self,
        primary: &str,
        secondary: &str,
    ) -> ClientResult<SendOutcome> {
        self.subscribe(ChannelName::ticker(primary, secondary)?).await
    }

    pub async fn subscribe_order_book(
        &self,
        primary: &str,
        secondary: &str,
    ) -> ClientResult<SendOutcome> {
        self.subscribe(ChannelName::order_book(primary, secondary)?).await
    }

    pub async fn subscribe_recent_trades(
        &self,
        primary: &str,
        secondary: &str,
    ) -> ClientResult<SendOutcome> {
        self.subscribe(ChannelName::recent_trades(primary, secondary)?).await
    }

    /// Subscribe to account balances. Needs API credentials.
    pub async fn subscribe_balance(&self) -> ClientResult<SendOutcome> {
        self.subscribe(ChannelName::balance()).await
    }

    pub async fn unsubscribe_ticker(
        &self,
        primary: &str,
        secondary: &str,
    ) -> ClientResult<SendOutcome> {
        self.unsubscribe(ChannelName::ticker(primary, secondary)?).await
    }

    pub async fn unsubscribe_order_book(
        &self,
        primary: &str,
        secondary: &str,
    ) -> ClientResult<SendOutcome> {
        self.unsubscribe(ChannelName::order_book(primary, secondary)?).await
    }

    pub async fn unsubscribe_recent_trades(
        &self,
        primary: &str,
        secondary: &str,
    ) -> ClientResult<SendOutcome> {
        self.unsubscribe(ChannelName::recent_trades(primary, secondary)?).await
    }

    pub async fn unsubscribe_balance(&self) -> ClientResult<SendOutcome> {
        self.unsubscribe(ChannelName::balance()).await
    }

    async fn subscribe(&self, channel: ChannelName) -> ClientResult<SendOutcome> {
        self.manager
            .send_subscribe(&channel)
            .await
            .map_err(ClientError::from)
    }

    async fn unsubscribe(&self, channel: ChannelName) -> ClientResult<SendOutcome> {
        self.manager
            .send_unsubscribe(&channel)
            .await
            .map_err(ClientError::from)
    }

    // ------------------------------------------------------------------
    // Cached data
    // ------------------------------------------------------------------

    /// Latest ticker, or `None` if nothing has arrived for the pair yet.
    pub fn get_latest_ticker(&self, primary: &str, secondary: &str) -> Option<Ticker> {
        self.cache.ticker(primary, secondary)
    }

    pub fn get_latest_order_book(&self, primary: &str, secondary: &str) -> Option<OrderBook> {
        self.cache.order_book(primary, secondary)
    }

    pub fn get_latest_recent_trades(
        &self,
        primary: &str,
        secondary: &str,
    ) -> Option<RecentTrades> {
        self.cache.recent_trades(primary, secondary)
    }

    /// Every cached balance, ordered by currency code.
    pub fn get_balances(&self) -> Vec<Balance> {
        self.cache.balances()
    }

    pub fn get_balance(&self, currency: &str) -> Option<Balance> {
        self.cache.balance(currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> ClientConfig {
        ClientConfig {
            ws_url: "ws://127.0.0.1:1".to_string(),
            reconnect_delay_ms: 50,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ClientConfig {
            ws_url: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            MarketDataClient::new(config),
            Err(ClientError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_before_connect() {
        let client = MarketDataClient::new(offline_config()).unwrap();

        let outcome = client.subscribe_ticker("xbt", "usd").await.unwrap();
        assert_eq!(outcome, SendOutcome::NotConnected);
        assert!(client.active_subscriptions().is_empty());
        assert!(client.get_latest_ticker("xbt", "usd").is_none());
        assert!(client.get_balances().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_pair_is_rejected() {
        let client = MarketDataClient::new(offline_config()).unwrap();
        assert!(matches!(
            client.subscribe_order_book("", "usd").await,
            Err(ClientError::Channel(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_and_stop_is_terminal() {
        let client = MarketDataClient::new(offline_config()).unwrap();
        client.connect().unwrap();
        client.connect().unwrap();
        assert_eq!(client.tasks.lock().len(), 2);

        client.stop();
        tokio::time::timeout(Duration::from_secs(2), client.join())
            .await
            .expect("tasks should exit after stop");

        assert_eq!(client.state(), ConnectionState::Stopped);
        assert!(matches!(
            client.connect(),
            Err(ClientError::WebSocket(WsError::Stopped))
        ));
    }
}
