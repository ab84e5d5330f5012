//! Inbound frame routing.
//!
//! Runs inside the connection's read loop. Error frames and frames without
//! a channel or payload are logged and dropped. Data frames are decoded by
//! channel prefix and written to the cache; channel kinds with no cache
//! slot are ignored.

use crate::cache::MarketDataCache;
use crate::error::FeedResult;
use ir_core::{ChannelKind, MarketPayload};
use ir_ws::{FrameHandler, InboundFrame};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// What the router did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Number of cache entries written.
    Stored(usize),
    /// Server error frame; logged only.
    ServerError,
    /// Channel or payload missing.
    Incomplete,
    /// Payload did not decode for its channel kind.
    Malformed,
    /// Channel kind has no cache slot.
    Ignored,
}

/// Router counters.
#[derive(Debug, Default)]
pub struct RouterStats {
    stored: AtomicU64,
    server_errors: AtomicU64,
    dropped: AtomicU64,
    ignored: AtomicU64,
}

impl RouterStats {
    pub fn stored(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    pub fn server_errors(&self) -> u64 {
        self.server_errors.load(Ordering::Relaxed)
    }

    /// Incomplete plus malformed frames.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }

    fn record(&self, outcome: RouteOutcome) {
        let counter = match outcome {
            RouteOutcome::Stored(n) => {
                self.stored.fetch_add(n as u64, Ordering::Relaxed);
                return;
            }
            RouteOutcome::ServerError => &self.server_errors,
            RouteOutcome::Incomplete | RouteOutcome::Malformed => &self.dropped,
            RouteOutcome::Ignored => &self.ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Routes decoded frames into the market data cache.
pub struct MessageRouter {
    cache: Arc<MarketDataCache>,
    stats: RouterStats,
}

impl MessageRouter {
    pub fn new(cache: Arc<MarketDataCache>) -> Self {
        Self {
            cache,
            stats: RouterStats::default(),
        }
    }

    pub fn cache(&self) -> &Arc<MarketDataCache> {
        &self.cache
    }

    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Route one frame. Never panics and never fails past this point.
    pub fn route(&self, frame: &InboundFrame) -> RouteOutcome {
        let outcome = self.classify(frame);
        self.stats.record(outcome);
        outcome
    }

    fn classify(&self, frame: &InboundFrame) -> RouteOutcome {
        if frame.is_error() {
            error!(message = %frame.error_message(), "Server reported error");
            return RouteOutcome::ServerError;
        }

        let (Some(channel), Some(payload)) = (frame.channel(), frame.payload()) else {
            warn!(
                channel = ?frame.channel(),
                has_payload = frame.payload().is_some(),
                "Dropping frame without channel or payload"
            );
            return RouteOutcome::Incomplete;
        };

        let kind = ChannelKind::from_channel(channel);
        let result = match kind {
            ChannelKind::Ticker | ChannelKind::OrderBook | ChannelKind::RecentTrades => {
                self.store_pair(kind, payload)
            }
            ChannelKind::Balance => self.store_balances(payload),
            _ => {
                debug!(channel, "No cache slot for channel, ignoring");
                return RouteOutcome::Ignored;
            }
        };

        match result {
            Ok(stored) => {
                debug!(channel, stored, "Frame routed");
                RouteOutcome::Stored(stored)
            }
            Err(e) => {
                warn!(channel, error = %e, "Dropping undecodable payload");
                RouteOutcome::Malformed
            }
        }
    }

    fn store_pair(&self, kind: ChannelKind, payload: &serde_json::Value) -> FeedResult<usize> {
        let decoded = MarketPayload::parse(kind, payload)?;
        self.cache.put_payload(decoded)?;
        Ok(1)
    }

    /// Balance frames carry a list; a lone object is accepted as a list of one.
    fn store_balances(&self, payload: &serde_json::Value) -> FeedResult<usize> {
        let balances = if payload.is_array() {
            MarketPayload::parse_balances(payload)?
        } else {
            match MarketPayload::parse(ChannelKind::Balance, payload)? {
                MarketPayload::Balance(b) => vec![b],
                _ => Vec::new(),
            }
        };
        Ok(self.cache.put_balances(balances))
    }
}

impl FrameHandler for MessageRouter {
    fn handle_frame(&self, frame: InboundFrame) {
        self.route(&frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir_core::{Price, Volume};
    use rust_decimal_macros::dec;

    fn router() -> MessageRouter {
        MessageRouter::new(Arc::new(MarketDataCache::new()))
    }

    fn frame(text: &str) -> InboundFrame {
        InboundFrame::parse(text).unwrap()
    }

    #[test]
    fn test_ticker_round_trip() {
        let router = router();
        let outcome = router.route(&frame(
            r#"{"n":"ticker-xbtusd","o":{"PrimaryCurrencyCode":"Xbt","SecondaryCurrencyCode":"Usd","LastPrice":50000.0,"BestBid":49990.5,"BestAsk":50010,"Volume24Hour":12.5}}"#,
        ));

        assert_eq!(outcome, RouteOutcome::Stored(1));
        for (p, s) in [("xbt", "usd"), ("XBT", "Usd")] {
            let ticker = router.cache().ticker(p, s).unwrap();
            assert_eq!(ticker.last_price, Some(Price::new(dec!(50000))));
            assert_eq!(ticker.volume_24h, Some(Volume::new(dec!(12.5))));
        }
    }

    #[test]
    fn test_ticker_with_missing_optional_fields() {
        let router = router();
        router.route(&frame(
            r#"{"n":"ticker-ethaud","o":{"PrimaryCurrencyCode":"Eth","SecondaryCurrencyCode":"Aud"}}"#,
        ));

        let ticker = router.cache().ticker("eth", "aud").unwrap();
        assert!(ticker.last_price.is_none());
        assert!(ticker.spread().is_none());
    }

    #[test]
    fn test_order_book_preserves_level_order() {
        let router = router();
        router.route(&frame(
            r#"{"n":"orderbook-ethaud","o":{"PrimaryCurrencyCode":"Eth","SecondaryCurrencyCode":"Aud","BuyOrders":[{"Price":3000,"Volume":10},{"Price":2995,"Volume":1}],"SellOrders":[]}}"#,
        ));

        let book = router.cache().order_book("eth", "aud").unwrap();
        assert_eq!(book.buy_orders[0].price, Price::new(dec!(3000)));
        assert_eq!(book.buy_orders[0].volume, Volume::new(dec!(10)));
        assert_eq!(book.buy_orders[1].price, Price::new(dec!(2995)));
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn test_recent_trades() {
        let router = router();
        router.route(&frame(
            r#"{"n":"recenttrades-xbtaud","o":{"PrimaryCurrencyCode":"Xbt","SecondaryCurrencyCode":"Aud","Trades":[{"Price":100000,"Volume":0.01,"TradeTimestampUtc":"2024-01-01T00:00:00Z"}]}}"#,
        ));

        let trades = router.cache().recent_trades("xbt", "aud").unwrap();
        assert_eq!(trades.trades.len(), 1);
        assert_eq!(trades.trades[0].volume, Volume::new(dec!(0.01)));
    }

    #[test]
    fn test_balance_fans_out() {
        let router = router();
        let outcome = router.route(&frame(
            r#"{"n":"balance","o":[{"CurrencyCode":"Xbt","AvailableBalance":1.5,"TotalBalance":2},{"CurrencyCode":"Aud","AvailableBalance":100}]}"#,
        ));

        assert_eq!(outcome, RouteOutcome::Stored(2));
        let cache = router.cache();
        assert_eq!(cache.balance("xbt").unwrap().total_balance, Some(dec!(2)));
        assert_eq!(cache.balance("aud").unwrap().available_balance, Some(dec!(100)));
        assert_eq!(cache.balances().len(), 2);
        assert_eq!(router.stats().stored(), 2);
    }

    #[test]
    fn test_single_balance_object() {
        let router = router();
        let outcome = router.route(&frame(
            r#"{"n":"balance","o":{"CurrencyCode":"Eth","AvailableBalance":3}}"#,
        ));
        assert_eq!(outcome, RouteOutcome::Stored(1));
        assert!(router.cache().balance("eth").is_some());
    }

    #[test]
    fn test_error_frame_does_not_touch_cache() {
        let router = router();
        router.route(&frame(
            r#"{"n":"ticker-xbtusd","o":{"PrimaryCurrencyCode":"Xbt","SecondaryCurrencyCode":"Usd","LastPrice":1}}"#,
        ));

        let outcome = router.route(&frame(
            r#"{"e":"error","n":"ticker-xbtusd","o":{"PrimaryCurrencyCode":"Xbt","SecondaryCurrencyCode":"Usd","LastPrice":2}}"#,
        ));

        assert_eq!(outcome, RouteOutcome::ServerError);
        assert_eq!(
            router.cache().ticker("xbt", "usd").unwrap().last_price,
            Some(Price::new(dec!(1)))
        );
        assert_eq!(router.stats().server_errors(), 1);
    }

    #[test]
    fn test_missing_channel_or_payload() {
        let router = router();
        assert_eq!(router.route(&frame(r#"{"o":{}}"#)), RouteOutcome::Incomplete);
        assert_eq!(
            router.route(&frame(r#"{"n":"ticker-xbtusd"}"#)),
            RouteOutcome::Incomplete
        );
        assert_eq!(
            router.route(&frame(r#"{"n":"ticker-xbtusd","o":null}"#)),
            RouteOutcome::Incomplete
        );
        assert!(router.cache().is_empty());
        assert_eq!(router.stats().dropped(), 3);
    }

    #[test]
    fn test_undecodable_payload() {
        let router = router();
        let outcome = router.route(&frame(r#"{"n":"ticker-xbtusd","o":{"LastPrice":"abc"}}"#));
        assert_eq!(outcome, RouteOutcome::Malformed);
        assert!(router.cache().is_empty());
    }

    #[test]
    fn test_unknown_channel_ignored() {
        let router = router();
        assert_eq!(
            router.route(&frame(r#"{"n":"orders","o":[{"OrderGuid":"x"}]}"#)),
            RouteOutcome::Ignored
        );
        assert_eq!(
            router.route(&frame(r#"{"n":"heartbeat-v2","o":{}}"#)),
            RouteOutcome::Ignored
        );
        assert!(router.cache().is_empty());
        assert_eq!(router.stats().ignored(), 2);
    }

    #[test]
    fn test_frame_handler_seam() {
        let cache = Arc::new(MarketDataCache::new());
        let handler: Arc<dyn FrameHandler> = Arc::new(MessageRouter::new(cache.clone()));
        handler.handle_frame(frame(
            r#"{"n":"ticker-xbtusd","o":{"PrimaryCurrencyCode":"Xbt","SecondaryCurrencyCode":"Usd"}}"#,
        ));
        assert!(cache.ticker("xbt", "usd").is_some());
    }
}
