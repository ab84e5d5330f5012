//! Latest-value market data cache.
//!
//! One entry per `(kind, instrument)` key. Every write replaces the whole
//! entry, so a reader sees either the previous payload or the new one,
//! never a mix. Reads never wait on the network.

use crate::error::{FeedError, FeedResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ir_core::{
    Balance, ChannelKind, InstrumentKey, MarketPayload, OrderBook, RecentTrades, Ticker,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache key.
pub type CacheKey = (ChannelKind, InstrumentKey);

/// A cached payload with its arrival time.
#[derive(Debug, Clone)]
pub struct CachedPayload {
    pub payload: Arc<MarketPayload>,
    pub received_at: DateTime<Utc>,
}

/// Market data cache.
pub struct MarketDataCache {
    entries: DashMap<CacheKey, CachedPayload>,
}

impl MarketDataCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store `payload` under `(kind, primary, secondary)`.
    pub fn put(
        &self,
        kind: ChannelKind,
        primary: &str,
        secondary: &str,
        payload: MarketPayload,
    ) -> FeedResult<()> {
        ensure_kind(kind, &payload)?;
        let key = InstrumentKey::new(primary, secondary)?;
        self.insert(kind, key, payload);
        Ok(())
    }

    /// Store a pair payload under the key its own currency codes give.
    pub fn put_payload(&self, payload: MarketPayload) -> FeedResult<()> {
        let key = match &payload {
            MarketPayload::Ticker(t) => t.instrument_key()?,
            MarketPayload::OrderBook(b) => b.instrument_key()?,
            MarketPayload::RecentTrades(t) => t.instrument_key()?,
            MarketPayload::Balance(b) => b.instrument_key()?,
        };
        self.insert(payload.kind(), key, payload);
        Ok(())
    }

    /// Fan a balance list out into one entry per currency.
    ///
    /// Entries with an unusable currency code are skipped. Returns how many
    /// were stored.
    pub fn put_balances(&self, balances: Vec<Balance>) -> usize {
        let mut stored = 0;
        for balance in balances {
            match balance.instrument_key() {
                Ok(key) => {
                    self.insert(ChannelKind::Balance, key, MarketPayload::Balance(balance));
                    stored += 1;
                }
                Err(e) => warn!(error = %e, "Skipping balance entry"),
            }
        }
        stored
    }

    fn insert(&self, kind: ChannelKind, key: InstrumentKey, payload: MarketPayload) {
        debug!(kind = kind.prefix(), key = %key, "Cache updated");
        self.entries.insert(
            (kind, key),
            CachedPayload {
                payload: Arc::new(payload),
                received_at: Utc::now(),
            },
        );
    }

    /// Latest payload for `(kind, primary, secondary)`, if any has arrived.
    pub fn get(
        &self,
        kind: ChannelKind,
        primary: &str,
        secondary: &str,
    ) -> Option<Arc<MarketPayload>> {
        let key = InstrumentKey::new(primary, secondary).ok()?;
        self.get_by_key(kind, &key).map(|c| c.payload)
    }

    pub fn get_by_key(&self, kind: ChannelKind, key: &InstrumentKey) -> Option<CachedPayload> {
        self.entries
            .get(&(kind, key.clone()))
            .map(|entry| entry.value().clone())
    }

    pub fn ticker(&self, primary: &str, secondary: &str) -> Option<Ticker> {
        self.get(ChannelKind::Ticker, primary, secondary)
            .and_then(|p| p.as_ticker().cloned())
    }

    pub fn order_book(&self, primary: &str, secondary: &str) -> Option<OrderBook> {
        self.get(ChannelKind::OrderBook, primary, secondary)
            .and_then(|p| p.as_order_book().cloned())
    }

    pub fn recent_trades(&self, primary: &str, secondary: &str) -> Option<RecentTrades> {
        self.get(ChannelKind::RecentTrades, primary, secondary)
            .and_then(|p| p.as_recent_trades().cloned())
    }

    /// Cached balance for one currency.
    pub fn balance(&self, currency: &str) -> Option<Balance> {
        let key = InstrumentKey::currency(currency).ok()?;
        self.get_by_key(ChannelKind::Balance, &key)
            .and_then(|c| c.payload.as_balance().cloned())
    }

    /// All cached balances, ordered by currency code.
    pub fn balances(&self) -> Vec<Balance> {
        let mut balances: Vec<(InstrumentKey, Balance)> = self
            .entries
            .iter()
            .filter(|entry| entry.key().0 == ChannelKind::Balance)
            .filter_map(|entry| {
                entry
                    .value()
                    .payload
                    .as_balance()
                    .map(|b| (entry.key().1.clone(), b.clone()))
            })
            .collect();
        balances.sort_by(|a, b| a.0.cmp(&b.0));
        balances.into_iter().map(|(_, b)| b).collect()
    }

    /// When the entry for `(kind, primary, secondary)` was last written.
    pub fn received_at(
        &self,
        kind: ChannelKind,
        primary: &str,
        secondary: &str,
    ) -> Option<DateTime<Utc>> {
        let key = InstrumentKey::new(primary, secondary).ok()?;
        self.get_by_key(kind, &key).map(|c| c.received_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for MarketDataCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject a payload whose kind does not match the channel it arrived on.
pub(crate) fn ensure_kind(expected: ChannelKind, payload: &MarketPayload) -> FeedResult<()> {
    if payload.kind() == expected {
        Ok(())
    } else {
        Err(FeedError::Unsupported(expected.prefix()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir_core::{OrderBookLevel, Price, Volume};
    use rust_decimal_macros::dec;

    fn ticker(primary: &str, secondary: &str, last: rust_decimal::Decimal) -> Ticker {
        Ticker {
            primary_currency_code: primary.to_string(),
            secondary_currency_code: secondary.to_string(),
            last_price: Some(Price::new(last)),
            best_bid: Some(Price::new(last - dec!(1))),
            best_ask: Some(Price::new(last + dec!(1))),
            volume_24h: None,
        }
    }

    fn balance(code: &str, available: rust_decimal::Decimal) -> Balance {
        Balance {
            currency_code: code.to_string(),
            available_balance: Some(available),
            total_balance: Some(available),
        }
    }

    #[test]
    fn test_get_absent() {
        let cache = MarketDataCache::new();
        assert!(cache.ticker("xbt", "usd").is_none());
        assert!(cache.get(ChannelKind::OrderBook, "xbt", "usd").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_key_is_case_insensitive() {
        let cache = MarketDataCache::new();
        cache
            .put_payload(MarketPayload::Ticker(ticker("Xbt", "Usd", dec!(50000))))
            .unwrap();

        for (p, s) in [("xbt", "usd"), ("XBT", "USD"), ("Xbt", "uSd")] {
            let t = cache.ticker(p, s).unwrap();
            assert_eq!(t.last_price, Some(Price::new(dec!(50000))));
        }
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let cache = MarketDataCache::new();
        cache
            .put_payload(MarketPayload::Ticker(ticker("xbt", "usd", dec!(1))))
            .unwrap();
        let book = OrderBook {
            primary_currency_code: "xbt".to_string(),
            secondary_currency_code: "usd".to_string(),
            buy_orders: vec![],
            sell_orders: vec![],
        };
        cache
            .put(ChannelKind::OrderBook, "xbt", "usd", MarketPayload::OrderBook(book))
            .unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.ticker("xbt", "usd").is_some());
        assert!(cache.order_book("xbt", "usd").is_some());
        assert!(cache.recent_trades("xbt", "usd").is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let cache = MarketDataCache::new();
        cache
            .put_payload(MarketPayload::Ticker(ticker("xbt", "usd", dec!(1))))
            .unwrap();
        let first = cache.received_at(ChannelKind::Ticker, "xbt", "usd").unwrap();
        cache
            .put_payload(MarketPayload::Ticker(ticker("xbt", "usd", dec!(2))))
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.ticker("xbt", "usd").unwrap().last_price,
            Some(Price::new(dec!(2)))
        );
        assert!(cache.received_at(ChannelKind::Ticker, "xbt", "usd").unwrap() >= first);
    }

    #[test]
    fn test_order_book_levels_keep_order() {
        let cache = MarketDataCache::new();
        let level = |p, v| OrderBookLevel {
            price: Price::new(p),
            volume: Volume::new(v),
        };
        let book = OrderBook {
            primary_currency_code: "Eth".to_string(),
            secondary_currency_code: "Aud".to_string(),
            buy_orders: vec![level(dec!(3000), dec!(10)), level(dec!(2990), dec!(5))],
            sell_orders: vec![level(dec!(3010), dec!(2))],
        };
        cache.put_payload(MarketPayload::OrderBook(book)).unwrap();

        let cached = cache.order_book("eth", "aud").unwrap();
        assert_eq!(cached.best_bid().unwrap().price, Price::new(dec!(3000)));
        assert_eq!(cached.buy_orders[1].volume, Volume::new(dec!(5)));
    }

    #[test]
    fn test_balance_fan_out() {
        let cache = MarketDataCache::new();
        let stored = cache.put_balances(vec![
            balance("Xbt", dec!(1.5)),
            balance("Aud", dec!(1000)),
            balance("", dec!(1)),
        ]);

        assert_eq!(stored, 2);
        assert_eq!(cache.balance("xbt").unwrap().available_balance, Some(dec!(1.5)));
        assert_eq!(cache.balance("AUD").unwrap().available_balance, Some(dec!(1000)));

        let codes: Vec<_> = cache
            .balances()
            .into_iter()
            .map(|b| b.currency_code)
            .collect();
        assert_eq!(codes, vec!["Aud".to_string(), "Xbt".to_string()]);
    }

    #[test]
    fn test_invalid_currency_rejected() {
        let cache = MarketDataCache::new();
        let result = cache.put_payload(MarketPayload::Ticker(ticker("x-b", "usd", dec!(1))));
        assert!(matches!(result, Err(FeedError::Core(_))));
        assert!(cache.get(ChannelKind::Ticker, "x-b", "usd").is_none());
    }

    #[test]
    fn test_clear() {
        let cache = MarketDataCache::new();
        cache.put_balances(vec![balance("xbt", dec!(1))]);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.balances().is_empty());
    }

    #[test]
    fn test_ensure_kind() {
        let payload = MarketPayload::Ticker(ticker("xbt", "usd", dec!(1)));
        assert!(ensure_kind(ChannelKind::Ticker, &payload).is_ok());
        assert!(matches!(
            ensure_kind(ChannelKind::OrderBook, &payload),
            Err(FeedError::Unsupported("orderbook"))
        ));
    }

    #[test]
    fn test_concurrent_readers_see_whole_payloads() {
        let cache = Arc::new(MarketDataCache::new());
        cache
            .put_payload(MarketPayload::Ticker(ticker("xbt", "usd", dec!(0))))
            .unwrap();

        let writer = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for i in 1..=2000 {
                    let t = ticker("xbt", "usd", rust_decimal::Decimal::from(i));
                    cache.put_payload(MarketPayload::Ticker(t)).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..2000 {
                        let t = cache.ticker("xbt", "usd").unwrap();
                        let last = t.last_price.unwrap().inner();
                        assert_eq!(t.best_bid.unwrap().inner(), last - dec!(1));
                        assert_eq!(t.best_ask.unwrap().inner(), last + dec!(1));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(
            cache.ticker("xbt", "usd").unwrap().last_price,
            Some(Price::new(dec!(2000)))
        );
    }
}
