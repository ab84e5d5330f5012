//! Typed payload records for market data frames.
//!
//! Field names follow the feed's PascalCase JSON. Anything the feed may omit
//! is an `Option` (or an empty `Vec` for level lists) so a sparse payload
//! parses instead of failing.

use crate::channel::{ChannelKind, InstrumentKey};
use crate::error::{CoreError, CoreResult};
use crate::{Price, Volume};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ticker snapshot for a currency pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ticker {
    pub primary_currency_code: String,
    pub secondary_currency_code: String,
    #[serde(default)]
    pub last_price: Option<Price>,
    #[serde(default)]
    pub best_bid: Option<Price>,
    #[serde(default)]
    pub best_ask: Option<Price>,
    #[serde(rename = "Volume24Hour", default)]
    pub volume_24h: Option<Volume>,
}

impl Ticker {
    /// Spread between best ask and best bid, when both are present.
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn instrument_key(&self) -> CoreResult<InstrumentKey> {
        InstrumentKey::new(&self.primary_currency_code, &self.secondary_currency_code)
    }
}

/// One price level of an order book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderBookLevel {
    pub price: Price,
    pub volume: Volume,
}

/// Order book snapshot. Levels keep the order the feed sent them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderBook {
    pub primary_currency_code: String,
    pub secondary_currency_code: String,
    #[serde(default)]
    pub buy_orders: Vec<OrderBookLevel>,
    #[serde(default)]
    pub sell_orders: Vec<OrderBookLevel>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<&OrderBookLevel> {
        self.buy_orders.first()
    }

    pub fn best_ask(&self) -> Option<&OrderBookLevel> {
        self.sell_orders.first()
    }

    pub fn instrument_key(&self) -> CoreResult<InstrumentKey> {
        InstrumentKey::new(&self.primary_currency_code, &self.secondary_currency_code)
    }
}

/// A single public trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Trade {
    pub price: Price,
    pub volume: Volume,
    #[serde(default)]
    pub trade_timestamp_utc: Option<String>,
}

/// Recent trades for a currency pair, most recent first as sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecentTrades {
    pub primary_currency_code: String,
    pub secondary_currency_code: String,
    #[serde(default)]
    pub trades: Vec<Trade>,
}

impl RecentTrades {
    pub fn instrument_key(&self) -> CoreResult<InstrumentKey> {
        InstrumentKey::new(&self.primary_currency_code, &self.secondary_currency_code)
    }
}

/// Account balance for one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Balance {
    pub currency_code: String,
    #[serde(default)]
    pub available_balance: Option<Decimal>,
    #[serde(default)]
    pub total_balance: Option<Decimal>,
}

impl Balance {
    pub fn instrument_key(&self) -> CoreResult<InstrumentKey> {
        InstrumentKey::currency(&self.currency_code)
    }
}

/// A decoded payload of any cached kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarketPayload {
    Ticker(Ticker),
    OrderBook(OrderBook),
    RecentTrades(RecentTrades),
    Balance(Balance),
}

impl MarketPayload {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Ticker(_) => ChannelKind::Ticker,
            Self::OrderBook(_) => ChannelKind::OrderBook,
            Self::RecentTrades(_) => ChannelKind::RecentTrades,
            Self::Balance(_) => ChannelKind::Balance,
        }
    }

    /// Decode a raw `o` value as a single payload of `kind`.
    ///
    /// `Balance` frames carry a list; use [`MarketPayload::parse_balances`].
    pub fn parse(kind: ChannelKind, value: &serde_json::Value) -> CoreResult<Self> {
        let wrap = |source| CoreError::Payload {
            kind: kind.prefix(),
            source,
        };
        match kind {
            ChannelKind::Ticker => Ticker::deserialize(value).map(Self::Ticker).map_err(wrap),
            ChannelKind::OrderBook => OrderBook::deserialize(value)
                .map(Self::OrderBook)
                .map_err(wrap),
            ChannelKind::RecentTrades => RecentTrades::deserialize(value)
                .map(Self::RecentTrades)
                .map_err(wrap),
            ChannelKind::Balance => Balance::deserialize(value).map(Self::Balance).map_err(wrap),
            other => Err(CoreError::InvalidChannel(other.prefix().to_string())),
        }
    }

    /// Decode a balance frame: a list of per-currency entries.
    pub fn parse_balances(value: &serde_json::Value) -> CoreResult<Vec<Balance>> {
        Vec::<Balance>::deserialize(value).map_err(|source| CoreError::Payload {
            kind: ChannelKind::Balance.prefix(),
            source,
        })
    }

    pub fn as_ticker(&self) -> Option<&Ticker> {
        match self {
            Self::Ticker(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_order_book(&self) -> Option<&OrderBook> {
        match self {
            Self::OrderBook(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_recent_trades(&self) -> Option<&RecentTrades> {
        match self {
            Self::RecentTrades(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_balance(&self) -> Option<&Balance> {
        match self {
            Self::Balance(b) => Some(b),
            _ => None,
        }
    }
}
