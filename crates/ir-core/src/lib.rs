//! Core domain types for the Independent Reserve market data stream.
//!
//! This crate provides the vocabulary shared by the transport, cache and
//! client crates:
//! - `ChannelName`, `ChannelKind`: subscription channel identifiers
//! - `InstrumentKey`: lowercase cache key for a currency pair or currency
//! - `Price`, `Volume`: precision-safe numeric types
//! - `Ticker`, `OrderBook`, `RecentTrades`, `Balance`: typed payload records

pub mod channel;
pub mod decimal;
pub mod error;
pub mod types;

pub use channel::{ChannelKind, ChannelName, InstrumentKey};
pub use decimal::{Price, Volume};
pub use error::{CoreError, CoreResult};
pub use types::{Balance, MarketPayload, OrderBook, OrderBookLevel, RecentTrades, Ticker, Trade};
