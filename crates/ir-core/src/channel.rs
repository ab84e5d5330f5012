//! Channel identifiers.
//!
//! Public channels are named `{kind}-{primary}{secondary}` (for example
//! `ticker-xbtusd`); private channels carry a bare name such as `balance`.
//! Names are lowercased at construction so that `Xbt`/`XBT`/`xbt` all refer
//! to the same subscription.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel kind, derived from the channel name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Ticker,
    OrderBook,
    RecentTrades,
    /// Account balances (private).
    Balance,
    /// Account order updates (private).
    Orders,
    /// Account fills (private).
    Trades,
    /// Anything the server sends that this client does not model.
    Unknown,
}

impl ChannelKind {
    /// Wire prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::OrderBook => "orderbook",
            Self::RecentTrades => "recenttrades",
            Self::Balance => "balance",
            Self::Orders => "orders",
            Self::Trades => "trades",
            Self::Unknown => "unknown",
        }
    }

    /// Classify a channel name by prefix.
    ///
    /// Longer prefixes are matched first: `orderbook-*` is not `orders`,
    /// and `recenttrades-*` is not `trades`.
    pub fn from_channel(channel: &str) -> Self {
        let lower = channel.to_ascii_lowercase();
        if lower.starts_with("ticker") {
            Self::Ticker
        } else if lower.starts_with("orderbook") {
            Self::OrderBook
        } else if lower.starts_with("recenttrades") {
            Self::RecentTrades
        } else if lower.starts_with("balance") {
            Self::Balance
        } else if lower.starts_with("orders") {
            Self::Orders
        } else if lower.starts_with("trades") {
            Self::Trades
        } else {
            Self::Unknown
        }
    }

    /// Private channels require a signed subscribe.
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Balance | Self::Orders | Self::Trades)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Lowercase channel name as sent in the `n` field of a frame.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelName(String);

impl ChannelName {
    /// Build a channel name from a raw string, lowercasing it.
    pub fn new(name: &str) -> CoreResult<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidChannel(name.to_string()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Public per-pair channel, e.g. `ticker-xbtusd`.
    pub fn public(kind: ChannelKind, primary: &str, secondary: &str) -> CoreResult<Self> {
        let key = InstrumentKey::new(primary, secondary)?;
        Self::new(&format!("{}-{}", kind.prefix(), key))
    }

    /// Bare private channel, e.g. `balance`.
    pub fn private(kind: ChannelKind) -> Self {
        Self(kind.prefix().to_string())
    }

    pub fn ticker(primary: &str, secondary: &str) -> CoreResult<Self> {
        Self::public(ChannelKind::Ticker, primary, secondary)
    }

    pub fn order_book(primary: &str, secondary: &str) -> CoreResult<Self> {
        Self::public(ChannelKind::OrderBook, primary, secondary)
    }

    pub fn recent_trades(primary: &str, secondary: &str) -> CoreResult<Self> {
        Self::public(ChannelKind::RecentTrades, primary, secondary)
    }

    pub fn balance() -> Self {
        Self::private(ChannelKind::Balance)
    }

    pub fn kind(&self) -> ChannelKind {
        ChannelKind::from_channel(&self.0)
    }

    pub fn is_private(&self) -> bool {
        self.kind().is_private()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Cache key for an instrument: `lowercase(primary) + lowercase(secondary)`,
/// or a single lowercase currency code for balances.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentKey(String);

impl InstrumentKey {
    /// Key for a currency pair.
    pub fn new(primary: &str, secondary: &str) -> CoreResult<Self> {
        let primary = normalize_code(primary)?;
        let secondary = normalize_code(secondary)?;
        Ok(Self(format!("{primary}{secondary}")))
    }

    /// Key for a single currency (balance entries).
    pub fn currency(code: &str) -> CoreResult<Self> {
        Ok(Self(normalize_code(code)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_code(code: &str) -> CoreResult<String> {
    let trimmed = code.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CoreError::InvalidCurrency(code.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}
