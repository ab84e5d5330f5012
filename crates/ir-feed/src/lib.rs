//! Market data cache and inbound frame routing.
//!
//! The router plugs into the connection's read loop through
//! `ir_ws::FrameHandler` and writes decoded payloads into a
//! `MarketDataCache` that any number of readers can query concurrently.

pub mod cache;
pub mod error;
pub mod router;

pub use cache::{CacheKey, CachedPayload, MarketDataCache};
pub use error::{FeedError, FeedResult};
pub use router::{MessageRouter, RouteOutcome, RouterStats};
