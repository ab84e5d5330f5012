//! Integration tests for ir-client.
//!
//! These tests run the client against an in-process WebSocket server:
//! - Connection lifecycle and reconnection
//! - Subscription de-duplication and replay
//! - Inbound routing into the cache
//! - Expiry sweeping

#[macro_use]
pub mod common;
