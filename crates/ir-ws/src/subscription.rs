//! Subscription registry for WebSocket channels.
//!
//! Tracks which channels the server should currently have active and when
//! each was last requested. An entry exists iff the client believes the
//! server has that channel active (or a send for it is in flight).
//!
//! Every decision is a two-step protocol so concurrent callers cannot both
//! send for the same channel:
//! 1. `request_*` decides `Send`/`Skip` under the lock and reserves the entry
//! 2. `confirm_*` commits after the frame was written, `abort_*` rolls back
//!
//! Re-sending a stale channel the server still has never drops the entry: a
//! failed re-send restores it as it was.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use ir_core::ChannelName;

/// Outcome of a subscribe/unsubscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeAction {
    /// Caller must write the frame, then confirm or abort.
    Send,
    /// Nothing to send.
    Skip,
}

/// Per-channel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Subscribe decided, frame not yet written.
    Pending,
    /// Server has the channel.
    Active,
    /// Unsubscribe decided, frame not yet written.
    Unsubscribing,
    /// Server has the channel; a fresh subscribe is in flight.
    Resubscribing,
}

/// A tracked channel subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionEntry {
    pub channel: ChannelName,
    pub state: EntryState,
    pub last_refreshed: Instant,
}

/// Subscription registry.
pub struct SubscriptionRegistry {
    /// Redundant-subscribe window.
    ttl: Duration,
    /// Ordered by channel name so sweeps and replays are deterministic.
    entries: Mutex<BTreeMap<ChannelName, SubscriptionEntry>>,
}

impl SubscriptionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Decide whether a subscribe must be sent.
    pub fn request_subscribe(&self, channel: &ChannelName) -> SubscribeAction {
        self.request_subscribe_at(channel, Instant::now())
    }

    /// Decide whether a subscribe must be sent, as of `now`.
    ///
    /// An active entry younger than the TTL is refreshed and skipped. An
    /// in-flight subscribe is skipped. An unknown channel reserves a pending
    /// entry; a stale or unsubscribing one is marked `Resubscribing` with its
    /// timestamp kept for rollback. Both return `Send`.
    pub fn request_subscribe_at(&self, channel: &ChannelName, now: Instant) -> SubscribeAction {
        let mut entries = self.entries.lock();

        let Some(entry) = entries.get_mut(channel) else {
            entries.insert(
                channel.clone(),
                SubscriptionEntry {
                    channel: channel.clone(),
                    state: EntryState::Pending,
                    last_refreshed: now,
                },
            );
            return SubscribeAction::Send;
        };

        match entry.state {
            EntryState::Pending | EntryState::Resubscribing => {
                debug!(%channel, "Subscribe already in flight");
                SubscribeAction::Skip
            }
            EntryState::Active
                if now.saturating_duration_since(entry.last_refreshed) < self.ttl =>
            {
                entry.last_refreshed = now;
                debug!(%channel, "Subscription refreshed");
                SubscribeAction::Skip
            }
            EntryState::Active | EntryState::Unsubscribing => {
                entry.state = EntryState::Resubscribing;
                debug!(%channel, "Resubscribing");
                SubscribeAction::Send
            }
        }
    }

    /// Commit a subscribe after the frame was written.
    pub fn confirm_subscribe(&self, channel: &ChannelName) {
        self.confirm_subscribe_at(channel, Instant::now());
    }

    pub fn confirm_subscribe_at(&self, channel: &ChannelName, now: Instant) {
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(channel.clone())
            .or_insert_with(|| SubscriptionEntry {
                channel: channel.clone(),
                state: EntryState::Pending,
                last_refreshed: now,
            });
        entry.state = EntryState::Active;
        entry.last_refreshed = now;
        info!(%channel, "Subscribed");
    }

    /// Roll back a subscribe whose frame was not written.
    ///
    /// A new channel is forgotten; a re-send goes back to `Active` with its
    /// previous timestamp, since the server still has it.
    pub fn abort_subscribe(&self, channel: &ChannelName) {
        let mut entries = self.entries.lock();
        match entries.get(channel).map(|e| e.state) {
            Some(EntryState::Pending) => {
                entries.remove(channel);
                debug!(%channel, "Subscribe aborted");
            }
            Some(EntryState::Resubscribing) => {
                if let Some(entry) = entries.get_mut(channel) {
                    entry.state = EntryState::Active;
                }
                debug!(%channel, "Resubscribe aborted, keeping previous entry");
            }
            _ => {}
        }
    }

    /// Decide whether an unsubscribe must be sent.
    ///
    /// Only an active entry yields `Send`; it is marked `Unsubscribing` until
    /// confirmed or aborted.
    pub fn request_unsubscribe(&self, channel: &ChannelName) -> SubscribeAction {
        let mut entries = self.entries.lock();
        match entries.get_mut(channel) {
            Some(entry) if entry.state == EntryState::Active => {
                entry.state = EntryState::Unsubscribing;
                SubscribeAction::Send
            }
            _ => SubscribeAction::Skip,
        }
    }

    /// Remove the entry after the unsubscribe frame was written.
    ///
    /// A subscribe that raced in after the unsubscribe decision keeps its entry.
    pub fn confirm_unsubscribe(&self, channel: &ChannelName) {
        let mut entries = self.entries.lock();
        if entries
            .get(channel)
            .is_some_and(|e| e.state == EntryState::Unsubscribing)
        {
            entries.remove(channel);
            info!(%channel, "Unsubscribed");
        }
    }

    /// Restore an entry whose unsubscribe frame was not written.
    pub fn abort_unsubscribe(&self, channel: &ChannelName) {
        if let Some(entry) = self.entries.lock().get_mut(channel) {
            if entry.state == EntryState::Unsubscribing {
                entry.state = EntryState::Active;
            }
        }
    }

    /// Active channels whose last refresh is older than `ttl` as of `now`.
    ///
    /// Computed over a snapshot; the registry is not mutated.
    pub fn list_expired(&self, now: Instant, ttl: Duration) -> Vec<ChannelName> {
        self.entries
            .lock()
            .values()
            .filter(|e| e.state == EntryState::Active)
            .filter(|e| now.saturating_duration_since(e.last_refreshed) > ttl)
            .map(|e| e.channel.clone())
            .collect()
    }

    /// Channels the server should have active, for replay after reconnect.
    pub fn list_active(&self) -> Vec<ChannelName> {
        self.entries
            .lock()
            .values()
            .filter(|e| {
                matches!(
                    e.state,
                    EntryState::Active | EntryState::Unsubscribing | EntryState::Resubscribing
                )
            })
            .map(|e| e.channel.clone())
            .collect()
    }

    pub fn last_refreshed(&self, channel: &ChannelName) -> Option<Instant> {
        self.entries.lock().get(channel).map(|e| e.last_refreshed)
    }

    pub fn state(&self, channel: &ChannelName) -> Option<EntryState> {
        self.entries.lock().get(channel).map(|e| e.state)
    }

    pub fn is_active(&self, channel: &ChannelName) -> bool {
        self.state(channel) == Some(EntryState::Active)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry (client stop).
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        info!(count, "Subscription registry cleared");
    }
}
