//! Per-client session tracking.
//!
//! Remembers the last byte each client was successfully served, so the
//! throttle can tell a sequential read from a forward jump. Sessions live in
//! memory only; a restart forgets everyone.

use dashmap::DashMap;
use seekgate_common::ClientId;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Storage for client sessions, injected into the stream engine.
pub trait SessionStore: Send + Sync {
    /// Last byte offset delivered to `client`, or 0 for an unknown client.
    fn last_offset(&self, client: &ClientId) -> u64;

    /// Record that a transfer to `client` completed at byte `end` (inclusive).
    fn record_completion(&self, client: &ClientId, end: u64);

    /// Number of tracked sessions.
    fn len(&self) -> usize;

    /// Check if no sessions are tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired sessions, returning how many were removed.
    fn purge_expired(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct SessionEntry {
    last_offset: u64,
    updated_at: Instant,
}

/// Thread-safe in-memory session store.
///
/// Each client's entry is updated atomically through its DashMap shard, so
/// concurrent completions for the same client resolve to whichever finished
/// last. With no TTL the map grows with the number of distinct clients.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<ClientId, SessionEntry>,
    /// Sessions idle longer than this are forgotten (None = never).
    ttl: Option<Duration>,
}

impl InMemorySessionStore {
    /// Create a store whose sessions never expire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that forgets sessions idle for longer than `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Some(ttl),
        }
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.duration_since(entry.updated_at) > ttl)
    }
}

impl SessionStore for InMemorySessionStore {
    fn last_offset(&self, client: &ClientId) -> u64 {
        let now = Instant::now();
        self.sessions
            .get(client)
            .filter(|entry| !self.is_expired(entry, now))
            .map(|entry| entry.last_offset)
            .unwrap_or(0)
    }

    fn record_completion(&self, client: &ClientId, end: u64) {
        self.sessions.insert(
            client.clone(),
            SessionEntry {
                last_offset: end,
                updated_at: Instant::now(),
            },
        );
        tracing::trace!(client = %client, last_offset = end, "Session updated");
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }

    fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }

        let now = Instant::now();
        let mut removed_count = 0;
        self.sessions.retain(|client, entry| {
            if self.is_expired(entry, now) {
                tracing::trace!(client = %client, "Expired session removed");
                removed_count += 1;
                false
            } else {
                true
            }
        });

        if removed_count > 0 {
            tracing::debug!(removed = removed_count, "Cleaned up expired sessions");
        }

        removed_count
    }
}

/// Start a background task that periodically purges expired sessions.
///
/// The task exits when `cancel` fires.
pub fn start_cleanup_task(
    store: Arc<dyn SessionStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    store.purge_expired();
                }
                _ = cancel.cancelled() => break,
            }
        }
    })
}
