//! Governor-based per-client rate limiting.
//!
//! Keyed by [`ClientId`], so each client gets its own quota. Disabled when the
//! configured quota is zero.

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use seekgate_common::ClientId;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A shared, per-client rate limiter instance.
pub type SharedLimiter =
    Arc<RateLimiter<ClientId, DefaultKeyedStateStore<ClientId>, DefaultClock>>;

/// Create a limiter allowing `requests_per_minute` per client, or `None` when
/// the quota is zero.
pub fn create_limiter(requests_per_minute: u32) -> Option<SharedLimiter> {
    let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute)?);
    Some(Arc::new(RateLimiter::keyed(quota)))
}

/// Consume one request from `client`'s quota. Returns `false` when exhausted.
pub fn allow(limiter: &SharedLimiter, client: &ClientId) -> bool {
    limiter.check_key(client).is_ok()
}

/// Forget clients whose quota has fully replenished.
pub fn prune(limiter: &SharedLimiter) {
    limiter.retain_recent();
    limiter.shrink_to_fit();
}

/// Periodically prune `limiter` until `cancel` fires.
pub fn start_cleanup_task(
    limiter: SharedLimiter,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    prune(&limiter);
                    tracing::trace!(clients = limiter.len(), "Pruned rate limiter state");
                }
                _ = cancel.cancelled() => break,
            }
        }
    })
}
