//! Seek-throttle policy.
//!
//! Forward jumps are charged a delay proportional to the amount of content
//! skipped, measured in seconds of playback at the resource's bitrate.
//! Rewinds and sequential reads are free.

use std::time::Duration;

/// Default delay charged per second of content skipped.
pub const DEFAULT_DELAY_MS_PER_SECOND_JUMP: u64 = 500;

/// Default upper bound on any single delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Delay parameters. Cheap to copy; the engine holds one per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    pub delay_ms_per_second_jump: u64,
    pub max_delay_ms: u64,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            delay_ms_per_second_jump: DEFAULT_DELAY_MS_PER_SECOND_JUMP,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl ThrottlePolicy {
    pub fn new(delay_ms_per_second_jump: u64, max_delay_ms: u64) -> Self {
        Self {
            delay_ms_per_second_jump,
            max_delay_ms,
        }
    }

    /// Milliseconds to wait before serving `requested_start` to a client
    /// whose previous transfer ended at `last_offset`.
    ///
    /// Non-finite inputs and non-positive bitrates yield 0: bad metadata must
    /// never stall playback.
    pub fn compute_delay_ms(&self, last_offset: f64, requested_start: f64, bitrate: f64) -> u64 {
        if !last_offset.is_finite()
            || !requested_start.is_finite()
            || !bitrate.is_finite()
            || bitrate <= 0.0
        {
            return 0;
        }

        let byte_jump = (requested_start - last_offset).max(0.0);
        let seconds_jump = byte_jump / bitrate;
        let delay = (seconds_jump * self.delay_ms_per_second_jump as f64).ceil();

        // `as` saturates for floats, so huge jumps clamp rather than wrap.
        (delay as u64).min(self.max_delay_ms)
    }

    /// [`compute_delay_ms`](Self::compute_delay_ms) as a [`Duration`].
    pub fn compute_delay(&self, last_offset: f64, requested_start: f64, bitrate: f64) -> Duration {
        Duration::from_millis(self.compute_delay_ms(last_offset, requested_start, bitrate))
    }
}
