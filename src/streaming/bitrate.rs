//! Bitrate estimation.
//!
//! The throttle needs bytes-per-second to convert a byte jump into seconds of
//! content. Where that number comes from (config, a probe, a sidecar file) is
//! behind [`BitrateEstimator`]; the engine only ever sees the
//! [`FallbackEstimator`] wrapper, which always produces a usable value.

use std::collections::HashMap;
use std::sync::Arc;

use super::resource::ResourceHandle;

/// Default estimate when nothing better is known (~4 Mbit/s).
pub const DEFAULT_FALLBACK_BYTES_PER_SECOND: f64 = 500_000.0;

/// Source of bytes-per-second estimates.
pub trait BitrateEstimator: Send + Sync {
    /// Estimated bytes per second of playback, if known.
    fn bytes_per_second(&self, resource: &ResourceHandle) -> Option<f64>;
}

/// Per-resource estimates from configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredBitrates {
    by_name: HashMap<String, f64>,
}

impl ConfiguredBitrates {
    pub fn new(by_name: HashMap<String, f64>) -> Self {
        Self { by_name }
    }
}

impl BitrateEstimator for ConfiguredBitrates {
    fn bytes_per_second(&self, resource: &ResourceHandle) -> Option<f64> {
        self.by_name.get(&resource.name).copied()
    }
}

/// Wraps an estimator and substitutes a fixed value for unknown or unusable
/// estimates, so the result is always finite and strictly positive.
#[derive(Clone)]
pub struct FallbackEstimator {
    inner: Arc<dyn BitrateEstimator>,
    fallback: f64,
}

impl FallbackEstimator {
    /// `fallback` itself must be finite and positive; anything else is
    /// replaced with [`DEFAULT_FALLBACK_BYTES_PER_SECOND`].
    pub fn new(inner: Arc<dyn BitrateEstimator>, fallback: f64) -> Self {
        let fallback = if is_usable(fallback) {
            fallback
        } else {
            DEFAULT_FALLBACK_BYTES_PER_SECOND
        };
        Self { inner, fallback }
    }

    /// Estimator that always answers with `fallback`.
    pub fn fixed(fallback: f64) -> Self {
        Self::new(Arc::new(ConfiguredBitrates::default()), fallback)
    }

    pub fn estimate(&self, resource: &ResourceHandle) -> f64 {
        match self.inner.bytes_per_second(resource) {
            Some(bps) if is_usable(bps) => bps,
            Some(bps) => {
                tracing::debug!(
                    resource = %resource.name,
                    bytes_per_second = bps,
                    "Ignoring unusable bitrate estimate"
                );
                self.fallback
            }
            None => self.fallback,
        }
    }
}

fn is_usable(bps: f64) -> bool {
    bps.is_finite() && bps > 0.0
}
