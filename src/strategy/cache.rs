//! Per-instance cache for strategy yield metrics.
//!
//! APY and TVL come from an external data API and change slowly; the
//! optimizer's binary search queries them once per candidate rate, so an
//! uncached strategy would hammer the API ~17 times per cycle. Each
//! strategy instance owns one cache slot per metric; there is no global
//! state.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a fetched metric stays fresh.
pub(crate) const METRIC_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct CachedValue {
    value: f64,
    expires_at: Instant,
}

impl CachedValue {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// A single cached metric with get-or-refresh access.
#[derive(Debug, Default)]
pub(crate) struct MetricCache {
    slot: Mutex<Option<CachedValue>>,
}

impl MetricCache {
    pub(crate) fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    /// Returns the cached value if present and fresh.
    pub(crate) fn get(&self) -> Option<f64> {
        let slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        };

        slot.filter(|entry| !entry.is_expired()).map(|entry| entry.value)
    }

    /// Stores a freshly fetched value with the default TTL.
    pub(crate) fn set(&self, value: f64) {
        let mut slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        };

        *slot = Some(CachedValue {
            value,
            expires_at: Instant::now() + METRIC_TTL,
        });
    }

    #[cfg(test)]
    fn force_expire(&self) {
        let mut slot = self.slot.lock().unwrap();
        if let Some(entry) = slot.as_mut() {
            entry.expires_at = Instant::now() - Duration::from_secs(1);
        }
    }
}
