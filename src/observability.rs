//! Counters and tracing bootstrap

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Process-wide request counters
#[derive(Debug, Default)]
pub struct Metrics {
    subscriptions_served: AtomicU64,
    sources_failed: AtomicU64,
    links_dropped: AtomicU64,
    conversions_delegated: AtomicU64,
    callback_short_circuits: AtomicU64,
    synthesis_fallbacks: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &AtomicU64, name: &'static str, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
        tracing::debug!(counter = name, by, "Metric incremented");
    }

    pub fn subscription_served(&self) {
        Self::bump(&self.subscriptions_served, "subscriptions_served", 1);
    }

    pub fn source_failed(&self) {
        Self::bump(&self.sources_failed, "sources_failed", 1);
    }

    pub fn links_dropped(&self, count: u64) {
        if count > 0 {
            Self::bump(&self.links_dropped, "links_dropped", count);
        }
    }

    pub fn conversion_delegated(&self) {
        Self::bump(&self.conversions_delegated, "conversions_delegated", 1);
    }

    pub fn callback_short_circuit(&self) {
        Self::bump(&self.callback_short_circuits, "callback_short_circuits", 1);
    }

    pub fn synthesis_fallback(&self) {
        Self::bump(&self.synthesis_fallbacks, "synthesis_fallbacks", 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            subscriptions_served: self.subscriptions_served.load(Ordering::Relaxed),
            sources_failed: self.sources_failed.load(Ordering::Relaxed),
            links_dropped: self.links_dropped.load(Ordering::Relaxed),
            conversions_delegated: self.conversions_delegated.load(Ordering::Relaxed),
            callback_short_circuits: self.callback_short_circuits.load(Ordering::Relaxed),
            synthesis_fallbacks: self.synthesis_fallbacks.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub subscriptions_served: u64,
    pub sources_failed: u64,
    pub links_dropped: u64,
    pub conversions_delegated: u64,
    pub callback_short_circuits: u64,
    pub synthesis_fallbacks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.subscription_served();
        metrics.links_dropped(3);
        metrics.links_dropped(0);
        metrics.source_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.subscriptions_served, 1);
        assert_eq!(snapshot.links_dropped, 3);
        assert_eq!(snapshot.sources_failed, 1);
        assert_eq!(snapshot.conversions_delegated, 0);
    }
}
