//! Observability hooks for table cache operations.
//!
//! The counters inside each `CacheStore` are the source of truth for hit and
//! miss statistics. `CacheMetrics` exists to mirror those events into an
//! external monitoring system and to surface the self-healing paths (stale
//! entries, store resets) that never reach the caller.
//!
//! ```ignore
//! use table_cache::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, cache: &str, _duration: Duration) {
//!         // counter!("table_cache_hits", "cache" => cache).inc();
//!     }
//!     // ... implement other methods
//! }
//!
//! // let cache = TableCache::new().with_metrics(Arc::new(PrometheusMetrics));
//! ```
//!
//! Default trait methods log via the `log` crate. `TableCache` uses
//! `NoOpMetrics` unless told otherwise.

use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, cache: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", cache, duration);
    }

    /// Record a cache miss, including the fallback call.
    fn record_miss(&self, cache: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", cache, duration);
    }

    /// Record a cached entity that failed the validity check.
    fn record_stale(&self, cache: &str) {
        debug!("Cache STALE: {}", cache);
    }

    /// Record a store cleared because its indices disagreed.
    fn record_reset(&self, cache: &str) {
        warn!("Cache RESET: {}", cache);
    }

    /// Record a bulk warm.
    fn record_warm(&self, cache: &str, count: usize) {
        debug!("Cache WARM: {} with {} entities", cache, count);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _cache: &str, _duration: Duration) {}
    fn record_miss(&self, _cache: &str, _duration: Duration) {}
    fn record_stale(&self, _cache: &str) {}
    fn record_reset(&self, _cache: &str) {}
    fn record_warm(&self, _cache: &str, _count: usize) {}
}

/// Metrics implementation that logs every event (the trait defaults).
#[derive(Clone, Default)]
pub struct LogMetrics;

impl CacheMetrics for LogMetrics {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_metrics() {
        let metrics = NoOpMetrics;
        metrics.record_hit("library", Duration::from_secs(1));
        metrics.record_miss("library", Duration::from_secs(2));
        metrics.record_stale("library");
        metrics.record_reset("library");
        metrics.record_warm("library", 3);
    }

    #[test]
    fn test_log_metrics_defaults() {
        let _ = env_logger::builder().is_test(true).try_init();

        let metrics = LogMetrics;
        metrics.record_hit("library", Duration::from_millis(1));
        metrics.record_reset("library");
    }
}
