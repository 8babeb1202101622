//! Resolver metrics collection and reporting.

use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Cached,
    Realtime,
    Direct,
    Passthrough,
    Unavailable,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Cached => "cached",
            QueryMode::Realtime => "realtime",
            QueryMode::Direct => "direct",
            QueryMode::Passthrough => "passthrough",
            QueryMode::Unavailable => "unavailable",
        }
    }
}

/// Counters for the request resolvers.
#[derive(Debug)]
pub struct ResolverMetrics {
    pub requests: AtomicU64,
    pub invalid_requests: AtomicU64,
    pub cached: AtomicU64,
    pub realtime: AtomicU64,
    pub direct: AtomicU64,
    pub passthrough: AtomicU64,
    pub unavailable: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub registry_errors: AtomicU64,
    pub render_errors: AtomicU64,
    pub render_timeouts: AtomicU64,

    resolution_times: RwLock<TimingStats>,
    start_time: Instant,
}

#[derive(Debug, Default)]
struct TimingStats {
    count: u64,
    total_us: u64,
    min_us: u64,
    max_us: u64,
    last_us: u64,
}

impl TimingStats {
    fn record(&mut self, duration_us: u64) {
        self.count += 1;
        self.total_us += duration_us;
        self.last_us = duration_us;
        if self.min_us == 0 || duration_us < self.min_us {
            self.min_us = duration_us;
        }
        if duration_us > self.max_us {
            self.max_us = duration_us;
        }
    }

    fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.total_us as f64 / self.count as f64) / 1000.0
        }
    }
}

/// JSON view served by `/api/metrics`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub requests: u64,
    pub invalid_requests: u64,
    pub modes: ModeCounts,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub registry_errors: u64,
    pub render_errors: u64,
    pub render_timeouts: u64,
    pub resolution_avg_ms: f64,
    pub resolution_min_ms: f64,
    pub resolution_max_ms: f64,
    pub resolution_last_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModeCounts {
    pub cached: u64,
    pub realtime: u64,
    pub direct: u64,
    pub passthrough: u64,
    pub unavailable: u64,
}

impl Default for ResolverMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverMetrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            invalid_requests: AtomicU64::new(0),
            cached: AtomicU64::new(0),
            realtime: AtomicU64::new(0),
            direct: AtomicU64::new(0),
            passthrough: AtomicU64::new(0),
            unavailable: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            registry_errors: AtomicU64::new(0),
            render_errors: AtomicU64::new(0),
            render_timeouts: AtomicU64::new(0),
            resolution_times: RwLock::new(TimingStats::default()),
            start_time: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid(&self) {
        self.invalid_requests.fetch_add(1, Ordering::Relaxed);
        counter!("directory_invalid_requests_total").increment(1);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        counter!("directory_cache_hits_total").increment(1);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        counter!("directory_cache_misses_total").increment(1);
    }

    pub fn record_registry_error(&self) {
        self.registry_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_render_error(&self) {
        self.render_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_render_timeout(&self) {
        self.render_timeouts.fetch_add(1, Ordering::Relaxed);
        counter!("directory_render_timeouts_total").increment(1);
    }

    /// Record the terminal mode of one request and how long it took.
    pub async fn record_resolution(&self, mode: QueryMode, elapsed: Duration) {
        let slot = match mode {
            QueryMode::Cached => &self.cached,
            QueryMode::Realtime => &self.realtime,
            QueryMode::Direct => &self.direct,
            QueryMode::Passthrough => &self.passthrough,
            QueryMode::Unavailable => &self.unavailable,
        };
        slot.fetch_add(1, Ordering::Relaxed);
        counter!("directory_resolutions_total", "mode" => mode.as_str()).increment(1);
        histogram!("directory_resolution_duration_seconds").record(elapsed.as_secs_f64());

        self.resolution_times
            .write()
            .await
            .record(elapsed.as_micros() as u64);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let times = self.resolution_times.read().await;
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let cache_hit_rate = if hits + misses > 0 {
            hits as f64 / (hits + misses) as f64 * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            invalid_requests: self.invalid_requests.load(Ordering::Relaxed),
            modes: ModeCounts {
                cached: self.cached.load(Ordering::Relaxed),
                realtime: self.realtime.load(Ordering::Relaxed),
                direct: self.direct.load(Ordering::Relaxed),
                passthrough: self.passthrough.load(Ordering::Relaxed),
                unavailable: self.unavailable.load(Ordering::Relaxed),
            },
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            registry_errors: self.registry_errors.load(Ordering::Relaxed),
            render_errors: self.render_errors.load(Ordering::Relaxed),
            render_timeouts: self.render_timeouts.load(Ordering::Relaxed),
            resolution_avg_ms: times.avg_ms(),
            resolution_min_ms: times.min_us as f64 / 1000.0,
            resolution_max_ms: times.max_us as f64 / 1000.0,
            resolution_last_ms: times.last_us as f64 / 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_counts_modes() {
        let metrics = ResolverMetrics::new();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        metrics.record_cache_miss();
        metrics
            .record_resolution(QueryMode::Cached, Duration::from_millis(2))
            .await;
        metrics
            .record_resolution(QueryMode::Unavailable, Duration::from_millis(6))
            .await;

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.modes.cached, 1);
        assert_eq!(snapshot.modes.unavailable, 1);
        assert!((snapshot.cache_hit_rate - 33.333).abs() < 0.01);
        assert!((snapshot.resolution_avg_ms - 4.0).abs() < 0.001);
        assert_eq!(snapshot.resolution_max_ms, 6.0);
    }
}
