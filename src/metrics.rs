//! Emission metrics.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Collects emission counters and timing; cheap to clone and share.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    total_emissions: AtomicU64,
    emissions_by_type: DashMap<String, u64>,
    cumulative_micros: AtomicU64,
    error_count: AtomicU64,
    started_at: Instant,
}

impl MetricsCollector {
    /// Create a collector; uptime is measured from this point.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                total_emissions: AtomicU64::new(0),
                emissions_by_type: DashMap::new(),
                cumulative_micros: AtomicU64::new(0),
                error_count: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    /// Record one emission and its elapsed dispatch time.
    pub fn record_emission(&self, event_type: &str, duration: Duration) {
        self.inner.total_emissions.fetch_add(1, Ordering::Relaxed);
        self.inner
            .cumulative_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        *self
            .inner
            .emissions_by_type
            .entry(event_type.to_string())
            .or_insert(0) += 1;
    }

    /// Record one recovered failure.
    pub fn record_error(&self) {
        self.inner.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Take an immutable snapshot of the counters.
    pub fn summary(&self) -> MetricsSummary {
        let total = self.inner.total_emissions.load(Ordering::Relaxed);
        let errors = self.inner.error_count.load(Ordering::Relaxed);
        let cumulative_micros = self.inner.cumulative_micros.load(Ordering::Relaxed);

        let average_execution_time_ms = if total > 0 {
            (cumulative_micros as f64 / total as f64) / 1000.0
        } else {
            0.0
        };

        let success_rate = if total + errors > 0 {
            total as f64 / (total + errors) as f64 * 100.0
        } else {
            100.0
        };

        let emissions_by_type: HashMap<String, u64> = self
            .inner
            .emissions_by_type
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        let mut event_types: Vec<String> = emissions_by_type.keys().cloned().collect();
        event_types.sort();

        MetricsSummary {
            total_emissions: total,
            average_execution_time_ms,
            error_count: errors,
            success_rate,
            uptime_seconds: self.inner.started_at.elapsed().as_secs_f64(),
            event_types,
            emissions_by_type,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of the collector's counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    /// Total emissions recorded
    pub total_emissions: u64,

    /// Mean elapsed dispatch time per emission, in milliseconds
    pub average_execution_time_ms: f64,

    /// Recovered failures recorded
    pub error_count: u64,

    /// `total / (total + errors) × 100`; 100 with no activity
    pub success_rate: f64,

    /// Seconds since the collector was created
    pub uptime_seconds: f64,

    /// Event types seen, sorted
    pub event_types: Vec<String>,

    /// Emission count per event type
    pub emissions_by_type: HashMap<String, u64>,
}

impl MetricsSummary {
    /// Emission count for one event type.
    pub fn emissions(&self, event_type: &str) -> u64 {
        self.emissions_by_type.get(event_type).copied().unwrap_or(0)
    }
}
