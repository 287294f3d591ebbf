//! Metrics module - timing histograms and per-channel counters

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn histogram() -> Histogram<u64> {
    // Auto-resizing; 3 significant figures is always in range.
    Histogram::new(3).expect("3 significant figures is a valid histogram precision")
}

// ============================================================================
// TIMING METRICS - Thread-safe performance tracking
// ============================================================================

#[derive(Clone)]
pub struct TimingMetrics {
    generation_hist: Arc<Mutex<Histogram<u64>>>,
    // Time a trigger code sat in the slot before its channel claimed it
    trigger_latency_hist: Arc<Mutex<Histogram<u64>>>,
    published: Arc<AtomicU64>,
    triggers_issued: Arc<AtomicU64>,
}

impl Default for TimingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingMetrics {
    pub fn new() -> Self {
        Self {
            generation_hist: Arc::new(Mutex::new(histogram())),
            trigger_latency_hist: Arc::new(Mutex::new(histogram())),
            published: Arc::new(AtomicU64::new(0)),
            triggers_issued: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_generation(&self, duration: Duration) {
        self.generation_hist.lock().record(duration.as_nanos() as u64).ok();
    }

    pub fn record_trigger_latency(&self, duration: Duration) {
        self.trigger_latency_hist.lock().record(duration.as_nanos() as u64).ok();
    }

    pub fn record_publish(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trigger_issued(&self) {
        self.triggers_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> MetricsReport {
        let gen = self.generation_hist.lock();
        let trig = self.trigger_latency_hist.lock();

        MetricsReport {
            generation_p50: Duration::from_nanos(gen.value_at_quantile(0.5)),
            generation_p99: Duration::from_nanos(gen.value_at_quantile(0.99)),
            trigger_latency_p50: Duration::from_nanos(trig.value_at_quantile(0.5)),
            trigger_latency_p99: Duration::from_nanos(trig.value_at_quantile(0.99)),
            triggers_consumed: trig.len(),
            triggers_issued: self.triggers_issued.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport {
    pub generation_p50: Duration,
    pub generation_p99: Duration,
    pub trigger_latency_p50: Duration,
    pub trigger_latency_p99: Duration,
    pub triggers_consumed: u64,
    pub triggers_issued: u64,
    pub published: u64,
}

// ============================================================================
// CHANNEL STATS - Per-channel counters shared with the orchestrator
// ============================================================================

#[derive(Debug, Default)]
pub struct ChannelStats {
    pub published: AtomicU64,
    pub failed: AtomicBool,
}

impl ChannelStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}
