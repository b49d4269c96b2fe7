// Conversion metrics
//
// Lightweight counters for what the conversion pipeline did during this run

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Conversion counters
///
/// Uses atomic operations so concurrently running conversions can record
/// without locks. Logged on shutdown.
#[derive(Debug)]
pub struct ConversionMetrics {
    /// Conversions that produced a document
    pub conversions_succeeded: AtomicUsize,

    /// Conversions where the engine failed, timed out or could not be started
    pub conversions_failed: AtomicUsize,

    /// Conversions rejected before any engine was started
    pub conversions_rejected: AtomicUsize,

    /// Engine processes started
    pub engine_spawns: AtomicUsize,

    /// Total time spent inside the engine in milliseconds
    pub total_engine_time_ms: AtomicU64,

    start_time: Instant,
}

impl ConversionMetrics {
    pub fn new() -> Self {
        Self {
            conversions_succeeded: AtomicUsize::new(0),
            conversions_failed: AtomicUsize::new(0),
            conversions_rejected: AtomicUsize::new(0),
            engine_spawns: AtomicUsize::new(0),
            total_engine_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_success(&self) {
        self.conversions_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.conversions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.conversions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_engine_spawn(&self) {
        self.engine_spawns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_engine_time(&self, duration: Duration) {
        self.total_engine_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn engine_spawn_count(&self) -> usize {
        self.engine_spawns.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average engine time per spawn in milliseconds
    pub fn avg_engine_time_ms(&self) -> f64 {
        let total = self.total_engine_time_ms.load(Ordering::Relaxed);
        let count = self.engine_spawns.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Conversion Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Conversions: {} succeeded, {} failed, {} rejected",
            self.conversions_succeeded.load(Ordering::Relaxed),
            self.conversions_failed.load(Ordering::Relaxed),
            self.conversions_rejected.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Engine: {} runs, {:.2}s total (avg: {:.2}ms per run)",
            self.engine_spawns.load(Ordering::Relaxed),
            self.total_engine_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_engine_time_ms()
        );
    }
}

impl Default for ConversionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
