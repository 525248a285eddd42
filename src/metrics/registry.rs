use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use serde::Serialize;

use super::Histogram;

/// Counters for the invoice numbering service.
pub struct NumberingMetrics {
    /// Numbers handed out
    pub generated_total: AtomicU64,
    /// Candidates rejected because an invoice already carried them
    pub collisions_total: AtomicU64,
    /// Times the last issued state was unreadable and treated as absent
    pub corrupt_state_total: AtomicU64,
    /// Times a caller had to wait for the generator lock
    pub lock_waits_total: AtomicU64,
    /// Failed generation attempts
    pub errors_total: AtomicU64,
    /// Time spent per successful generation, lock wait included
    pub generate_duration_us: Histogram,
    start_time: OnceLock<Instant>,
}

impl Default for NumberingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl NumberingMetrics {
    pub fn new() -> Self {
        let metrics = Self {
            generated_total: AtomicU64::new(0),
            collisions_total: AtomicU64::new(0),
            corrupt_state_total: AtomicU64::new(0),
            lock_waits_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            generate_duration_us: Histogram::new(),
            start_time: OnceLock::new(),
        };
        let _ = metrics.start_time.set(Instant::now());
        metrics
    }

    #[inline]
    pub fn record_generated(&self, collisions: u64, duration_us: u64) {
        self.generated_total.fetch_add(1, Ordering::Relaxed);
        self.collisions_total.fetch_add(collisions, Ordering::Relaxed);
        self.generate_duration_us.observe(duration_us);
    }

    #[inline]
    pub fn record_lock_waits(&self, waits: u64) {
        self.lock_waits_total.fetch_add(waits, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_corrupt_state(&self) {
        self.corrupt_state_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time
            .get()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let generated = self.generated_total.load(Ordering::Relaxed);
        let duration_sum = self.generate_duration_us.sum();
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            generated_total: generated,
            collisions_total: self.collisions_total.load(Ordering::Relaxed),
            corrupt_state_total: self.corrupt_state_total.load(Ordering::Relaxed),
            lock_waits_total: self.lock_waits_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            avg_generate_us: if generated > 0 {
                duration_sum as f64 / generated as f64
            } else {
                0.0
            },
        }
    }

    /// Formats all metrics in Prometheus exposition format.
    pub fn format_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        let counters = [
            (
                "folio_generated_total",
                "Invoice numbers issued",
                &self.generated_total,
            ),
            (
                "folio_collisions_total",
                "Candidates skipped because an invoice already carried them",
                &self.collisions_total,
            ),
            (
                "folio_corrupt_state_total",
                "Unreadable last issued states treated as absent",
                &self.corrupt_state_total,
            ),
            (
                "folio_lock_waits_total",
                "Waits on the generator lock",
                &self.lock_waits_total,
            ),
            (
                "folio_errors_total",
                "Failed generation attempts",
                &self.errors_total,
            ),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, value.load(Ordering::Relaxed));
            output.push('\n');
        }

        output.push_str(&self.generate_duration_us.format_prometheus(
            "folio_generate_duration_us",
            "Invoice number generation latency in microseconds",
        ));
        output
    }
}

/// Serializable view of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: f64,
    pub generated_total: u64,
    pub collisions_total: u64,
    pub corrupt_state_total: u64,
    pub lock_waits_total: u64,
    pub errors_total: u64,
    pub avg_generate_us: f64,
}
