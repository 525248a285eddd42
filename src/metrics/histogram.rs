//! Lock-free latency histogram with Prometheus output.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bucket bounds in microseconds.
///
/// Generation includes a synced WAL write and possibly a lock wait, so the
/// range runs from sub-millisecond to several seconds.
pub const LATENCY_BUCKETS_US: [u64; 10] = [
    100,       // 100μs
    500,       // 500μs
    1_000,     // 1ms
    5_000,     // 5ms
    10_000,    // 10ms
    50_000,    // 50ms
    100_000,   // 100ms
    500_000,   // 500ms
    1_000_000, // 1s
    5_000_000, // 5s
];

const BUCKETS: usize = LATENCY_BUCKETS_US.len();

/// Latency histogram.
///
/// Each observation lands in exactly one slot; cumulative counts are
/// computed on read.
///
/// ```
/// use folio::metrics::Histogram;
///
/// let histogram = Histogram::new();
/// histogram.observe(750);
/// assert_eq!(histogram.count(), 1);
/// assert_eq!(histogram.cumulative()[2], 1);
/// ```
pub struct Histogram {
    sum: AtomicU64,
    count: AtomicU64,
    slots: [AtomicU64; BUCKETS],
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            slots: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Records one observation in microseconds.
    #[inline]
    pub fn observe(&self, value_us: u64) {
        self.sum.fetch_add(value_us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        if let Some(slot) = LATENCY_BUCKETS_US.iter().position(|&le| value_us <= le) {
            self.slots[slot].fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// Cumulative count per bucket, aligned with `LATENCY_BUCKETS_US`.
    pub fn cumulative(&self) -> [u64; BUCKETS] {
        let mut running = 0;
        std::array::from_fn(|i| {
            running += self.slots[i].load(Ordering::Relaxed);
            running
        })
    }

    /// Renders the histogram in Prometheus exposition format.
    pub fn format_prometheus(&self, name: &str, help: &str) -> String {
        let cumulative = self.cumulative();
        let count = self.count();

        let mut output = String::with_capacity(768);
        let _ = writeln!(output, "# HELP {} {}", name, help);
        let _ = writeln!(output, "# TYPE {} histogram", name);
        for (le, total) in LATENCY_BUCKETS_US.iter().zip(cumulative) {
            let _ = writeln!(output, "{}_bucket{{le=\"{}\"}} {}", name, le, total);
        }
        let _ = writeln!(output, "{}_bucket{{le=\"+Inf\"}} {}", name, count);
        let _ = writeln!(output, "{}_sum {}", name, self.sum());
        let _ = writeln!(output, "{}_count {}", name, count);
        output
    }
}
