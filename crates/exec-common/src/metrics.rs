//! Frame service metrics for latency and overrun monitoring.
//!
//! Provides a ring buffer-based histogram of per-frame service times
//! without heap allocations during normal operation, plus totals for the
//! drop-overrun policy (ticks that accrued beyond one per servicing pass
//! and were discarded).

use std::time::Duration;

/// Frame execution metrics with ring buffer for service-time tracking.
#[derive(Debug)]
pub struct FrameMetrics {
    /// Ring buffer of frame service durations in nanoseconds.
    samples: Box<[u64]>,
    /// Current write position in the ring buffer.
    write_pos: usize,
    /// Number of samples collected (saturates at buffer size).
    sample_count: usize,
    /// Total frames serviced.
    frames: u64,
    /// Minimum observed service time in nanoseconds.
    min_ns: u64,
    /// Maximum observed service time in nanoseconds.
    max_ns: u64,
    /// Sum of all service times for mean calculation.
    sum_ns: u64,
    /// Total ticks discarded as overrun backlog.
    dropped_ticks: u64,
    /// Frames whose service time exceeded the tick interval.
    service_overruns: u64,
    /// Configured tick interval in nanoseconds.
    interval_ns: u64,
}

impl FrameMetrics {
    /// Create a new metrics collector with the given histogram size.
    ///
    /// # Arguments
    ///
    /// * `histogram_size` - Number of samples to retain in the ring buffer.
    /// * `tick_interval` - Base tick interval; service times exceeding it
    ///   count as service overruns.
    #[must_use]
    pub fn new(histogram_size: usize, tick_interval: Duration) -> Self {
        let size = histogram_size.max(1);
        Self {
            samples: vec![0u64; size].into_boxed_slice(),
            write_pos: 0,
            sample_count: 0,
            frames: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            sum_ns: 0,
            dropped_ticks: 0,
            service_overruns: 0,
            interval_ns: tick_interval.as_nanos() as u64,
        }
    }

    /// Record one serviced frame.
    ///
    /// `dropped` is the tick backlog discarded for this pass
    /// (`observed - 1` under the drop-overrun policy).
    ///
    /// This method is designed to be allocation-free for use in the loop context.
    pub fn record(&mut self, service_time: Duration, dropped: u32) {
        let ns = service_time.as_nanos() as u64;

        // Update ring buffer
        self.samples[self.write_pos] = ns;
        self.write_pos = (self.write_pos + 1) % self.samples.len();
        self.sample_count = self.sample_count.saturating_add(1).min(self.samples.len());

        // Update statistics
        self.frames += 1;
        self.min_ns = self.min_ns.min(ns);
        self.max_ns = self.max_ns.max(ns);
        self.sum_ns = self.sum_ns.wrapping_add(ns);
        self.dropped_ticks += u64::from(dropped);

        if ns > self.interval_ns {
            self.service_overruns += 1;
        }
    }

    /// Get total number of frames serviced.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Get total ticks discarded as overrun backlog.
    #[must_use]
    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks
    }

    /// Get number of frames whose service time exceeded the tick interval.
    #[must_use]
    pub fn service_overruns(&self) -> u64 {
        self.service_overruns
    }

    /// Get minimum observed service time.
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        if self.frames > 0 {
            Some(Duration::from_nanos(self.min_ns))
        } else {
            None
        }
    }

    /// Get maximum observed service time.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        if self.frames > 0 {
            Some(Duration::from_nanos(self.max_ns))
        } else {
            None
        }
    }

    /// Get mean service time.
    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        if self.frames > 0 {
            Some(Duration::from_nanos(self.sum_ns / self.frames))
        } else {
            None
        }
    }

    /// Compute a percentile from the ring buffer.
    ///
    /// Returns `None` if no samples have been collected or if the
    /// percentile is out of range.
    #[must_use]
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.sample_count == 0 {
            return None;
        }
        if !(0.0..=100.0).contains(&percentile) || percentile.is_nan() {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples[..self.sample_count].to_vec();
        sorted.sort_unstable();

        let idx = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        let idx = idx.min(sorted.len() - 1);

        Some(Duration::from_nanos(sorted[idx]))
    }

    /// Get a snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> FrameMetricsSnapshot {
        FrameMetricsSnapshot {
            frames: self.frames,
            min_ns: if self.frames > 0 {
                Some(self.min_ns)
            } else {
                None
            },
            max_ns: if self.frames > 0 {
                Some(self.max_ns)
            } else {
                None
            },
            mean_ns: if self.frames > 0 {
                Some(self.sum_ns / self.frames)
            } else {
                None
            },
            dropped_ticks: self.dropped_ticks,
            service_overruns: self.service_overruns,
            sample_count: self.sample_count,
        }
    }

    /// Reset all metrics to initial state.
    pub fn reset(&mut self) {
        self.samples.fill(0);
        self.write_pos = 0;
        self.sample_count = 0;
        self.frames = 0;
        self.min_ns = u64::MAX;
        self.max_ns = 0;
        self.sum_ns = 0;
        self.dropped_ticks = 0;
        self.service_overruns = 0;
    }
}

/// Immutable snapshot of metrics for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct FrameMetricsSnapshot {
    /// Total frames serviced.
    pub frames: u64,
    /// Minimum service time in nanoseconds.
    pub min_ns: Option<u64>,
    /// Maximum service time in nanoseconds.
    pub max_ns: Option<u64>,
    /// Mean service time in nanoseconds.
    pub mean_ns: Option<u64>,
    /// Total ticks discarded as overrun backlog.
    pub dropped_ticks: u64,
    /// Frames whose service time exceeded the tick interval.
    pub service_overruns: u64,
    /// Number of samples in the histogram.
    pub sample_count: usize,
}

impl FrameMetricsSnapshot {
    /// Get jitter (max - min) in nanoseconds.
    #[must_use]
    pub fn jitter_ns(&self) -> Option<u64> {
        match (self.min_ns, self.max_ns) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}
