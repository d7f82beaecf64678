//! Per-worker step-duration sampler (`PERF_STATS`, §6).
//!
//! Grounded on `evo_control_unit::cycle::CycleStats`'s O(1) running-sum
//! tracking (count/sum/sum-of-squares/min/max), extended with a bounded
//! ring buffer of recent samples so percentiles can be computed on demand.
//! Emitted every [`railsim_common::consts::PERF_STATS_INTERVAL_S`] seconds.

use std::collections::VecDeque;

use railsim_common::command::PerfStats;

/// How many of the most recent step durations are kept for percentile
/// computation. Older samples are evicted in FIFO order.
const SAMPLE_WINDOW: usize = 2048;

/// Accumulates step durations between `PERF_STATS` emissions.
pub struct PerfSampler {
    count: u64,
    sum_ms: f64,
    sum_sq_ms: f64,
    min_ms: f64,
    max_ms: f64,
    samples: VecDeque<f64>,
}

impl PerfSampler {
    pub fn new() -> Self {
        Self {
            count: 0,
            sum_ms: 0.0,
            sum_sq_ms: 0.0,
            min_ms: f64::MAX,
            max_ms: f64::MIN,
            samples: VecDeque::with_capacity(SAMPLE_WINDOW),
        }
    }

    /// Records one tick's step duration, in milliseconds.
    pub fn record(&mut self, step_ms: f64) {
        self.count += 1;
        self.sum_ms += step_ms;
        self.sum_sq_ms += step_ms * step_ms;
        self.min_ms = self.min_ms.min(step_ms);
        self.max_ms = self.max_ms.max(step_ms);
        if self.samples.len() == SAMPLE_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(step_ms);
    }

    /// Whether any samples have been recorded since the last reset.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Builds a `PerfStats` snapshot from everything recorded so far and
    /// resets the accumulator. Returns `None` if nothing was recorded.
    pub fn take_snapshot(&mut self) -> Option<PerfStats> {
        if self.count == 0 {
            return None;
        }
        let avg_step_ms = self.sum_ms / self.count as f64;
        let variance = (self.sum_sq_ms / self.count as f64) - avg_step_ms * avg_step_ms;
        let std_dev = variance.max(0.0).sqrt();
        let cv = if avg_step_ms > 0.0 { std_dev / avg_step_ms } else { 0.0 };

        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let stats = PerfStats {
            avg_step_ms,
            min_step_ms: self.min_ms,
            max_step_ms: self.max_ms,
            std_dev,
            cv,
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
            sample_count: self.count,
        };

        self.count = 0;
        self.sum_ms = 0.0;
        self.sum_sq_ms = 0.0;
        self.min_ms = f64::MAX;
        self.max_ms = f64::MIN;
        Some(stats)
    }
}

impl Default for PerfSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Nearest-rank percentile over an already-sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}
