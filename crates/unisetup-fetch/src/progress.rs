use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const WINDOW_BLOCKS: usize = 100;
pub const RECOMPUTE_INTERVAL: Duration = Duration::from_millis(500);

/// Receives download progress; the CLI renders it, tests record it.
pub trait ProgressSink {
    fn start(&mut self, file_name: &str, total_bytes: u64, resumed_from: u64);
    fn advance(&mut self, downloaded_bytes: u64, bytes_per_sec: Option<f64>);
    fn finish(&mut self);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&mut self, _file_name: &str, _total_bytes: u64, _resumed_from: u64) {}
    fn advance(&mut self, _downloaded_bytes: u64, _bytes_per_sec: Option<f64>) {}
    fn finish(&mut self) {}
}

/// Sliding throughput estimate over the most recent blocks.
///
/// The speed is recomputed at most once per [`RECOMPUTE_INTERVAL`]; in between
/// callers keep showing the previous figure.
#[derive(Debug)]
pub struct ThroughputWindow {
    samples: VecDeque<(Duration, u64)>,
    last_block_at: Instant,
    last_computed_at: Option<Instant>,
    capacity: usize,
    interval: Duration,
}

impl ThroughputWindow {
    pub fn new(started_at: Instant) -> Self {
        Self::with_limits(started_at, WINDOW_BLOCKS, RECOMPUTE_INTERVAL)
    }

    pub fn with_limits(started_at: Instant, capacity: usize, interval: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            last_block_at: started_at,
            last_computed_at: None,
            capacity: capacity.max(1),
            interval,
        }
    }

    /// Records a block of `bytes` received at `now`; returns a fresh bytes/second
    /// figure when one is due.
    pub fn record(&mut self, now: Instant, bytes: u64) -> Option<f64> {
        let elapsed = now.saturating_duration_since(self.last_block_at);
        self.last_block_at = now;
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((elapsed, bytes));

        let due = match self.last_computed_at {
            Some(previous) => now.saturating_duration_since(previous) >= self.interval,
            None => true,
        };
        if !due {
            return None;
        }
        self.last_computed_at = Some(now);
        Some(self.bytes_per_sec())
    }

    pub fn bytes_per_sec(&self) -> f64 {
        let (elapsed, bytes) = self
            .samples
            .iter()
            .fold((Duration::ZERO, 0_u64), |(time, total), (block_time, block_bytes)| {
                (time + *block_time, total + block_bytes)
            });
        if elapsed.is_zero() {
            return 0.0;
        }
        bytes as f64 / elapsed.as_secs_f64()
    }
}

pub fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (done as f64 / total as f64 * 100.0).min(100.0)
}
