//! Feed statistics tracking
//!
//! Tracks frames/sec, decode latency, dropped frames and reconnects.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const WINDOW_SIZE: usize = 10000;

#[derive(Debug, Clone, Copy)]
pub struct LatencyStats {
    pub min_us: u64,
    pub max_us: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p99_us: u64,
}

#[derive(Debug, Clone)]
pub struct FeedStats {
    start_time: Option<Instant>,
    total_frames: u64,
    total_bytes: u64,
    decoded_events: u64,
    dropped_frames: u64,
    reconnects: u64,

    // Decode latencies (in microseconds)
    decode_latencies: VecDeque<u64>,
}

impl FeedStats {
    pub fn new() -> Self {
        FeedStats {
            start_time: None,
            total_frames: 0,
            total_bytes: 0,
            decoded_events: 0,
            dropped_frames: 0,
            reconnects: 0,
            decode_latencies: VecDeque::with_capacity(WINDOW_SIZE),
        }
    }

    /// Record a binary frame received
    pub fn record_frame(&mut self, size: usize) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
        self.total_frames += 1;
        self.total_bytes += size as u64;
    }

    /// Record a successful decode and its latency in microseconds
    pub fn record_decoded(&mut self, micros: u64) {
        self.decoded_events += 1;
        if self.decode_latencies.len() >= WINDOW_SIZE {
            self.decode_latencies.pop_front();
        }
        self.decode_latencies.push_back(micros);
    }

    /// Record a frame that produced no event
    pub fn record_dropped(&mut self) {
        self.dropped_frames += 1;
    }

    pub fn record_reconnect(&mut self) {
        self.reconnects += 1;
    }

    pub fn frames_per_sec(&self) -> f64 {
        match self.start_time {
            None => 0.0,
            Some(start) => {
                let elapsed = start.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    self.total_frames as f64 / elapsed
                } else {
                    0.0
                }
            }
        }
    }

    pub fn decode_latency_stats(&self) -> Option<LatencyStats> {
        if self.decode_latencies.is_empty() {
            return None;
        }

        let mut sorted: Vec<u64> = self.decode_latencies.iter().copied().collect();
        sorted.sort_unstable();

        let total: u64 = sorted.iter().sum();
        Some(LatencyStats {
            min_us: sorted[0],
            max_us: sorted[sorted.len() - 1],
            mean_us: total as f64 / sorted.len() as f64,
            p50_us: nearest_rank(&sorted, 50),
            p99_us: nearest_rank(&sorted, 99),
        })
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|st| st.elapsed())
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn decoded_events(&self) -> u64 {
        self.decoded_events
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    pub fn reset(&mut self) {
        *self = FeedStats::new();
    }

    /// Emit a one-line summary at info level
    pub fn log_summary(&self) {
        let latency = self.decode_latency_stats();
        tracing::info!(
            frames = self.total_frames,
            bytes = self.total_bytes,
            events = self.decoded_events,
            dropped = self.dropped_frames,
            reconnects = self.reconnects,
            frames_per_sec = self.frames_per_sec(),
            decode_p50_us = latency.map(|l| l.p50_us),
            decode_p99_us = latency.map(|l| l.p99_us),
            "feed statistics"
        );
    }
}

/// Nearest-rank percentile of a sorted, non-empty sample
fn nearest_rank(sorted: &[u64], pct: usize) -> u64 {
    let rank = (sorted.len() * pct).div_ceil(100).max(1);
    sorted[rank - 1]
}

impl Default for FeedStats {
    fn default() -> Self {
        Self::new()
    }
}
