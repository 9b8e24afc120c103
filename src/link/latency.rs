//! Round-trip latency window

use std::collections::VecDeque;

pub const DEFAULT_LATENCY_WINDOW: usize = 30;

/// Sliding window of RTT samples in milliseconds
#[derive(Debug, Clone)]
pub struct LatencyTracker {
    samples: VecDeque<u32>,
    window_size: usize,
}

impl LatencyTracker {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            samples: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    pub fn record(&mut self, rtt_ms: u32) {
        if self.samples.len() >= self.window_size {
            self.samples.pop_front();
        }
        self.samples.push_back(rtt_ms);
    }

    /// Most recent sample, the published latency
    pub fn latest(&self) -> Option<u32> {
        self.samples.back().copied()
    }

    pub fn average_ms(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().map(|s| u64::from(*s)).sum();
        Some(sum as f32 / self.samples.len() as f32)
    }

    pub fn samples(&self) -> impl Iterator<Item = u32> + '_ {
        self.samples.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}

/// Rounds `now - sent` to whole milliseconds, clamping negative values to zero
pub fn round_trip_ms(now_ms: f64, sent_ms: f64) -> Option<u32> {
    if !now_ms.is_finite() || !sent_ms.is_finite() {
        return None;
    }
    let rtt = (now_ms - sent_ms).round();
    Some(rtt.clamp(0.0, f64::from(u32::MAX)) as u32)
}
