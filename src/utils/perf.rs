//! Timing helpers for turn and synthesis latency

use std::time::{Duration, Instant};

/// A stopwatch that remembers when the first event of a run happened
#[derive(Debug)]
pub struct Stopwatch {
    start: Instant,
    first_mark: Option<Duration>,
}

impl Stopwatch {
    /// Start a new stopwatch
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            first_mark: None,
        }
    }

    /// Record the first event; later calls are ignored
    pub fn mark_first(&mut self) {
        if self.first_mark.is_none() {
            self.first_mark = Some(self.start.elapsed());
        }
    }

    /// Milliseconds from start to the first recorded event
    pub fn first_ms(&self) -> Option<u64> {
        self.first_mark.map(|d| d.as_millis() as u64)
    }

    /// Get the elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
