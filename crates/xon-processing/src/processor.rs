//! Block processor trait and step timing

use serde::{Deserialize, Serialize};
use std::time::Instant;
use xon_core::XonResult;

/// Anything that transforms a block of samples (timesteps x channels)
pub trait BlockProcessor: Send {
    /// Process a block and return the transformed block
    fn process(&mut self, block: &[Vec<f32>]) -> XonResult<Vec<Vec<f32>>>;

    /// Get processor name/identifier
    fn name(&self) -> &str;

    /// Reset processor internal state
    fn reset(&mut self);
}

/// Counters kept by the streamer across polling iterations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMetrics {
    /// Pipeline steps run
    pub steps: u64,
    /// Pulls that appended data
    pub data_pulls: u64,
    /// Pulls that found nothing (timeout or short chunk)
    pub empty_pulls: u64,
    /// Rows appended to the window
    pub samples_appended: u64,
    /// Stale chunks dropped while catching up
    pub chunks_skipped: u64,
    /// Duration of the last step in microseconds
    pub last_step_us: u64,
}

impl StreamMetrics {
    /// Start timing a processing step
    pub fn start_timing() -> StepTimer {
        StepTimer {
            start_time: Instant::now(),
        }
    }

    /// Fraction of pulls that delivered data
    pub fn hit_rate(&self) -> f32 {
        let total = self.data_pulls + self.empty_pulls;
        if total == 0 {
            0.0
        } else {
            self.data_pulls as f32 / total as f32
        }
    }
}

/// Helper for timing processing steps
pub struct StepTimer {
    start_time: Instant,
}

impl StepTimer {
    /// Finish timing and record into the metrics
    pub fn finish(self, metrics: &mut StreamMetrics) {
        metrics.last_step_us = self.start_time.elapsed().as_micros() as u64;
        metrics.steps += 1;
    }
}
