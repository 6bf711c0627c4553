//! Rolling window of the most recent samples

use std::collections::VecDeque;
use tracing::trace;
use xon_core::{config_error, Chunk, XonError, XonResult};

/// Fixed-duration FIFO of (timestamp, sample-vector) pairs.
///
/// The window starts full of zeros stamped `-window_seconds .. 0`, so it
/// always holds exactly `capacity` rows. Incoming timestamps are discarded
/// and rebuilt from the nominal rate, which removes transport jitter.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    sampling_rate: f64,
    channel_count: usize,
    capacity: usize,
    times: VecDeque<f64>,
    samples: VecDeque<Vec<f32>>,
}

impl RollingWindow {
    /// Create a zero-filled window covering `window_seconds`
    pub fn new(sampling_rate: f64, channel_count: usize, window_seconds: f64) -> XonResult<Self> {
        let capacity = (sampling_rate * window_seconds) as usize;
        if capacity == 0 {
            return Err(config_error!(
                "window of {}s at {}Hz holds no samples",
                window_seconds,
                sampling_rate
            ));
        }
        if channel_count == 0 {
            return Err(config_error!("window needs at least one channel"));
        }

        let dt = 1.0 / sampling_rate;
        let times = (0..capacity).map(|i| -window_seconds + i as f64 * dt).collect();
        let samples = (0..capacity).map(|_| vec![0.0; channel_count]).collect();

        Ok(RollingWindow {
            sampling_rate,
            channel_count,
            capacity,
            times,
            samples,
        })
    }

    /// Append a chunk, returning how many rows were added.
    ///
    /// Chunks with fewer than two timestamps are ignored and leave the
    /// window untouched.
    pub fn append(&mut self, chunk: &Chunk) -> XonResult<usize> {
        if chunk.len() < 2 {
            return Ok(0);
        }
        if chunk.channel_count() != self.channel_count {
            return Err(XonError::ShapeMismatch {
                context: "rolling window channels",
                expected: self.channel_count,
                actual: chunk.channel_count(),
            });
        }

        let last = self.last_timestamp();
        let dt = 1.0 / self.sampling_rate;
        for (k, row) in chunk.samples.iter().enumerate() {
            self.times.push_back(last + (k + 1) as f64 * dt);
            self.samples.push_back(row.clone());
        }

        while self.samples.len() > self.capacity {
            self.samples.pop_front();
            self.times.pop_front();
        }

        trace!(added = chunk.len(), last = self.last_timestamp(), "window append");
        Ok(chunk.len())
    }

    /// Timestamp of the newest row
    pub fn last_timestamp(&self) -> f64 {
        self.times.back().copied().unwrap_or(0.0)
    }

    /// Maximum rows held
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Timestamps, oldest first
    pub fn times(&self) -> &VecDeque<f64> {
        &self.times
    }

    /// Sample rows, oldest first
    pub fn samples(&self) -> &VecDeque<Vec<f32>> {
        &self.samples
    }

    /// Copy the rows into a contiguous block (timesteps x channels)
    pub fn to_block(&self) -> Vec<Vec<f32>> {
        self.samples.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(values: &[f32], channels: usize, raw_time: f64) -> Chunk {
        let samples = values.iter().map(|&v| vec![v; channels]).collect();
        let timestamps = (0..values.len()).map(|i| raw_time + i as f64 * 0.37).collect();
        Chunk::new(samples, timestamps).unwrap()
    }

    #[test]
    fn test_starts_full_of_zeros() {
        let window = RollingWindow::new(100.0, 3, 2.0).unwrap();
        assert_eq!(window.len(), 200);
        assert_eq!(window.capacity(), 200);
        assert!((window.times()[0] + 2.0).abs() < 1e-12);
        assert!((window.last_timestamp() + 0.01).abs() < 1e-12);
        assert!(window.samples().iter().all(|row| row == &vec![0.0; 3]));
    }

    #[test]
    fn test_length_capped_and_most_recent_kept() {
        let mut window = RollingWindow::new(10.0, 1, 1.0).unwrap();

        let mut next = 1.0;
        for size in [3, 7, 2, 9, 4] {
            let values: Vec<f32> = (0..size).map(|i| next + i as f32).collect();
            next += size as f32;
            window.append(&chunk(&values, 1, 1e6)).unwrap();
            assert!(window.len() <= window.capacity());
        }

        // 25 samples pushed in total, last 10 retained in order
        let kept: Vec<f32> = window.samples().iter().map(|row| row[0]).collect();
        let expected: Vec<f32> = (16..=25).map(|v| v as f32).collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn test_timestamps_rebuilt_from_rate() {
        let mut window = RollingWindow::new(250.0, 2, 1.0).unwrap();
        let before = window.last_timestamp();

        window.append(&chunk(&[1.0, 2.0, 3.0, 4.0], 2, 98765.4)).unwrap();

        let times: Vec<f64> = window.times().iter().rev().take(4).rev().copied().collect();
        for (k, t) in times.iter().enumerate() {
            let expected = before + (k + 1) as f64 / 250.0;
            assert!((t - expected).abs() < 1e-12, "t[{}] = {} != {}", k, t, expected);
        }
    }

    #[test]
    fn test_short_chunks_are_noops() {
        let mut window = RollingWindow::new(50.0, 1, 1.0).unwrap();
        let before = window.to_block();

        assert_eq!(window.append(&Chunk::empty()).unwrap(), 0);
        assert_eq!(window.append(&chunk(&[5.0], 1, 0.0)).unwrap(), 0);

        assert_eq!(window.to_block(), before);
    }

    #[test]
    fn test_channel_mismatch_rejected() {
        let mut window = RollingWindow::new(50.0, 4, 1.0).unwrap();
        let result = window.append(&chunk(&[1.0, 2.0], 3, 0.0));
        assert!(matches!(result, Err(XonError::ShapeMismatch { expected: 4, actual: 3, .. })));
    }
}
