//! Rolling normalized variability features

use crate::config::FeatureConfig;
use std::collections::VecDeque;
use tracing::trace;
use xon_core::{XonError, XonResult};

/// Mean of the non-NaN values, NaN if there are none
pub fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Population standard deviation of the non-NaN values
pub fn nan_std(values: &[f64]) -> f64 {
    let mean = nan_mean(values.iter().copied());
    let var = nan_mean(values.iter().map(|v| (v - mean).powi(2)));
    var.sqrt()
}

/// Per-channel standard deviation normalized by its own trailing average.
///
/// The first call always yields 1.0 per channel. A channel whose whole
/// history is exactly zero divides by zero and reports NaN; that case is a
/// dead signal and is passed through unguarded.
#[derive(Debug, Clone)]
pub struct RollingStd {
    n_features: usize,
    history_chunks: usize,
    history: VecDeque<Vec<f64>>,
}

impl RollingStd {
    pub fn new(n_features: usize, history_chunks: usize) -> Self {
        RollingStd {
            n_features,
            history_chunks,
            history: VecDeque::with_capacity(history_chunks + 1),
        }
    }

    /// Build from config, defaulting to every stream channel
    pub fn from_config(config: &FeatureConfig, channel_count: usize) -> XonResult<Self> {
        config.validate()?;
        let n_features = config.n_features.unwrap_or(channel_count);
        if n_features > channel_count {
            return Err(XonError::ShapeMismatch {
                context: "feature channels",
                expected: channel_count,
                actual: n_features,
            });
        }
        Ok(Self::new(n_features, config.history_chunks))
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Variability vectors currently averaged into the baseline
    pub fn history(&self) -> &VecDeque<Vec<f64>> {
        &self.history
    }

    /// Per-channel standard deviation of a block, restricted to the feature
    /// channels and zero-meaned first
    pub fn current_stddevs(&self, block: &[Vec<f32>]) -> XonResult<Vec<f64>> {
        let mut stddevs = Vec::with_capacity(self.n_features);
        for channel in 0..self.n_features {
            let mut column = Vec::with_capacity(block.len());
            for row in block {
                let value = row.get(channel).ok_or_else(|| XonError::ShapeMismatch {
                    context: "feature block channels",
                    expected: self.n_features,
                    actual: row.len(),
                })?;
                column.push(*value as f64);
            }

            let mean = nan_mean(column.iter().copied());
            for value in &mut column {
                *value -= mean;
            }
            stddevs.push(nan_std(&column));
        }
        Ok(stddevs)
    }

    /// Compute the feature vector for a filtered window
    pub fn extract(&mut self, block: &[Vec<f32>]) -> XonResult<Vec<f32>> {
        let current = self.current_stddevs(block)?;

        self.history.push_back(current.clone());
        if self.history.len() > self.history_chunks {
            self.history.pop_front();
        }

        let features = current
            .iter()
            .enumerate()
            .map(|(channel, &std)| {
                let baseline = nan_mean(self.history.iter().map(|h| h[channel]));
                (std / baseline) as f32
            })
            .collect();

        trace!(history = self.history.len(), "features extracted");
        Ok(features)
    }

    /// Forget the baseline history
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(amplitudes: &[f32], len: usize) -> Vec<Vec<f32>> {
        (0..len)
            .map(|i| {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                amplitudes.iter().map(|a| 3.0 + sign * a).collect()
            })
            .collect()
    }

    #[test]
    fn test_first_call_is_all_ones() {
        let mut extractor = RollingStd::new(3, 100);
        let features = extractor.extract(&block(&[0.5, 2.0, 7.0], 20)).unwrap();
        assert_eq!(features, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_constant_variability_stays_at_one() {
        let mut extractor = RollingStd::new(2, 10);
        for _ in 0..25 {
            let features = extractor.extract(&block(&[1.5, 0.25], 40)).unwrap();
            for f in features {
                assert!((f - 1.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_history_bounded() {
        let mut extractor = RollingStd::new(1, 5);
        for i in 0..12 {
            extractor.extract(&block(&[1.0 + i as f32], 10)).unwrap();
            assert!(extractor.history().len() <= 5);
        }
        // Oldest entries dropped: only amplitudes 8..=12 remain
        let kept: Vec<f64> = extractor.history().iter().map(|h| h[0]).collect();
        assert_eq!(kept, vec![8.0, 9.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_burst_raises_feature() {
        let mut extractor = RollingStd::new(1, 4);
        for _ in 0..3 {
            extractor.extract(&block(&[1.0], 10)).unwrap();
        }
        // baseline = (1 + 1 + 1 + 5) / 4 = 2
        let features = extractor.extract(&block(&[5.0], 10)).unwrap();
        assert!((features[0] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_extra_channels_trimmed() {
        let mut extractor = RollingStd::new(2, 4);
        let features = extractor.extract(&block(&[1.0, 2.0, 3.0, 4.0], 10)).unwrap();
        assert_eq!(features.len(), 2);

        assert!(extractor.extract(&block(&[1.0], 10)).is_err());
    }

    #[test]
    fn test_nan_samples_ignored() {
        let mut data = block(&[2.0], 10);
        data[3][0] = f32::NAN;
        let extractor = RollingStd::new(1, 4);
        let std = extractor.current_stddevs(&data).unwrap();
        assert!(std[0].is_finite());
    }

    #[test]
    fn test_zero_signal_yields_nan() {
        let mut extractor = RollingStd::new(1, 4);
        let features = extractor.extract(&vec![vec![0.0]; 10]).unwrap();
        assert!(features[0].is_nan());
    }

    #[test]
    fn test_from_config_defaults_to_all_channels() {
        let extractor = RollingStd::from_config(&FeatureConfig::default(), 8).unwrap();
        assert_eq!(extractor.n_features(), 8);

        let config = FeatureConfig { n_features: Some(9), history_chunks: 10 };
        assert!(RollingStd::from_config(&config, 8).is_err());
    }
}
