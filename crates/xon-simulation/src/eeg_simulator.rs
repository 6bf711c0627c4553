//! Synthetic multi-channel EEG whose band power follows a 2D intent

use crate::signal_patterns::IntentPattern;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use xon_core::{XonError, XonResult};

/// Configuration for EEG simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EegConfig {
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    /// Number of channels to simulate
    pub channel_count: usize,
    /// Amplitude of the alpha rhythm at rest (uV)
    pub alpha_amplitude: f32,
    /// Alpha rhythm frequency (Hz)
    pub alpha_frequency: f32,
    /// How strongly the intent scales each channel's alpha power
    pub intent_gain: f32,
    /// Gaussian background noise standard deviation (uV)
    pub noise_std: f32,
    /// Slow electrode drift amplitude (uV), removed by the band-pass
    pub drift_amplitude: f32,
    /// Power line interference frequency, if any
    pub powerline_freq: Option<f32>,
    /// Intent trajectory when nobody sets the intent explicitly
    pub pattern: IntentPattern,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for EegConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 250.0,
            channel_count: 8,
            alpha_amplitude: 10.0,
            alpha_frequency: 10.0,
            intent_gain: 0.8,
            noise_std: 2.0,
            drift_amplitude: 20.0,
            powerline_freq: Some(50.0),
            pattern: IntentPattern::default(),
            seed: None,
        }
    }
}

impl EegConfig {
    pub fn validate(&self) -> XonResult<()> {
        if !(self.sampling_rate > 0.0) {
            return Err(XonError::InvalidConfig {
                reason: format!("sampling rate must be positive, got {}", self.sampling_rate),
            });
        }
        if self.channel_count == 0 {
            return Err(XonError::InvalidConfig {
                reason: "simulator needs at least one channel".to_string(),
            });
        }
        if self.noise_std < 0.0 {
            return Err(XonError::InvalidConfig {
                reason: "noise standard deviation cannot be negative".to_string(),
            });
        }
        Ok(())
    }
}

/// `sin(2 pi f t + phase)` with the phase accumulated in f64 so long-running
/// streams keep their frequency
fn tone(freq: f32, time: f64, phase: f32) -> f32 {
    let cycles = (freq as f64 * time).fract();
    (std::f64::consts::TAU * cycles + phase as f64).sin() as f32
}

/// EEG signal simulator.
///
/// Channel `c` carries an alpha rhythm whose amplitude is scaled by
/// `1 + gain * (intent . d_c)`, where `d_c` is a unit direction spread evenly
/// around the circle. The rolling variability features of the stream
/// therefore encode the intent, which is what calibration learns.
pub struct EegSimulator {
    config: EegConfig,
    rng: StdRng,
    noise: Normal<f32>,
    directions: Vec<[f32; 2]>,
    phases: Vec<f32>,
    intent_override: Option<[f32; 2]>,
    time_offset: f64,
}

impl EegSimulator {
    pub fn new(config: EegConfig) -> XonResult<Self> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, config.noise_std).map_err(|e| XonError::InvalidConfig {
            reason: format!("failed to create noise distribution: {}", e),
        })?;

        let n = config.channel_count;
        let directions = (0..n)
            .map(|c| {
                let angle = 2.0 * PI * c as f32 / n as f32;
                [angle.cos(), angle.sin()]
            })
            .collect();
        let phases = (0..n).map(|_| rng.gen_range(0.0..2.0 * PI)).collect();

        Ok(EegSimulator {
            config,
            rng,
            noise,
            directions,
            phases,
            intent_override: None,
            time_offset: 0.0,
        })
    }

    /// Pin the intent, overriding the configured pattern
    pub fn set_intent(&mut self, intent: Option<[f32; 2]>) {
        self.intent_override = intent.map(|[x, y]| [x.clamp(-1.0, 1.0), y.clamp(-1.0, 1.0)]);
    }

    pub fn set_pattern(&mut self, pattern: IntentPattern) {
        self.config.pattern = pattern;
    }

    /// Intent in effect at the current stream time
    pub fn current_intent(&self) -> [f32; 2] {
        self.intent_override
            .unwrap_or_else(|| self.config.pattern.intent_at_time(self.time_offset as f32))
    }

    /// Per-channel alpha amplitude for an intent
    pub fn channel_gains(&self, intent: [f32; 2]) -> Vec<f32> {
        self.directions
            .iter()
            .map(|d| {
                let alignment = intent[0] * d[0] + intent[1] * d[1];
                (1.0 + self.config.intent_gain * alignment).max(0.05)
            })
            .collect()
    }

    /// Generate `n_samples` rows (timesteps x channels)
    pub fn generate(&mut self, n_samples: usize) -> Vec<Vec<f32>> {
        let dt = 1.0 / self.config.sampling_rate;
        let mut rows = Vec::with_capacity(n_samples);

        for i in 0..n_samples {
            let time = self.time_offset + i as f64 * dt;
            let t = time as f32;
            let intent = self
                .intent_override
                .unwrap_or_else(|| self.config.pattern.intent_at_time(t));
            let gains = self.channel_gains(intent);

            let mut row = Vec::with_capacity(self.config.channel_count);
            for channel in 0..self.config.channel_count {
                let phase = self.phases[channel];
                let alpha = self.config.alpha_amplitude
                    * gains[channel]
                    * tone(self.config.alpha_frequency, time, phase);
                let drift = self.config.drift_amplitude * tone(0.05, time, phase);
                let powerline = self
                    .config
                    .powerline_freq
                    .map(|f| 2.0 * tone(f, time, 0.0))
                    .unwrap_or(0.0);

                row.push(alpha + drift + powerline + self.noise.sample(&mut self.rng));
            }
            rows.push(row);
        }

        self.time_offset += n_samples as f64 * dt;
        rows
    }

    /// Stream time of the next sample in seconds
    pub fn time(&self) -> f64 {
        self.time_offset
    }

    /// Reset time offset (useful for restarting simulation)
    pub fn reset_time(&mut self) {
        self.time_offset = 0.0;
    }

    /// Get current configuration
    pub fn config(&self) -> &EegConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EegConfig {
        EegConfig {
            seed: Some(7),
            pattern: IntentPattern::Rest,
            ..EegConfig::default()
        }
    }

    fn std_of(rows: &[Vec<f32>], channel: usize) -> f32 {
        let n = rows.len() as f32;
        let mean = rows.iter().map(|r| r[channel]).sum::<f32>() / n;
        (rows.iter().map(|r| (r[channel] - mean).powi(2)).sum::<f32>() / n).sqrt()
    }

    #[test]
    fn test_shape_and_time() {
        let mut simulator = EegSimulator::new(config()).unwrap();
        let rows = simulator.generate(125);
        assert_eq!(rows.len(), 125);
        assert!(rows.iter().all(|r| r.len() == 8));
        assert!((simulator.time() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = EegSimulator::new(config()).unwrap().generate(50);
        let b = EegSimulator::new(config()).unwrap().generate(50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_intent_modulates_channel_power() {
        let mut config = config();
        config.drift_amplitude = 0.0;
        config.powerline_freq = None;
        config.noise_std = 0.1;
        let mut simulator = EegSimulator::new(config).unwrap();

        // channel 0 points along +x, channel 4 along -x
        simulator.set_intent(Some([1.0, 0.0]));
        let rows = simulator.generate(500);
        assert!(std_of(&rows, 0) > 3.0 * std_of(&rows, 4));

        simulator.set_intent(Some([-1.0, 0.0]));
        let rows = simulator.generate(500);
        assert!(std_of(&rows, 4) > 3.0 * std_of(&rows, 0));
    }

    #[test]
    fn test_tone_phase_after_long_run() {
        // a quarter period past 10^6 s, where f32 time has 1/16 s spacing
        assert!((tone(50.0, 1_000_000.005, 0.0) - 1.0).abs() < 1e-3);
        assert!((tone(10.0, 1_000_000.075, 0.0) + 1.0).abs() < 1e-3);
        assert!(tone(50.0, 0.0, 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_config() {
        let mut bad = config();
        bad.channel_count = 0;
        assert!(EegSimulator::new(bad).is_err());
    }
}
