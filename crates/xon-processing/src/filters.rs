//! Causal FIR band-pass filtering with state carried across calls

use crate::config::FilterConfig;
use crate::processor::BlockProcessor;
use std::f64::consts::PI;
use tracing::debug;
use xon_core::{XonError, XonResult};

/// Stopband attenuation (dB) a Kaiser window reaches for a given length and
/// transition width (fraction of Nyquist)
pub fn kaiser_atten(num_taps: usize, width: f64) -> f64 {
    2.285 * (num_taps as f64 - 1.0) * PI * width + 7.95
}

/// Kaiser shape parameter for a target attenuation in dB
pub fn kaiser_beta(atten: f64) -> f64 {
    if atten > 50.0 {
        0.1102 * (atten - 8.7)
    } else if atten > 21.0 {
        0.5842 * (atten - 21.0).powf(0.4) + 0.07886 * (atten - 21.0)
    } else {
        0.0
    }
}

/// Modified Bessel function of the first kind, order zero (power series)
fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..200 {
        term *= (half / k as f64).powi(2);
        sum += term;
        if term < sum * 1e-17 {
            break;
        }
    }
    sum
}

/// Symmetric Kaiser window of length `n`
pub fn kaiser_window(n: usize, beta: f64) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    let denom = bessel_i0(beta);
    (0..n)
        .map(|i| {
            let r = 2.0 * i as f64 / (n as f64 - 1.0) - 1.0;
            bessel_i0(beta * (1.0 - r * r).max(0.0).sqrt()) / denom
        })
        .collect()
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Windowed-sinc band-pass taps.
///
/// Band edges are normalized to Nyquist. The taps are scaled for unit gain
/// at the centre of the band.
pub fn firwin_bandpass(num_taps: usize, low: f64, high: f64, width: f64) -> XonResult<Vec<f64>> {
    if num_taps < 2 {
        return Err(XonError::InvalidConfig {
            reason: format!("filter needs at least 2 taps, got {}", num_taps),
        });
    }
    if !(0.0 < low && low < high && high < 1.0) {
        return Err(XonError::InvalidConfig {
            reason: format!("normalized band [{}, {}] must lie strictly inside (0, 1)", low, high),
        });
    }

    let alpha = 0.5 * (num_taps as f64 - 1.0);
    let beta = kaiser_beta(kaiser_atten(num_taps, width));
    let window = kaiser_window(num_taps, beta);

    let mut taps: Vec<f64> = (0..num_taps)
        .map(|i| {
            let m = i as f64 - alpha;
            (high * sinc(high * m) - low * sinc(low * m)) * window[i]
        })
        .collect();

    let centre = 0.5 * (low + high);
    let gain: f64 = taps
        .iter()
        .enumerate()
        .map(|(i, h)| h * (PI * (i as f64 - alpha) * centre).cos())
        .sum();
    for h in &mut taps {
        *h /= gain;
    }

    Ok(taps)
}

/// Initial state giving steady-state output for a unit step input.
///
/// For an FIR filter the transposed direct form state is the tail sum of
/// the taps: `zi[k] = b[k+1] + ... + b[n-1]`.
pub fn lfilter_zi(taps: &[f64]) -> Vec<f64> {
    let n = taps.len().saturating_sub(1);
    let mut zi = vec![0.0; n];
    let mut acc = 0.0;
    for k in (0..n).rev() {
        acc += taps[k + 1];
        zi[k] = acc;
    }
    zi
}

/// Band-pass FIR filter with per-channel state
#[derive(Debug, Clone)]
pub struct FirFilter {
    name: String,
    taps: Vec<f64>,
    initial_state: Vec<f64>,
    state: Vec<Vec<f64>>,
}

impl FirFilter {
    /// Design the filter for a stream and seed every channel's state
    pub fn new(config: &FilterConfig, sampling_rate: f64, channel_count: usize) -> XonResult<Self> {
        config.validate(sampling_rate)?;
        let nyquist = sampling_rate / 2.0;
        let taps = firwin_bandpass(
            config.num_taps,
            config.low_cutoff / nyquist,
            config.high_cutoff / nyquist,
            config.transition_width,
        )?;
        Ok(Self::from_taps(taps, channel_count, "fir_bandpass"))
    }

    /// Filter with explicit taps
    pub fn from_taps(taps: Vec<f64>, channel_count: usize, name: &str) -> Self {
        let initial_state = lfilter_zi(&taps);
        debug!(taps = taps.len(), channels = channel_count, "FIR filter ready");
        FirFilter {
            name: name.to_string(),
            state: vec![initial_state.clone(); channel_count],
            initial_state,
            taps,
        }
    }

    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    /// Current state of one channel
    pub fn channel_state(&self, channel: usize) -> Option<&[f64]> {
        self.state.get(channel).map(|s| s.as_slice())
    }

    pub fn channel_count(&self) -> usize {
        self.state.len()
    }

    /// Filter a block (timesteps x channels) along time, advancing the state
    pub fn filter(&mut self, block: &[Vec<f32>]) -> XonResult<Vec<Vec<f32>>> {
        let channels = self.state.len();
        let mut output = Vec::with_capacity(block.len());

        for row in block {
            if row.len() != channels {
                return Err(XonError::ShapeMismatch {
                    context: "fir filter channels",
                    expected: channels,
                    actual: row.len(),
                });
            }

            let mut out_row = Vec::with_capacity(channels);
            for (channel, &sample) in row.iter().enumerate() {
                out_row.push(self.step(channel, sample as f64) as f32);
            }
            output.push(out_row);
        }

        Ok(output)
    }

    /// Transposed direct form II update for one sample
    fn step(&mut self, channel: usize, x: f64) -> f64 {
        let b = &self.taps;
        let z = &mut self.state[channel];
        let n = z.len();
        if n == 0 {
            return b[0] * x;
        }

        let y = b[0] * x + z[0];
        for k in 0..n - 1 {
            z[k] = b[k + 1] * x + z[k + 1];
        }
        z[n - 1] = b[n] * x;
        y
    }
}

impl BlockProcessor for FirFilter {
    fn process(&mut self, block: &[Vec<f32>]) -> XonResult<Vec<Vec<f32>>> {
        self.filter(block)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&mut self) {
        for state in &mut self.state {
            state.clone_from(&self.initial_state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signal(len: usize, channels: usize) -> Vec<Vec<f32>> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 250.0;
                (0..channels)
                    .map(|c| {
                        (2.0 * std::f32::consts::PI * 10.0 * t).sin()
                            + 0.5 * (2.0 * std::f32::consts::PI * 55.0 * t + c as f32).sin()
                            + 0.3 * c as f32
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_kaiser_beta_ranges() {
        assert_eq!(kaiser_beta(10.0), 0.0);
        assert!((kaiser_beta(60.0) - 0.1102 * 51.3).abs() < 1e-12);
        let mid = kaiser_beta(30.0);
        assert!((mid - (0.5842 * 9f64.powf(0.4) + 0.07886 * 9.0)).abs() < 1e-12);
    }

    #[test]
    fn test_default_design_uses_rectangular_window() {
        // 32 taps with width 0.05 gives ~19 dB, below the Kaiser threshold
        assert!(kaiser_atten(32, 0.05) < 21.0);
        let window = kaiser_window(32, 0.0);
        assert!(window.iter().all(|w| (w - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_kaiser_window_symmetric_and_peaked() {
        let window = kaiser_window(9, 5.0);
        for i in 0..9 {
            assert!((window[i] - window[8 - i]).abs() < 1e-12);
        }
        assert!((window[4] - 1.0).abs() < 1e-12);
        assert!(window[0] < window[2]);
    }

    #[test]
    fn test_bandpass_taps_linear_phase_and_unit_centre_gain() {
        let taps = firwin_bandpass(32, 1.0 / 125.0, 40.0 / 125.0, 0.05).unwrap();
        assert_eq!(taps.len(), 32);
        for i in 0..32 {
            assert!((taps[i] - taps[31 - i]).abs() < 1e-12);
        }

        let centre = 0.5 * (1.0 / 125.0 + 40.0 / 125.0);
        let alpha = 15.5;
        let gain: f64 = taps
            .iter()
            .enumerate()
            .map(|(i, h)| h * (PI * (i as f64 - alpha) * centre).cos())
            .sum();
        assert!((gain - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_band_rejected() {
        assert!(firwin_bandpass(32, 0.5, 0.2, 0.05).is_err());
        assert!(firwin_bandpass(32, 0.1, 1.0, 0.05).is_err());
        assert!(firwin_bandpass(1, 0.1, 0.2, 0.05).is_err());
        assert!(FirFilter::new(&FilterConfig::default(), 60.0, 4).is_err());
    }

    #[test]
    fn test_zi_is_tail_sum() {
        let zi = lfilter_zi(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(zi, vec![9.0, 7.0, 4.0]);
    }

    #[test]
    fn test_step_input_starts_in_steady_state() {
        let mut filter = FirFilter::new(&FilterConfig::default(), 250.0, 2).unwrap();
        let dc_gain: f64 = filter.taps().iter().sum();

        let out = filter.filter(&vec![vec![1.0, 1.0]; 40]).unwrap();
        for row in out {
            for value in row {
                assert!((value as f64 - dc_gain).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_split_filtering_matches_single_pass() {
        let signal = test_signal(300, 3);
        let mut whole = FirFilter::new(&FilterConfig::default(), 250.0, 3).unwrap();
        let mut split = whole.clone();

        let expected = whole.filter(&signal).unwrap();
        let mut actual = split.filter(&signal[..117]).unwrap();
        actual.extend(split.filter(&signal[117..]).unwrap());

        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(&expected) {
            for (x, y) in a.iter().zip(e) {
                assert!((x - y).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_state_advances_and_resets() {
        let mut filter = FirFilter::new(&FilterConfig::default(), 250.0, 1).unwrap();
        let initial = filter.channel_state(0).unwrap().to_vec();

        filter.filter(&test_signal(20, 1)).unwrap();
        assert_ne!(filter.channel_state(0).unwrap(), initial.as_slice());

        filter.reset();
        assert_eq!(filter.channel_state(0).unwrap(), initial.as_slice());
    }

    #[test]
    fn test_output_shape_matches_input() {
        let mut filter = FirFilter::new(&FilterConfig::default(), 250.0, 4).unwrap();
        let out = filter.process(&test_signal(57, 4)).unwrap();
        assert_eq!(out.len(), 57);
        assert!(out.iter().all(|row| row.len() == 4));

        assert!(filter.process(&test_signal(5, 2)).is_err());
    }
}
