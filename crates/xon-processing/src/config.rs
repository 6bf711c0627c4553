//! Configuration management for the streaming pipeline

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use xon_core::{config_error, XonError, XonResult, DEFAULT_RESOLVE_ATTEMPTS};

/// Stream acquisition parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Name of the EEG stream to resolve
    pub stream_name: String,
    /// Resolve attempts before giving up
    pub resolve_attempts: usize,
    /// Rolling window duration in seconds
    pub window_seconds: f64,
    /// Inlet buffer in seconds
    pub buffer_seconds: f64,
    /// Poll timeout for a single pull (seconds)
    pub pull_timeout: f64,
    /// Maximum samples per pull
    pub max_chunk_samples: usize,
    /// Queue depth above which stale chunks are skipped
    pub drain_threshold: usize,
    /// Idle time after an empty pull in blocking loops (seconds)
    pub idle_sleep: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stream_name: "X.on-102801-0045".to_string(),
            resolve_attempts: DEFAULT_RESOLVE_ATTEMPTS,
            window_seconds: 5.0,
            buffer_seconds: 1.0,
            pull_timeout: 0.01,
            max_chunk_samples: 24,
            drain_threshold: 50,
            idle_sleep: 0.01,
        }
    }
}

impl StreamConfig {
    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.pull_timeout)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_secs_f64(self.idle_sleep)
    }

    pub fn validate(&self) -> XonResult<()> {
        if self.stream_name.is_empty() {
            return Err(config_error!("stream name cannot be empty"));
        }
        if !(self.window_seconds > 0.0) {
            return Err(config_error!("window must be positive, got {}", self.window_seconds));
        }
        if !(self.pull_timeout >= 0.0 && self.idle_sleep >= 0.0 && self.buffer_seconds >= 0.0) {
            return Err(config_error!("timeouts and buffer lengths cannot be negative"));
        }
        if self.max_chunk_samples < 2 {
            return Err(config_error!(
                "max chunk samples must be at least 2, got {}",
                self.max_chunk_samples
            ));
        }
        Ok(())
    }
}

/// FIR band-pass design parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Number of filter taps
    pub num_taps: usize,
    /// Lower band edge (Hz)
    pub low_cutoff: f64,
    /// Upper band edge (Hz)
    pub high_cutoff: f64,
    /// Transition width as a fraction of Nyquist, drives the Kaiser window
    pub transition_width: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            num_taps: 32,
            low_cutoff: 1.0,
            high_cutoff: 40.0,
            transition_width: 0.05,
        }
    }
}

impl FilterConfig {
    /// Validate against the stream's sampling rate
    pub fn validate(&self, sampling_rate: f64) -> XonResult<()> {
        let nyquist = sampling_rate / 2.0;
        if self.num_taps < 2 {
            return Err(config_error!("filter needs at least 2 taps, got {}", self.num_taps));
        }
        if !(self.low_cutoff > 0.0) || self.low_cutoff >= self.high_cutoff {
            return Err(config_error!(
                "band edges must satisfy 0 < low < high, got [{}, {}]",
                self.low_cutoff,
                self.high_cutoff
            ));
        }
        if self.high_cutoff >= nyquist {
            return Err(config_error!(
                "high cutoff {} Hz must be below Nyquist {} Hz",
                self.high_cutoff,
                nyquist
            ));
        }
        if self.transition_width < 0.0 {
            return Err(config_error!("transition width cannot be negative"));
        }
        Ok(())
    }
}

/// Rolling variability feature parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Channels kept for features; `None` keeps every stream channel
    pub n_features: Option<usize>,
    /// Number of past variability vectors averaged into the baseline
    pub history_chunks: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_features: None,
            history_chunks: 100,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> XonResult<()> {
        if self.history_chunks == 0 {
            return Err(config_error!("history must hold at least one chunk"));
        }
        if self.n_features == Some(0) {
            return Err(config_error!("at least one feature channel is required"));
        }
        Ok(())
    }
}

/// Everything the streamer needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub stream: StreamConfig,
    pub filter: FilterConfig,
    pub features: FeatureConfig,
    /// Seconds between plot refreshes in `Streamer::stream`
    pub update_plot_every_s: f64,
    /// Plot every n-th sample
    pub plot_subsample: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            filter: FilterConfig::default(),
            features: FeatureConfig::default(),
            update_plot_every_s: 0.2,
            plot_subsample: 5,
        }
    }
}

impl PipelineConfig {
    /// Default pipeline for a named stream
    pub fn for_stream(stream_name: &str) -> Self {
        let mut config = Self::default();
        config.stream.stream_name = stream_name.to_string();
        config
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(text: &str) -> XonResult<Self> {
        serde_json::from_str(text).map_err(|e| config_error!("invalid pipeline config: {}", e))
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> XonResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| XonError::InvalidConfig {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_json(&text)
    }

    /// Validate everything that does not depend on the stream
    pub fn validate(&self) -> XonResult<()> {
        self.stream.validate()?;
        self.features.validate()?;
        if self.plot_subsample == 0 {
            return Err(config_error!("plot subsample must be at least 1"));
        }
        if !(self.update_plot_every_s > 0.0) {
            return Err(config_error!("plot refresh period must be positive"));
        }
        Ok(())
    }
}
