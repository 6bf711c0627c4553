//! xon-processing: Real-time EEG feature pipeline
//!
//! Rolling window, causal FIR band-pass and rolling normalized variability,
//! wired together by the `Streamer`.

pub mod buffer;
pub mod config;
pub mod features;
pub mod filters;
pub mod pipeline;
pub mod plot;
pub mod processor;

pub use buffer::RollingWindow;
pub use config::{FeatureConfig, FilterConfig, PipelineConfig, StreamConfig};
pub use features::RollingStd;
pub use filters::{firwin_bandpass, lfilter_zi, FirFilter};
pub use pipeline::{PullOutcome, Streamer};
pub use plot::{plot_interval_steps, prepare_plot, PlotFrame};
pub use processor::{BlockProcessor, StreamMetrics};
