//! Plot-ready traces from a window

use crate::features::{nan_mean, nan_std};
use std::collections::VecDeque;

/// Stacked traces ready for a line plot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotFrame {
    /// Seconds relative to the newest sample (all <= 0)
    pub times: Vec<f64>,
    /// One trace per channel, channel `c` centred on `-c`
    pub traces: Vec<Vec<f64>>,
}

impl PlotFrame {
    /// Trace of one channel as (x, y) points
    pub fn points(&self, channel: usize) -> Vec<[f64; 2]> {
        self.traces
            .get(channel)
            .map(|trace| self.times.iter().zip(trace).map(|(&t, &y)| [t, y]).collect())
            .unwrap_or_default()
    }
}

/// Subsample, zero-mean and scale each channel by three standard
/// deviations, then stack channels downwards
pub fn prepare_plot(times: &VecDeque<f64>, block: &[Vec<f32>], subsample: usize) -> PlotFrame {
    let step = subsample.max(1);
    let newest = times.back().copied().unwrap_or(0.0);
    let channels = block.first().map(|row| row.len()).unwrap_or(0);

    let rows: Vec<&Vec<f32>> = block.iter().step_by(step).collect();
    let plot_times = times.iter().step_by(step).map(|t| t - newest).collect();

    let traces = (0..channels)
        .map(|channel| {
            let column: Vec<f64> = rows.iter().map(|row| row[channel] as f64).collect();
            let mean = nan_mean(column.iter().copied());
            let std = nan_std(&column);
            let scale = if std > 0.0 { 3.0 * std } else { 1.0 };
            column
                .iter()
                .map(|v| (v - mean) / scale - channel as f64)
                .collect()
        })
        .collect();

    PlotFrame {
        times: plot_times,
        traces,
    }
}

/// Polling steps between plot refreshes; each step is assumed to bring in
/// about 12 samples
pub fn plot_interval_steps(sampling_rate: f64, update_plot_every_s: f64) -> usize {
    let steps = (update_plot_every_s / (12.0 / sampling_rate)) as usize;
    steps.max(1)
}
