//! Streaming pipeline: inlet -> rolling window -> FIR filter -> features

use crate::buffer::RollingWindow;
use crate::config::PipelineConfig;
use crate::features::RollingStd;
use crate::filters::FirFilter;
use crate::plot::{plot_interval_steps, prepare_plot, PlotFrame};
use crate::processor::{BlockProcessor, StreamMetrics};
use tracing::{debug, info};
use xon_core::{resolve_stream, StreamInfo, StreamInlet, StreamResolver, XonResult};

/// Result of one pull from the inlet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Rows appended to the window
    Appended(usize),
    /// Nothing usable arrived; the window is unchanged
    NoData,
}

/// Owns the inlet and every stage of the feature pipeline
pub struct Streamer {
    config: PipelineConfig,
    inlet: Box<dyn StreamInlet>,
    info: StreamInfo,
    window: RollingWindow,
    filter: FirFilter,
    features: RollingStd,
    filtered: Vec<Vec<f32>>,
    metrics: StreamMetrics,
}

impl Streamer {
    /// Resolve the configured stream by name and open an inlet on it
    pub fn connect<R: StreamResolver + ?Sized>(
        resolver: &R,
        config: PipelineConfig,
    ) -> XonResult<Self> {
        config.validate()?;
        let stream = &config.stream;
        let info = resolve_stream(resolver, &stream.stream_name, stream.resolve_attempts)?;
        let inlet = resolver.open_inlet(&info, config.stream.buffer_seconds)?;
        Self::from_inlet(inlet, config)
    }

    /// Build the pipeline around an already opened inlet
    pub fn from_inlet(inlet: Box<dyn StreamInlet>, config: PipelineConfig) -> XonResult<Self> {
        config.validate()?;
        let info = inlet.info().clone();

        let window_seconds = config.stream.window_seconds;
        let window = RollingWindow::new(info.nominal_srate, info.channel_count, window_seconds)?;
        let filter = FirFilter::new(&config.filter, info.nominal_srate, info.channel_count)?;
        let features = RollingStd::from_config(&config.features, info.channel_count)?;

        info!(
            stream = %info.name,
            sampling_rate = info.nominal_srate,
            channels = info.channel_count,
            window_samples = window.capacity(),
            "starting streamer"
        );

        Ok(Streamer {
            filtered: window.to_block(),
            config,
            inlet,
            info,
            window,
            filter,
            features,
            metrics: StreamMetrics::default(),
        })
    }

    /// Pull the newest chunk into the window.
    ///
    /// When the inlet has a backlog above the drain threshold, older chunks
    /// are skipped so the window tracks the present.
    pub fn pull_data(&mut self) -> XonResult<PullOutcome> {
        let timeout = self.config.stream.pull_timeout();
        let max_samples = self.config.stream.max_chunk_samples;

        let mut chunk = self.inlet.pull_chunk(timeout, max_samples)?;
        while self.inlet.samples_available() > self.config.stream.drain_threshold {
            chunk = self.inlet.pull_chunk(timeout, max_samples)?;
            self.metrics.chunks_skipped += 1;
        }

        let added = self.window.append(&chunk)?;
        if added == 0 {
            self.metrics.empty_pulls += 1;
            return Ok(PullOutcome::NoData);
        }

        self.metrics.data_pulls += 1;
        self.metrics.samples_appended += added as u64;
        Ok(PullOutcome::Appended(added))
    }

    /// One polling iteration: pull, filter the full window, extract features
    pub fn step(&mut self) -> XonResult<Vec<f32>> {
        let timer = StreamMetrics::start_timing();

        self.pull_data()?;
        self.filtered = self.filter.filter(&self.window.to_block())?;
        let features = self.features.extract(&self.filtered)?;

        timer.finish(&mut self.metrics);
        Ok(features)
    }

    /// Blocking loop over `n_steps` pulls.
    ///
    /// Each step passes the window through `callbacks` in order; every few
    /// steps the result is handed to `on_plot`. Empty pulls idle for the
    /// configured sleep before the next try.
    pub fn stream<F>(
        &mut self,
        n_steps: usize,
        callbacks: &mut [Box<dyn BlockProcessor>],
        mut on_plot: F,
    ) -> XonResult<()>
    where
        F: FnMut(&PlotFrame),
    {
        let plot_every =
            plot_interval_steps(self.info.nominal_srate, self.config.update_plot_every_s);
        debug!(n_steps, plot_every, "streaming");

        for step in 0..n_steps {
            if self.pull_data()? == PullOutcome::NoData {
                std::thread::sleep(self.config.stream.idle_sleep());
            }

            let mut block = self.window.to_block();
            for callback in callbacks.iter_mut() {
                block = callback.process(&block)?;
            }

            if step % plot_every == 0 {
                on_plot(&prepare_plot(self.window.times(), &block, self.config.plot_subsample));
            }
        }

        Ok(())
    }

    /// Plot frame of the latest filtered window
    pub fn plot_frame(&self) -> PlotFrame {
        prepare_plot(self.window.times(), &self.filtered, self.config.plot_subsample)
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    /// Output of the filter from the last step
    pub fn filtered(&self) -> &[Vec<f32>] {
        &self.filtered
    }

    /// Length of the feature vectors `step` returns
    pub fn n_features(&self) -> usize {
        self.features.n_features()
    }

    pub fn metrics(&self) -> &StreamMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;
    use xon_core::Chunk;

    /// Inlet replaying prepared chunks, then timing out
    struct ReplayInlet {
        info: StreamInfo,
        chunks: VecDeque<Chunk>,
        backlog: usize,
    }

    impl StreamInlet for ReplayInlet {
        fn info(&self) -> &StreamInfo {
            &self.info
        }

        fn pull_chunk(&mut self, _timeout: Duration, _max_samples: usize) -> XonResult<Chunk> {
            let chunk = self.chunks.pop_front().unwrap_or_default();
            self.backlog = self.backlog.saturating_sub(chunk.len());
            Ok(chunk)
        }

        fn samples_available(&self) -> usize {
            self.backlog
        }
    }

    fn chunk(start: usize, len: usize, channels: usize) -> Chunk {
        let samples = (start..start + len)
            .map(|i| (0..channels).map(|c| ((i as f32) * 0.3 + c as f32).sin()).collect())
            .collect();
        let timestamps = (start..start + len).map(|i| 1000.0 + i as f64 * 0.0041).collect();
        Chunk::new(samples, timestamps).unwrap()
    }

    fn streamer(chunks: Vec<Chunk>, backlog: usize) -> Streamer {
        let inlet = ReplayInlet {
            info: StreamInfo::new("replay", "EEG", "test", 250.0, 4).unwrap(),
            chunks: chunks.into(),
            backlog,
        };
        let mut config = PipelineConfig::for_stream("replay");
        config.stream.window_seconds = 1.0;
        config.stream.idle_sleep = 0.0;
        Streamer::from_inlet(Box::new(inlet), config).unwrap()
    }

    #[test]
    fn test_step_returns_feature_per_channel() {
        let mut streamer = streamer(vec![chunk(0, 24, 4)], 0);

        let features = streamer.step().unwrap();
        assert_eq!(features.len(), 4);
        assert_eq!(streamer.metrics().data_pulls, 1);
        assert_eq!(streamer.metrics().steps, 1);
        assert_eq!(streamer.filtered().len(), 250);
    }

    #[test]
    fn test_timeout_keeps_window() {
        let mut streamer = streamer(Vec::new(), 0);
        let before = streamer.window().to_block();

        assert_eq!(streamer.pull_data().unwrap(), PullOutcome::NoData);
        assert_eq!(streamer.window().to_block(), before);
        assert_eq!(streamer.metrics().empty_pulls, 1);
    }

    #[test]
    fn test_backlog_skips_to_latest_chunk() {
        let chunks: Vec<Chunk> = (0..5).map(|i| chunk(i * 24, 24, 4)).collect();
        let expected_last = chunks[2].samples[23].clone();
        // 120 queued: pull 0 leaves 96, pull 1 leaves 72, pull 2 leaves 48
        let mut streamer = streamer(chunks, 120);

        assert_eq!(streamer.pull_data().unwrap(), PullOutcome::Appended(24));
        assert_eq!(streamer.metrics().chunks_skipped, 2);
        assert_eq!(streamer.window().samples().back(), Some(&expected_last));
    }

    #[test]
    fn test_stream_runs_callbacks_and_plots() {
        struct Gain(f32);
        impl BlockProcessor for Gain {
            fn process(&mut self, block: &[Vec<f32>]) -> XonResult<Vec<Vec<f32>>> {
                Ok(block.iter().map(|r| r.iter().map(|v| v * self.0).collect()).collect())
            }
            fn name(&self) -> &str {
                "gain"
            }
            fn reset(&mut self) {}
        }

        let chunks = (0..8).map(|i| chunk(i * 12, 12, 4)).collect();
        let mut streamer = streamer(chunks, 0);
        let mut callbacks: Vec<Box<dyn BlockProcessor>> = vec![Box::new(Gain(2.0))];
        let mut plots = 0;

        streamer
            .stream(8, &mut callbacks, |frame| {
                assert_eq!(frame.traces.len(), 4);
                plots += 1;
            })
            .unwrap();

        // 250 Hz, 0.2 s refresh -> every 4 steps
        assert_eq!(plots, 2);
        assert_eq!(streamer.metrics().samples_appended, 96);
    }
}
