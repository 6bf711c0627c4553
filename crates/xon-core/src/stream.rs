//! Stream metadata, chunks and the acquisition traits

use crate::error::{XonError, XonResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Descriptor of a discoverable signal stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Human-readable stream name, e.g. the headset serial
    pub name: String,
    /// Content type, e.g. "EEG"
    pub stream_type: String,
    /// Source identifier reported by the device
    pub source_id: String,
    /// Unique id of this stream instance
    pub uid: Uuid,
    /// Nominal sampling rate in Hz
    pub nominal_srate: f64,
    /// Number of channels per sample
    pub channel_count: usize,
}

impl StreamInfo {
    /// Create a descriptor with a fresh uid
    pub fn new(
        name: &str,
        stream_type: &str,
        source_id: &str,
        nominal_srate: f64,
        channel_count: usize,
    ) -> XonResult<Self> {
        if !(nominal_srate > 0.0) {
            return Err(XonError::InvalidConfig {
                reason: format!("Stream {} has non-positive sampling rate {}", name, nominal_srate),
            });
        }
        if channel_count == 0 {
            return Err(XonError::InvalidConfig {
                reason: format!("Stream {} has no channels", name),
            });
        }

        Ok(StreamInfo {
            name: name.to_string(),
            stream_type: stream_type.to_string(),
            source_id: source_id.to_string(),
            uid: Uuid::new_v4(),
            nominal_srate,
            channel_count,
        })
    }
}

/// Batch of newly arrived samples, one row per timestep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    /// Sample vectors (timesteps x channels)
    pub samples: Vec<Vec<f32>>,
    /// Timestamps as reported by the source, one per row
    pub timestamps: Vec<f64>,
}

impl Chunk {
    /// Create a chunk, checking rows and timestamps line up
    pub fn new(samples: Vec<Vec<f32>>, timestamps: Vec<f64>) -> XonResult<Self> {
        if samples.len() != timestamps.len() {
            return Err(XonError::ShapeMismatch {
                context: "chunk timestamps",
                expected: samples.len(),
                actual: timestamps.len(),
            });
        }
        Ok(Chunk { samples, timestamps })
    }

    /// Empty chunk, returned when a pull times out
    pub fn empty() -> Self {
        Chunk::default()
    }

    /// Number of timesteps
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if chunk carries no samples
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Channels per row (0 for an empty chunk)
    pub fn channel_count(&self) -> usize {
        self.samples.first().map(|row| row.len()).unwrap_or(0)
    }
}

/// Pull-based reader of a resolved stream
pub trait StreamInlet: Send {
    /// Metadata of the stream this inlet reads
    fn info(&self) -> &StreamInfo;

    /// Pull up to `max_samples` samples, waiting at most `timeout` for the
    /// first one. An empty chunk means nothing arrived in time.
    fn pull_chunk(&mut self, timeout: Duration, max_samples: usize) -> XonResult<Chunk>;

    /// Number of samples queued and ready to pull
    fn samples_available(&self) -> usize;
}

/// Stream discovery backend
pub trait StreamResolver {
    /// Streams currently visible with the given content type
    fn resolve_by_type(&self, stream_type: &str) -> Vec<StreamInfo>;

    /// Every stream currently visible
    fn resolve_all(&self) -> Vec<StreamInfo>;

    /// Open an inlet on a resolved stream, buffering up to `max_buffer_secs`
    fn open_inlet(
        &self,
        info: &StreamInfo,
        max_buffer_secs: f64,
    ) -> XonResult<Box<dyn StreamInlet>>;
}
