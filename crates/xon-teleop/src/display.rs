//! Camera frame decoding and the display the loop pushes into

use image::RgbImage;
use std::sync::{Arc, Mutex};
use xon_core::{XonError, XonResult};

/// Decode an encoded camera frame (PNG or JPEG) to RGB
pub fn decode_frame(bytes: &[u8]) -> XonResult<RgbImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|e| XonError::FrameDecode { reason: e.to_string() })
}

/// Where the control loop sends what the robot sees
pub trait FrameSink: Send {
    fn show_frame(&mut self, frame: RgbImage) -> XonResult<()>;

    /// Latest distance reading in metres
    fn show_distance(&mut self, _metres: f32) {}
}

/// Latest sensor state as seen by a viewer
#[derive(Debug, Clone, Default)]
pub struct TeleopView {
    pub frame: Option<RgbImage>,
    /// Increments with every new frame so viewers can skip re-uploads
    pub frame_seq: u64,
    pub distance: Option<f32>,
}

/// Frame sink that keeps only the newest frame, readable from another thread
#[derive(Debug, Clone, Default)]
pub struct SharedView {
    view: Arc<Mutex<TeleopView>>,
}

impl SharedView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current view
    pub fn snapshot(&self) -> TeleopView {
        self.view.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Take the frame if it is newer than `seen_seq`
    pub fn frame_since(&self, seen_seq: u64) -> Option<(u64, RgbImage)> {
        let view = self.view.lock().ok()?;
        if view.frame_seq > seen_seq {
            view.frame.clone().map(|f| (view.frame_seq, f))
        } else {
            None
        }
    }

    pub fn distance(&self) -> Option<f32> {
        self.view.lock().ok().and_then(|v| v.distance)
    }
}

impl FrameSink for SharedView {
    fn show_frame(&mut self, frame: RgbImage) -> XonResult<()> {
        let mut view = self.view.lock().map_err(|_| XonError::DeviceError {
            device: "display".to_string(),
            reason: "view lock poisoned".to_string(),
        })?;
        view.frame = Some(frame);
        view.frame_seq += 1;
        Ok(())
    }

    fn show_distance(&mut self, metres: f32) {
        if let Ok(mut view) = self.view.lock() {
            view.distance = Some(metres);
        }
    }
}
