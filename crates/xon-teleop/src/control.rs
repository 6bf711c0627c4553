//! Keyboard teleoperation loop

use crate::display::{decode_frame, FrameSink};
use crate::input::InputSource;
use crate::keys::{WheelCommand, SPEED};
use serde::{Deserialize, Serialize};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use xon_core::{Vehicle, VehicleAddress, XonError, XonResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleopConfig {
    /// Full wheel speed
    pub speed: f32,
    pub address: VehicleAddress,
    /// Wait for the next camera frame each iteration
    pub block_camera: bool,
    pub loop_sleep_ms: u64,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            speed: SPEED,
            address: VehicleAddress::default(),
            block_camera: true,
            loop_sleep_ms: 1,
        }
    }
}

impl TeleopConfig {
    pub fn validate(&self) -> XonResult<()> {
        if !self.speed.is_finite() || self.speed < 0.0 {
            return Err(XonError::InvalidConfig {
                reason: format!("speed must be finite and non-negative, got {}", self.speed),
            });
        }
        VehicleAddress::new(&self.address.host, &self.address.robot).map(|_| ())
    }
}

/// Counters for one teleoperation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeleopStats {
    pub iterations: u64,
    pub frames_shown: u64,
    /// Camera polls that had nothing new
    pub camera_misses: u64,
    pub distance_readings: u64,
    pub device_errors: u64,
    pub last_distance: Option<f32>,
    pub last_command: WheelCommand,
}

/// Reads input, drives, polls sensors and pushes frames, one iteration per `step`
pub struct TeleopLoop {
    config: TeleopConfig,
    stats: TeleopStats,
}

impl TeleopLoop {
    pub fn new(config: TeleopConfig) -> XonResult<Self> {
        config.validate()?;
        Ok(TeleopLoop {
            config,
            stats: TeleopStats::default(),
        })
    }

    pub fn stats(&self) -> &TeleopStats {
        &self.stats
    }

    pub fn config(&self) -> &TeleopConfig {
        &self.config
    }

    fn device_error(&mut self, err: XonError) {
        warn!(error = %err, "vehicle device error");
        self.stats.device_errors += 1;
    }

    /// One iteration. Device errors are logged and counted; only a failing
    /// display ends the loop.
    pub fn step(
        &mut self,
        input: &mut dyn InputSource,
        vehicle: &mut dyn Vehicle,
        sink: &mut dyn FrameSink,
    ) -> XonResult<()> {
        self.stats.iterations += 1;

        let command = input
            .read_key()
            .map(|key| WheelCommand::for_key(key, self.config.speed))
            .unwrap_or(WheelCommand::STOP);
        if command != self.stats.last_command {
            debug!(left = command.left, right = command.right, "drive");
        }
        match vehicle.drive(command.left, command.right) {
            Ok(()) => self.stats.last_command = command,
            Err(err) => self.device_error(err),
        }

        match vehicle.capture_distance(false) {
            Ok(Some(metres)) => {
                self.stats.distance_readings += 1;
                self.stats.last_distance = Some(metres);
                sink.show_distance(metres);
            }
            Ok(None) => {}
            Err(err) => self.device_error(err),
        }

        match vehicle.capture_camera(self.config.block_camera) {
            Ok(Some(bytes)) => match decode_frame(&bytes) {
                Ok(frame) => {
                    sink.show_frame(frame)?;
                    self.stats.frames_shown += 1;
                }
                Err(err) => self.device_error(err),
            },
            Ok(None) => self.stats.camera_misses += 1,
            Err(err) => self.device_error(err),
        }

        Ok(())
    }

    /// Loop until `shutdown` turns true or its sender goes away, then stop the wheels
    pub fn run(
        &mut self,
        input: &mut dyn InputSource,
        vehicle: &mut dyn Vehicle,
        sink: &mut dyn FrameSink,
        shutdown: &watch::Receiver<bool>,
    ) -> XonResult<TeleopStats> {
        info!(vehicle = %self.config.address, speed = self.config.speed, "teleoperation started");
        let pause = Duration::from_millis(self.config.loop_sleep_ms);

        let result = loop {
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break Ok(());
            }
            if let Err(err) = self.step(input, vehicle, sink) {
                break Err(err);
            }
            if !pause.is_zero() {
                std::thread::sleep(pause);
            }
        };

        if let Err(err) = vehicle.drive(0.0, 0.0) {
            self.device_error(err);
        }
        info!(
            iterations = self.stats.iterations,
            frames = self.stats.frames_shown,
            device_errors = self.stats.device_errors,
            "teleoperation stopped"
        );
        result.map(|()| self.stats.clone())
    }
}

/// Teleoperation running on its own thread; dropping it signals shutdown
/// and waits for the loop to finish
pub struct TeleopSession {
    shutdown: watch::Sender<bool>,
    thread: Option<JoinHandle<XonResult<TeleopStats>>>,
}

impl TeleopSession {
    pub fn spawn(
        config: TeleopConfig,
        mut input: Box<dyn InputSource>,
        mut vehicle: Box<dyn Vehicle>,
        mut sink: Box<dyn FrameSink>,
    ) -> XonResult<Self> {
        let mut control = TeleopLoop::new(config)?;
        let (shutdown, signal) = watch::channel(false);

        let thread = std::thread::Builder::new()
            .name("xon-teleop".to_string())
            .spawn(move || control.run(input.as_mut(), vehicle.as_mut(), sink.as_mut(), &signal))
            .map_err(|e| XonError::DeviceError {
                device: "teleop thread".to_string(),
                reason: e.to_string(),
            })?;

        Ok(TeleopSession {
            shutdown,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal shutdown and collect the loop's result
    pub fn stop(mut self) -> XonResult<TeleopStats> {
        self.finish()
    }

    fn finish(&mut self) -> XonResult<TeleopStats> {
        let _ = self.shutdown.send(true);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| XonError::DeviceError {
                device: "teleop thread".to_string(),
                reason: "control loop panicked".to_string(),
            })?,
            None => Ok(TeleopStats::default()),
        }
    }
}

impl Drop for TeleopSession {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            warn!(error = %err, "teleoperation ended with an error");
        }
    }
}
