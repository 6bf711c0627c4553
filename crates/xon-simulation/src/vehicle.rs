//! Simulated differential-drive robot in a square arena

use image::{ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use xon_core::{Vehicle, VehicleAddress, XonError, XonResult};

/// Configuration for the simulated robot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub camera_width: u32,
    pub camera_height: u32,
    /// Camera frame rate (Hz)
    pub camera_fps: f64,
    /// Distance sensor update rate (Hz)
    pub tof_rate: f64,
    /// Distance sensor maximum range (m)
    pub tof_max_range: f32,
    /// Arena side length (m), centred on the origin
    pub arena_size: f32,
    /// Distance between the wheels (m)
    pub wheel_base: f32,
    /// Ground speed (m/s) per unit of wheel command
    pub speed_scale: f32,
    /// Fail every n-th camera capture, for exercising error paths
    pub camera_fault_every: Option<u64>,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            camera_width: 640,
            camera_height: 480,
            camera_fps: 30.0,
            tof_rate: 20.0,
            tof_max_range: 1.2,
            arena_size: 2.0,
            wheel_base: 0.1,
            speed_scale: 0.02,
            camera_fault_every: None,
        }
    }
}

/// Position (m) and heading (rad) in the arena frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub heading: f32,
}

/// Kinematic robot with a rendered camera and a ray-cast distance sensor
pub struct SimulatedVehicle {
    address: VehicleAddress,
    config: VehicleConfig,
    pose: Pose,
    wheels: (f32, f32),
    last_update: Instant,
    last_frame: Option<Instant>,
    last_reading: Option<Instant>,
    frames_captured: u64,
}

impl SimulatedVehicle {
    /// Attach to a robot in the simulated world
    pub fn connect(address: VehicleAddress, config: VehicleConfig) -> XonResult<Self> {
        if config.camera_width == 0 || config.camera_height == 0 {
            return Err(XonError::InvalidConfig {
                reason: "camera resolution cannot be zero".to_string(),
            });
        }
        if !(config.camera_fps > 0.0) || !(config.tof_rate > 0.0) {
            return Err(XonError::InvalidConfig {
                reason: "sensor rates must be positive".to_string(),
            });
        }
        if !(config.arena_size > 0.0) || !(config.wheel_base > 0.0) {
            return Err(XonError::InvalidConfig {
                reason: "arena size and wheel base must be positive".to_string(),
            });
        }

        info!(vehicle = %address, "connected to simulated vehicle");
        Ok(SimulatedVehicle {
            address,
            config,
            pose: Pose::default(),
            wheels: (0.0, 0.0),
            last_update: Instant::now(),
            last_frame: None,
            last_reading: None,
            frames_captured: 0,
        })
    }

    pub fn address(&self) -> &VehicleAddress {
        &self.address
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn wheels(&self) -> (f32, f32) {
        self.wheels
    }

    /// Integrate the current wheel speeds over `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        let (left, right) = self.wheels;
        let v = 0.5 * (left + right) * self.config.speed_scale;
        let omega = (right - left) * self.config.speed_scale / self.config.wheel_base;

        self.pose.x += v * self.pose.heading.cos() * dt;
        self.pose.y += v * self.pose.heading.sin() * dt;
        self.pose.heading = (self.pose.heading + omega * dt).rem_euclid(std::f32::consts::TAU);

        let limit = 0.5 * self.config.arena_size - 0.01;
        self.pose.x = self.pose.x.clamp(-limit, limit);
        self.pose.y = self.pose.y.clamp(-limit, limit);
    }

    fn catch_up(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        self.advance(dt);
    }

    /// Distance along the heading to the nearest arena wall
    pub fn distance_ahead(&self) -> f32 {
        let half = 0.5 * self.config.arena_size;
        let (dx, dy) = (self.pose.heading.cos(), self.pose.heading.sin());

        let along = |pos: f32, dir: f32| -> f32 {
            if dir > 1e-6 {
                (half - pos) / dir
            } else if dir < -1e-6 {
                (-half - pos) / dir
            } else {
                f32::INFINITY
            }
        };

        along(self.pose.x, dx).min(along(self.pose.y, dy)).max(0.0)
    }

    /// Render the forward view: sky, floor with a centre line, and the wall
    /// ahead sized by its distance
    pub fn render_frame(&self) -> RgbImage {
        let (w, h) = (self.config.camera_width, self.config.camera_height);
        let horizon = h as f32 / 2.0;
        let distance = self.distance_ahead().max(0.05);
        let wall_half = (0.25 * h as f32 / distance).min(horizon);

        let heading = self.pose.heading;
        let shade = (1.0 / (1.0 + distance)).clamp(0.3, 1.0);
        let channel = |offset: f32| ((128.0 + 127.0 * (heading - offset).cos()) * shade) as u8;
        let wall = Rgb([channel(0.0), channel(2.094), channel(4.189)]);

        RgbImage::from_fn(w, h, |x, y| {
            let yf = y as f32;
            if (yf - horizon).abs() < wall_half {
                wall
            } else if yf < horizon {
                Rgb([135, 170, 220])
            } else if (x as i64 - (w / 2) as i64).abs() < 4 {
                Rgb([230, 200, 40])
            } else {
                Rgb([80, 80, 80])
            }
        })
    }

    /// Time left before a sensor has a new sample, `None` if one is ready
    fn pending(last: Option<Instant>, rate: f64) -> Option<Duration> {
        let period = Duration::from_secs_f64(1.0 / rate);
        let elapsed = last?.elapsed();
        (elapsed < period).then(|| period - elapsed)
    }
}

impl Vehicle for SimulatedVehicle {
    fn drive(&mut self, left: f32, right: f32) -> XonResult<()> {
        if !left.is_finite() || !right.is_finite() {
            return Err(XonError::DeviceError {
                device: "wheels".to_string(),
                reason: format!("non-finite wheel command ({}, {})", left, right),
            });
        }
        self.catch_up();
        if (left, right) != self.wheels {
            debug!(left, right, "wheel command");
        }
        self.wheels = (left, right);
        Ok(())
    }

    fn capture_camera(&mut self, block: bool) -> XonResult<Option<Vec<u8>>> {
        if let Some(wait) = Self::pending(self.last_frame, self.config.camera_fps) {
            if !block {
                return Ok(None);
            }
            std::thread::sleep(wait);
        }
        self.last_frame = Some(Instant::now());
        self.catch_up();

        self.frames_captured += 1;
        if let Some(every) = self.config.camera_fault_every {
            if every > 0 && self.frames_captured % every == 0 {
                return Err(XonError::DeviceError {
                    device: "camera".to_string(),
                    reason: format!("frame {} lost", self.frames_captured),
                });
            }
        }

        let mut bytes = Vec::new();
        self.render_frame()
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| XonError::DeviceError {
                device: "camera".to_string(),
                reason: format!("encode failed: {}", e),
            })?;
        Ok(Some(bytes))
    }

    fn capture_distance(&mut self, block: bool) -> XonResult<Option<f32>> {
        if let Some(wait) = Self::pending(self.last_reading, self.config.tof_rate) {
            if !block {
                return Ok(None);
            }
            std::thread::sleep(wait);
        }
        self.last_reading = Some(Instant::now());
        self.catch_up();

        Ok(Some(self.distance_ahead().min(self.config.tof_max_range)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(config: VehicleConfig) -> SimulatedVehicle {
        SimulatedVehicle::connect(VehicleAddress::default(), config).unwrap()
    }

    #[test]
    fn test_forward_motion() {
        let mut v = vehicle(VehicleConfig::default());
        v.wheels = (10.0, 10.0);
        v.advance(1.0);
        assert!((v.pose().x - 0.2).abs() < 1e-5);
        assert!(v.pose().y.abs() < 1e-6);
    }

    #[test]
    fn test_pivot_in_place() {
        let mut v = vehicle(VehicleConfig::default());
        v.wheels = (-5.0, 5.0);
        v.advance(0.5);
        assert!(v.pose().x.abs() < 1e-6);
        // omega = 10 * 0.02 / 0.1 = 2 rad/s
        assert!((v.pose().heading - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_walls_contain_robot() {
        let mut v = vehicle(VehicleConfig::default());
        v.wheels = (10.0, 10.0);
        v.advance(100.0);
        assert!(v.pose().x <= 1.0);
        assert!(v.distance_ahead() < 0.02);
    }

    #[test]
    fn test_distance_sensor_rate_limited() {
        let mut v = vehicle(VehicleConfig::default());
        let first = v.capture_distance(false).unwrap();
        assert_eq!(first, Some(1.0));
        assert_eq!(v.capture_distance(false).unwrap(), None);
        assert!(v.capture_distance(true).unwrap().is_some());
    }

    #[test]
    fn test_camera_frame_decodes() {
        let mut v = vehicle(VehicleConfig {
            camera_width: 64,
            camera_height: 48,
            ..VehicleConfig::default()
        });
        let bytes = v.capture_camera(true).unwrap().unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_camera_fault_injection() {
        let mut v = vehicle(VehicleConfig {
            camera_width: 8,
            camera_height: 8,
            camera_fault_every: Some(2),
            ..VehicleConfig::default()
        });
        assert!(v.capture_camera(true).is_ok());
        assert!(matches!(v.capture_camera(true), Err(XonError::DeviceError { .. })));
    }

    #[test]
    fn test_rejects_bad_commands_and_config() {
        let mut v = vehicle(VehicleConfig::default());
        assert!(v.drive(f32::NAN, 0.0).is_err());

        let bad = VehicleConfig { camera_fps: 0.0, ..VehicleConfig::default() };
        assert!(SimulatedVehicle::connect(VehicleAddress::default(), bad).is_err());
    }
}
