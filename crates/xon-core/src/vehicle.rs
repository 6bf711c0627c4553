//! Differential-drive vehicle interface

use crate::error::{XonError, XonResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a vehicle lives: engine host plus `map/vehicle` path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleAddress {
    pub host: String,
    pub robot: String,
}

impl VehicleAddress {
    /// Validate and build an address such as `localhost` + `map_0/vehicle_0`
    pub fn new(host: &str, robot: &str) -> XonResult<Self> {
        if host.is_empty() {
            return Err(XonError::InvalidConfig {
                reason: "vehicle host cannot be empty".to_string(),
            });
        }
        let mut parts = robot.split('/');
        let valid = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(map), Some(vehicle), None) if !map.is_empty() && !vehicle.is_empty()
        );
        if !valid {
            return Err(XonError::InvalidConfig {
                reason: format!("robot path must look like map/vehicle, got {:?}", robot),
            });
        }

        Ok(VehicleAddress {
            host: host.to_string(),
            robot: robot.to_string(),
        })
    }
}

impl Default for VehicleAddress {
    fn default() -> Self {
        VehicleAddress {
            host: "localhost".to_string(),
            robot: "map_0/vehicle_0".to_string(),
        }
    }
}

impl fmt::Display for VehicleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.robot)
    }
}

/// Robot with two driven wheels, a camera and a distance sensor.
///
/// Sensor reads distinguish "nothing new yet" (`Ok(None)`) from a device
/// failure (`Err`).
pub trait Vehicle: Send {
    /// Set signed wheel speeds
    fn drive(&mut self, left: f32, right: f32) -> XonResult<()>;

    /// Latest encoded camera frame; with `block` waits for the next one
    fn capture_camera(&mut self, block: bool) -> XonResult<Option<Vec<u8>>>;

    /// Latest time-of-flight distance in metres
    fn capture_distance(&mut self, block: bool) -> XonResult<Option<f32>>;
}
