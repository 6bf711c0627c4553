//! xon-simulation: stand-ins for the headset and the robot
//!
//! A simulated EEG outlet whose band power follows a 2D intent, an
//! in-process discovery registry for it, and a kinematic vehicle with a
//! rendered camera and a distance sensor.

pub mod signal_patterns;
pub mod eeg_simulator;
pub mod real_time_stream;
pub mod registry;
pub mod vehicle;

pub use eeg_simulator::*;
pub use real_time_stream::*;
pub use registry::SimulatedRegistry;
pub use signal_patterns::*;
pub use vehicle::{Pose, SimulatedVehicle, VehicleConfig};
