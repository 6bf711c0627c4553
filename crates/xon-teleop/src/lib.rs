//! xon-teleop: drive a robot from the keyboard and watch its camera
//!
//! Input, vehicle and display are all traits, so the same loop runs against
//! the simulated vehicle, a scripted key sequence in tests, or the desktop
//! viewer's key state.

pub mod keys;
pub mod input;
pub mod display;
pub mod control;

pub use control::{TeleopConfig, TeleopLoop, TeleopSession, TeleopStats};
pub use display::{decode_frame, FrameSink, SharedView, TeleopView};
pub use input::{HeldKey, InputSource, ScriptedInput};
pub use keys::{Key, WheelCommand, SPEED};
