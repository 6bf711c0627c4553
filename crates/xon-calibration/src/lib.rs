//! xon-calibration: learn a mapping from EEG features to 2D actions
//!
//! A subject tracks a moving target while the stream's feature vectors are
//! paired with the target position; at the end of each trial a small dense
//! network is fitted to the pairs and snapshotted under the session name.

pub mod mlp;
pub mod agent;
pub mod snapshot;
pub mod target;
pub mod trainer;

pub use agent::{Agent, ACTION_DIM};
pub use mlp::{Gradients, Linear, Mlp};
pub use snapshot::{load_snapshot, save_snapshot, snapshot_path, Snapshot};
pub use target::{TargetConfig, TargetPath};
pub use trainer::{
    CalibrationConfig, CalibrationSession, Calibrator, Dataset, StepOutcome, Tick, TrainingJob,
    TrainingReport,
};
