//! Viewer configuration, optionally loaded from the file named by `XON_CONFIG`

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use xon_calibration::CalibrationConfig;
use xon_processing::PipelineConfig;
use xon_simulation::{OutletConfig, VehicleConfig};
use xon_teleop::TeleopConfig;

/// Environment variable naming a JSON config file
pub const CONFIG_ENV: &str = "XON_CONFIG";

/// The simulated devices the viewer talks to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub outlet: OutletConfig,
    pub vehicle: VehicleConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub simulation: SimulationConfig,
    pub pipeline: PipelineConfig,
    pub calibration: CalibrationConfig,
    pub teleop: TeleopConfig,
}

impl AppConfig {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_json::from_str(text).context("invalid viewer config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Config from `XON_CONFIG` if set, defaults otherwise
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                let path = Path::new(&path);
                info!(path = %path.display(), "loading config");
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.simulation.outlet.eeg.validate()?;
        self.pipeline.validate()?;
        self.calibration.validate()?;
        self.teleop.validate()?;
        if self.pipeline.stream.stream_name != self.simulation.outlet.stream_name {
            anyhow::bail!(
                "pipeline reads {:?} but the simulated headset publishes {:?}",
                self.pipeline.stream.stream_name,
                self.simulation.outlet.stream_name
            );
        }
        Ok(())
    }
}
