//! Calibration: collect (features, target) pairs during a trial, then fit the agent

use crate::agent::{Agent, ACTION_DIM};
use crate::target::{TargetConfig, TargetPath};
use ndarray::{Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use xon_core::{XonError, XonResult};

/// Calibration and training settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Session name; trained parameters are saved to `snapshot_dir/<name>`
    pub name: String,
    pub snapshot_dir: PathBuf,
    /// Snapshot to initialize the agent from instead of random parameters
    pub init_snapshot: Option<String>,
    pub hidden_layers: Vec<usize>,
    pub batch_size: usize,
    pub training_steps: usize,
    pub learning_rate: f32,
    /// Global gradient norm limit
    pub grad_clip: f32,
    pub seed: Option<u64>,
    pub target: TargetConfig,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            name: "calibration".to_string(),
            snapshot_dir: PathBuf::from("snapshots"),
            init_snapshot: None,
            hidden_layers: vec![256, 256],
            batch_size: 128,
            training_steps: 2000,
            learning_rate: 0.01,
            grad_clip: 1.0,
            seed: None,
            target: TargetConfig::default(),
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> XonResult<()> {
        if self.name.is_empty() || self.name.contains(['/', '\\']) {
            return Err(XonError::InvalidConfig {
                reason: format!("session name {:?} is not a valid file name", self.name),
            });
        }
        if self.hidden_layers.contains(&0) {
            return Err(XonError::InvalidConfig {
                reason: "hidden layer sizes must be positive".to_string(),
            });
        }
        if self.batch_size == 0 || self.training_steps == 0 {
            return Err(XonError::InvalidConfig {
                reason: "batch size and training steps must be positive".to_string(),
            });
        }
        if !(self.learning_rate > 0.0) || !(self.grad_clip > 0.0) {
            return Err(XonError::InvalidConfig {
                reason: "learning rate and gradient clip must be positive".to_string(),
            });
        }
        self.target.validate()
    }
}

/// Collected trial data, one row per step
#[derive(Debug, Clone)]
pub struct Dataset {
    inputs: Array2<f32>,
    targets: Array2<f32>,
}

impl Dataset {
    fn from_pairs(inputs: &[Vec<f32>], targets: &[[f32; ACTION_DIM]]) -> XonResult<Self> {
        let width = inputs.first().map(Vec::len).ok_or(XonError::EmptyDataset)?;
        let flat_inputs: Vec<f32> = inputs.iter().flatten().copied().collect();
        let flat_targets: Vec<f32> = targets.iter().flatten().copied().collect();

        let inputs = Array2::from_shape_vec((inputs.len(), width), flat_inputs).map_err(|_| {
            XonError::ShapeMismatch {
                context: "calibration inputs",
                expected: width,
                actual: 0,
            }
        })?;
        let targets = Array2::from_shape_vec((targets.len(), ACTION_DIM), flat_targets)
            .map_err(|_| XonError::ShapeMismatch {
                context: "calibration targets",
                expected: ACTION_DIM,
                actual: 0,
            })?;
        Ok(Dataset { inputs, targets })
    }

    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Uniform sample of rows, with replacement
    pub fn sample_batch<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> (Array2<f32>, Array2<f32>) {
        let indices: Vec<usize> = (0..batch_size).map(|_| rng.gen_range(0..self.len())).collect();
        (
            self.inputs.select(Axis(0), &indices),
            self.targets.select(Axis(0), &indices),
        )
    }
}

/// Summary of one training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub samples: usize,
    pub steps: usize,
    pub initial_loss: f32,
    pub final_loss: f32,
    pub snapshot: PathBuf,
    pub elapsed_ms: u128,
}

/// Self-contained training work, safe to move onto a worker thread
pub struct TrainingJob {
    agent: Agent,
    dataset: Dataset,
    batch_size: usize,
    training_steps: usize,
    learning_rate: f32,
    grad_clip: f32,
    snapshot_dir: PathBuf,
    rng: StdRng,
}

impl TrainingJob {
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Run mini-batch SGD with gradient clipping, then snapshot the agent
    pub fn run(mut self) -> XonResult<(Agent, TrainingReport)> {
        let start = Instant::now();
        info!(
            agent = self.agent.name(),
            samples = self.dataset.len(),
            steps = self.training_steps,
            "training"
        );

        let mut initial_loss = f32::NAN;
        let mut final_loss = f32::NAN;
        for step in 0..self.training_steps {
            let (inputs, targets) = self.dataset.sample_batch(self.batch_size, &mut self.rng);
            let net = self.agent.network_mut();
            let (loss, mut grads) = net.loss_and_gradients(inputs.view(), targets.view())?;
            grads.clip_norm(self.grad_clip);
            net.apply_sgd(&grads, self.learning_rate);

            if step == 0 {
                initial_loss = loss;
            }
            final_loss = loss;
            if step % 500 == 0 {
                debug!(step, loss, "training step");
            }
        }

        let snapshot = self.agent.snapshot(&self.snapshot_dir)?;
        let report = TrainingReport {
            samples: self.dataset.len(),
            steps: self.training_steps,
            initial_loss,
            final_loss,
            snapshot,
            elapsed_ms: start.elapsed().as_millis(),
        };
        info!(initial_loss, final_loss, elapsed_ms = report.elapsed_ms as u64, "training finished");
        Ok((self.agent, report))
    }
}

/// What one calibration step produced
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Agent's predicted position for the current features
    pub prediction: [f32; ACTION_DIM],
    /// Present when this step closed a trial and training ran
    pub training: Option<TrainingReport>,
}

/// Learns the mapping from EEG features to on-screen positions
pub struct Calibrator {
    config: CalibrationConfig,
    agent: Agent,
    inputs: Vec<Vec<f32>>,
    targets: Vec<[f32; ACTION_DIM]>,
    rng: StdRng,
    trials_trained: usize,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig, in_features: usize) -> XonResult<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));

        let agent = match &config.init_snapshot {
            Some(snapshot) => Agent::from_snapshot(
                &config.name,
                &config.snapshot_dir,
                snapshot,
                in_features,
                ACTION_DIM,
            )?,
            None => Agent::new(
                &config.name,
                in_features,
                &config.hidden_layers,
                ACTION_DIM,
                &mut rng,
            )?,
        };

        info!(
            session = %config.name,
            in_features,
            hidden = ?config.hidden_layers,
            "calibrator ready"
        );
        Ok(Calibrator {
            config,
            agent,
            inputs: Vec::new(),
            targets: Vec::new(),
            rng,
            trials_trained: 0,
        })
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Pairs collected since the last training run
    pub fn collected(&self) -> usize {
        self.inputs.len()
    }

    pub fn trials_trained(&self) -> usize {
        self.trials_trained
    }

    pub fn snapshot_path(&self) -> PathBuf {
        crate::snapshot::snapshot_path(&self.config.snapshot_dir, &self.config.name)
    }

    /// Agent's position for a feature vector
    pub fn predict(&self, features: &[f32]) -> XonResult<[f32; ACTION_DIM]> {
        let action = self.agent.act(ArrayView1::from(features))?;
        Ok([action[0], action[1]])
    }

    /// Store a training pair
    pub fn record(&mut self, features: &[f32], target: [f32; ACTION_DIM]) -> XonResult<()> {
        if features.len() != self.agent.in_features() {
            return Err(XonError::ShapeMismatch {
                context: "calibration features",
                expected: self.agent.in_features(),
                actual: features.len(),
            });
        }
        self.inputs.push(features.to_vec());
        self.targets.push(target);
        Ok(())
    }

    /// Hand the collected pairs and a copy of the agent to a training job,
    /// clearing the collection
    pub fn begin_training(&mut self) -> XonResult<TrainingJob> {
        let dataset = Dataset::from_pairs(&self.inputs, &self.targets)?;
        self.inputs.clear();
        self.targets.clear();

        Ok(TrainingJob {
            agent: self.agent.clone(),
            dataset,
            batch_size: self.config.batch_size,
            training_steps: self.config.training_steps,
            learning_rate: self.config.learning_rate,
            grad_clip: self.config.grad_clip,
            snapshot_dir: self.config.snapshot_dir.clone(),
            rng: StdRng::seed_from_u64(self.rng.gen()),
        })
    }

    /// Replace the agent with a trained one
    pub fn install(&mut self, agent: Agent) {
        self.agent = agent;
        self.trials_trained += 1;
    }

    /// One display callback: when `finished`, train on the trial first; then
    /// predict for `features` and record the pair
    pub fn step(
        &mut self,
        features: &[f32],
        target: [f32; ACTION_DIM],
        finished: bool,
    ) -> XonResult<StepOutcome> {
        let training = if finished {
            info!(session = %self.config.name, "calibration trial finished");
            let (agent, report) = self.begin_training()?.run()?;
            self.install(agent);
            Some(report)
        } else {
            None
        };

        let prediction = self.predict(features)?;
        self.record(features, target)?;
        Ok(StepOutcome { prediction, training })
    }
}

/// Target path plus calibrator, advanced together one tick at a time.
///
/// Training runs inline on the tick that finishes a trial. Callers that must
/// stay responsive drive `Calibrator::begin_training` and `install`
/// themselves instead, with the same ordering.
pub struct CalibrationSession {
    path: TargetPath,
    calibrator: Calibrator,
}

/// Result of a session tick
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub target: [f32; ACTION_DIM],
    pub outcome: StepOutcome,
}

impl CalibrationSession {
    pub fn new(config: CalibrationConfig, in_features: usize) -> XonResult<Self> {
        let path = TargetPath::new(config.target.clone())?;
        let calibrator = Calibrator::new(config, in_features)?;
        Ok(CalibrationSession { path, calibrator })
    }

    pub fn tick(&mut self, features: &[f32]) -> XonResult<Tick> {
        let (target, finished) = self.path.next();
        let outcome = self.calibrator.step(features, target, finished)?;
        if finished {
            self.path.reset();
        }
        Ok(Tick { target, outcome })
    }

    pub fn path(&self) -> &TargetPath {
        &self.path
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.calibrator.config.snapshot_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> CalibrationConfig {
        CalibrationConfig {
            name: "unit".to_string(),
            snapshot_dir: dir.to_path_buf(),
            hidden_layers: vec![16],
            batch_size: 16,
            training_steps: 50,
            seed: Some(4),
            ..CalibrationConfig::default()
        }
    }

    #[test]
    fn test_empty_dataset_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut calibrator = Calibrator::new(config(dir.path()), 3).unwrap();
        assert!(matches!(calibrator.begin_training(), Err(XonError::EmptyDataset)));
        assert!(matches!(
            calibrator.step(&[0.0, 0.0, 0.0], [0.0, 0.0], true),
            Err(XonError::EmptyDataset)
        ));
    }

    #[test]
    fn test_record_checks_width() {
        let dir = tempfile::tempdir().unwrap();
        let mut calibrator = Calibrator::new(config(dir.path()), 3).unwrap();
        assert!(calibrator.record(&[1.0, 2.0], [0.0, 0.0]).is_err());
        assert_eq!(calibrator.collected(), 0);
    }

    #[test]
    fn test_step_trains_snapshots_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let mut calibrator = Calibrator::new(config(dir.path()), 3).unwrap();

        for i in 0..20 {
            let x = i as f32 / 20.0;
            let outcome = calibrator.step(&[x, 1.0 - x, 0.5], [x, -x], false).unwrap();
            assert!(outcome.training.is_none());
        }
        assert_eq!(calibrator.collected(), 20);

        let outcome = calibrator.step(&[0.5, 0.5, 0.5], [0.5, -0.5], true).unwrap();
        let report = outcome.training.unwrap();
        assert_eq!(report.samples, 20);
        assert_eq!(report.steps, 50);
        assert!(report.snapshot.exists());
        assert_eq!(report.snapshot, calibrator.snapshot_path());

        // the finishing step's own pair starts the next trial
        assert_eq!(calibrator.collected(), 1);
        assert_eq!(calibrator.trials_trained(), 1);
    }

    #[test]
    fn test_training_reduces_loss() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.training_steps = 400;
        config.learning_rate = 0.1;
        let mut calibrator = Calibrator::new(config, 2).unwrap();

        for i in 0..40 {
            let x = (i % 10) as f32 / 10.0;
            calibrator.record(&[x, 1.0], [x - 0.5, 0.5 - x]).unwrap();
        }
        let (_, report) = calibrator.begin_training().unwrap().run().unwrap();
        assert!(report.final_loss < report.initial_loss);
    }

    #[test]
    fn test_resume_from_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut calibrator = Calibrator::new(config(dir.path()), 3).unwrap();
        calibrator.record(&[0.1, 0.2, 0.3], [0.5, 0.5]).unwrap();
        let (agent, _) = calibrator.begin_training().unwrap().run().unwrap();

        let resumed = Calibrator::new(
            CalibrationConfig {
                name: "unit-2".to_string(),
                init_snapshot: Some("unit".to_string()),
                ..config(dir.path())
            },
            3,
        )
        .unwrap();
        assert_eq!(resumed.agent().network(), agent.network());
    }

    #[test]
    fn test_session_resets_path_after_trial() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.target.trial_steps = 5;
        config.training_steps = 5;
        let mut session = CalibrationSession::new(config, 2).unwrap();

        let mut trained = 0;
        for _ in 0..12 {
            let tick = session.tick(&[0.3, 0.6]).unwrap();
            if tick.outcome.training.is_some() {
                trained += 1;
            }
        }
        assert_eq!(trained, 2);
        assert_eq!(session.path().trials_started(), 3);
        assert!(session.snapshot_dir().join("unit").exists());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad = CalibrationConfig {
            name: "../escape".to_string(),
            ..config(dir.path())
        };
        assert!(Calibrator::new(bad, 3).is_err());
    }
}
