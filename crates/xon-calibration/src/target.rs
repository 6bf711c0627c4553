//! Moving calibration target the subject tracks during a trial

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use xon_core::{XonError, XonResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Steps per calibration trial
    pub trial_steps: usize,
    /// Distance the target covers per step
    pub speed: f32,
    /// Distance at which a waypoint counts as reached
    pub waypoint_tolerance: f32,
    pub seed: Option<u64>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            trial_steps: 600,
            speed: 0.01,
            waypoint_tolerance: 0.02,
            seed: None,
        }
    }
}

impl TargetConfig {
    pub fn validate(&self) -> XonResult<()> {
        if self.trial_steps == 0 {
            return Err(XonError::InvalidConfig {
                reason: "trial needs at least one step".to_string(),
            });
        }
        if !(self.speed > 0.0) || !(self.waypoint_tolerance > 0.0) {
            return Err(XonError::InvalidConfig {
                reason: "target speed and waypoint tolerance must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Target drifting between random waypoints in `[-1, 1]^2`
pub struct TargetPath {
    config: TargetConfig,
    rng: StdRng,
    position: [f32; 2],
    waypoint: [f32; 2],
    step: usize,
    trials_started: usize,
}

impl TargetPath {
    pub fn new(config: TargetConfig) -> XonResult<Self> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));

        let mut path = TargetPath {
            config,
            rng,
            position: [0.0, 0.0],
            waypoint: [0.0, 0.0],
            step: 0,
            trials_started: 0,
        };
        path.reset();
        Ok(path)
    }

    /// Start a new trial from the centre
    pub fn reset(&mut self) {
        self.position = [0.0, 0.0];
        self.waypoint = self.random_point();
        self.step = 0;
        self.trials_started += 1;
    }

    fn random_point(&mut self) -> [f32; 2] {
        [self.rng.gen_range(-1.0..=1.0), self.rng.gen_range(-1.0..=1.0)]
    }

    /// Advance one step; returns the target and whether the trial is over
    pub fn next(&mut self) -> ([f32; 2], bool) {
        let dx = self.waypoint[0] - self.position[0];
        let dy = self.waypoint[1] - self.position[1];
        let distance = (dx * dx + dy * dy).sqrt();

        if distance <= self.config.speed {
            self.position = self.waypoint;
        } else {
            self.position[0] += self.config.speed * dx / distance;
            self.position[1] += self.config.speed * dy / distance;
        }
        if distance <= self.config.waypoint_tolerance.max(self.config.speed) {
            self.waypoint = self.random_point();
        }

        self.step += 1;
        (self.position, self.step >= self.config.trial_steps)
    }

    pub fn position(&self) -> [f32; 2] {
        self.position
    }

    pub fn waypoint(&self) -> [f32; 2] {
        self.waypoint
    }

    /// Fraction of the current trial completed
    pub fn progress(&self) -> f32 {
        (self.step as f32 / self.config.trial_steps as f32).min(1.0)
    }

    pub fn trials_started(&self) -> usize {
        self.trials_started
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(trial_steps: usize) -> TargetPath {
        TargetPath::new(TargetConfig {
            trial_steps,
            seed: Some(9),
            ..TargetConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_trial_finishes_after_fixed_steps() {
        let mut path = path(10);
        let finished: Vec<bool> = (0..10).map(|_| path.next().1).collect();
        assert!(finished[..9].iter().all(|f| !f));
        assert!(finished[9]);
        assert_eq!(path.progress(), 1.0);

        path.reset();
        assert_eq!(path.position(), [0.0, 0.0]);
        assert_eq!(path.trials_started(), 2);
        assert!(!path.next().1);
    }

    #[test]
    fn test_target_stays_in_bounds_and_moves_smoothly() {
        let mut path = path(5000);
        let mut last = path.position();
        for _ in 0..5000 {
            let (p, _) = path.next();
            assert!(p.iter().all(|v| (-1.0..=1.0).contains(v)));
            let step = ((p[0] - last[0]).powi(2) + (p[1] - last[1]).powi(2)).sqrt();
            assert!(step <= 0.01 + 1e-6);
            last = p;
        }
    }

    #[test]
    fn test_invalid_config() {
        let config = TargetConfig { trial_steps: 0, ..TargetConfig::default() };
        assert!(TargetPath::new(config).is_err());
    }
}
