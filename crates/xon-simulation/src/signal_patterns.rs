//! Intent trajectories that drive the simulated headset

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// How the simulated wearer's 2D intent evolves when nobody steers it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum IntentPattern {
    /// Resting, no modulation
    Rest,
    /// Fixed intent
    Constant { x: f32, y: f32 },
    /// Slow circle of the given radius and period
    Circle { radius: f32, period: f32 },
    /// Alternating between two opposite points
    Alternate { x: f32, y: f32, half_period: f32 },
}

impl IntentPattern {
    /// Intent at a given stream time in seconds, components in [-1, 1]
    pub fn intent_at_time(&self, time: f32) -> [f32; 2] {
        let intent = match *self {
            IntentPattern::Rest => [0.0, 0.0],
            IntentPattern::Constant { x, y } => [x, y],
            IntentPattern::Circle { radius, period } => {
                let phase = 2.0 * PI * time / period.max(f32::EPSILON);
                [radius * phase.cos(), radius * phase.sin()]
            }
            IntentPattern::Alternate { x, y, half_period } => {
                let cycle = (time / half_period.max(f32::EPSILON)) as u64;
                if cycle % 2 == 0 {
                    [x, y]
                } else {
                    [-x, -y]
                }
            }
        };
        [intent[0].clamp(-1.0, 1.0), intent[1].clamp(-1.0, 1.0)]
    }

    /// Named patterns offered by the viewer
    pub fn presets() -> Vec<(&'static str, IntentPattern)> {
        vec![
            ("Rest", IntentPattern::Rest),
            ("Hold right", IntentPattern::Constant { x: 0.8, y: 0.0 }),
            ("Hold up", IntentPattern::Constant { x: 0.0, y: 0.8 }),
            ("Slow circle", IntentPattern::Circle { radius: 0.8, period: 8.0 }),
            ("Left/right", IntentPattern::Alternate { x: 0.8, y: 0.0, half_period: 2.0 }),
        ]
    }

    /// Get pattern description
    pub fn description(&self) -> &'static str {
        match self {
            IntentPattern::Rest => "Rest",
            IntentPattern::Constant { .. } => "Constant",
            IntentPattern::Circle { .. } => "Circle",
            IntentPattern::Alternate { .. } => "Alternate",
        }
    }
}

impl Default for IntentPattern {
    fn default() -> Self {
        IntentPattern::Circle { radius: 0.8, period: 8.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_stays_on_radius() {
        let pattern = IntentPattern::Circle { radius: 0.5, period: 4.0 };
        for i in 0..20 {
            let [x, y] = pattern.intent_at_time(i as f32 * 0.3);
            assert!(((x * x + y * y).sqrt() - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_alternate_flips() {
        let pattern = IntentPattern::Alternate { x: 1.0, y: 0.0, half_period: 2.0 };
        assert_eq!(pattern.intent_at_time(1.0), [1.0, 0.0]);
        assert_eq!(pattern.intent_at_time(3.0), [-1.0, -0.0]);
    }

    #[test]
    fn test_intent_clamped() {
        let pattern = IntentPattern::Constant { x: 3.0, y: -2.0 };
        assert_eq!(pattern.intent_at_time(0.0), [1.0, -1.0]);
    }
}
