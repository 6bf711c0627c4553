//! Keyboard to wheel speed mapping

use serde::{Deserialize, Serialize};

/// Full wheel speed for straight driving
pub const SPEED: f32 = 10.0;

/// Keys the driver can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Other,
}

impl Key {
    /// Parse a key name such as `"up"`; unknown names map to `Other`
    pub fn from_name(name: &str) -> Key {
        match name.to_ascii_lowercase().as_str() {
            "up" | "arrowup" => Key::Up,
            "down" | "arrowdown" => Key::Down,
            "left" | "arrowleft" => Key::Left,
            "right" | "arrowright" => Key::Right,
            _ => Key::Other,
        }
    }
}

/// Signed left/right wheel speeds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelCommand {
    pub left: f32,
    pub right: f32,
}

impl WheelCommand {
    pub const STOP: WheelCommand = WheelCommand { left: 0.0, right: 0.0 };

    pub fn new(left: f32, right: f32) -> Self {
        WheelCommand { left, right }
    }

    /// Forward/back at full speed, turn in place at half speed
    pub fn for_key(key: Key, speed: f32) -> Self {
        match key {
            Key::Up => WheelCommand::new(speed, speed),
            Key::Down => WheelCommand::new(-speed, -speed),
            Key::Left => WheelCommand::new(-speed / 2.0, speed / 2.0),
            Key::Right => WheelCommand::new(speed / 2.0, -speed / 2.0),
            Key::Other => WheelCommand::STOP,
        }
    }

    pub fn for_key_name(name: &str, speed: f32) -> Self {
        WheelCommand::for_key(Key::from_name(name), speed)
    }

    pub fn is_stop(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        let cases = [
            ("up", (10.0, 10.0)),
            ("down", (-10.0, -10.0)),
            ("left", (-5.0, 5.0)),
            ("right", (5.0, -5.0)),
            ("space", (0.0, 0.0)),
            ("", (0.0, 0.0)),
        ];
        for (name, (left, right)) in cases {
            assert_eq!(
                WheelCommand::for_key_name(name, SPEED),
                WheelCommand::new(left, right),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_key_names() {
        assert_eq!(Key::from_name("ArrowUp"), Key::Up);
        assert_eq!(Key::from_name("Left"), Key::Left);
        assert_eq!(Key::from_name("w"), Key::Other);
        assert!(WheelCommand::for_key(Key::Other, SPEED).is_stop());
    }
}
