//! Driver input sources

use crate::keys::Key;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Something that reports the key currently held, if any
pub trait InputSource: Send {
    fn read_key(&mut self) -> Option<Key>;
}

/// Replays a fixed key sequence, then reports nothing held
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    keys: VecDeque<Option<Key>>,
}

impl ScriptedInput {
    pub fn new<I: IntoIterator<Item = Option<Key>>>(keys: I) -> Self {
        ScriptedInput {
            keys: keys.into_iter().collect(),
        }
    }

    /// Build from key names; empty names mean no key held
    pub fn from_names(names: &[&str]) -> Self {
        ScriptedInput::new(
            names
                .iter()
                .map(|name| (!name.is_empty()).then(|| Key::from_name(name))),
        )
    }

    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

impl InputSource for ScriptedInput {
    fn read_key(&mut self) -> Option<Key> {
        self.keys.pop_front().flatten()
    }
}

/// Key state written by a UI thread and read by the control loop
#[derive(Debug, Clone, Default)]
pub struct HeldKey {
    key: Arc<Mutex<Option<Key>>>,
}

impl HeldKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: Option<Key>) {
        if let Ok(mut held) = self.key.lock() {
            *held = key;
        }
    }

    pub fn get(&self) -> Option<Key> {
        self.key.lock().ok().and_then(|held| *held)
    }
}

impl InputSource for HeldKey {
    fn read_key(&mut self) -> Option<Key> {
        self.get()
    }
}
