//! Keyboard state tracking.
//!
//! Window callbacks only enqueue [`InputEvent`]s; the simulation drains the
//! queue once at the start of each frame so every event is applied in
//! arrival order before the resolver runs.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use winit::keyboard::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub key: KeyCode,
    pub edge: KeyEdge,
    /// Clock reading when the event arrived.
    pub at: Duration,
}

impl InputEvent {
    pub fn down(key: KeyCode, at: Duration) -> Self {
        Self {
            key,
            edge: KeyEdge::Down,
            at,
        }
    }

    pub fn up(key: KeyCode, at: Duration) -> Self {
        Self {
            key,
            edge: KeyEdge::Up,
            at,
        }
    }
}

#[derive(Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = InputEvent> + '_ {
        self.events.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Set of currently held keys.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the key was already held (auto-repeat).
    pub fn handle_key_press(&mut self, key: KeyCode) -> bool {
        self.pressed_keys.insert(key)
    }

    /// Returns `false` if the key was not held.
    pub fn handle_key_release(&mut self, key: KeyCode) -> bool {
        self.pressed_keys.remove(&key)
    }

    pub fn apply(&mut self, event: &InputEvent) -> bool {
        match event.edge {
            KeyEdge::Down => self.handle_key_press(event.key),
            KeyEdge::Up => self.handle_key_release(event.key),
        }
    }

    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn held(&self) -> &HashSet<KeyCode> {
        &self.pressed_keys
    }

    pub fn is_empty(&self) -> bool {
        self.pressed_keys.is_empty()
    }
}
