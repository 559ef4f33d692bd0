//! Ordered key-mapping table and the input resolver.
//!
//! Entries are evaluated in declaration order. A matching entry adds its
//! planar delta to the direction and overwrites the facing, so the last
//! matching facing wins. Single-key entries must come before the chord
//! entries that override their facing for diagonal input.

use std::collections::HashSet;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use glam::Vec2;
use winit::keyboard::KeyCode;

use crate::config::KEY_STEP;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCombo {
    Single(KeyCode),
    Chord(KeyCode, KeyCode),
}

impl KeyCombo {
    pub fn is_held(&self, held: &HashSet<KeyCode>) -> bool {
        match *self {
            KeyCombo::Single(key) => held.contains(&key),
            KeyCombo::Chord(a, b) => held.contains(&a) && held.contains(&b),
        }
    }

    pub fn contains(&self, key: KeyCode) -> bool {
        match *self {
            KeyCombo::Single(k) => k == key,
            KeyCombo::Chord(a, b) => a == key || b == key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyMapping {
    pub combo: KeyCombo,
    /// Planar (x, z) contribution while the combo is held.
    pub delta: Option<Vec2>,
    /// Facing (yaw, radians) written while the combo is held.
    pub facing: Option<f32>,
}

impl KeyMapping {
    pub fn movement(key: KeyCode, delta: Vec2, facing: f32) -> Self {
        Self {
            combo: KeyCombo::Single(key),
            delta: Some(delta),
            facing: Some(facing),
        }
    }

    pub fn facing(a: KeyCode, b: KeyCode, facing: f32) -> Self {
        Self {
            combo: KeyCombo::Chord(a, b),
            delta: None,
            facing: Some(facing),
        }
    }

    fn moves(&self) -> bool {
        self.delta.is_some_and(|d| d != Vec2::ZERO)
    }
}

/// Resolved direction and facing for the current key state.
///
/// `direction` is planar: `x` is world X, `y` is world Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementIntent {
    pub direction: Vec2,
    pub target_facing: f32,
}

impl MovementIntent {
    pub const IDLE: Self = Self {
        direction: Vec2::ZERO,
        target_facing: 0.0,
    };

    pub fn is_moving(&self) -> bool {
        self.direction != Vec2::ZERO
    }
}

impl Default for MovementIntent {
    fn default() -> Self {
        Self::IDLE
    }
}

#[derive(Debug, Clone)]
pub struct KeyRegistry {
    entries: Vec<KeyMapping>,
}

impl KeyRegistry {
    pub fn new(entries: Vec<KeyMapping>) -> Self {
        let registry = Self { entries };
        for (chord, single) in registry.ordering_conflicts() {
            log::warn!(
                "Key mapping #{} ({:?}) is declared after chord #{} ({:?}) and will override its facing",
                single,
                registry.entries[single].combo,
                chord,
                registry.entries[chord].combo,
            );
        }
        registry
    }

    /// WASD and arrow keys. Forward is +Z (yaw 0), left is +X (yaw +pi/2).
    pub fn default_bindings() -> Self {
        let mut entries = Vec::new();
        let layouts = [
            (KeyCode::KeyW, KeyCode::KeyS, KeyCode::KeyA, KeyCode::KeyD),
            (
                KeyCode::ArrowUp,
                KeyCode::ArrowDown,
                KeyCode::ArrowLeft,
                KeyCode::ArrowRight,
            ),
        ];

        for &(forward, back, left, right) in &layouts {
            entries.push(KeyMapping::movement(forward, Vec2::new(0.0, KEY_STEP), 0.0));
            entries.push(KeyMapping::movement(back, Vec2::new(0.0, -KEY_STEP), PI));
            entries.push(KeyMapping::movement(left, Vec2::new(KEY_STEP, 0.0), FRAC_PI_2));
            entries.push(KeyMapping::movement(right, Vec2::new(-KEY_STEP, 0.0), -FRAC_PI_2));
        }
        for &(forward, back, left, right) in &layouts {
            entries.push(KeyMapping::facing(forward, left, FRAC_PI_4));
            entries.push(KeyMapping::facing(forward, right, -FRAC_PI_4));
            entries.push(KeyMapping::facing(back, left, 3.0 * FRAC_PI_4));
            entries.push(KeyMapping::facing(back, right, -3.0 * FRAC_PI_4));
        }

        Self::new(entries)
    }

    pub fn entries(&self) -> &[KeyMapping] {
        &self.entries
    }

    /// Pairs `(chord_index, single_index)` where a single-key entry with a
    /// facing is declared after a chord containing its key.
    pub fn ordering_conflicts(&self) -> Vec<(usize, usize)> {
        let mut conflicts = Vec::new();
        for (i, chord) in self.entries.iter().enumerate() {
            if !matches!(chord.combo, KeyCombo::Chord(..)) || chord.facing.is_none() {
                continue;
            }
            for (j, single) in self.entries.iter().enumerate().skip(i + 1) {
                if let KeyCombo::Single(key) = single.combo
                    && single.facing.is_some()
                    && chord.combo.contains(key)
                {
                    conflicts.push((i, j));
                }
            }
        }
        conflicts
    }

    /// Resolve held keys into an intent. With nothing matching a facing,
    /// `last_facing` is kept.
    pub fn resolve(&self, held: &HashSet<KeyCode>, last_facing: f32) -> MovementIntent {
        let mut direction = Vec2::ZERO;
        let mut target_facing = last_facing;

        for entry in self.entries.iter().filter(|e| e.combo.is_held(held)) {
            if let Some(delta) = entry.delta {
                direction += delta;
            }
            if let Some(facing) = entry.facing {
                target_facing = facing;
            }
        }

        MovementIntent {
            direction,
            target_facing,
        }
    }

    /// Whether `key` on its own drives any translation.
    pub fn contributes_movement(&self, key: KeyCode) -> bool {
        self.entries
            .iter()
            .any(|e| e.moves() && e.combo.contains(key))
    }

    /// Whether any held key drives translation (net cancellation is ignored).
    pub fn has_movement_key(&self, held: &HashSet<KeyCode>) -> bool {
        held.iter().any(|&key| self.contributes_movement(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(keys: &[KeyCode]) -> HashSet<KeyCode> {
        keys.iter().copied().collect()
    }

    #[test]
    fn single_key_moves_and_faces() {
        let registry = KeyRegistry::default_bindings();
        let intent = registry.resolve(&held(&[KeyCode::KeyW]), 1.0);
        assert_eq!(intent.direction, Vec2::new(0.0, 3.0));
        assert_eq!(intent.target_facing, 0.0);
    }

    #[test]
    fn diagonal_chord_overrides_cardinal_facing() {
        let registry = KeyRegistry::default_bindings();
        let intent = registry.resolve(&held(&[KeyCode::KeyW, KeyCode::KeyA]), 0.0);
        assert_eq!(intent.direction, Vec2::new(3.0, 3.0));
        assert_eq!(intent.target_facing, FRAC_PI_4);

        let intent = registry.resolve(&held(&[KeyCode::KeyS, KeyCode::KeyD]), 0.0);
        assert_eq!(intent.target_facing, -3.0 * FRAC_PI_4);
    }

    #[test]
    fn reordering_changes_diagonal_facing() {
        let entries = vec![
            KeyMapping::facing(KeyCode::KeyW, KeyCode::KeyA, FRAC_PI_4),
            KeyMapping::movement(KeyCode::KeyW, Vec2::new(0.0, 3.0), 0.0),
            KeyMapping::movement(KeyCode::KeyA, Vec2::new(3.0, 0.0), FRAC_PI_2),
        ];
        let registry = KeyRegistry::new(entries);
        assert_eq!(registry.ordering_conflicts(), vec![(0, 1), (0, 2)]);

        let intent = registry.resolve(&held(&[KeyCode::KeyW, KeyCode::KeyA]), 0.0);
        assert_eq!(intent.target_facing, FRAC_PI_2);
    }

    #[test]
    fn default_bindings_are_ordered() {
        assert!(KeyRegistry::default_bindings().ordering_conflicts().is_empty());
    }

    #[test]
    fn no_keys_gives_zero_direction_and_sticky_facing() {
        let registry = KeyRegistry::default_bindings();
        let moving = registry.resolve(&held(&[KeyCode::KeyD]), 0.0);
        let stopped = registry.resolve(&held(&[]), moving.target_facing);
        assert_eq!(stopped.direction, Vec2::ZERO);
        assert_eq!(stopped.target_facing, -FRAC_PI_2);

        let again = registry.resolve(&held(&[]), stopped.target_facing);
        assert_eq!(again, stopped);
    }

    #[test]
    fn opposing_keys_cancel_but_still_face() {
        let registry = KeyRegistry::default_bindings();
        let intent = registry.resolve(&held(&[KeyCode::KeyW, KeyCode::KeyS]), 0.5);
        assert_eq!(intent.direction, Vec2::ZERO);
        assert_eq!(intent.target_facing, PI);

        let intent = registry.resolve(&held(&[KeyCode::KeyA, KeyCode::KeyD]), 0.5);
        assert_eq!(intent.direction, Vec2::ZERO);
        assert_eq!(intent.target_facing, -FRAC_PI_2);
    }

    #[test]
    fn unmapped_keys_do_not_contribute() {
        let registry = KeyRegistry::default_bindings();
        assert!(registry.contributes_movement(KeyCode::ArrowLeft));
        assert!(!registry.contributes_movement(KeyCode::Space));
        assert!(!registry.has_movement_key(&held(&[KeyCode::Space, KeyCode::ShiftLeft])));
        assert!(registry.has_movement_key(&held(&[KeyCode::Space, KeyCode::KeyS])));
    }
}
