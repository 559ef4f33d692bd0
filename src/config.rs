use std::path::PathBuf;
use std::time::Duration;

use glam::Vec3;

// Movement
pub const MOVE_SPEED: f32 = 5.0;
pub const KEY_STEP: f32 = 3.0; // planar delta contributed by one held movement key
pub const VELOCITY_DAMPING: f32 = 0.9;
pub const YAW_SMOOTHING: f32 = 0.1;
pub const GROUND_OFFSET: f32 = 0.0;
pub const CAMERA_FOLLOW_OFFSET: Vec3 = Vec3::new(0.0, 10.0, -4.0);

// Animation
pub const IDLE_DEBOUNCE: Duration = Duration::from_millis(300);
pub const CLIP_FPS: f32 = 30.0;
pub const WALK_FRAMES: (u32, u32) = (250, 315);
pub const IDLE_FRAMES: (u32, u32) = (15, 115);

// Physics
pub const NOMINAL_DT: f32 = 1.0 / 60.0;
pub const GRAVITY: f32 = -9.82;
pub const BODY_MASS: f32 = 5.0;
pub const BODY_RADIUS: f32 = 1.0;
pub const SPAWN_POSITION: Vec3 = Vec3::new(0.0, 2.0, 0.0);
pub const MAX_STEPS_PER_FRAME: u32 = 5;
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

// Model
pub const MODEL_SCALE: f32 = 0.1;
pub const MODEL_TILT: f32 = -0.05;
pub const DEFAULT_MODEL_PATH: &str = "assets/fox/scene.gltf";

// Camera
pub const CAMERA_START: Vec3 = Vec3::new(10.0, 10.0, 20.0);
pub const CAMERA_FOV_DEG: f32 = 60.0;
pub const CAMERA_NEAR: f32 = 1.0;
pub const CAMERA_FAR: f32 = 20000.0;
pub const ORBIT_MIN_POLAR_DEG: f32 = 15.0;
pub const ORBIT_MAX_POLAR_DEG: f32 = 75.0;
pub const ORBIT_MIN_DISTANCE: f32 = 20.0;
pub const ORBIT_MAX_DISTANCE: f32 = 40.0;
pub const ORBIT_ROTATE_SPEED: f32 = 0.5;
pub const ORBIT_ZOOM_SPEED: f32 = 1.0;
pub const ORBIT_DAMPING: f32 = 0.05;

// Scene
pub const SKY_COLOR: [f32; 3] = [0x87 as f32 / 255.0, 0xce as f32 / 255.0, 0xeb as f32 / 255.0];
pub const FOG_DENSITY: f32 = 0.0007;
pub const GROUND_EXTENT: f32 = 20000.0;
pub const AMBIENT_INTENSITY: f32 = 0.5;
pub const SUN_INTENSITY: f32 = 1.0;
pub const SUN_POSITION: Vec3 = Vec3::new(5.0, 10.0, 5.0);

const STEP_MODE_ENV_VAR: &str = "FOXTRAIL_STEP_MODE";
const PHYSICS_HZ_ENV_VAR: &str = "FOXTRAIL_PHYSICS_HZ";
const MODEL_ENV_VAR: &str = "FOXTRAIL_MODEL";

/// Tunables for the character controller. `Default` gives the reference feel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    pub speed: f32,
    /// Horizontal velocity multiplier applied per nominal frame while no key is held.
    pub damping: f32,
    /// Fraction of the remaining yaw error closed per nominal frame.
    pub smoothing: f32,
    pub ground_offset: f32,
    pub camera_offset: Vec3,
    /// Scale the unit direction instead of the raw summed key deltas.
    pub normalize_direction: bool,
    /// Frame length the per-frame factors above are expressed against.
    pub nominal_dt: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            speed: MOVE_SPEED,
            damping: VELOCITY_DAMPING,
            smoothing: YAW_SMOOTHING,
            ground_offset: GROUND_OFFSET,
            camera_offset: CAMERA_FOLLOW_OFFSET,
            normalize_direction: false,
            nominal_dt: NOMINAL_DT,
        }
    }
}

/// How the simulation loop maps display frames onto physics steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// One fixed step per frame regardless of elapsed time. Simulation speed
    /// follows the display refresh rate.
    PerFrame,
    /// Accumulate real elapsed time and take `floor(acc / dt)` fixed steps.
    Accumulated,
}

impl StepMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "per-frame" | "per_frame" | "frame" => Some(Self::PerFrame),
            "accumulated" | "accumulator" | "fixed" => Some(Self::Accumulated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub physics_dt: f32,
    pub step_mode: StepMode,
    pub max_steps_per_frame: u32,
    pub max_frame_delta: Duration,
    pub idle_debounce: Duration,
    pub model_path: PathBuf,
    pub controller: ControllerConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            physics_dt: NOMINAL_DT,
            step_mode: StepMode::PerFrame,
            max_steps_per_frame: MAX_STEPS_PER_FRAME,
            max_frame_delta: MAX_FRAME_DELTA,
            idle_debounce: IDLE_DEBOUNCE,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            controller: ControllerConfig::default(),
        }
    }
}

impl LoopConfig {
    /// Defaults overridden by `FOXTRAIL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(STEP_MODE_ENV_VAR) {
            match StepMode::parse(&raw) {
                Some(mode) => config.step_mode = mode,
                None => log::warn!("Ignoring {}={:?}: expected per-frame or accumulated", STEP_MODE_ENV_VAR, raw),
            }
        }

        if let Some(raw) = lookup(PHYSICS_HZ_ENV_VAR) {
            match raw.trim().parse::<f32>() {
                Ok(hz) if hz.is_finite() && hz >= 1.0 => config.physics_dt = 1.0 / hz,
                _ => log::warn!("Ignoring {}={:?}: expected a rate in Hz", PHYSICS_HZ_ENV_VAR, raw),
            }
        }

        if let Some(path) = lookup(MODEL_ENV_VAR).filter(|p| !p.trim().is_empty()) {
            config.model_path = PathBuf::from(path);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_keep_reference_behavior() {
        let config = LoopConfig::from_lookup(lookup(&[]));
        assert_eq!(config.step_mode, StepMode::PerFrame);
        assert!((config.physics_dt - 1.0 / 60.0).abs() < 1e-9);
        assert_eq!(config.idle_debounce, Duration::from_millis(300));
        assert_eq!(config.controller.speed, 5.0);
    }

    #[test]
    fn env_overrides_step_mode_and_rate() {
        let config = LoopConfig::from_lookup(lookup(&[
            ("FOXTRAIL_STEP_MODE", "Accumulated"),
            ("FOXTRAIL_PHYSICS_HZ", "120"),
            ("FOXTRAIL_MODEL", "models/fox.glb"),
        ]));
        assert_eq!(config.step_mode, StepMode::Accumulated);
        assert!((config.physics_dt - 1.0 / 120.0).abs() < 1e-9);
        assert_eq!(config.model_path, PathBuf::from("models/fox.glb"));
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let config = LoopConfig::from_lookup(lookup(&[
            ("FOXTRAIL_STEP_MODE", "sometimes"),
            ("FOXTRAIL_PHYSICS_HZ", "0"),
        ]));
        assert_eq!(config, LoopConfig::default());
    }
}
