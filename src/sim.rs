//! Per-frame driver.
//!
//! One call to [`Simulation::frame`] runs the whole control loop in a fixed
//! order: queued input, idle timer, clip time, camera damping, physics,
//! then the controller sync that reads the freshly stepped body. The app
//! renders right after.

use std::time::Duration;

use glam::{Mat4, Vec3};
use rapier3d::prelude::RigidBodyHandle;
use winit::keyboard::KeyCode;

use crate::anim::{AnimationGate, Gait};
use crate::assets::CharacterAsset;
use crate::camera::OrbitCamera;
use crate::clock::Clock;
use crate::config::{CAMERA_START, LoopConfig, MODEL_SCALE, MODEL_TILT, StepMode};
use crate::controller::{CharacterController, CharacterState, RenderActor};
use crate::input::{InputEvent, InputQueue, InputState, KeyEdge};
use crate::keymap::{KeyRegistry, MovementIntent};
use crate::physics::PhysicsWorld;

/// Scene node the character mesh is drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Actor {
    pub position: Vec3,
    pub yaw: f32,
    pub tilt: f32,
    pub scale: f32,
}

impl Actor {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: 0.0,
            tilt: MODEL_TILT,
            scale: MODEL_SCALE,
        }
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_y(self.yaw)
            * Mat4::from_rotation_x(self.tilt)
            * Mat4::from_scale(Vec3::splat(self.scale))
    }
}

impl RenderActor for Actor {
    fn set_transform(&mut self, position: Vec3, yaw: f32) {
        self.position = position;
        self.yaw = yaw;
    }
}

struct Character {
    controller: CharacterController,
    body: RigidBodyHandle,
    actor: Actor,
}

/// What happened during one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub now: Duration,
    pub physics_steps: u32,
    pub dropped_backlog: Duration,
    pub intent: MovementIntent,
    pub gait: Gait,
    pub character: Option<CharacterState>,
}

struct StepPlan {
    steps: u32,
    dropped_backlog: Duration,
}

pub struct Simulation<C: Clock> {
    config: LoopConfig,
    clock: C,
    registry: KeyRegistry,
    queue: InputQueue,
    input: InputState,
    intent: MovementIntent,
    gate: AnimationGate,
    physics: PhysicsWorld,
    camera: OrbitCamera,
    character: Option<Character>,
    accumulator: Duration,
}

impl<C: Clock> Simulation<C> {
    pub fn new(config: LoopConfig, clock: C, aspect: f32) -> Self {
        Self::with_registry(config, clock, aspect, KeyRegistry::default_bindings())
    }

    pub fn with_registry(config: LoopConfig, clock: C, aspect: f32, registry: KeyRegistry) -> Self {
        log::info!(
            "Simulation: {:?} stepping at {:.1} Hz, idle debounce {:?}",
            config.step_mode,
            1.0 / config.physics_dt,
            config.idle_debounce
        );
        Self {
            gate: AnimationGate::new(config.idle_debounce),
            config,
            clock,
            registry,
            queue: InputQueue::new(),
            input: InputState::new(),
            intent: MovementIntent::IDLE,
            physics: PhysicsWorld::new(),
            camera: OrbitCamera::new(CAMERA_START, Vec3::ZERO, aspect),
            character: None,
            accumulator: Duration::ZERO,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn intent(&self) -> MovementIntent {
        self.intent
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn gate(&self) -> &AnimationGate {
        &self.gate
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn is_active(&self) -> bool {
        self.character.is_some()
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.character.as_ref().map(|c| &c.actor)
    }

    /// Simulated position of the character body.
    pub fn body_position(&self) -> Option<Vec3> {
        let character = self.character.as_ref()?;
        let body = self.physics.body(character.body)?;
        Some(crate::controller::PhysicsBody::translation(body))
    }

    pub fn push_event(&mut self, event: InputEvent) {
        self.queue.push(event);
    }

    /// Queue a key-down stamped with the current clock reading.
    pub fn key_down(&mut self, key: KeyCode) {
        let at = self.clock.now();
        self.queue.push(InputEvent::down(key, at));
    }

    pub fn key_up(&mut self, key: KeyCode) {
        let at = self.clock.now();
        self.queue.push(InputEvent::up(key, at));
    }

    /// Queue releases for every held key, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        let at = self.clock.now();
        for &key in self.input.held() {
            self.queue.push(InputEvent::up(key, at));
        }
    }

    /// Bring the loaded character into the world. Gating and control start
    /// with the next frame.
    pub fn attach(&mut self, asset: &CharacterAsset) {
        if self.character.is_some() {
            log::warn!("Character already attached; ignoring second asset");
            return;
        }
        let body = self.physics.spawn_character(&asset.body);
        let controller = CharacterController::new(self.config.controller, asset.body.spawn);
        let actor = Actor::new(controller.state().render_position);
        self.gate.activate(
            asset.walk.clone(),
            asset.idle.clone(),
            self.registry.has_movement_key(self.input.held()),
        );
        self.character = Some(Character {
            controller,
            body,
            actor,
        });
        log::info!("Character active");
    }

    pub fn frame(&mut self, real_dt: Duration) -> FrameReport {
        let events: Vec<InputEvent> = self.queue.drain().collect();
        for event in events {
            self.apply_event(event);
        }

        let now = self.clock.now();
        let moving = self.registry.has_movement_key(self.input.held());
        self.gate.update(now, moving);

        let (plan, frame_dt) = match self.config.step_mode {
            StepMode::PerFrame => (
                StepPlan {
                    steps: 1,
                    dropped_backlog: Duration::ZERO,
                },
                self.config.controller.nominal_dt,
            ),
            StepMode::Accumulated => {
                let elapsed = real_dt.min(self.config.max_frame_delta);
                let plan = self.plan_steps(elapsed);
                (plan, elapsed.as_secs_f32())
            }
        };

        self.gate.advance(frame_dt);
        self.camera.update();

        for _ in 0..plan.steps {
            self.physics.step(self.config.physics_dt);
        }

        let controller_dt = match self.config.step_mode {
            StepMode::PerFrame => frame_dt,
            StepMode::Accumulated => plan.steps as f32 * self.config.physics_dt,
        };
        let state = self.character.as_mut().and_then(|character| {
            let body = self.physics.body_mut(character.body)?;
            character.controller.step(
                &self.intent,
                controller_dt,
                body,
                &mut character.actor,
                &mut self.camera,
            );
            Some(character.controller.state())
        });

        FrameReport {
            now,
            physics_steps: plan.steps,
            dropped_backlog: plan.dropped_backlog,
            intent: self.intent,
            gait: self.gate.gait(),
            character: state,
        }
    }

    fn apply_event(&mut self, event: InputEvent) {
        // Auto-repeat downs and stray ups leave the key set untouched.
        if !self.input.apply(&event) {
            return;
        }
        self.intent = self
            .registry
            .resolve(self.input.held(), self.intent.target_facing);

        match event.edge {
            KeyEdge::Down => self
                .gate
                .key_down(self.registry.contributes_movement(event.key)),
            KeyEdge::Up => {
                let still_moving = self.registry.has_movement_key(self.input.held());
                self.gate.key_up(still_moving, event.at);
            }
        }
    }

    fn plan_steps(&mut self, elapsed: Duration) -> StepPlan {
        let fixed = Duration::from_secs_f32(self.config.physics_dt);
        self.accumulator += elapsed;

        let mut steps = 0;
        while self.accumulator >= fixed && steps < self.config.max_steps_per_frame {
            self.accumulator -= fixed;
            steps += 1;
        }

        let mut dropped_backlog = Duration::ZERO;
        if self.accumulator >= fixed {
            dropped_backlog = self.accumulator;
            self.accumulator = Duration::ZERO;
            log::warn!(
                "Physics fell behind: dropped {:?} after {} steps",
                dropped_backlog,
                steps
            );
        }
        StepPlan {
            steps,
            dropped_backlog,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::AnimClip;
    use crate::clock::ManualClock;
    use crate::mesh::Mesh;
    use crate::physics::BodyParams;
    use std::f32::consts::FRAC_PI_2;

    const FRAME: Duration = Duration::from_micros(16_667);

    fn asset() -> CharacterAsset {
        CharacterAsset {
            mesh: Mesh::default(),
            body: BodyParams::new(Vec3::new(0.0, 1.0, 0.0)),
            walk: Some(AnimClip::new("walk", 0.0, 1.0)),
            idle: Some(AnimClip::new("idle", 1.0, 2.0)),
        }
    }

    fn sim(mode: StepMode) -> Simulation<ManualClock> {
        let config = LoopConfig {
            step_mode: mode,
            ..LoopConfig::default()
        };
        Simulation::new(config, ManualClock::new(), 16.0 / 9.0)
    }

    #[test]
    fn actor_matrix_places_scaled_model() {
        let mut actor = Actor::new(Vec3::ZERO);
        actor.set_transform(Vec3::new(1.0, 0.0, 2.0), FRAC_PI_2);
        let origin = actor.model_matrix().transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 0.0, 2.0)).length() < 1e-6);
        let forward = actor.model_matrix().transform_vector3(Vec3::Z * 10.0);
        assert!(forward.x > 0.99 && forward.length() < 1.01);
    }

    #[test]
    fn inactive_until_attached() {
        let mut sim = sim(StepMode::PerFrame);
        sim.key_down(KeyCode::KeyW);
        let report = sim.frame(FRAME);
        assert!(report.character.is_none());
        assert_eq!(report.gait, Gait::Idle);
        assert!(!sim.gate().is_active());
        assert!(report.intent.is_moving());
    }

    #[test]
    fn attach_while_key_held_starts_walking() {
        let mut sim = sim(StepMode::PerFrame);
        sim.key_down(KeyCode::KeyW);
        sim.frame(FRAME);
        sim.attach(&asset());
        let report = sim.frame(FRAME);
        assert_eq!(report.gait, Gait::Walking);
        assert!(report.character.is_some());
    }

    #[test]
    fn per_frame_mode_takes_one_step_regardless_of_elapsed() {
        let mut sim = sim(StepMode::PerFrame);
        assert_eq!(sim.frame(Duration::from_millis(100)).physics_steps, 1);
        assert_eq!(sim.frame(Duration::from_millis(1)).physics_steps, 1);
    }

    #[test]
    fn accumulated_mode_tracks_real_time() {
        let mut sim = sim(StepMode::Accumulated);
        assert_eq!(sim.frame(Duration::from_millis(8)).physics_steps, 0);
        assert_eq!(sim.frame(Duration::from_millis(10)).physics_steps, 1);
        assert_eq!(sim.frame(Duration::from_millis(50)).physics_steps, 3);
    }

    #[test]
    fn accumulated_mode_caps_steps_and_drops_backlog() {
        let mut sim = sim(StepMode::Accumulated);
        let report = sim.frame(Duration::from_secs(2));
        assert_eq!(report.physics_steps, 5);
        assert!(report.dropped_backlog > Duration::ZERO);
        assert_eq!(sim.frame(Duration::ZERO).physics_steps, 0);
    }

    #[test]
    fn release_all_clears_held_keys() {
        let mut sim = sim(StepMode::PerFrame);
        sim.attach(&asset());
        sim.key_down(KeyCode::KeyW);
        sim.key_down(KeyCode::KeyA);
        sim.frame(FRAME);
        sim.release_all();
        let report = sim.frame(FRAME);
        assert!(sim.input().is_empty());
        assert!(!report.intent.is_moving());
        assert!(sim.gate().pending_idle().is_some());
    }

    #[test]
    fn auto_repeat_does_not_rearm() {
        let mut sim = sim(StepMode::PerFrame);
        sim.attach(&asset());
        sim.key_down(KeyCode::KeyW);
        sim.key_down(KeyCode::KeyW);
        sim.frame(FRAME);
        sim.key_up(KeyCode::KeyW);
        sim.key_up(KeyCode::KeyW);
        sim.frame(FRAME);
        assert_eq!(sim.gate().pending_idle(), Some(sim.config().idle_debounce));
    }
}
