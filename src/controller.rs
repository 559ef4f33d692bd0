//! Character controller: drives the physics body from the movement intent
//! and mirrors the simulated body onto the render actor and camera target.
//!
//! The controller never owns the body, actor or camera. It reaches them
//! through the small traits below so the simulation can hand over rapier
//! bodies and scene objects, and tests can hand over plain structs.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::config::ControllerConfig;
use crate::keymap::MovementIntent;

/// Horizontal speeds below this are snapped to rest.
const REST_SPEED: f32 = 1e-3;

pub trait PhysicsBody {
    fn linvel(&self) -> Vec3;
    fn set_linvel(&mut self, velocity: Vec3);
    fn translation(&self) -> Vec3;
}

pub trait RenderActor {
    fn set_transform(&mut self, position: Vec3, yaw: f32);
}

pub trait CameraTarget {
    fn set_target(&mut self, target: Vec3);
}

/// What the renderer sees of the character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterState {
    pub render_position: Vec3,
    pub render_yaw: f32,
}

pub struct CharacterController {
    config: ControllerConfig,
    state: CharacterState,
}

impl CharacterController {
    pub fn new(config: ControllerConfig, spawn: Vec3) -> Self {
        Self {
            config,
            state: CharacterState {
                render_position: Vec3::new(spawn.x, config.ground_offset, spawn.z),
                render_yaw: 0.0,
            },
        }
    }

    pub fn state(&self) -> CharacterState {
        self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Run once per frame after the physics world has stepped.
    ///
    /// Reads the freshly stepped body position into the render transform
    /// (vertical pinned to the ground offset), eases the yaw toward the
    /// intent's facing, then commands the body velocity for the next step.
    pub fn step(
        &mut self,
        intent: &MovementIntent,
        dt: f32,
        body: &mut impl PhysicsBody,
        actor: &mut impl RenderActor,
        camera: &mut impl CameraTarget,
    ) {
        let frames = if self.config.nominal_dt > 0.0 {
            (dt / self.config.nominal_dt).max(0.0)
        } else {
            1.0
        };

        let simulated = body.translation();
        self.state.render_position =
            Vec3::new(simulated.x, self.config.ground_offset, simulated.z);

        let alpha = 1.0 - (1.0 - self.config.smoothing).powf(frames);
        self.state.render_yaw = lerp_angle(self.state.render_yaw, intent.target_facing, alpha);

        body.set_linvel(self.commanded_velocity(intent, body.linvel(), frames));

        actor.set_transform(self.state.render_position, self.state.render_yaw);
        camera.set_target(self.state.render_position + self.config.camera_offset);
    }

    /// The body's vertical velocity is left to gravity and contacts.
    fn commanded_velocity(&self, intent: &MovementIntent, current: Vec3, frames: f32) -> Vec3 {
        if intent.is_moving() {
            let direction = if self.config.normalize_direction {
                intent.direction.normalize_or_zero()
            } else {
                intent.direction
            };
            return Vec3::new(
                direction.x * self.config.speed,
                current.y,
                direction.y * self.config.speed,
            );
        }

        let k = self.config.damping.powf(frames);
        let (vx, vz) = (current.x * k, current.z * k);
        if vx.hypot(vz) < REST_SPEED {
            Vec3::new(0.0, current.y, 0.0)
        } else {
            Vec3::new(vx, current.y, vz)
        }
    }
}

/// Wrap an angle into `[-PI, PI)`. Angles already in range are returned untouched.
pub fn wrap_angle(a: f32) -> f32 {
    if (-PI..PI).contains(&a) {
        a
    } else {
        (a + PI).rem_euclid(TAU) - PI
    }
}

/// Interpolate `current` toward `target` along the shorter arc.
pub fn lerp_angle(current: f32, target: f32, t: f32) -> f32 {
    wrap_angle(current + wrap_angle(target - current) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use std::f32::consts::FRAC_PI_2;

    #[derive(Default)]
    struct TestBody {
        position: Vec3,
        velocity: Vec3,
    }

    impl PhysicsBody for TestBody {
        fn linvel(&self) -> Vec3 {
            self.velocity
        }
        fn set_linvel(&mut self, velocity: Vec3) {
            self.velocity = velocity;
        }
        fn translation(&self) -> Vec3 {
            self.position
        }
    }

    #[derive(Default)]
    struct TestActor {
        position: Vec3,
        yaw: f32,
    }

    impl RenderActor for TestActor {
        fn set_transform(&mut self, position: Vec3, yaw: f32) {
            self.position = position;
            self.yaw = yaw;
        }
    }

    #[derive(Default)]
    struct TestCamera {
        target: Vec3,
    }

    impl CameraTarget for TestCamera {
        fn set_target(&mut self, target: Vec3) {
            self.target = target;
        }
    }

    const DT: f32 = 1.0 / 60.0;

    fn intent(direction: Vec2, facing: f32) -> MovementIntent {
        MovementIntent {
            direction,
            target_facing: facing,
        }
    }

    #[test]
    fn moving_intent_sets_horizontal_velocity() {
        let mut controller = CharacterController::new(ControllerConfig::default(), Vec3::ZERO);
        let mut body = TestBody {
            velocity: Vec3::new(0.0, -2.0, 0.0),
            ..Default::default()
        };
        controller.step(
            &intent(Vec2::new(0.0, 3.0), 0.0),
            DT,
            &mut body,
            &mut TestActor::default(),
            &mut TestCamera::default(),
        );
        assert_eq!(body.velocity, Vec3::new(0.0, -2.0, 15.0));
    }

    #[test]
    fn normalized_direction_uses_unit_vector() {
        let config = ControllerConfig {
            normalize_direction: true,
            ..Default::default()
        };
        let mut controller = CharacterController::new(config, Vec3::ZERO);
        let mut body = TestBody::default();
        controller.step(
            &intent(Vec2::new(3.0, 3.0), 0.0),
            DT,
            &mut body,
            &mut TestActor::default(),
            &mut TestCamera::default(),
        );
        let horizontal = Vec2::new(body.velocity.x, body.velocity.z);
        assert!((horizontal.length() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn idle_intent_damps_velocity() {
        let mut controller = CharacterController::new(ControllerConfig::default(), Vec3::ZERO);
        let mut body = TestBody {
            velocity: Vec3::new(10.0, 1.0, -20.0),
            ..Default::default()
        };
        controller.step(
            &MovementIntent::IDLE,
            DT,
            &mut body,
            &mut TestActor::default(),
            &mut TestCamera::default(),
        );
        assert!((body.velocity.x - 9.0).abs() < 1e-4);
        assert!((body.velocity.z + 18.0).abs() < 1e-4);
        assert_eq!(body.velocity.y, 1.0);
    }

    #[test]
    fn damping_at_rest_stays_at_rest() {
        let mut controller = CharacterController::new(ControllerConfig::default(), Vec3::ZERO);
        let mut body = TestBody::default();
        for _ in 0..600 {
            controller.step(
                &MovementIntent::IDLE,
                DT,
                &mut body,
                &mut TestActor::default(),
                &mut TestCamera::default(),
            );
        }
        assert_eq!(body.velocity, Vec3::ZERO);
    }

    #[test]
    fn render_height_is_clamped_to_ground() {
        let mut controller = CharacterController::new(ControllerConfig::default(), Vec3::ZERO);
        let mut actor = TestActor::default();
        for height in [-3.0, 0.0, 0.97, 7.25, 1000.0] {
            let mut body = TestBody {
                position: Vec3::new(4.0, height, -2.0),
                ..Default::default()
            };
            controller.step(
                &MovementIntent::IDLE,
                DT,
                &mut body,
                &mut actor,
                &mut TestCamera::default(),
            );
            assert_eq!(actor.position, Vec3::new(4.0, 0.0, -2.0));
            assert_eq!(body.position.y, height);
        }
    }

    #[test]
    fn camera_trails_render_position() {
        let mut controller = CharacterController::new(ControllerConfig::default(), Vec3::ZERO);
        let mut body = TestBody {
            position: Vec3::new(1.0, 0.8, 2.0),
            ..Default::default()
        };
        let mut camera = TestCamera::default();
        controller.step(
            &MovementIntent::IDLE,
            DT,
            &mut body,
            &mut TestActor::default(),
            &mut camera,
        );
        assert_eq!(camera.target, Vec3::new(1.0, 10.0, -2.0));
    }

    #[test]
    fn yaw_converges_without_overshoot() {
        let mut controller = CharacterController::new(ControllerConfig::default(), Vec3::ZERO);
        let mut body = TestBody::default();
        let mut actor = TestActor::default();
        let target = FRAC_PI_2;
        let mut previous_error = (target - controller.state().render_yaw).abs();

        for _ in 0..120 {
            controller.step(
                &intent(Vec2::ZERO, target),
                DT,
                &mut body,
                &mut actor,
                &mut TestCamera::default(),
            );
            let yaw = controller.state().render_yaw;
            assert!(yaw <= target);
            let error = (target - yaw).abs();
            assert!(error < previous_error || error == 0.0);
            previous_error = error;
        }
        assert!(previous_error < 1e-3);
        assert_eq!(actor.yaw, controller.state().render_yaw);
    }

    #[test]
    fn first_yaw_step_uses_reference_factor() {
        let mut controller = CharacterController::new(ControllerConfig::default(), Vec3::ZERO);
        controller.step(
            &intent(Vec2::ZERO, 1.0),
            DT,
            &mut TestBody::default(),
            &mut TestActor::default(),
            &mut TestCamera::default(),
        );
        assert!((controller.state().render_yaw - 0.1).abs() < 1e-5);
    }

    #[test]
    fn yaw_turns_through_the_short_arc() {
        let next = lerp_angle(PI - 0.1, -PI + 0.1, 0.5);
        assert!((next.abs() - PI).abs() < 1e-4);
        assert!((wrap_angle(2.5 * PI) - FRAC_PI_2).abs() < 1e-5);
    }
}
