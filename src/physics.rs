use glam::Vec3;
use rapier3d::prelude::*;

use crate::config::{BODY_MASS, BODY_RADIUS, GRAVITY};
use crate::controller::PhysicsBody;

/// Parameters for the character's rigid body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyParams {
    pub mass: f32,
    pub radius: f32,
    pub spawn: Vec3,
}

impl BodyParams {
    pub fn new(spawn: Vec3) -> Self {
        Self {
            mass: BODY_MASS,
            radius: BODY_RADIUS,
            spawn,
        }
    }
}

pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl PhysicsWorld {
    /// World with gravity and an infinite static ground plane at y = 0.
    pub fn new() -> Self {
        let rigid_body_set = RigidBodySet::new();
        let mut collider_set = ColliderSet::new();

        let ground = ColliderBuilder::halfspace(Vector::y_axis())
            .friction(0.8)
            .build();
        collider_set.insert(ground);

        Self {
            rigid_body_set,
            collider_set,
            gravity: vector![0.0, GRAVITY, 0.0],
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    /// Insert the character's sphere body. Rotations are locked so the
    /// sphere slides instead of rolling.
    pub fn spawn_character(&mut self, params: &BodyParams) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![params.spawn.x, params.spawn.y, params.spawn.z])
            .lock_rotations()
            .build();
        let handle = self.rigid_body_set.insert(body);

        let collider = ColliderBuilder::ball(params.radius)
            .mass(params.mass)
            .friction(0.0)
            .build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);

        log::info!(
            "Spawned character body at {:?} (mass {}, radius {})",
            params.spawn,
            params.mass,
            params.radius
        );
        handle
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.rigid_body_set.get_mut(handle)
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    /// Advance the world by one fixed step of `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsBody for RigidBody {
    fn linvel(&self) -> Vec3 {
        let v = RigidBody::linvel(self);
        Vec3::new(v.x, v.y, v.z)
    }

    fn set_linvel(&mut self, velocity: Vec3) {
        RigidBody::set_linvel(self, vector![velocity.x, velocity.y, velocity.z], true);
    }

    fn translation(&self) -> Vec3 {
        let t = RigidBody::translation(self);
        Vec3::new(t.x, t.y, t.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NOMINAL_DT, SPAWN_POSITION};

    #[test]
    fn character_settles_on_ground() {
        let mut world = PhysicsWorld::new();
        let handle = world.spawn_character(&BodyParams::new(SPAWN_POSITION));
        for _ in 0..240 {
            world.step(NOMINAL_DT);
        }
        let body = world.body(handle).expect("character body");
        let y = PhysicsBody::translation(body).y;
        assert!((y - BODY_RADIUS).abs() < 0.05, "resting height {y}");
    }

    #[test]
    fn commanded_velocity_moves_body() {
        let mut world = PhysicsWorld::new();
        let handle = world.spawn_character(&BodyParams::new(Vec3::new(0.0, 1.0, 0.0)));
        for _ in 0..60 {
            let body = world.body_mut(handle).expect("character body");
            let v = PhysicsBody::linvel(body);
            PhysicsBody::set_linvel(body, Vec3::new(0.0, v.y, 15.0));
            world.step(NOMINAL_DT);
        }
        let body = world.body(handle).expect("character body");
        let z = PhysicsBody::translation(body).z;
        assert!((z - 15.0).abs() < 0.5, "travelled {z}");
    }
}
