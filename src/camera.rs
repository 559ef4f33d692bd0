//! Orbit camera around a movable look-at target.
//!
//! Drag deltas and wheel zoom are queued and folded in by `update`, which
//! runs once per frame and eases the queued rotation out exponentially.

use std::f32::consts::TAU;

use glam::{Mat4, Vec3};

use crate::config::*;
use crate::controller::CameraTarget;

pub struct OrbitCamera {
    target: Vec3,
    radius: f32,
    /// Azimuth around +Y, measured from +Z.
    theta: f32,
    /// Polar angle from +Y.
    phi: f32,
    pending_theta: f32,
    pending_phi: f32,
    pending_scale: f32,
    damping: f32,
    aspect: f32,
    dragging: bool,
    last_cursor: Option<(f64, f64)>,
}

impl OrbitCamera {
    pub fn new(position: Vec3, target: Vec3, aspect: f32) -> Self {
        let offset = position - target;
        let radius = offset.length().max(f32::EPSILON);
        let mut camera = Self {
            target,
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_scale: 1.0,
            damping: ORBIT_DAMPING,
            aspect,
            dragging: false,
            last_cursor: None,
        };
        camera.clamp();
        camera
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn polar_angle(&self) -> f32 {
        self.phi
    }

    pub fn position(&self) -> Vec3 {
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        self.target
            + self.radius * Vec3::new(sin_phi * sin_theta, cos_phi, sin_phi * cos_theta)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn handle_mouse_input(&mut self, pressed: bool) {
        self.dragging = pressed;
        if !pressed {
            self.last_cursor = None;
        }
    }

    /// Cursor moved to `(x, y)` in a viewport `viewport_height` pixels tall.
    pub fn handle_mouse_move(&mut self, x: f64, y: f64, viewport_height: u32) {
        if !self.dragging {
            return;
        }
        if let Some((last_x, last_y)) = self.last_cursor {
            let height = viewport_height.max(1) as f32;
            let dx = (x - last_x) as f32;
            let dy = (y - last_y) as f32;
            self.pending_theta -= TAU * dx / height * ORBIT_ROTATE_SPEED;
            self.pending_phi -= TAU * dy / height * ORBIT_ROTATE_SPEED;
        }
        self.last_cursor = Some((x, y));
    }

    /// Positive `lines` zooms in.
    pub fn handle_scroll(&mut self, lines: f32) {
        self.pending_scale *= 0.95_f32.powf(ORBIT_ZOOM_SPEED * lines);
    }

    /// Fold queued input into the orbit and enforce the polar and distance limits.
    pub fn update(&mut self) {
        self.theta += self.pending_theta * self.damping;
        self.phi += self.pending_phi * self.damping;
        self.pending_theta *= 1.0 - self.damping;
        self.pending_phi *= 1.0 - self.damping;

        self.radius *= self.pending_scale;
        self.pending_scale = 1.0;

        self.clamp();
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(CAMERA_FOV_DEG.to_radians(), self.aspect, CAMERA_NEAR, CAMERA_FAR)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view_matrix()
    }

    fn clamp(&mut self) {
        self.phi = self.phi.clamp(
            ORBIT_MIN_POLAR_DEG.to_radians(),
            ORBIT_MAX_POLAR_DEG.to_radians(),
        );
        self.radius = self.radius.clamp(ORBIT_MIN_DISTANCE, ORBIT_MAX_DISTANCE);
    }
}

impl CameraTarget for OrbitCamera {
    fn set_target(&mut self, target: Vec3) {
        self.target = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_position_is_preserved_within_limits() {
        let camera = OrbitCamera::new(CAMERA_START, Vec3::ZERO, 1.0);
        assert!((camera.position() - CAMERA_START).length() < 1e-3);
    }

    #[test]
    fn following_target_keeps_offset() {
        let mut camera = OrbitCamera::new(CAMERA_START, Vec3::ZERO, 1.0);
        let offset = camera.position() - camera.target();
        camera.set_target(Vec3::new(5.0, 10.0, -4.0));
        camera.update();
        assert!((camera.position() - camera.target() - offset).length() < 1e-3);
    }

    #[test]
    fn zoom_and_tilt_are_clamped() {
        let mut camera = OrbitCamera::new(CAMERA_START, Vec3::ZERO, 1.0);
        for _ in 0..200 {
            camera.handle_scroll(5.0);
            camera.update();
        }
        assert!((camera.radius() - ORBIT_MIN_DISTANCE).abs() < 1e-4);

        camera.handle_mouse_input(true);
        camera.handle_mouse_move(0.0, 0.0, 600);
        camera.handle_mouse_move(0.0, 5000.0, 600);
        for _ in 0..500 {
            camera.update();
        }
        assert!(camera.polar_angle() >= ORBIT_MIN_POLAR_DEG.to_radians() - 1e-5);
        assert!(camera.polar_angle() <= ORBIT_MAX_POLAR_DEG.to_radians() + 1e-5);
    }

    #[test]
    fn drag_rotation_is_damped_over_frames() {
        let mut camera = OrbitCamera::new(CAMERA_START, Vec3::ZERO, 1.0);
        let start = camera.position();
        camera.handle_mouse_input(true);
        camera.handle_mouse_move(100.0, 100.0, 600);
        camera.handle_mouse_move(130.0, 100.0, 600);
        camera.handle_mouse_input(false);

        camera.update();
        let first = camera.position();
        camera.update();
        let second = camera.position();
        assert!((first - start).length() > 0.0);
        assert!((second - first).length() < (first - start).length());
    }
}
