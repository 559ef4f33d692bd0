use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use super::gpu::create_uniform_buffer;
use crate::camera::OrbitCamera;
use crate::config::{AMBIENT_INTENSITY, FOG_DENSITY, SKY_COLOR, SUN_INTENSITY, SUN_POSITION};

/// Per-frame camera, fog and light parameters.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct SceneUniform {
    pub view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
    pub sky: [f32; 4],
    pub sun: [f32; 4],
    pub ambient: [f32; 4],
}

impl SceneUniform {
    pub fn new(camera: &OrbitCamera) -> Self {
        let [r, g, b] = sky_linear();
        let sun = SUN_POSITION.normalize();
        Self {
            view_proj: camera.view_proj().to_cols_array_2d(),
            eye: camera.position().extend(1.0).to_array(),
            sky: [r, g, b, FOG_DENSITY],
            sun: [sun.x, sun.y, sun.z, SUN_INTENSITY],
            ambient: [AMBIENT_INTENSITY, 0.0, 0.0, 0.0],
        }
    }
}

/// Sky colour converted from sRGB for the clear colour and fog.
pub fn sky_linear() -> [f32; 3] {
    SKY_COLOR.map(|c| {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    })
}

pub struct SceneState {
    pub uniform_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl SceneState {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> Self {
        let uniform = SceneUniform {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            eye: [0.0; 4],
            sky: [0.0; 4],
            sun: [0.0, 1.0, 0.0, 0.0],
            ambient: [1.0, 0.0, 0.0, 0.0],
        };
        let uniform_buffer = create_uniform_buffer(device, &uniform, "Scene Uniform");

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Self {
            uniform_buffer,
            bind_group,
        }
    }

    pub fn update(&self, queue: &wgpu::Queue, camera: &OrbitCamera) {
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(&[SceneUniform::new(camera)]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sky_is_linearised() {
        let [r, g, b] = sky_linear();
        assert!(r < SKY_COLOR[0] && g < SKY_COLOR[1] && b < SKY_COLOR[2]);
        assert!(b > r);
    }
}
