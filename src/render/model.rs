use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use super::gpu::{
    DEPTH_FORMAT, create_index_buffer, create_texture_with_bind_group, create_uniform_buffer,
    create_vertex_buffer, texture_bind_group_layout, uniform_bind_group_layout,
};
use crate::mesh::{Mesh, Vertex};

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
    pub tint: [f32; 4],
}

struct PartRenderData {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    bind_group: wgpu::BindGroup,
}

/// A mesh resident on the GPU with its own model transform.
pub struct GpuModel {
    parts: Vec<PartRenderData>,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
}

impl GpuModel {
    pub fn set_transform(&self, queue: &wgpu::Queue, model: Mat4) {
        let uniform = ModelUniform {
            model: model.to_cols_array_2d(),
            tint: [1.0; 4],
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }
}

/// Lit, fogged, textured pipeline shared by the ground and the character.
pub struct ModelRenderer {
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white: wgpu::BindGroup,
}

impl ModelRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene_layout: &wgpu::BindGroupLayout,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("scene.wgsl").into()),
        });

        let uniform_layout = uniform_bind_group_layout(device, "Model Uniform Layout");
        let texture_layout = texture_bind_group_layout(device);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Model Pipeline Layout"),
            bind_group_layouts: &[scene_layout, &uniform_layout, &texture_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Model Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Model Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // Untextured primitives sample plain white
        let (_, _, white) = create_texture_with_bind_group(
            device,
            queue,
            &texture_layout,
            &sampler,
            &[255, 255, 255, 255],
            1,
            1,
            "White Texture",
        );

        Self {
            pipeline,
            uniform_layout,
            texture_layout,
            sampler,
            white,
        }
    }

    pub fn upload(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mesh: &Mesh,
        label: &str,
    ) -> GpuModel {
        let textures: Vec<wgpu::BindGroup> = mesh
            .textures
            .iter()
            .enumerate()
            .map(|(i, tex)| {
                let (_, _, bind_group) = create_texture_with_bind_group(
                    device,
                    queue,
                    &self.texture_layout,
                    &self.sampler,
                    &tex.rgba,
                    tex.width,
                    tex.height,
                    &format!("{label} Texture {i}"),
                );
                bind_group
            })
            .collect();

        let parts = mesh
            .submeshes
            .iter()
            .filter(|s| !s.vertices.is_empty() && !s.indices.is_empty())
            .map(|submesh| PartRenderData {
                vertex_buffer: create_vertex_buffer(device, &submesh.vertices, label),
                index_buffer: create_index_buffer(device, &submesh.indices, label),
                index_count: submesh.indices.len() as u32,
                bind_group: submesh
                    .texture
                    .and_then(|i| textures.get(i))
                    .unwrap_or(&self.white)
                    .clone(),
            })
            .collect();

        let uniform = ModelUniform {
            model: Mat4::IDENTITY.to_cols_array_2d(),
            tint: [1.0; 4],
        };
        let uniform_buffer =
            create_uniform_buffer(device, &uniform, &format!("{label} Model Uniform"));
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} Model Bind Group")),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        GpuModel {
            parts,
            uniform_buffer,
            uniform_bind_group,
        }
    }

    pub fn render<'a>(
        &'a self,
        pass: &mut wgpu::RenderPass<'a>,
        scene_bind_group: &'a wgpu::BindGroup,
        models: &[&'a GpuModel],
    ) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, scene_bind_group, &[]);

        for model in models {
            pass.set_bind_group(1, &model.uniform_bind_group, &[]);
            for part in &model.parts {
                pass.set_bind_group(2, &part.bind_group, &[]);
                pass.set_vertex_buffer(0, part.vertex_buffer.slice(..));
                pass.set_index_buffer(part.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..part.index_count, 0, 0..1);
            }
        }
    }
}
