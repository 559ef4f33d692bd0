pub mod camera;
pub mod gpu;
pub mod model;

use std::sync::Arc;

use winit::window::Window;

use crate::camera::OrbitCamera;
use crate::config::GROUND_EXTENT;
use crate::error::RenderError;
use crate::mesh::Mesh;
use crate::sim::Actor;

use camera::{SceneState, sky_linear};
use gpu::{create_depth_texture, uniform_bind_group_layout};
use model::{GpuModel, ModelRenderer};

/// World units per checker cell on the ground.
const GROUND_TILE: f32 = 4.0;

pub struct RenderContext {
    pub window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
}

impl RenderContext {
    pub async fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let (width, height) = {
            let size = window.inner_size();
            (size.width.max(1), size.height.max(1))
        };

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
        })
    }
}

pub struct Renderer {
    pub ctx: RenderContext,
    scene: SceneState,
    depth_view: wgpu::TextureView,
    models: ModelRenderer,
    ground: GpuModel,
    character: Option<GpuModel>,
}

impl Renderer {
    pub async fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let ctx = RenderContext::new(window).await?;

        let scene_layout = uniform_bind_group_layout(&ctx.device, "Scene Uniform Layout");
        let scene = SceneState::new(&ctx.device, &scene_layout);
        let (_, depth_view) =
            create_depth_texture(&ctx.device, ctx.config.width, ctx.config.height);

        let models = ModelRenderer::new(&ctx.device, &ctx.queue, &scene_layout, ctx.config.format);
        let ground = models.upload(
            &ctx.device,
            &ctx.queue,
            &Mesh::ground(GROUND_EXTENT, GROUND_TILE),
            "Ground",
        );

        Ok(Self {
            ctx,
            scene,
            depth_view,
            models,
            ground,
            character: None,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.ctx.config.width, self.ctx.config.height)
    }

    pub fn upload_character(&mut self, mesh: &Mesh) {
        self.character = Some(
            self.models
                .upload(&self.ctx.device, &self.ctx.queue, mesh, "Character"),
        );
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.ctx
                .surface
                .configure(&self.ctx.device, &self.ctx.config);

            let (_, depth_view) = create_depth_texture(&self.ctx.device, width, height);
            self.depth_view = depth_view;
        }
    }

    /// Reapply the current surface configuration after a lost or outdated surface.
    pub fn reconfigure(&mut self) {
        let (width, height) = self.size();
        self.resize(width, height);
    }

    pub fn render_frame(
        &mut self,
        camera: &OrbitCamera,
        actor: Option<&Actor>,
    ) -> Result<(), wgpu::SurfaceError> {
        self.scene.update(&self.ctx.queue, camera);

        let mut drawn: Vec<&GpuModel> = vec![&self.ground];
        if let (Some(model), Some(actor)) = (&self.character, actor) {
            model.set_transform(&self.ctx.queue, actor.model_matrix());
            drawn.push(model);
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let [r, g, b] = sky_linear();
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            self.models
                .render(&mut pass, &self.scene.bind_group, &drawn);
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
