use std::sync::Arc;

use web_time::Instant;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use crate::assets::AssetJoin;
use crate::clock::SystemClock;
use crate::config::LoopConfig;
use crate::render::Renderer;
use crate::sim::Simulation;

/// Pixels of touchpad scroll treated as one wheel notch.
const PIXELS_PER_LINE: f64 = 40.0;

struct AppState {
    renderer: Renderer,
    sim: Simulation<SystemClock>,
    assets: AssetJoin,
    last_frame: Instant,
}

impl AppState {
    fn window(&self) -> &Window {
        &self.renderer.ctx.window
    }

    fn handle_keyboard(&mut self, event: KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        if event.repeat {
            return;
        }
        match event.state {
            ElementState::Pressed => self.sim.key_down(code),
            ElementState::Released => self.sim.key_up(code),
        }
    }

    fn poll_assets(&mut self) {
        match self.assets.poll() {
            Some(Ok(asset)) => {
                self.renderer.upload_character(&asset.mesh);
                self.sim.attach(&asset);
            }
            Some(Err(err)) => {
                log::error!("Character unavailable: {err}");
            }
            None => {}
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        self.poll_assets();

        let now = Instant::now();
        let elapsed = now - self.last_frame;
        self.last_frame = now;
        self.sim.frame(elapsed);

        match self
            .renderer
            .render_frame(self.sim.camera(), self.sim.actor())
        {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.renderer.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of GPU memory, exiting");
                event_loop.exit();
            }
            Err(e) => log::error!("Render error: {:?}", e),
        }

        self.window().request_redraw();
    }
}

struct App {
    config: LoopConfig,
    state: Option<AppState>,
}

impl App {
    fn new(config: LoopConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes().with_title("Foxtrail");
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let renderer = match pollster::block_on(Renderer::new(window.clone())) {
            Ok(renderer) => renderer,
            Err(e) => {
                log::error!("Failed to initialise renderer: {e}");
                event_loop.exit();
                return;
            }
        };

        let (width, height) = renderer.size();
        let sim = Simulation::new(
            self.config.clone(),
            SystemClock::new(),
            width as f32 / height as f32,
        );
        let assets = AssetJoin::spawn(self.config.model_path.clone());

        self.state = Some(AppState {
            renderer,
            sim,
            assets,
            last_frame: Instant::now(),
        });
        window.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            if matches!(event, WindowEvent::CloseRequested) {
                event_loop.exit();
            }
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                state.renderer.resize(size.width, size.height);
                state.sim.camera_mut().resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => state.handle_keyboard(event),
            WindowEvent::Focused(false) => state.sim.release_all(),
            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => {
                let pressed = button_state == ElementState::Pressed;
                state.sim.camera_mut().handle_mouse_input(pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (_, height) = state.renderer.size();
                state
                    .sim
                    .camera_mut()
                    .handle_mouse_move(position.x, position.y, height);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / PIXELS_PER_LINE) as f32,
                };
                state.sim.camera_mut().handle_scroll(lines);
            }
            WindowEvent::RedrawRequested => state.redraw(event_loop),
            _ => {}
        }
    }
}

pub fn run() {
    env_logger::init();

    let config = LoopConfig::from_env();
    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {e}");
            return;
        }
    };

    let mut app = App::new(config);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {e}");
    }
}
