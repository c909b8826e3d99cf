use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::ModifiersState;
use winit::window::{Window, WindowBuilder};

use crate::controls::{Action, KeyTable};
use crate::gpu::{check_gpu, draw_frame, GpuContext, Scene};
use crate::runtime::{BoxedTimeSource, FrameState, FrameStats, SystemTimeSource};
use crate::types::RendererConfig;

const WINDOW_TITLE: &str = "shadeview";

/// Everything the event loop owns.
///
/// Fields drop in declaration order: the scene goes first, then the device
/// and surface, then the window the surface was created from.
struct WindowState {
    scene: Option<Scene>,
    gpu: GpuContext,
    window: Arc<Window>,
    frame: FrameState,
    clock: BoxedTimeSource,
    keys: KeyTable,
    modifiers: ModifiersState,
    zoom_step: f32,
    stats: FrameStats,
}

impl WindowState {
    fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let gpu = GpuContext::new(window.as_ref(), window.inner_size())?;
        let scene = Scene::new(
            &gpu.device,
            &gpu.queue,
            gpu.surface_format,
            &config.shader_source,
            config.channels.clone(),
            config.reload_policy,
        );
        let size = gpu.size;

        Ok(Self {
            scene: Some(scene),
            gpu,
            window,
            frame: FrameState::new((size.width, size.height), config.scale),
            clock: Box::new(SystemTimeSource::new()),
            keys: KeyTable::default(),
            modifiers: ModifiersState::empty(),
            zoom_step: config.zoom_step,
            stats: FrameStats::new(Duration::from_secs(1)),
        })
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Reload => {
                if let Some(scene) = self.scene.as_mut() {
                    tracing::info!(path = %scene.shader_path().display(), "reloading");
                    scene.reload(&self.gpu.device, &self.gpu.queue);
                }
            }
            Action::ZoomIn => {
                self.frame.zoom_in(self.zoom_step);
                tracing::info!(scale = self.frame.scale(), "zoom in");
            }
            Action::ZoomOut => {
                self.frame.zoom_out(self.zoom_step);
                tracing::info!(scale = self.frame.scale(), "zoom out");
            }
        }
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if self.gpu.resize(new_size) && self.frame.resize(new_size.width, new_size.height) {
            tracing::debug!(
                width = new_size.width,
                height = new_size.height,
                "framebuffer resized"
            );
        }
    }

    fn render_frame(&mut self) -> Result<()> {
        let surface_texture = match self.gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.gpu.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(anyhow!("surface out of memory"));
            }
            Err(other) => {
                tracing::warn!(error = %other, "surface error; retrying next frame");
                return Ok(());
            }
        };
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.frame.set_elapsed(self.clock.sample());
        if let Some(scene) = self.scene.as_mut() {
            check_gpu(&self.gpu.device, "draw_frame", || {
                draw_frame(scene, &self.gpu.device, &self.gpu.queue, &view, &self.frame)
            });
        }

        self.window.pre_present_notify();
        surface_texture.present();

        if let Some(fps) = self.stats.record(Instant::now()) {
            tracing::debug!(fps, "frame rate");
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(scene) = self.scene.take() {
            drop(scene);
            tracing::debug!("scene released");
        }
    }
}

/// Opens the preview window and drives the `winit` event loop until it closes.
pub(crate) fn run(config: &RendererConfig) -> Result<()> {
    let event_loop = EventLoopBuilder::new()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(format!("{WINDOW_TITLE} - {}", config.shader_source.display()))
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, config)?;
    state.window.request_redraw();

    let mut result = Ok(());
    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::ModifiersChanged(modifiers) => {
                state.modifiers = modifiers.state();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(action) = state.keys.action_for(&event, state.modifiers) {
                    state.apply(action);
                }
            }
            WindowEvent::Resized(new_size) => state.resize(new_size),
            WindowEvent::RedrawRequested => {
                if let Err(err) = state.render_frame() {
                    tracing::error!(error = %err, "rendering stopped");
                    result = Err(err);
                    elwt.exit();
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            state.window.request_redraw();
            elwt.set_control_flow(ControlFlow::Wait);
        }
        Event::LoopExiting => state.shutdown(),
        _ => {}
    });

    if let Err(err) = run_result {
        result = Err(anyhow!("window event loop error: {err}"));
    }

    result
}
