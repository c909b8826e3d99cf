//! Renderer crate for shadeview, a live GLSL fragment-shader preview.
//!
//! The crate wraps a user-written `main_image` function in a fixed preamble
//! and epilogue, draws it over one screen quad with up to four image
//! channels, and rebuilds the program and textures in place when asked.
//!
//! ```text
//!   shadeview CLI
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ WindowState ──▶ winit event loop ──▶ draw_frame()
//!                          │                  │
//!                          │                  └─ Ctrl+R / Ctrl+± ─▶ Scene::reload / zoom
//!                          └─▶ Scene (program, channels, uniforms, quad)
//! ```
//!
//! `Scene` owns every GPU object and is usable without a window, which is how
//! the integration tests drive it against an offscreen texture.

pub mod compile;
pub mod controls;
pub mod gpu;
pub mod projection;
pub mod runtime;
pub mod types;
mod window;

use anyhow::Result;

pub use compile::{ShaderError, ShaderStage};
pub use controls::{Action, Binding, KeyTable};
pub use gpu::{draw_frame, LocationTable, ProgramId, ReloadReport, Scene, TextureError};
pub use projection::{Projection, Viewport};
pub use runtime::{FixedTimeSource, FrameState, SystemTimeSource, TimeSample, TimeSource};
pub use types::{ChannelPaths, ReloadPolicy, RendererConfig, CHANNEL_COUNT, MIN_SCALE};

/// Entry point used by the binary.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Opens the preview window and blocks until it is closed.
    ///
    /// Fails only when no window, surface or GPU device can be created.
    /// Shader and texture problems are logged and the preview keeps running.
    pub fn run(&self) -> Result<()> {
        tracing::info!(
            shader = %self.config.shader_source.display(),
            textures = self.config.channels.occupied(),
            width = self.config.surface_size.0,
            height = self.config.surface_size.1,
            policy = %self.config.reload_policy,
            "starting preview"
        );
        window::run(&self.config)
    }
}
