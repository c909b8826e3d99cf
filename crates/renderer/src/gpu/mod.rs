//! GPU resources for the preview.
//!
//! - `context` owns the wgpu instance, surface and device.
//! - `locations` resolves the attribute and uniform slots a program reads.
//! - `pipeline` links compiled stages into a render pipeline.
//! - `channels` decodes images and keeps the four texture channels bound.
//! - `uniforms` writes per-frame values into the blocks the program uses.
//! - `geometry` owns the screen quad.
//! - `scene` aggregates all of the above and handles reloads.
//! - `render` records one frame.

mod channels;
mod context;
mod geometry;
mod locations;
mod pipeline;
mod render;
mod scene;
mod uniforms;

pub(crate) use context::GpuContext;

pub use channels::{decode_texture, DecodedTexture, TextureError};
pub use geometry::{quad_vertices, QuadVertex, QUAD_INDICES};
pub use locations::{AttributeSlot, Location, LocationTable, UniformSlot};
pub use pipeline::ProgramId;
pub use render::draw_frame;
pub use scene::{ReloadReport, Scene};
pub use uniforms::FrameUniforms;

/// Runs `work` inside a validation error scope in debug builds and logs
/// anything it raised, tagged with `site`.
///
/// Release builds rely on the device's uncaptured-error handler instead.
pub fn check_gpu<T>(device: &wgpu::Device, site: &str, work: impl FnOnce() -> T) -> T {
    if !cfg!(debug_assertions) {
        return work();
    }
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let output = work();
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        tracing::error!(site, %error, "GPU validation error");
    }
    output
}
