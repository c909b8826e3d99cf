use std::path::{Path, PathBuf};

use crate::types::{ChannelPaths, ReloadPolicy, CHANNEL_COUNT};

use super::channels::{self, ChannelSet, ChannelTexture};
use super::geometry::Quad;
use super::locations::LocationTable;
use super::pipeline::{build_program, PipelineLayouts, ProgramId, ShaderProgram};
use super::uniforms::UniformBuffers;

/// What a reload changed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReloadReport {
    /// Program active after the reload, if any.
    pub program: Option<ProgramId>,
    /// Whether the shader rebuilt successfully.
    pub shader_ok: bool,
    /// Channels whose image failed to load.
    pub failed_channels: Vec<usize>,
}

/// Every GPU object the preview draws with.
///
/// Created once per device and dropped before the device goes away. Load
/// failures never escape: they are logged and the affected slot follows the
/// reload policy.
pub struct Scene {
    pub(crate) layouts: PipelineLayouts,
    target_format: wgpu::TextureFormat,
    pub(crate) program: Option<ShaderProgram>,
    shader_path: PathBuf,
    channel_paths: ChannelPaths,
    pub(crate) channels: ChannelSet,
    pub(crate) uniforms: UniformBuffers,
    pub(crate) quad: Quad,
    policy: ReloadPolicy,
}

impl Scene {
    /// Builds the static resources, then the initial program and textures.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target_format: wgpu::TextureFormat,
        shader_path: &Path,
        channel_paths: ChannelPaths,
        policy: ReloadPolicy,
    ) -> Self {
        let layouts = PipelineLayouts::new(device);
        let channels = ChannelSet::new(device, queue, &layouts.channel_layout);
        let uniforms = UniformBuffers::new(device, &layouts.uniform_layout);
        let quad = Quad::new(device);

        let mut scene = Self {
            layouts,
            target_format,
            program: None,
            shader_path: shader_path.to_path_buf(),
            channel_paths,
            channels,
            uniforms,
            quad,
            policy,
        };
        scene.reload(device, queue);
        scene
    }

    pub fn program_id(&self) -> Option<ProgramId> {
        self.program.as_ref().map(|program| program.id)
    }

    /// Locations resolved for the active program.
    pub fn locations(&self) -> Option<&LocationTable> {
        self.program.as_ref().map(|program| &program.locations)
    }

    /// Pixel size of the texture bound to `channel`.
    pub fn texture_size(&self, channel: usize) -> Option<(u32, u32)> {
        self.channels
            .get(channel)
            .map(|texture| (texture.width, texture.height))
    }

    pub fn shader_path(&self) -> &Path {
        &self.shader_path
    }

    /// Rebuilds the program from its path, then every occupied channel.
    pub fn reload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> ReloadReport {
        let shader_ok = self.reload_shader(device);
        let failed_channels = self.reload_textures(device, queue);
        let report = ReloadReport {
            program: self.program_id(),
            shader_ok,
            failed_channels,
        };
        tracing::info!(
            program = ?report.program.map(ProgramId::get),
            shader_ok = report.shader_ok,
            textures = self.channels.occupied(),
            failed = report.failed_channels.len(),
            "scene reloaded"
        );
        report
    }

    /// Compiles and links the shader file again.
    ///
    /// The new program is built before the old one is released. On failure
    /// the policy decides whether the old program survives.
    pub fn reload_shader(&mut self, device: &wgpu::Device) -> bool {
        match build_program(device, &self.layouts, self.target_format, &self.shader_path) {
            Ok(program) => {
                tracing::info!(
                    program = %program.id,
                    path = %program.source_path.display(),
                    "shader program linked"
                );
                if let Some(previous) = self.program.replace(program) {
                    tracing::debug!(program = %previous.id, "released previous program");
                }
                true
            }
            Err(error) => {
                tracing::error!(path = %self.shader_path.display(), "{error}");
                match self.policy {
                    ReloadPolicy::Discard => {
                        if let Some(previous) = self.program.take() {
                            tracing::warn!(
                                program = %previous.id,
                                "previous program released; drawing nothing until the shader builds"
                            );
                        }
                    }
                    ReloadPolicy::KeepLastGood => {
                        if let Some(current) = &self.program {
                            tracing::warn!(program = %current.id, "keeping last good program");
                        }
                    }
                }
                false
            }
        }
    }

    /// Reloads every channel that has a path; returns the channels that failed.
    ///
    /// Failures are independent: one bad image does not stop the others.
    pub fn reload_textures(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> Vec<usize> {
        let mut failed = Vec::new();
        let mut released: Vec<ChannelTexture> = Vec::new();

        for channel in 0..CHANNEL_COUNT {
            let Some(path) = self.channel_paths.get(channel) else {
                continue;
            };
            match channels::load_texture(device, queue, channel, path) {
                Ok(texture) => {
                    tracing::info!(
                        channel,
                        path = %path.display(),
                        width = texture.width,
                        height = texture.height,
                        "texture loaded"
                    );
                    released.extend(self.channels.replace(channel, Some(texture)));
                }
                Err(error) => {
                    tracing::warn!(channel, error = %error, "texture channel failed to load");
                    failed.push(channel);
                    if self.policy == ReloadPolicy::Discard {
                        released.extend(self.channels.replace(channel, None));
                    }
                }
            }
        }

        self.channels.rebind(device, &self.layouts.channel_layout);
        drop(released);
        failed
    }
}
