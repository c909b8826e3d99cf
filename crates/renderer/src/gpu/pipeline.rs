use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::compile::{
    compile_stage, fragment_sources, read_source, vertex_sources, CompiledStage, ShaderError,
    ShaderStage,
};

use super::channels;
use super::geometry::{vertex_attributes, VERTEX_STRIDE};
use super::locations::{AttributeSlot, LocationTable};
use super::uniforms;

static NEXT_PROGRAM_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of a linked program. Never zero; an absent program is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(NonZeroU32);

impl ProgramId {
    fn next() -> Self {
        let raw = NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU32::new(raw).unwrap_or(NonZeroU32::MIN))
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for ProgramId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bind group layouts shared by every program, created once per device.
pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub channel_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &uniforms::layout_entries(),
        });
        let channel_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("channel layout"),
            entries: &channels::layout_entries(),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shader pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &channel_layout],
            push_constant_ranges: &[],
        });

        Self {
            uniform_layout,
            channel_layout,
            pipeline_layout,
        }
    }
}

/// A linked program and the locations resolved for it.
pub(crate) struct ShaderProgram {
    pub id: ProgramId,
    pub pipeline: wgpu::RenderPipeline,
    pub locations: LocationTable,
    pub source_path: PathBuf,
}

/// Links both stages into a render pipeline.
///
/// The stage modules are consumed and released whether or not linking
/// succeeds.
pub(crate) fn link(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    target_format: wgpu::TextureFormat,
    source_path: &Path,
    vertex: CompiledStage,
    fragment: CompiledStage,
) -> Result<ShaderProgram, ShaderError> {
    let locations = LocationTable::resolve(&vertex.parsed, &fragment.parsed);
    let Some(position) = locations.attribute(AttributeSlot::Position).get() else {
        return Err(ShaderError::Link {
            diagnostic: format!(
                "vertex stage does not declare input '{}'",
                AttributeSlot::Position.name()
            ),
        });
    };

    let attributes = vertex_attributes(
        Some(position),
        locations.attribute(AttributeSlot::TexCoord).get(),
    );

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("shader pipeline"),
        layout: Some(&layouts.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex.module,
            entry_point: Some("main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: VERTEX_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &fragment.module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(ShaderError::Link {
            diagnostic: error.to_string(),
        });
    }

    Ok(ShaderProgram {
        id: ProgramId::next(),
        pipeline,
        locations,
        source_path: source_path.to_path_buf(),
    })
}

/// Reads `path`, compiles both stages and links them.
///
/// A stage that compiled is dropped as soon as a later step fails.
pub(crate) fn build_program(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    target_format: wgpu::TextureFormat,
    path: &Path,
) -> Result<ShaderProgram, ShaderError> {
    let user_source = read_source(path)?;
    let origin = path.display().to_string();
    let vertex = compile_stage(device, ShaderStage::Vertex, &vertex_sources())?;
    let fragment = compile_stage(
        device,
        ShaderStage::Fragment,
        &fragment_sources(&user_source, &origin),
    )?;
    link(device, layouts, target_format, path, vertex, fragment)
}
