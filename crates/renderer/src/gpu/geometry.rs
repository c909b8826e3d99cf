use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::projection::Viewport;

/// Two triangles sharing the 0-2 diagonal.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

/// Corners of a quad covering `rect` in pixel space, clockwise from the top-left.
///
/// Texture coordinates put v = 0 at the bottom edge to match the flipped
/// texture rows.
pub fn quad_vertices(rect: Viewport) -> [QuadVertex; 4] {
    let (x0, y0) = (rect.x, rect.y);
    let (x1, y1) = (rect.x + rect.width, rect.y + rect.height);
    [
        QuadVertex {
            position: [x0, y0],
            tex_coord: [0.0, 1.0],
        },
        QuadVertex {
            position: [x1, y0],
            tex_coord: [1.0, 1.0],
        },
        QuadVertex {
            position: [x1, y1],
            tex_coord: [1.0, 0.0],
        },
        QuadVertex {
            position: [x0, y1],
            tex_coord: [0.0, 0.0],
        },
    ]
}

/// Vertex and index buffers for the single screen quad.
///
/// The vertex buffer is rewritten only when the covered rectangle changes.
pub(crate) struct Quad {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    rect: Option<Viewport>,
}

impl Quad {
    pub fn new(device: &wgpu::Device) -> Self {
        let vertices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quad vertices"),
            size: std::mem::size_of::<[QuadVertex; 4]>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad indices"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertices,
            indices,
            rect: None,
        }
    }

    /// Uploads new corners if `rect` differs from the last upload.
    ///
    /// Returns whether a write happened.
    pub fn update(&mut self, queue: &wgpu::Queue, rect: Viewport) -> bool {
        if self.rect == Some(rect) {
            return false;
        }
        queue.write_buffer(&self.vertices, 0, bytemuck::cast_slice(&quad_vertices(rect)));
        self.rect = Some(rect);
        tracing::trace!(
            width = rect.width,
            height = rect.height,
            "quad vertices uploaded"
        );
        true
    }

    pub fn vertex_slice(&self) -> wgpu::BufferSlice<'_> {
        self.vertices.slice(..)
    }

    pub fn index_slice(&self) -> wgpu::BufferSlice<'_> {
        self.indices.slice(..)
    }

    pub fn index_count(&self) -> u32 {
        QUAD_INDICES.len() as u32
    }
}

/// Vertex attributes for the inputs the program declares, at its locations.
pub(crate) fn vertex_attributes(
    position: Option<u32>,
    tex_coord: Option<u32>,
) -> Vec<wgpu::VertexAttribute> {
    let mut attributes = Vec::with_capacity(2);
    if let Some(location) = position {
        attributes.push(wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: std::mem::offset_of!(QuadVertex, position) as u64,
            shader_location: location,
        });
    }
    if let Some(location) = tex_coord {
        attributes.push(wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: std::mem::offset_of!(QuadVertex, tex_coord) as u64,
            shader_location: location,
        });
    }
    attributes
}

pub(crate) const VERTEX_STRIDE: u64 = std::mem::size_of::<QuadVertex>() as u64;
