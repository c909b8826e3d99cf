use bytemuck::{Pod, Zeroable};

use crate::projection::Projection;
use crate::types::CHANNEL_COUNT;

use super::locations::{LocationTable, UniformSlot};

#[repr(C, align(16))]
#[derive(Clone, Copy, Default)]
pub(crate) struct Std140Vec4 {
    value: [f32; 4],
}

unsafe impl Zeroable for Std140Vec4 {}
unsafe impl Pod for Std140Vec4 {}

#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub(crate) struct Std140Mat4 {
    columns: [f32; 16],
}

unsafe impl Zeroable for Std140Mat4 {}
unsafe impl Pod for Std140Mat4 {}

/// Values pushed to the program every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub projection: Projection,
    /// Pixel size of each channel in `xy`; zero for unset channels.
    pub texture_resolution: [[f32; 4]; CHANNEL_COUNT],
    pub resolution: [f32; 2],
    pub time: f32,
    pub scale: f32,
}

impl FrameUniforms {
    /// Block contents for `slot`, padded to the block size.
    pub(crate) fn bytes(&self, slot: UniformSlot) -> Vec<u8> {
        let bytes = match slot {
            UniformSlot::Projection => bytemuck::bytes_of(&Std140Mat4 {
                columns: self.projection.to_column_major(),
            })
            .to_vec(),
            UniformSlot::TextureResolution => {
                let rows = self
                    .texture_resolution
                    .map(|value| Std140Vec4 { value });
                bytemuck::cast_slice::<_, u8>(&rows).to_vec()
            }
            UniformSlot::Resolution => vec4_bytes([self.resolution[0], self.resolution[1], 0.0, 0.0]),
            UniformSlot::Time => vec4_bytes([self.time, 0.0, 0.0, 0.0]),
            UniformSlot::Scale => vec4_bytes([self.scale, 0.0, 0.0, 0.0]),
        };
        debug_assert_eq!(bytes.len() as u64, slot.size());
        bytes
    }

    /// Block writes for every slot the program uses; unused slots are skipped.
    pub(crate) fn writes(&self, locations: &LocationTable) -> Vec<(UniformSlot, Vec<u8>)> {
        locations
            .used_uniforms()
            .map(|slot| (slot, self.bytes(slot)))
            .collect()
    }
}

fn vec4_bytes(value: [f32; 4]) -> Vec<u8> {
    bytemuck::bytes_of(&Std140Vec4 { value }).to_vec()
}

/// One uniform buffer per block plus the bind group that exposes them.
///
/// The buffers are independent of the program, so they survive shader
/// reloads; only the location table decides which of them get written.
pub(crate) struct UniformBuffers {
    buffers: Vec<wgpu::Buffer>,
    pub bind_group: wgpu::BindGroup,
}

impl UniformBuffers {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> Self {
        let buffers: Vec<wgpu::Buffer> = UniformSlot::ALL
            .iter()
            .map(|slot| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(slot.name()),
                    size: slot.size(),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
            .collect();

        let entries: Vec<wgpu::BindGroupEntry> = UniformSlot::ALL
            .iter()
            .zip(buffers.iter())
            .map(|(slot, buffer)| wgpu::BindGroupEntry {
                binding: slot.binding(),
                resource: buffer.as_entire_binding(),
            })
            .collect();

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadeview uniforms"),
            layout,
            entries: &entries,
        });

        Self {
            buffers,
            bind_group,
        }
    }

    /// Writes every uniform the current program reads.
    pub fn push(&self, queue: &wgpu::Queue, locations: &LocationTable, values: &FrameUniforms) {
        for (slot, bytes) in values.writes(locations) {
            queue.write_buffer(&self.buffers[slot as usize], 0, &bytes);
        }
    }
}

/// Layout entries for bind group 0, one per uniform block.
pub(crate) fn layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    UniformSlot::ALL
        .iter()
        .map(|slot| wgpu::BindGroupLayoutEntry {
            binding: slot.binding(),
            visibility: slot.visibility(),
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(slot.size()),
            },
            count: None,
        })
        .collect()
}
