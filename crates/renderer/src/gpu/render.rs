use crate::runtime::FrameState;

use super::scene::Scene;
use super::uniforms::FrameUniforms;

/// Records and submits one frame into `target`.
///
/// Without a program the target is cleared to black and nothing is drawn.
/// The render pass, and with it every binding, ends before this returns.
pub fn draw_frame(
    scene: &mut Scene,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    target: &wgpu::TextureView,
    frame: &FrameState,
) {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("shadeview frame encoder"),
    });

    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("shadeview frame"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let Some(program) = scene.program.as_ref() {
            let viewport = frame.viewport();
            pass.set_viewport(
                viewport.x,
                viewport.y,
                viewport.width,
                viewport.height,
                0.0,
                1.0,
            );
            pass.set_pipeline(&program.pipeline);

            scene.quad.update(queue, viewport);
            pass.set_vertex_buffer(0, scene.quad.vertex_slice());
            pass.set_index_buffer(scene.quad.index_slice(), wgpu::IndexFormat::Uint32);

            let values = FrameUniforms {
                projection: *frame.projection(),
                texture_resolution: scene.channels.resolutions(),
                resolution: [viewport.width, viewport.height],
                time: frame.elapsed(),
                scale: frame.scale(),
            };
            scene.uniforms.push(queue, &program.locations, &values);
            pass.set_bind_group(0, &scene.uniforms.bind_group, &[]);
            pass.set_bind_group(1, &scene.channels.bind_group, &[]);

            pass.draw_indexed(0..scene.quad.index_count(), 0, 0..1);
        } else {
            tracing::trace!("no program bound; frame cleared");
        }
    }

    queue.submit(Some(encoder.finish()));
}
