//! Full-screen pass geometry
//!
//! Every filter pass draws the same static quad: 4 clip-space vertices, 2
//! triangles, unit UV. Uploaded once when the pipeline is built, immutable
//! afterwards. The quad is authored directly in clip space, so no transform
//! uniform is needed.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

/// Destinations are cleared to this before every pass. Deliberately loud
/// (orange, not transparent black) so any region a pass failed to cover is
/// visible at a glance.
pub const PASS_CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 1.0,
    g: 0.75,
    b: 0.5,
    a: 0.8,
};

/// A clip-space vertex with UV coordinates
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl QuadVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x2,
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// The static full-screen quad mesh shared by every pass
pub struct FullscreenQuad {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl FullscreenQuad {
    pub fn new(device: &wgpu::Device) -> Self {
        // V runs top-down in texture space while clip-space Y runs bottom-up,
        // so the top vertices carry v = 0
        let vertices = [
            QuadVertex {
                position: [-1.0, -1.0, 0.0],
                uv: [0.0, 1.0],
            },
            QuadVertex {
                position: [-1.0, 1.0, 0.0],
                uv: [0.0, 0.0],
            },
            QuadVertex {
                position: [1.0, 1.0, 0.0],
                uv: [1.0, 0.0],
            },
            QuadVertex {
                position: [1.0, -1.0, 0.0],
                uv: [1.0, 1.0],
            },
        ];
        let indices: [u16; 6] = [0, 2, 1, 0, 3, 2];

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fullscreen Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fullscreen Quad Index Buffer"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }

    /// Draw the quad into an already-configured render pass
    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}
