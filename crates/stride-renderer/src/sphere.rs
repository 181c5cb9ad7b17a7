use bytemuck::{Pod, Zeroable};
use std::f32::consts::{PI, TAU};

/// Vertex for the projection sphere.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SphereVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl SphereVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: &[wgpu::VertexAttribute] = &wgpu::vertex_attr_array![
            0 => Float32x3,  // position
            1 => Float32x2,  // uv
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SphereVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: ATTRIBUTES,
        }
    }
}

/// UV sphere seen from its center.
///
/// Rows run from the north pole (v = 0) to the south pole (v = 1); columns
/// sweep u from 0 to 1 so that u = 0.5 lies straight ahead (-Z) and u grows
/// to the right. Triangles wind counter-clockwise as seen from the center,
/// so back-face culling keeps the inside.
pub struct SphereMesh {
    pub vertices: Vec<SphereVertex>,
    pub indices: Vec<u32>,
    pub radius: f32,
    pub stacks: u32,
    pub sectors: u32,
}

impl SphereMesh {
    pub fn generate(radius: f32, stacks: u32, sectors: u32) -> Self {
        let stacks = stacks.max(2);
        let sectors = sectors.max(3);

        let mut vertices = Vec::with_capacity(((stacks + 1) * (sectors + 1)) as usize);
        for i in 0..=stacks {
            let phi = PI / 2.0 - i as f32 * PI / stacks as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();
            for j in 0..=sectors {
                let theta = j as f32 * TAU / sectors as f32;
                let (sin_theta, cos_theta) = theta.sin_cos();
                // Negated x mirrors the sweep so the image reads correctly from inside.
                vertices.push(SphereVertex {
                    position: [
                        -radius * cos_phi * sin_theta,
                        radius * sin_phi,
                        radius * cos_phi * cos_theta,
                    ],
                    uv: [j as f32 / sectors as f32, i as f32 / stacks as f32],
                });
            }
        }

        // Pole rows collapse to a point, so they get one triangle per quad.
        let mut indices = Vec::with_capacity((6 * sectors * (stacks - 1)) as usize);
        for i in 0..stacks {
            let mut k1 = i * (sectors + 1);
            let mut k2 = k1 + sectors + 1;
            for _ in 0..sectors {
                if i != 0 {
                    indices.extend_from_slice(&[k1, k2, k1 + 1]);
                }
                if i != stacks - 1 {
                    indices.extend_from_slice(&[k1 + 1, k2, k2 + 1]);
                }
                k1 += 1;
                k2 += 1;
            }
        }

        Self {
            vertices,
            indices,
            radius,
            stacks,
            sectors,
        }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}
