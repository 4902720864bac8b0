// Mesh and texture source data
//
// The renderer consumes flat vertex/index arrays and raw RGBA8 pixels; where
// they come from (OBJ parser, image decoder, generator) is not its concern.
// Vertex deduplication happens here, keyed on exact attribute bit patterns,
// so identical input always produces identical buffers.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;
use std::mem::size_of;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Dedup key: the exact bit patterns of all attributes. Float equality
    /// would collapse -0.0/0.0 and choke on NaN; bits are unambiguous.
    fn key(&self) -> [u32; 8] {
        [
            self.pos[0].to_bits(),
            self.pos[1].to_bits(),
            self.pos[2].to_bits(),
            self.color[0].to_bits(),
            self.color[1].to_bits(),
            self.color[2].to_bits(),
            self.tex_coord[0].to_bits(),
            self.tex_coord[1].to_bits(),
        ]
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(0)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(12)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(2)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(24)
                .build(),
        ]
    }
}

/// Deduplicated mesh ready for upload
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Build a mesh from a raw triangle-list vertex stream, merging vertices
    /// whose attributes match exactly. Unique vertices keep the order of
    /// their first occurrence.
    pub fn from_raw(raw: &[Vertex]) -> Self {
        let mut unique: HashMap<[u32; 8], u32> = HashMap::with_capacity(raw.len());
        let mut vertices = Vec::new();
        let mut indices = Vec::with_capacity(raw.len());

        for vertex in raw {
            let index = *unique.entry(vertex.key()).or_insert_with(|| {
                vertices.push(*vertex);
                (vertices.len() - 1) as u32
            });
            indices.push(index);
        }

        log::debug!(
            "Mesh: {} unique vertices from {} input vertices",
            vertices.len(),
            raw.len()
        );

        MeshData { vertices, indices }
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Raw decoded RGBA8 pixels
pub struct TexturePixels {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Two stacked textured quads, indexed. The classic starter scene.
pub fn builtin_quads() -> MeshData {
    const CORNERS: [([f32; 2], [f32; 3], [f32; 2]); 4] = [
        ([-0.5, -0.5], [1.0, 0.0, 0.0], [0.0, 0.0]),
        ([0.5, -0.5], [0.0, 1.0, 0.0], [1.0, 0.0]),
        ([0.5, 0.5], [0.0, 0.0, 1.0], [1.0, 1.0]),
        ([-0.5, 0.5], [1.0, 1.0, 1.0], [0.0, 1.0]),
    ];
    const QUAD_ORDER: [usize; 6] = [0, 1, 2, 2, 3, 0];

    let mut raw = Vec::with_capacity(12);
    for &z in &[0.0f32, -0.5] {
        for &corner in &QUAD_ORDER {
            let (xy, color, uv) = CORNERS[corner];
            raw.push(Vertex {
                pos: [xy[0], xy[1], z],
                color,
                tex_coord: uv,
            });
        }
    }

    MeshData::from_raw(&raw)
}

/// Procedural checkerboard so the renderer has something to sample without
/// touching the filesystem.
pub fn builtin_texture() -> TexturePixels {
    const SIZE: u32 = 256;
    const CELL: u32 = 32;

    let mut pixels = Vec::with_capacity((SIZE * SIZE * 4) as usize);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let light = ((x / CELL) + (y / CELL)) % 2 == 0;
            let value = if light { 0xE8 } else { 0x30 };
            pixels.extend_from_slice(&[value, value, value, 0xFF]);
        }
    }

    TexturePixels {
        pixels,
        width: SIZE,
        height: SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32, y: f32) -> Vertex {
        Vertex {
            pos: [x, y, 0.0],
            color: [1.0, 1.0, 1.0],
            tex_coord: [0.0, 0.0],
        }
    }

    #[test]
    fn dedup_merges_identical_vertices() {
        let raw = [v(0.0, 0.0), v(1.0, 0.0), v(0.0, 0.0)];
        let mesh = MeshData::from_raw(&raw);
        assert_eq!(mesh.vertices.len(), 2);
        assert_eq!(mesh.indices, vec![0, 1, 0]);
    }

    #[test]
    fn dedup_is_order_stable_by_first_occurrence() {
        let raw = [v(2.0, 0.0), v(1.0, 0.0), v(2.0, 0.0), v(0.0, 0.0)];
        let mesh = MeshData::from_raw(&raw);
        assert_eq!(mesh.vertices[0], v(2.0, 0.0));
        assert_eq!(mesh.vertices[1], v(1.0, 0.0));
        assert_eq!(mesh.vertices[2], v(0.0, 0.0));
        assert_eq!(mesh.indices, vec![0, 1, 0, 2]);
    }

    #[test]
    fn dedup_is_idempotent() {
        let first = builtin_quads();
        let second = builtin_quads();
        assert_eq!(first.vertices, second.vertices);
        assert_eq!(first.indices, second.indices);
    }

    #[test]
    fn builtin_quads_dedup_to_eight_vertices() {
        let mesh = builtin_quads();
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.indices.len(), 12);
    }

    #[test]
    fn vertex_layout_matches_attribute_offsets() {
        assert_eq!(size_of::<Vertex>(), 32);
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[2].offset, 24);
    }
}
