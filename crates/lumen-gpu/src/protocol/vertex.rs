//! Vertex and index buffer formats.
//!
//! Buffers travel as raw byte spans and are uploaded directly as vertex attribute
//! streams, so both vertex structs are tightly packed with no padding.

use bytemuck::{Pod, Zeroable};

use super::ProtocolError;

// ── vertex layouts ────────────────────────────────────────────────────────

/// Path vertex (`2f_4ub_2f`): tessellated path geometry.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct PathVertex {
    pub pos: [f32; 2],
    /// RGBA, premultiplied, unorm.
    pub color: [u8; 4],
    pub obj: [f32; 2],
}

/// Quad vertex (`2f_4ub_2f_2f_28f`): quads with per-vertex shader data
/// (gradients, shadows, rounded-rect clipping).
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub pos: [f32; 2],
    /// RGBA, premultiplied, unorm.
    pub color: [u8; 4],
    pub tex: [f32; 2],
    pub obj: [f32; 2],
    pub data: [[f32; 4]; 7],
}

const _: () = assert!(std::mem::size_of::<PathVertex>() == 20);
const _: () = assert!(std::mem::size_of::<QuadVertex>() == 140);

impl PathVertex {
    #[inline]
    pub const fn new(pos: [f32; 2], color: [u8; 4]) -> Self {
        Self { pos, color, obj: [0.0; 2] }
    }
}

impl QuadVertex {
    #[inline]
    pub const fn new(pos: [f32; 2], color: [u8; 4], tex: [f32; 2]) -> Self {
        Self { pos, color, tex, obj: [0.0; 2], data: [[0.0; 4]; 7] }
    }
}

/// Vertex buffer layout tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VertexBufferFormat {
    /// [`PathVertex`], used with `ShaderType::FillPath`.
    Path = 0,
    /// [`QuadVertex`], used with `ShaderType::Fill`.
    Quad = 1,
}

impl VertexBufferFormat {
    /// Bytes per vertex.
    #[inline]
    pub const fn stride(self) -> usize {
        match self {
            VertexBufferFormat::Path => std::mem::size_of::<PathVertex>(),
            VertexBufferFormat::Quad => std::mem::size_of::<QuadVertex>(),
        }
    }

    pub const fn from_raw(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(VertexBufferFormat::Path),
            1 => Some(VertexBufferFormat::Quad),
            _ => None,
        }
    }
}

// ── indices ───────────────────────────────────────────────────────────────

/// Index element type. Fixed for the whole protocol.
pub type IndexType = u32;

/// Bytes per index.
pub const INDEX_STRIDE: usize = std::mem::size_of::<IndexType>();

// ── borrowed buffers ──────────────────────────────────────────────────────

/// Vertex bytes passed to `create_geometry` / `update_geometry`.
///
/// Only valid for the duration of the call; backends copy what they retain.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VertexBuffer<'a> {
    pub format: VertexBufferFormat,
    pub data: &'a [u8],
}

impl<'a> VertexBuffer<'a> {
    #[inline]
    pub const fn new(format: VertexBufferFormat, data: &'a [u8]) -> Self {
        Self { format, data }
    }

    pub fn from_path_vertices(vertices: &'a [PathVertex]) -> Self {
        Self::new(VertexBufferFormat::Path, bytemuck::cast_slice(vertices))
    }

    pub fn from_quad_vertices(vertices: &'a [QuadVertex]) -> Self {
        Self::new(VertexBufferFormat::Quad, bytemuck::cast_slice(vertices))
    }

    /// Size must be an exact multiple of the format stride.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let stride = self.format.stride();
        if self.data.len() % stride != 0 {
            return Err(ProtocolError::VertexStride {
                format: self.format,
                len: self.data.len(),
                stride,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.format.stride()
    }
}

/// Index bytes passed to `create_geometry` / `update_geometry`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct IndexBuffer<'a> {
    pub data: &'a [u8],
}

impl<'a> IndexBuffer<'a> {
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn from_indices(indices: &'a [IndexType]) -> Self {
        Self::new(bytemuck::cast_slice(indices))
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.data.len() % INDEX_STRIDE != 0 {
            return Err(ProtocolError::IndexStride { len: self.data.len() });
        }
        Ok(())
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.data.len() / INDEX_STRIDE
    }
}

/// Validates a vertex/index pair before any state is touched.
pub fn validate_geometry(vertices: &VertexBuffer<'_>, indices: &IndexBuffer<'_>) -> Result<(), ProtocolError> {
    vertices.validate()?;
    indices.validate()
}

/// Decodes indices from a possibly unaligned byte span.
pub fn read_indices(data: &[u8]) -> Vec<IndexType> {
    data.chunks_exact(INDEX_STRIDE)
        .map(bytemuck::pod_read_unaligned::<IndexType>)
        .collect()
}

/// Decodes vertex `i` of an unaligned byte span.
pub fn read_vertex<V: Pod>(data: &[u8], i: usize) -> Option<V> {
    let stride = std::mem::size_of::<V>();
    data.get(i * stride..(i + 1) * stride).map(bytemuck::pod_read_unaligned::<V>)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn path_vertex_fields_are_packed() {
        assert_eq!(std::mem::offset_of!(PathVertex, color), 8);
        assert_eq!(std::mem::offset_of!(PathVertex, obj), 12);
        assert_eq!(VertexBufferFormat::Path.stride(), 20);
    }

    #[test]
    fn quad_vertex_fields_are_packed() {
        assert_eq!(std::mem::offset_of!(QuadVertex, tex), 12);
        assert_eq!(std::mem::offset_of!(QuadVertex, obj), 20);
        assert_eq!(std::mem::offset_of!(QuadVertex, data), 28);
        assert_eq!(VertexBufferFormat::Quad.stride(), 140);
    }

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn whole_vertices_validate() {
        let verts = [PathVertex::default(); 3];
        let vb = VertexBuffer::from_path_vertices(&verts);
        assert!(vb.validate().is_ok());
        assert_eq!(vb.vertex_count(), 3);
    }

    #[test]
    fn partial_vertex_is_rejected() {
        let bytes = [0u8; 41];
        let err = VertexBuffer::new(VertexBufferFormat::Path, &bytes).validate().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::VertexStride { format: VertexBufferFormat::Path, len: 41, stride: 20 }
        );
    }

    #[test]
    fn path_sized_buffer_is_not_a_quad_buffer() {
        let bytes = [0u8; 60];
        assert!(VertexBuffer::new(VertexBufferFormat::Path, &bytes).validate().is_ok());
        assert!(VertexBuffer::new(VertexBufferFormat::Quad, &bytes).validate().is_err());
    }

    #[test]
    fn partial_index_is_rejected() {
        assert_eq!(
            IndexBuffer::new(&[0u8; 6]).validate(),
            Err(ProtocolError::IndexStride { len: 6 })
        );
        assert!(IndexBuffer::new(&[]).validate().is_ok());
    }

    // ── decoding ──────────────────────────────────────────────────────────

    #[test]
    fn unaligned_reads_round_trip() {
        let verts = [
            PathVertex::new([1.0, 2.0], [1, 2, 3, 4]),
            PathVertex::new([5.0, 6.0], [5, 6, 7, 8]),
        ];
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(bytemuck::cast_slice(&verts));
        let v: Option<PathVertex> = read_vertex(&bytes[1..], 1);
        assert_eq!(v, Some(verts[1]));
        assert_eq!(read_vertex::<PathVertex>(&bytes[1..], 2), None);
    }

    #[test]
    fn indices_decode_in_order() {
        let idx = [0u32, 1, 2, 2, 3, 0];
        assert_eq!(read_indices(IndexBuffer::from_indices(&idx).data), idx.to_vec());
    }
}
