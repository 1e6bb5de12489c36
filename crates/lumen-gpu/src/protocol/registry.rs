use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::bitmap::Bitmap;

use super::{
    Command, GeometryId, IdAllocator, IndexBuffer, ProtocolError, RenderBufferDesc,
    RenderBufferId, ResourceKind, TextureId, VertexBuffer, VertexBufferFormat, validate_geometry,
};

/// How a texture was created.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextureKind {
    /// Created from pixel data; may be updated.
    Pixels,
    /// Created from an empty bitmap; backs render buffers and may not be updated.
    RenderTarget,
}

/// A live texture. Shared with the render buffers it backs.
#[derive(Debug)]
pub struct TextureEntry<T> {
    pub id: TextureId,
    pub kind: TextureKind,
    pub backing: T,
}

/// A live render buffer. Holds its backing texture alive.
#[derive(Debug)]
pub struct RenderBufferEntry<T> {
    pub id: RenderBufferId,
    pub desc: RenderBufferDesc,
    pub texture: Arc<TextureEntry<T>>,
}

/// Live geometry.
#[derive(Debug)]
pub struct GeometryEntry<G> {
    pub id: GeometryId,
    pub format: VertexBufferFormat,
    pub vertex_count: u32,
    pub index_count: u32,
    pub backing: G,
}

/// Live resource counts.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LiveCounts {
    pub textures: usize,
    pub render_buffers: usize,
    pub geometry: usize,
}

/// Id allocation plus the three resource tables of one backend.
///
/// `T` and `G` are the backend's texture and geometry payloads. Every mutation
/// validates first and only then builds the payload, so a rejected call leaves the
/// tables untouched.
#[derive(Debug)]
pub struct ResourceRegistry<T, G> {
    ids: IdAllocator,
    textures: HashMap<TextureId, Arc<TextureEntry<T>>>,
    render_buffers: HashMap<RenderBufferId, RenderBufferEntry<T>>,
    geometry: HashMap<GeometryId, GeometryEntry<G>>,
}

impl<T, G> Default for ResourceRegistry<T, G> {
    fn default() -> Self {
        Self {
            ids: IdAllocator::new(),
            textures: HashMap::new(),
            render_buffers: HashMap::new(),
            geometry: HashMap::new(),
        }
    }
}

impl<T, G> ResourceRegistry<T, G> {
    pub fn new() -> Self {
        Self::default()
    }

    // ── ids ───────────────────────────────────────────────────────────────

    pub fn next_texture_id(&mut self) -> TextureId {
        self.ids.next_texture_id()
    }

    pub fn next_render_buffer_id(&mut self) -> RenderBufferId {
        self.ids.next_render_buffer_id()
    }

    pub fn next_geometry_id(&mut self) -> GeometryId {
        self.ids.next_geometry_id()
    }

    #[inline]
    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    #[inline]
    pub fn ids_mut(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    fn require_issued(&self, kind: ResourceKind, id: u32) -> Result<(), ProtocolError> {
        if self.ids.was_issued(kind, id) {
            Ok(())
        } else {
            Err(ProtocolError::UnallocatedId { kind, id })
        }
    }

    // ── textures ──────────────────────────────────────────────────────────

    /// Registers a texture; `make` builds the payload once the call is known valid.
    pub fn create_texture(
        &mut self,
        id: TextureId,
        bitmap: &Bitmap,
        make: impl FnOnce(&Bitmap) -> T,
    ) -> Result<&Arc<TextureEntry<T>>, ProtocolError> {
        self.require_issued(ResourceKind::Texture, id.get())?;
        match self.textures.entry(id) {
            Entry::Occupied(_) => Err(ProtocolError::DuplicateId { kind: ResourceKind::Texture, id: id.get() }),
            Entry::Vacant(slot) => {
                let kind = if bitmap.is_empty() { TextureKind::RenderTarget } else { TextureKind::Pixels };
                Ok(slot.insert(Arc::new(TextureEntry { id, kind, backing: make(bitmap) })))
            }
        }
    }

    /// Checks that `id` may receive `bitmap` and returns the entry to write into.
    pub fn update_texture(
        &self,
        id: TextureId,
        bitmap: &Bitmap,
    ) -> Result<&Arc<TextureEntry<T>>, ProtocolError> {
        let entry = self
            .textures
            .get(&id)
            .ok_or_else(|| ProtocolError::unknown(ResourceKind::Texture, id.get()))?;
        if entry.kind == TextureKind::RenderTarget {
            return Err(ProtocolError::RenderTargetUpdate { id: id.get() });
        }
        if bitmap.is_empty() {
            return Err(ProtocolError::EmptyUpdate { id: id.get() });
        }
        Ok(entry)
    }

    /// Removes a texture. Render buffers it backs keep the storage alive.
    pub fn destroy_texture(&mut self, id: TextureId) -> Result<Arc<TextureEntry<T>>, ProtocolError> {
        let entry = self
            .textures
            .remove(&id)
            .ok_or_else(|| ProtocolError::unknown(ResourceKind::Texture, id.get()))?;
        let users = Arc::strong_count(&entry) - 1;
        if users > 0 {
            log::warn!("{id} destroyed while backing {users} render buffer(s); storage kept until they are destroyed");
        }
        Ok(entry)
    }

    #[inline]
    pub fn texture(&self, id: TextureId) -> Option<&Arc<TextureEntry<T>>> {
        self.textures.get(&id)
    }

    // ── render buffers ────────────────────────────────────────────────────

    pub fn create_render_buffer(
        &mut self,
        id: RenderBufferId,
        desc: &RenderBufferDesc,
    ) -> Result<&RenderBufferEntry<T>, ProtocolError> {
        self.require_issued(ResourceKind::RenderBuffer, id.get())?;
        if desc.width == 0 || desc.height == 0 {
            return Err(ProtocolError::EmptyRenderBuffer {
                id: id.get(),
                width: desc.width,
                height: desc.height,
            });
        }
        let texture = self
            .textures
            .get(&desc.texture_id)
            .cloned()
            .ok_or_else(|| ProtocolError::unknown(ResourceKind::Texture, desc.texture_id.get()))?;
        match self.render_buffers.entry(id) {
            Entry::Occupied(_) => Err(ProtocolError::DuplicateId {
                kind: ResourceKind::RenderBuffer,
                id: id.get(),
            }),
            Entry::Vacant(slot) => Ok(slot.insert(RenderBufferEntry { id, desc: *desc, texture })),
        }
    }

    pub fn destroy_render_buffer(&mut self, id: RenderBufferId) -> Result<RenderBufferEntry<T>, ProtocolError> {
        self.render_buffers
            .remove(&id)
            .ok_or_else(|| ProtocolError::unknown(ResourceKind::RenderBuffer, id.get()))
    }

    #[inline]
    pub fn render_buffer(&self, id: RenderBufferId) -> Option<&RenderBufferEntry<T>> {
        self.render_buffers.get(&id)
    }

    // ── geometry ──────────────────────────────────────────────────────────

    pub fn create_geometry(
        &mut self,
        id: GeometryId,
        vertices: VertexBuffer<'_>,
        indices: IndexBuffer<'_>,
        make: impl FnOnce(VertexBuffer<'_>, IndexBuffer<'_>) -> G,
    ) -> Result<&GeometryEntry<G>, ProtocolError> {
        validate_geometry(&vertices, &indices)?;
        self.require_issued(ResourceKind::Geometry, id.get())?;
        match self.geometry.entry(id) {
            Entry::Occupied(_) => Err(ProtocolError::DuplicateId { kind: ResourceKind::Geometry, id: id.get() }),
            Entry::Vacant(slot) => Ok(slot.insert(GeometryEntry {
                id,
                format: vertices.format,
                vertex_count: vertices.vertex_count() as u32,
                index_count: indices.index_count() as u32,
                backing: make(vertices, indices),
            })),
        }
    }

    /// Replaces both buffers wholesale. `make` receives the previous payload.
    pub fn update_geometry(
        &mut self,
        id: GeometryId,
        vertices: VertexBuffer<'_>,
        indices: IndexBuffer<'_>,
        make: impl FnOnce(&mut G, VertexBuffer<'_>, IndexBuffer<'_>),
    ) -> Result<&GeometryEntry<G>, ProtocolError> {
        validate_geometry(&vertices, &indices)?;
        let entry = self
            .geometry
            .get_mut(&id)
            .ok_or_else(|| ProtocolError::unknown(ResourceKind::Geometry, id.get()))?;
        entry.format = vertices.format;
        entry.vertex_count = vertices.vertex_count() as u32;
        entry.index_count = indices.index_count() as u32;
        make(&mut entry.backing, vertices, indices);
        Ok(entry)
    }

    pub fn destroy_geometry(&mut self, id: GeometryId) -> Result<GeometryEntry<G>, ProtocolError> {
        self.geometry
            .remove(&id)
            .ok_or_else(|| ProtocolError::unknown(ResourceKind::Geometry, id.get()))
    }

    #[inline]
    pub fn geometry(&self, id: GeometryId) -> Option<&GeometryEntry<G>> {
        self.geometry.get(&id)
    }

    // ── commands ──────────────────────────────────────────────────────────

    /// Checks that everything `command` references is live and in range.
    pub fn validate_command(&self, command: &Command) -> Result<(), ProtocolError> {
        let state = command.state();
        state.validate_limits()?;

        let rb_id = state.render_buffer_id;
        let target = self
            .render_buffers
            .get(&rb_id)
            .ok_or_else(|| ProtocolError::unknown(ResourceKind::RenderBuffer, rb_id.get()))?;

        for tex_id in command.sampled_textures() {
            let tex = self
                .textures
                .get(&tex_id)
                .ok_or_else(|| ProtocolError::unknown(ResourceKind::Texture, tex_id.get()))?;
            if Arc::ptr_eq(tex, &target.texture) {
                return Err(ProtocolError::FeedbackLoop {
                    texture: tex_id.get(),
                    render_buffer: rb_id.get(),
                });
            }
        }

        if let Command::DrawGeometry { geometry_id, indices_count, indices_offset, .. } = command {
            let geometry = self
                .geometry
                .get(geometry_id)
                .ok_or_else(|| ProtocolError::unknown(ResourceKind::Geometry, geometry_id.get()))?;
            let end = *indices_offset as u64 + *indices_count as u64;
            if end > geometry.index_count as u64 {
                return Err(ProtocolError::IndexRange {
                    geometry: geometry_id.get(),
                    offset: *indices_offset,
                    count: *indices_count,
                    available: geometry.index_count,
                });
            }
        }

        Ok(())
    }

    pub fn live_counts(&self) -> LiveCounts {
        LiveCounts {
            textures: self.textures.len(),
            render_buffers: self.render_buffers.len(),
            geometry: self.geometry.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{GpuState, PathVertex};

    type Registry = ResourceRegistry<(), ()>;

    fn red() -> Bitmap {
        Bitmap::solid_bgra(4, 4, [0, 0, 255, 255])
    }

    fn registry_with_target() -> (Registry, TextureId, RenderBufferId) {
        let mut reg = Registry::new();
        let tex = reg.next_texture_id();
        reg.create_texture(tex, &Bitmap::empty(), |_| ()).unwrap();
        let rb = reg.next_render_buffer_id();
        reg.create_render_buffer(rb, &RenderBufferDesc::new(tex, 8, 8)).unwrap();
        (reg, tex, rb)
    }

    fn triangle(reg: &mut Registry) -> GeometryId {
        let verts = [PathVertex::default(); 3];
        let id = reg.next_geometry_id();
        reg.create_geometry(
            id,
            VertexBuffer::from_path_vertices(&verts),
            IndexBuffer::from_indices(&[0, 1, 2]),
            |_, _| (),
        )
        .unwrap();
        id
    }

    // ── textures ──────────────────────────────────────────────────────────

    #[test]
    fn empty_bitmap_creates_render_target() {
        let mut reg = Registry::new();
        let a = reg.next_texture_id();
        let b = reg.next_texture_id();
        assert_eq!(reg.create_texture(a, &Bitmap::empty(), |_| ()).unwrap().kind, TextureKind::RenderTarget);
        assert_eq!(reg.create_texture(b, &red(), |_| ()).unwrap().kind, TextureKind::Pixels);
    }

    #[test]
    fn duplicate_create_fails() {
        let mut reg = Registry::new();
        let id = reg.next_texture_id();
        reg.create_texture(id, &red(), |_| ()).unwrap();
        assert_eq!(
            reg.create_texture(id, &red(), |_| ()).unwrap_err(),
            ProtocolError::DuplicateId { kind: ResourceKind::Texture, id: 1 }
        );
    }

    #[test]
    fn unissued_id_is_rejected() {
        let mut reg = Registry::new();
        let err = reg.create_texture(TextureId::new(3).unwrap(), &red(), |_| ()).unwrap_err();
        assert_eq!(err, ProtocolError::UnallocatedId { kind: ResourceKind::Texture, id: 3 });
        assert_eq!(reg.live_counts(), LiveCounts::default());
    }

    #[test]
    fn render_target_cannot_be_updated() {
        let (reg, tex, _) = registry_with_target();
        assert_eq!(
            reg.update_texture(tex, &red()).unwrap_err(),
            ProtocolError::RenderTargetUpdate { id: tex.get() }
        );
    }

    #[test]
    fn update_requires_existing_texture() {
        let reg = Registry::new();
        let err = reg.update_texture(TextureId::new(1).unwrap(), &red()).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownId { kind: ResourceKind::Texture, id: 1 }));
    }

    #[test]
    fn destroy_twice_fails() {
        let mut reg = Registry::new();
        let id = reg.next_texture_id();
        reg.create_texture(id, &red(), |_| ()).unwrap();
        assert!(reg.destroy_texture(id).is_ok());
        assert!(matches!(reg.destroy_texture(id), Err(ProtocolError::UnknownId { .. })));
    }

    #[test]
    fn destroyed_id_is_not_recreated() {
        let mut reg = Registry::new();
        let first = reg.next_texture_id();
        reg.create_texture(first, &red(), |_| ()).unwrap();
        reg.destroy_texture(first).unwrap();
        assert_ne!(reg.next_texture_id(), first);
    }

    // ── render buffers ────────────────────────────────────────────────────

    #[test]
    fn render_buffer_requires_backing_texture() {
        let mut reg = Registry::new();
        let rb = reg.next_render_buffer_id();
        let missing = TextureId::new(1).unwrap();
        let err = reg.create_render_buffer(rb, &RenderBufferDesc::new(missing, 4, 4)).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownId { kind: ResourceKind::Texture, id: 1 });
    }

    #[test]
    fn render_buffer_keeps_texture_alive_after_destroy() {
        let (mut reg, tex, rb) = registry_with_target();
        let removed = reg.destroy_texture(tex).unwrap();
        assert!(reg.texture(tex).is_none());
        let entry = reg.render_buffer(rb).unwrap();
        assert!(Arc::ptr_eq(&removed, &entry.texture));
    }

    #[test]
    fn zero_sized_render_buffer_is_rejected() {
        let mut reg = Registry::new();
        let tex = reg.next_texture_id();
        reg.create_texture(tex, &Bitmap::empty(), |_| ()).unwrap();
        let rb = reg.next_render_buffer_id();
        assert!(matches!(
            reg.create_render_buffer(rb, &RenderBufferDesc::new(tex, 0, 4)),
            Err(ProtocolError::EmptyRenderBuffer { .. })
        ));
    }

    // ── geometry ──────────────────────────────────────────────────────────

    #[test]
    fn geometry_stride_is_checked_before_ids() {
        let mut reg = Registry::new();
        let id = reg.next_geometry_id();
        let err = reg
            .create_geometry(
                id,
                VertexBuffer::new(VertexBufferFormat::Quad, &[0u8; 100]),
                IndexBuffer::new(&[]),
                |_, _| (),
            )
            .unwrap_err();
        assert!(matches!(err, ProtocolError::VertexStride { len: 100, stride: 140, .. }));
        assert!(reg.geometry(id).is_none());
    }

    #[test]
    fn update_geometry_replaces_counts() {
        let mut reg = Registry::new();
        let id = triangle(&mut reg);
        let verts = [PathVertex::default(); 4];
        let entry = reg
            .update_geometry(
                id,
                VertexBuffer::from_path_vertices(&verts),
                IndexBuffer::from_indices(&[0, 1, 2, 2, 3, 0]),
                |_, _, _| (),
            )
            .unwrap();
        assert_eq!((entry.vertex_count, entry.index_count), (4, 6));
    }

    // ── command validation ────────────────────────────────────────────────

    #[test]
    fn valid_draw_passes() {
        let (mut reg, _, rb) = registry_with_target();
        let geo = triangle(&mut reg);
        let cmd = Command::DrawGeometry {
            state: GpuState::new(rb, 8, 8),
            geometry_id: geo,
            indices_count: 3,
            indices_offset: 0,
        };
        assert!(reg.validate_command(&cmd).is_ok());
    }

    #[test]
    fn draw_past_index_buffer_fails() {
        let (mut reg, _, rb) = registry_with_target();
        let geo = triangle(&mut reg);
        let cmd = Command::DrawGeometry {
            state: GpuState::new(rb, 8, 8),
            geometry_id: geo,
            indices_count: 3,
            indices_offset: 1,
        };
        assert_eq!(
            reg.validate_command(&cmd),
            Err(ProtocolError::IndexRange { geometry: geo.get(), offset: 1, count: 3, available: 3 })
        );
    }

    #[test]
    fn destroyed_geometry_cannot_be_drawn() {
        let (mut reg, _, rb) = registry_with_target();
        let geo = triangle(&mut reg);
        reg.destroy_geometry(geo).unwrap();
        let cmd = Command::DrawGeometry {
            state: GpuState::new(rb, 8, 8),
            geometry_id: geo,
            indices_count: 3,
            indices_offset: 0,
        };
        assert!(matches!(
            reg.validate_command(&cmd),
            Err(ProtocolError::UnknownId { kind: ResourceKind::Geometry, .. })
        ));
    }

    #[test]
    fn sampling_the_target_is_a_feedback_loop() {
        let (mut reg, tex, rb) = registry_with_target();
        let geo = triangle(&mut reg);
        let cmd = Command::DrawGeometry {
            state: GpuState::new(rb, 8, 8).with_texture(tex),
            geometry_id: geo,
            indices_count: 3,
            indices_offset: 0,
        };
        assert_eq!(
            reg.validate_command(&cmd),
            Err(ProtocolError::FeedbackLoop { texture: tex.get(), render_buffer: rb.get() })
        );
    }

    #[test]
    fn clear_of_destroyed_render_buffer_fails() {
        let (mut reg, _, rb) = registry_with_target();
        reg.destroy_render_buffer(rb).unwrap();
        let cmd = Command::ClearRenderBuffer { state: GpuState::new(rb, 8, 8) };
        assert!(matches!(
            reg.validate_command(&cmd),
            Err(ProtocolError::UnknownId { kind: ResourceKind::RenderBuffer, .. })
        ));
    }
}
