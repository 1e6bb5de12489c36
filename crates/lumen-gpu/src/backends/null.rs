use crate::bitmap::Bitmap;
use crate::protocol::{
    CommandList, GeometryId, GpuDriver, IdAllocator, IndexBuffer, RenderBufferDesc,
    RenderBufferId, TextureId, VertexBuffer,
};

/// Per-call tallies kept by [`NullDriver`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CallCounts {
    pub passes: u64,
    pub texture_calls: u64,
    pub render_buffer_calls: u64,
    pub geometry_calls: u64,
    pub command_lists: u64,
    pub commands: u64,
}

/// Backend that does no GPU work.
///
/// Issues ids and counts calls. Useful as the inner driver of a validating or
/// recording wrapper, and for headless runs of a renderer core.
#[derive(Debug, Default)]
pub struct NullDriver {
    ids: IdAllocator,
    counts: CallCounts,
}

impl NullDriver {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn counts(&self) -> CallCounts {
        self.counts
    }
}

impl GpuDriver for NullDriver {
    fn begin_synchronize(&mut self) {}

    fn end_synchronize(&mut self) {
        self.counts.passes += 1;
    }

    fn next_texture_id(&mut self) -> TextureId {
        self.ids.next_texture_id()
    }

    fn create_texture(&mut self, _texture_id: TextureId, _bitmap: &Bitmap) {
        self.counts.texture_calls += 1;
    }

    fn update_texture(&mut self, _texture_id: TextureId, _bitmap: &Bitmap) {
        self.counts.texture_calls += 1;
    }

    fn destroy_texture(&mut self, _texture_id: TextureId) {
        self.counts.texture_calls += 1;
    }

    fn next_render_buffer_id(&mut self) -> RenderBufferId {
        self.ids.next_render_buffer_id()
    }

    fn create_render_buffer(&mut self, _id: RenderBufferId, _desc: &RenderBufferDesc) {
        self.counts.render_buffer_calls += 1;
    }

    fn destroy_render_buffer(&mut self, _id: RenderBufferId) {
        self.counts.render_buffer_calls += 1;
    }

    fn next_geometry_id(&mut self) -> GeometryId {
        self.ids.next_geometry_id()
    }

    fn create_geometry(&mut self, _id: GeometryId, _v: VertexBuffer<'_>, _i: IndexBuffer<'_>) {
        self.counts.geometry_calls += 1;
    }

    fn update_geometry(&mut self, _id: GeometryId, _v: VertexBuffer<'_>, _i: IndexBuffer<'_>) {
        self.counts.geometry_calls += 1;
    }

    fn destroy_geometry(&mut self, _id: GeometryId) {
        self.counts.geometry_calls += 1;
    }

    fn update_command_list(&mut self, list: &CommandList) {
        self.counts.command_lists += 1;
        self.counts.commands += list.len() as u64;
    }
}
