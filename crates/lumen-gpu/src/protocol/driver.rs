use crate::bitmap::Bitmap;

use super::{CommandList, GeometryId, IndexBuffer, RenderBufferId, TextureId, VertexBuffer};

/// Render buffer description passed to `create_render_buffer`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RenderBufferDesc {
    /// Backing texture. Must exist when the render buffer is created.
    pub texture_id: TextureId,
    pub width: u32,
    pub height: u32,
    /// Currently unused, always false.
    pub has_stencil_buffer: bool,
    /// Currently unused, always false.
    pub has_depth_buffer: bool,
}

impl RenderBufferDesc {
    #[inline]
    pub const fn new(texture_id: TextureId, width: u32, height: u32) -> Self {
        Self {
            texture_id,
            width,
            height,
            has_stencil_buffer: false,
            has_depth_buffer: false,
        }
    }
}

/// GPU backend capability set.
///
/// The renderer core drives a backend through these calls only. Per render pass:
/// `begin_synchronize`, any number of create/update/destroy calls in program order,
/// at most one `update_command_list`, then `end_synchronize`.
///
/// Calls return nothing; a backend that detects a protocol violation applies its own
/// policy (assert or skip). Borrowed arguments are valid for the duration of the call
/// only.
pub trait GpuDriver {
    /// Opens a pass. All resource mutation happens before the matching `end_synchronize`.
    fn begin_synchronize(&mut self);

    /// Closes the pass; every resource mutation for it has been issued.
    fn end_synchronize(&mut self);

    /// Fresh texture id. Starts at 1, never reused.
    fn next_texture_id(&mut self) -> TextureId;

    /// Creates a texture. An empty `bitmap` requests a render target whose storage is
    /// allocated when a render buffer is created over it.
    fn create_texture(&mut self, texture_id: TextureId, bitmap: &Bitmap);

    /// Replaces the pixels of a non-render-target texture.
    fn update_texture(&mut self, texture_id: TextureId, bitmap: &Bitmap);

    fn destroy_texture(&mut self, texture_id: TextureId);

    /// Fresh render buffer id. Starts at 1, never reused.
    fn next_render_buffer_id(&mut self) -> RenderBufferId;

    fn create_render_buffer(&mut self, render_buffer_id: RenderBufferId, desc: &RenderBufferDesc);

    fn destroy_render_buffer(&mut self, render_buffer_id: RenderBufferId);

    /// Fresh geometry id. Starts at 1, never reused.
    fn next_geometry_id(&mut self) -> GeometryId;

    fn create_geometry(
        &mut self,
        geometry_id: GeometryId,
        vertices: VertexBuffer<'_>,
        indices: IndexBuffer<'_>,
    );

    /// Replaces both buffers of existing geometry. There is no partial update.
    fn update_geometry(
        &mut self,
        geometry_id: GeometryId,
        vertices: VertexBuffer<'_>,
        indices: IndexBuffer<'_>,
    );

    fn destroy_geometry(&mut self, geometry_id: GeometryId);

    /// Publishes the commands for this pass, replacing any previous list.
    fn update_command_list(&mut self, list: &CommandList);
}

macro_rules! forward_gpu_driver {
    () => {
        fn begin_synchronize(&mut self) {
            (**self).begin_synchronize()
        }
        fn end_synchronize(&mut self) {
            (**self).end_synchronize()
        }
        fn next_texture_id(&mut self) -> TextureId {
            (**self).next_texture_id()
        }
        fn create_texture(&mut self, texture_id: TextureId, bitmap: &Bitmap) {
            (**self).create_texture(texture_id, bitmap)
        }
        fn update_texture(&mut self, texture_id: TextureId, bitmap: &Bitmap) {
            (**self).update_texture(texture_id, bitmap)
        }
        fn destroy_texture(&mut self, texture_id: TextureId) {
            (**self).destroy_texture(texture_id)
        }
        fn next_render_buffer_id(&mut self) -> RenderBufferId {
            (**self).next_render_buffer_id()
        }
        fn create_render_buffer(&mut self, id: RenderBufferId, desc: &RenderBufferDesc) {
            (**self).create_render_buffer(id, desc)
        }
        fn destroy_render_buffer(&mut self, id: RenderBufferId) {
            (**self).destroy_render_buffer(id)
        }
        fn next_geometry_id(&mut self) -> GeometryId {
            (**self).next_geometry_id()
        }
        fn create_geometry(&mut self, id: GeometryId, v: VertexBuffer<'_>, i: IndexBuffer<'_>) {
            (**self).create_geometry(id, v, i)
        }
        fn update_geometry(&mut self, id: GeometryId, v: VertexBuffer<'_>, i: IndexBuffer<'_>) {
            (**self).update_geometry(id, v, i)
        }
        fn destroy_geometry(&mut self, id: GeometryId) {
            (**self).destroy_geometry(id)
        }
        fn update_command_list(&mut self, list: &CommandList) {
            (**self).update_command_list(list)
        }
    };
}

impl<D: GpuDriver + ?Sized> GpuDriver for Box<D> {
    forward_gpu_driver!();
}

impl<D: GpuDriver + ?Sized> GpuDriver for &mut D {
    forward_gpu_driver!();
}
