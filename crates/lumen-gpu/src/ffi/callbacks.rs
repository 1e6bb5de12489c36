use std::collections::HashSet;
use std::ffi::c_void;

use crate::bitmap::Bitmap;
use crate::protocol::{
    CommandList, GeometryId, GpuDriver, IdAllocator, IndexBuffer, RenderBufferDesc, RenderBufferId,
    ResourceKind, TextureId, VertexBuffer,
};

use super::raw::{RawBitmap, RawCommandBuffer, RawCommandList, RawIndexBuffer, RawRenderBuffer, RawVertexBuffer};

pub type SynchronizeCallback = unsafe extern "C" fn(user_data: *mut c_void);
pub type NextIdCallback = unsafe extern "C" fn(user_data: *mut c_void) -> u32;
pub type TextureCallback = unsafe extern "C" fn(user_data: *mut c_void, texture_id: u32, bitmap: *const RawBitmap);
pub type DestroyCallback = unsafe extern "C" fn(user_data: *mut c_void, id: u32);
pub type CreateRenderBufferCallback =
    unsafe extern "C" fn(user_data: *mut c_void, render_buffer_id: u32, buffer: RawRenderBuffer);
pub type GeometryCallback = unsafe extern "C" fn(
    user_data: *mut c_void,
    geometry_id: u32,
    vertices: RawVertexBuffer,
    indices: RawIndexBuffer,
);
pub type UpdateCommandListCallback = unsafe extern "C" fn(user_data: *mut c_void, list: RawCommandList);

/// Host-side GPU driver as a table of C callbacks.
///
/// Every callback receives `user_data` first. Pointer arguments are only valid for the
/// duration of the call.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GpuDriverCallbacks {
    pub user_data: *mut c_void,
    pub begin_synchronize: Option<SynchronizeCallback>,
    pub end_synchronize: Option<SynchronizeCallback>,
    pub next_texture_id: Option<NextIdCallback>,
    pub create_texture: Option<TextureCallback>,
    pub update_texture: Option<TextureCallback>,
    pub destroy_texture: Option<DestroyCallback>,
    pub next_render_buffer_id: Option<NextIdCallback>,
    pub create_render_buffer: Option<CreateRenderBufferCallback>,
    pub destroy_render_buffer: Option<DestroyCallback>,
    pub next_geometry_id: Option<NextIdCallback>,
    pub create_geometry: Option<GeometryCallback>,
    pub update_geometry: Option<GeometryCallback>,
    pub destroy_geometry: Option<DestroyCallback>,
    pub update_command_list: Option<UpdateCommandListCallback>,
}

impl Default for GpuDriverCallbacks {
    fn default() -> Self {
        Self {
            user_data: std::ptr::null_mut(),
            begin_synchronize: None,
            end_synchronize: None,
            next_texture_id: None,
            create_texture: None,
            update_texture: None,
            destroy_texture: None,
            next_render_buffer_id: None,
            create_render_buffer: None,
            destroy_render_buffer: None,
            next_geometry_id: None,
            create_geometry: None,
            update_geometry: None,
            destroy_geometry: None,
            update_command_list: None,
        }
    }
}

/// [`GpuDriver`] forwarding to a [`GpuDriverCallbacks`] table.
///
/// A missing callback is reported once and the call is dropped. Missing id callbacks,
/// or ones that return 0 or a value at or below the last id of their kind, are served
/// from an internal allocator. Host ids advance that allocator too, so the two
/// sources never hand out the same id.
pub struct CallbackDriver {
    callbacks: GpuDriverCallbacks,
    fallback_ids: IdAllocator,
    missing: HashSet<&'static str>,
    encoded: RawCommandBuffer,
}

impl CallbackDriver {
    /// # Safety
    /// Every non-null callback must be safe to call with `callbacks.user_data` for as long
    /// as the returned driver is alive.
    pub unsafe fn new(callbacks: GpuDriverCallbacks) -> Self {
        Self {
            callbacks,
            fallback_ids: IdAllocator::new(),
            missing: HashSet::new(),
            encoded: RawCommandBuffer::default(),
        }
    }

    #[inline]
    pub fn callbacks(&self) -> &GpuDriverCallbacks {
        &self.callbacks
    }

    /// Names of callbacks that were needed but absent.
    pub fn missing_callbacks(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.missing.iter().copied()
    }

    fn callback<F: Copy>(&mut self, name: &'static str, f: Option<F>) -> Option<F> {
        if f.is_none() && self.missing.insert(name) {
            log::warn!("gpu driver callback {name} is not set; calls to it are ignored");
        }
        f
    }

    fn next_id(&mut self, kind: ResourceKind, name: &'static str, f: Option<NextIdCallback>) -> Option<u32> {
        let f = self.callback(name, f)?;
        // SAFETY: upheld by the contract of `CallbackDriver::new`.
        let raw = unsafe { f(self.callbacks.user_data) };
        match self.fallback_ids.accept(kind, raw) {
            Ok(id) => Some(id.get()),
            Err(e) => {
                log::error!("{name}: {e}; using an internal id");
                None
            }
        }
    }
}

impl GpuDriver for CallbackDriver {
    fn begin_synchronize(&mut self) {
        if let Some(f) = self.callback("begin_synchronize", self.callbacks.begin_synchronize) {
            // SAFETY: see `CallbackDriver::new`.
            unsafe { f(self.callbacks.user_data) }
        }
    }

    fn end_synchronize(&mut self) {
        if let Some(f) = self.callback("end_synchronize", self.callbacks.end_synchronize) {
            // SAFETY: see `CallbackDriver::new`.
            unsafe { f(self.callbacks.user_data) }
        }
    }

    fn next_texture_id(&mut self) -> TextureId {
        self.next_id(ResourceKind::Texture, "next_texture_id", self.callbacks.next_texture_id)
            .and_then(TextureId::new)
            .unwrap_or_else(|| self.fallback_ids.next_texture_id())
    }

    fn create_texture(&mut self, texture_id: TextureId, bitmap: &Bitmap) {
        if let Some(f) = self.callback("create_texture", self.callbacks.create_texture) {
            let raw = RawBitmap::from(bitmap);
            // SAFETY: see `CallbackDriver::new`; `raw` borrows `bitmap` for the call.
            unsafe { f(self.callbacks.user_data, texture_id.get(), &raw) }
        }
    }

    fn update_texture(&mut self, texture_id: TextureId, bitmap: &Bitmap) {
        if let Some(f) = self.callback("update_texture", self.callbacks.update_texture) {
            let raw = RawBitmap::from(bitmap);
            // SAFETY: see `CallbackDriver::new`; `raw` borrows `bitmap` for the call.
            unsafe { f(self.callbacks.user_data, texture_id.get(), &raw) }
        }
    }

    fn destroy_texture(&mut self, texture_id: TextureId) {
        if let Some(f) = self.callback("destroy_texture", self.callbacks.destroy_texture) {
            // SAFETY: see `CallbackDriver::new`.
            unsafe { f(self.callbacks.user_data, texture_id.get()) }
        }
    }

    fn next_render_buffer_id(&mut self) -> RenderBufferId {
        self.next_id(ResourceKind::RenderBuffer, "next_render_buffer_id", self.callbacks.next_render_buffer_id)
            .and_then(RenderBufferId::new)
            .unwrap_or_else(|| self.fallback_ids.next_render_buffer_id())
    }

    fn create_render_buffer(&mut self, render_buffer_id: RenderBufferId, desc: &RenderBufferDesc) {
        if let Some(f) = self.callback("create_render_buffer", self.callbacks.create_render_buffer) {
            // SAFETY: see `CallbackDriver::new`.
            unsafe { f(self.callbacks.user_data, render_buffer_id.get(), desc.into()) }
        }
    }

    fn destroy_render_buffer(&mut self, render_buffer_id: RenderBufferId) {
        if let Some(f) = self.callback("destroy_render_buffer", self.callbacks.destroy_render_buffer) {
            // SAFETY: see `CallbackDriver::new`.
            unsafe { f(self.callbacks.user_data, render_buffer_id.get()) }
        }
    }

    fn next_geometry_id(&mut self) -> GeometryId {
        self.next_id(ResourceKind::Geometry, "next_geometry_id", self.callbacks.next_geometry_id)
            .and_then(GeometryId::new)
            .unwrap_or_else(|| self.fallback_ids.next_geometry_id())
    }

    fn create_geometry(&mut self, geometry_id: GeometryId, vertices: VertexBuffer<'_>, indices: IndexBuffer<'_>) {
        if let Some(f) = self.callback("create_geometry", self.callbacks.create_geometry) {
            // SAFETY: see `CallbackDriver::new`; the buffers outlive the call.
            unsafe { f(self.callbacks.user_data, geometry_id.get(), vertices.into(), indices.into()) }
        }
    }

    fn update_geometry(&mut self, geometry_id: GeometryId, vertices: VertexBuffer<'_>, indices: IndexBuffer<'_>) {
        if let Some(f) = self.callback("update_geometry", self.callbacks.update_geometry) {
            // SAFETY: see `CallbackDriver::new`; the buffers outlive the call.
            unsafe { f(self.callbacks.user_data, geometry_id.get(), vertices.into(), indices.into()) }
        }
    }

    fn destroy_geometry(&mut self, geometry_id: GeometryId) {
        if let Some(f) = self.callback("destroy_geometry", self.callbacks.destroy_geometry) {
            // SAFETY: see `CallbackDriver::new`.
            unsafe { f(self.callbacks.user_data, geometry_id.get()) }
        }
    }

    fn update_command_list(&mut self, list: &CommandList) {
        if let Some(f) = self.callback("update_command_list", self.callbacks.update_command_list) {
            self.encoded = RawCommandBuffer::encode(list);
            // SAFETY: see `CallbackDriver::new`; `encoded` is not touched until the call returns.
            unsafe { f(self.callbacks.user_data, self.encoded.as_raw()) }
        }
    }
}
