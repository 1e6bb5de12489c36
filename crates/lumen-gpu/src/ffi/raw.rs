use thiserror::Error;

use crate::bitmap::{Bitmap, BitmapError, BitmapFormat};
use crate::coords::IntRect;
use crate::math::{Matrix4x4, Vec4};
use crate::protocol::{
    Command, CommandList, CommandType, GeometryId, GpuState, IndexBuffer, RenderBufferDesc,
    RenderBufferId, ShaderType, TextureId, VertexBuffer, VertexBufferFormat, MAX_CLIP_STACK,
    TEXTURE_SLOTS, UNIFORM_SLOTS,
};

/// A raw value that has no typed counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RawConversionError {
    #[error("{field} is 0 but must name a resource")]
    ZeroId { field: &'static str },

    #[error("{field} has unknown tag {tag}")]
    UnknownTag { field: &'static str, tag: u8 },

    #[error("clip_size {size} exceeds the maximum of {MAX_CLIP_STACK}")]
    ClipStackOverflow { size: u8 },

    #[error("{field} is null but {len} bytes were announced")]
    NullPointer { field: &'static str, len: usize },

    #[error(transparent)]
    Bitmap(#[from] BitmapError),
}

fn required<T>(field: &'static str, id: Option<T>) -> Result<T, RawConversionError> {
    id.ok_or(RawConversionError::ZeroId { field })
}

/// Borrows `len` bytes from `data`. A null pointer is only accepted for an empty span.
///
/// # Safety
/// When non-null, `data` must be valid for reads of `len` bytes for `'a`.
unsafe fn raw_bytes<'a>(
    field: &'static str,
    data: *const u8,
    len: usize,
) -> Result<&'a [u8], RawConversionError> {
    if len == 0 {
        return Ok(&[]);
    }
    if data.is_null() {
        return Err(RawConversionError::NullPointer { field, len });
    }
    // SAFETY: non-null and valid for `len` bytes per the caller's contract.
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

// ── wire structs ──────────────────────────────────────────────────────────
//
// Single-byte packing throughout, matching the host renderer's headers.

#[repr(C, packed)]
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct RawMatrix4x4 {
    pub data: [f32; 16],
}

#[repr(C, packed)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RawIntRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[repr(C, packed)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RawRenderBuffer {
    pub texture_id: u32,
    pub width: u32,
    pub height: u32,
    pub has_stencil_buffer: bool,
    pub has_depth_buffer: bool,
}

#[repr(C, packed)]
#[derive(Debug, Copy, Clone)]
pub struct RawVertexBuffer {
    pub format: u8,
    /// Size in bytes.
    pub size: u32,
    pub data: *const u8,
}

#[repr(C, packed)]
#[derive(Debug, Copy, Clone)]
pub struct RawIndexBuffer {
    /// Size in bytes.
    pub size: u32,
    pub data: *const u8,
}

/// Pixel view handed to texture callbacks. Valid for the duration of the call.
#[repr(C, packed)]
#[derive(Debug, Copy, Clone)]
pub struct RawBitmap {
    pub width: u32,
    pub height: u32,
    pub format: u8,
    pub row_bytes: u32,
    pub pixels: *const u8,
}

#[repr(C, packed)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RawGpuState {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub transform: RawMatrix4x4,
    pub enable_texturing: bool,
    pub enable_blend: bool,
    pub shader_type: u8,
    pub render_buffer_id: u32,
    pub texture_1_id: u32,
    pub texture_2_id: u32,
    pub texture_3_id: u32,
    pub uniform_scalar: [f32; UNIFORM_SLOTS],
    pub uniform_vector: [[f32; 4]; UNIFORM_SLOTS],
    pub clip_size: u8,
    pub clip: [RawMatrix4x4; MAX_CLIP_STACK],
    pub enable_scissor: bool,
    pub scissor_rect: RawIntRect,
}

#[repr(C, packed)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RawCommand {
    pub command_type: u8,
    pub gpu_state: RawGpuState,
    pub geometry_id: u32,
    pub indices_count: u32,
    pub indices_offset: u32,
}

#[repr(C, packed)]
#[derive(Debug, Copy, Clone)]
pub struct RawCommandList {
    pub size: u32,
    pub commands: *const RawCommand,
}

// ── typed → raw ───────────────────────────────────────────────────────────

impl From<Matrix4x4> for RawMatrix4x4 {
    fn from(m: Matrix4x4) -> Self {
        Self { data: m.data }
    }
}

impl From<RawMatrix4x4> for Matrix4x4 {
    fn from(m: RawMatrix4x4) -> Self {
        Matrix4x4::from_cols_array(m.data)
    }
}

impl From<IntRect> for RawIntRect {
    fn from(r: IntRect) -> Self {
        Self { left: r.left, top: r.top, right: r.right, bottom: r.bottom }
    }
}

impl From<RawIntRect> for IntRect {
    fn from(r: RawIntRect) -> Self {
        IntRect::new(r.left, r.top, r.right, r.bottom)
    }
}

impl From<&RenderBufferDesc> for RawRenderBuffer {
    fn from(d: &RenderBufferDesc) -> Self {
        Self {
            texture_id: d.texture_id.get(),
            width: d.width,
            height: d.height,
            has_stencil_buffer: d.has_stencil_buffer,
            has_depth_buffer: d.has_depth_buffer,
        }
    }
}

impl From<VertexBuffer<'_>> for RawVertexBuffer {
    fn from(v: VertexBuffer<'_>) -> Self {
        Self { format: v.format as u8, size: v.data.len() as u32, data: v.data.as_ptr() }
    }
}

impl From<IndexBuffer<'_>> for RawIndexBuffer {
    fn from(i: IndexBuffer<'_>) -> Self {
        Self { size: i.data.len() as u32, data: i.data.as_ptr() }
    }
}

impl From<&Bitmap> for RawBitmap {
    fn from(b: &Bitmap) -> Self {
        let pixels = if b.is_empty() { std::ptr::null() } else { b.pixels().as_ptr() };
        Self {
            width: b.width(),
            height: b.height(),
            format: b.format() as u8,
            row_bytes: b.row_bytes(),
            pixels,
        }
    }
}

impl From<&GpuState> for RawGpuState {
    fn from(s: &GpuState) -> Self {
        let slot = |i: usize| s.textures[i].map_or(0, TextureId::get);
        Self {
            viewport_width: s.viewport_width,
            viewport_height: s.viewport_height,
            transform: s.transform.into(),
            enable_texturing: s.enable_texturing,
            enable_blend: s.enable_blend,
            shader_type: s.shader_type as u8,
            render_buffer_id: s.render_buffer_id.get(),
            texture_1_id: slot(0),
            texture_2_id: slot(1),
            texture_3_id: slot(2),
            uniform_scalar: s.uniform_scalar,
            uniform_vector: s.uniform_vector.map(Vec4::to_array),
            clip_size: s.clip_size,
            clip: s.clip.map(RawMatrix4x4::from),
            enable_scissor: s.enable_scissor,
            scissor_rect: s.scissor_rect.into(),
        }
    }
}

impl From<&Command> for RawCommand {
    fn from(c: &Command) -> Self {
        let (geometry_id, indices_count, indices_offset) = match c {
            Command::ClearRenderBuffer { .. } => (0, 0, 0),
            Command::DrawGeometry { geometry_id, indices_count, indices_offset, .. } => {
                (geometry_id.get(), *indices_count, *indices_offset)
            }
        };
        Self {
            command_type: c.command_type() as u8,
            gpu_state: c.state().into(),
            geometry_id,
            indices_count,
            indices_offset,
        }
    }
}

// ── raw → typed ───────────────────────────────────────────────────────────

impl TryFrom<RawRenderBuffer> for RenderBufferDesc {
    type Error = RawConversionError;

    fn try_from(raw: RawRenderBuffer) -> Result<Self, Self::Error> {
        Ok(RenderBufferDesc {
            texture_id: required("texture_id", TextureId::new(raw.texture_id))?,
            width: raw.width,
            height: raw.height,
            has_stencil_buffer: raw.has_stencil_buffer,
            has_depth_buffer: raw.has_depth_buffer,
        })
    }
}

impl TryFrom<&RawGpuState> for GpuState {
    type Error = RawConversionError;

    fn try_from(raw: &RawGpuState) -> Result<Self, Self::Error> {
        let clip_size = raw.clip_size;
        if clip_size as usize > MAX_CLIP_STACK {
            return Err(RawConversionError::ClipStackOverflow { size: clip_size });
        }
        let shader_tag = raw.shader_type;
        let shader_type = ShaderType::from_raw(shader_tag)
            .ok_or(RawConversionError::UnknownTag { field: "shader_type", tag: shader_tag })?;

        let textures: [Option<TextureId>; TEXTURE_SLOTS] = [
            TextureId::new(raw.texture_1_id),
            TextureId::new(raw.texture_2_id),
            TextureId::new(raw.texture_3_id),
        ];
        let vectors = raw.uniform_vector;
        let clip = raw.clip;

        Ok(GpuState {
            viewport_width: raw.viewport_width,
            viewport_height: raw.viewport_height,
            transform: Matrix4x4::from(raw.transform),
            enable_texturing: raw.enable_texturing,
            enable_blend: raw.enable_blend,
            shader_type,
            render_buffer_id: required("render_buffer_id", RenderBufferId::new(raw.render_buffer_id))?,
            textures,
            uniform_scalar: raw.uniform_scalar,
            uniform_vector: vectors.map(Vec4::from),
            clip_size,
            clip: clip.map(Matrix4x4::from),
            enable_scissor: raw.enable_scissor,
            scissor_rect: IntRect::from(raw.scissor_rect),
        })
    }
}

impl TryFrom<&RawCommand> for Command {
    type Error = RawConversionError;

    fn try_from(raw: &RawCommand) -> Result<Self, Self::Error> {
        let state = GpuState::try_from(&raw.gpu_state)?;
        match raw.command_type {
            t if t == CommandType::ClearRenderBuffer as u8 => Ok(Command::ClearRenderBuffer { state }),
            t if t == CommandType::DrawGeometry as u8 => Ok(Command::DrawGeometry {
                state,
                geometry_id: required("geometry_id", GeometryId::new(raw.geometry_id))?,
                indices_count: raw.indices_count,
                indices_offset: raw.indices_offset,
            }),
            tag => Err(RawConversionError::UnknownTag { field: "command_type", tag }),
        }
    }
}

impl RawVertexBuffer {
    /// Borrows the vertex bytes.
    ///
    /// # Safety
    /// `data` must be valid for reads of `size` bytes for `'a`.
    pub unsafe fn as_buffer<'a>(&self) -> Result<VertexBuffer<'a>, RawConversionError> {
        let tag = self.format;
        let format = VertexBufferFormat::from_raw(tag)
            .ok_or(RawConversionError::UnknownTag { field: "vertex format", tag })?;
        // SAFETY: forwarded from the caller.
        let data = unsafe { raw_bytes("vertex data", self.data, self.size as usize)? };
        Ok(VertexBuffer::new(format, data))
    }
}

impl RawIndexBuffer {
    /// Borrows the index bytes.
    ///
    /// # Safety
    /// `data` must be valid for reads of `size` bytes for `'a`.
    pub unsafe fn as_buffer<'a>(&self) -> Result<IndexBuffer<'a>, RawConversionError> {
        // SAFETY: forwarded from the caller.
        let data = unsafe { raw_bytes("index data", self.data, self.size as usize)? };
        Ok(IndexBuffer::new(data))
    }
}

impl RawBitmap {
    /// Copies the pixels into an owned [`Bitmap`]. A zero extent yields the empty bitmap.
    ///
    /// # Safety
    /// `pixels` must be valid for reads of `row_bytes * height` bytes.
    pub unsafe fn to_bitmap(&self) -> Result<Bitmap, RawConversionError> {
        let (width, height, row_bytes) = (self.width, self.height, self.row_bytes);
        if width == 0 || height == 0 {
            return Ok(Bitmap::empty());
        }
        let tag = self.format;
        let format = BitmapFormat::from_raw(tag)
            .ok_or(RawConversionError::UnknownTag { field: "bitmap format", tag })?;
        let len = row_bytes as usize * height as usize;
        // SAFETY: forwarded from the caller.
        let pixels = unsafe { raw_bytes("pixels", self.pixels, len)? };
        Ok(Bitmap::from_pixels(width, height, format, row_bytes, pixels.to_vec())?)
    }
}

impl RawCommandList {
    /// Views the commands in place.
    ///
    /// # Safety
    /// `commands` must point at `size` initialized commands that outlive `'a`.
    pub unsafe fn as_slice<'a>(&self) -> Result<&'a [RawCommand], RawConversionError> {
        let size = self.size as usize;
        if size == 0 {
            return Ok(&[]);
        }
        let commands = self.commands;
        if commands.is_null() {
            return Err(RawConversionError::NullPointer {
                field: "commands",
                len: size * std::mem::size_of::<RawCommand>(),
            });
        }
        // SAFETY: non-null, alignment 1, `size` elements per the caller's contract.
        Ok(unsafe { std::slice::from_raw_parts(commands, size) })
    }

    /// Converts every command. Fails on the first malformed one.
    ///
    /// # Safety
    /// Same contract as [`RawCommandList::as_slice`].
    pub unsafe fn to_command_list(&self) -> Result<CommandList, RawConversionError> {
        // SAFETY: forwarded from the caller.
        let raw = unsafe { self.as_slice()? };
        raw.iter().map(Command::try_from).collect()
    }
}

/// Owned raw commands plus the list header pointing at them.
#[derive(Debug, Default, Clone)]
pub struct RawCommandBuffer {
    commands: Vec<RawCommand>,
}

impl RawCommandBuffer {
    pub fn encode(list: &CommandList) -> Self {
        Self { commands: list.iter().map(RawCommand::from).collect() }
    }

    #[inline]
    pub fn commands(&self) -> &[RawCommand] {
        &self.commands
    }

    /// Header borrowing this buffer. Do not use it after the buffer is dropped.
    pub fn as_raw(&self) -> RawCommandList {
        RawCommandList { size: self.commands.len() as u32, commands: self.commands.as_ptr() }
    }
}
