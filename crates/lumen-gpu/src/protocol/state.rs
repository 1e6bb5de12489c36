//! Per-draw GPU state.
//!
//! A [`GpuState`] travels with every command so a backend can execute each one
//! without tracking state between them. Limits are checked by
//! [`GpuState::validate_limits`].

use crate::coords::{IntRect, Viewport};
use crate::math::{Matrix4x4, Vec4};

use super::{ProtocolError, RenderBufferId, TextureId};

/// Deepest clip stack a `GpuState` can carry.
pub const MAX_CLIP_STACK: usize = 8;
/// Number of scalar and vector uniform slots.
pub const UNIFORM_SLOTS: usize = 8;
/// Texture slots that can be bound per draw.
pub const TEXTURE_SLOTS: usize = 3;

/// Vertex/pixel shader pair selected by a draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ShaderType {
    /// Quad geometry ([`QuadVertex`](super::QuadVertex)).
    #[default]
    Fill = 0,
    /// Tessellated path geometry ([`PathVertex`](super::PathVertex)).
    FillPath = 1,
}

impl ShaderType {
    pub const fn from_raw(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ShaderType::Fill),
            1 => Some(ShaderType::FillPath),
            _ => None,
        }
    }
}

/// Complete GPU state for one command.
///
/// Nothing is inherited from the previous command: a backend can execute any command
/// in isolation, on any thread, in any replay.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuState {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Model transform. Combine with the viewport projection
    /// ([`apply_projection`](crate::math::apply_projection)) before upload.
    pub transform: Matrix4x4,
    pub enable_texturing: bool,
    /// When disabled, drawn pixels overwrite the target (including alpha).
    pub enable_blend: bool,
    pub shader_type: ShaderType,
    pub render_buffer_id: RenderBufferId,
    /// Texture slots #1..#3.
    pub textures: [Option<TextureId>; TEXTURE_SLOTS],
    pub uniform_scalar: [f32; UNIFORM_SLOTS],
    pub uniform_vector: [Vec4; UNIFORM_SLOTS],
    /// Number of live entries in `clip`.
    pub clip_size: u8,
    pub clip: [Matrix4x4; MAX_CLIP_STACK],
    pub enable_scissor: bool,
    /// Scissor rectangle in pixels.
    pub scissor_rect: IntRect,
}

impl GpuState {
    /// Identity transform, blending on, everything else off.
    pub fn new(render_buffer_id: RenderBufferId, viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            viewport_width,
            viewport_height,
            transform: Matrix4x4::IDENTITY,
            enable_texturing: false,
            enable_blend: true,
            shader_type: ShaderType::Fill,
            render_buffer_id,
            textures: [None; TEXTURE_SLOTS],
            uniform_scalar: [0.0; UNIFORM_SLOTS],
            uniform_vector: [Vec4::ZERO; UNIFORM_SLOTS],
            clip_size: 0,
            clip: [Matrix4x4::IDENTITY; MAX_CLIP_STACK],
            enable_scissor: false,
            scissor_rect: IntRect::empty(),
        }
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        Viewport::from_pixels(self.viewport_width, self.viewport_height)
    }

    #[inline]
    pub fn with_transform(mut self, transform: Matrix4x4) -> Self {
        self.transform = transform;
        self
    }

    #[inline]
    pub fn with_shader(mut self, shader_type: ShaderType) -> Self {
        self.shader_type = shader_type;
        self
    }

    #[inline]
    pub fn with_blend(mut self, enable: bool) -> Self {
        self.enable_blend = enable;
        self
    }

    /// Binds `texture` to slot #1 and enables texturing.
    #[inline]
    pub fn with_texture(mut self, texture: TextureId) -> Self {
        self.textures[0] = Some(texture);
        self.enable_texturing = true;
        self
    }

    #[inline]
    pub fn with_scissor(mut self, rect: IntRect) -> Self {
        self.enable_scissor = true;
        self.scissor_rect = rect;
        self
    }

    /// Pushes a clip matrix; extra entries beyond the stack depth are dropped with a warning.
    pub fn push_clip(&mut self, clip: Matrix4x4) {
        let n = self.clip_size as usize;
        if n >= MAX_CLIP_STACK {
            log::warn!("clip stack full ({MAX_CLIP_STACK}); clip dropped");
            return;
        }
        self.clip[n] = clip;
        self.clip_size += 1;
    }

    /// The live part of the clip stack.
    #[inline]
    pub fn active_clips(&self) -> &[Matrix4x4] {
        &self.clip[..(self.clip_size as usize).min(MAX_CLIP_STACK)]
    }

    /// Bound textures, slot order, skipping empty slots.
    pub fn bound_textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.textures.iter().flatten().copied()
    }

    /// Texture in slot #1 when texturing is on.
    #[inline]
    pub fn primary_texture(&self) -> Option<TextureId> {
        if self.enable_texturing { self.textures[0] } else { None }
    }

    /// Checks the fixed-size limits and the viewport.
    pub fn validate_limits(&self) -> Result<(), ProtocolError> {
        if self.clip_size as usize > MAX_CLIP_STACK {
            return Err(ProtocolError::ClipStackOverflow { size: self.clip_size });
        }
        if !self.viewport().is_valid() {
            return Err(ProtocolError::InvalidViewport {
                width: self.viewport_width,
                height: self.viewport_height,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rb(n: u32) -> RenderBufferId {
        RenderBufferId::new(n).unwrap()
    }

    #[test]
    fn new_state_is_self_contained_defaults() {
        let s = GpuState::new(rb(1), 100, 50);
        assert_eq!(s.transform, Matrix4x4::IDENTITY);
        assert!(s.enable_blend);
        assert!(!s.enable_texturing && !s.enable_scissor);
        assert_eq!(s.bound_textures().count(), 0);
        assert!(s.validate_limits().is_ok());
    }

    #[test]
    fn with_texture_enables_texturing() {
        let t = TextureId::new(4).unwrap();
        let s = GpuState::new(rb(1), 10, 10).with_texture(t);
        assert_eq!(s.primary_texture(), Some(t));
    }

    #[test]
    fn primary_texture_requires_texturing() {
        let mut s = GpuState::new(rb(1), 10, 10).with_texture(TextureId::new(4).unwrap());
        s.enable_texturing = false;
        assert_eq!(s.primary_texture(), None);
        assert_eq!(s.bound_textures().count(), 1);
    }

    #[test]
    fn clip_stack_is_bounded() {
        let mut s = GpuState::new(rb(1), 10, 10);
        for i in 0..10 {
            s.push_clip(Matrix4x4::translation(i as f32, 0.0));
        }
        assert_eq!(s.clip_size as usize, MAX_CLIP_STACK);
        assert_eq!(s.active_clips().len(), MAX_CLIP_STACK);
    }

    #[test]
    fn oversized_clip_count_is_rejected() {
        let mut s = GpuState::new(rb(1), 10, 10);
        s.clip_size = 9;
        assert_eq!(s.validate_limits(), Err(ProtocolError::ClipStackOverflow { size: 9 }));
        assert_eq!(s.active_clips().len(), MAX_CLIP_STACK);
    }

    #[test]
    fn zero_viewport_is_rejected() {
        let s = GpuState::new(rb(1), 0, 10);
        assert!(matches!(s.validate_limits(), Err(ProtocolError::InvalidViewport { .. })));
    }
}
