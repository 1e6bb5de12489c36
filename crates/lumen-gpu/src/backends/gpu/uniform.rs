use bytemuck::{Pod, Zeroable};

use crate::bitmap::BitmapFormat;
use crate::math::{Matrix4x4, apply_projection};
use crate::protocol::{GpuState, MAX_CLIP_STACK, ShaderType, UNIFORM_SLOTS};

/// Per-command uniform block. Mirrors `State` in `protocol.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct StateUniform {
    pub mvp: [[f32; 4]; 4],
    /// width, height, 1/width, 1/height
    pub viewport: [f32; 4],
    /// shader type, texturing enabled, clip size, A8 slot mask
    pub flags: [u32; 4],
    pub scalars: [[f32; 4]; UNIFORM_SLOTS / 4],
    pub vectors: [[f32; 4]; UNIFORM_SLOTS],
    pub clip: [[[f32; 4]; 4]; MAX_CLIP_STACK],
}

const _: () = assert!(std::mem::size_of::<StateUniform>() == 768);

fn cols(m: Matrix4x4) -> [[f32; 4]; 4] {
    m.to_glam().to_cols_array_2d()
}

impl StateUniform {
    /// Packs `state` for a `target_width x target_height` render target.
    ///
    /// `slot_formats` are the formats bound to texture slots #1..#3.
    pub fn new(
        state: &GpuState,
        target_width: u32,
        target_height: u32,
        slot_formats: [Option<BitmapFormat>; 3],
    ) -> Self {
        // Viewport and projection cancel out in pixel space; projecting against the
        // target keeps viewports larger than the target legal.
        let (w, h) = (target_width.max(1) as f32, target_height.max(1) as f32);
        let mvp = apply_projection(state.transform, w, h, false);

        let a8_mask = slot_formats
            .iter()
            .enumerate()
            .filter(|(_, f)| **f == Some(BitmapFormat::A8Unorm))
            .fold(0u32, |m, (i, _)| m | (1 << i));

        let mut scalars = [[0.0; 4]; UNIFORM_SLOTS / 4];
        for (i, s) in state.uniform_scalar.iter().enumerate() {
            scalars[i / 4][i % 4] = *s;
        }

        let mut clip = [[[0.0; 4]; 4]; MAX_CLIP_STACK];
        for (dst, src) in clip.iter_mut().zip(state.active_clips()) {
            *dst = cols(*src);
        }

        Self {
            mvp: cols(mvp),
            viewport: [w, h, 1.0 / w, 1.0 / h],
            flags: [
                match state.shader_type {
                    ShaderType::Fill => 0,
                    ShaderType::FillPath => 1,
                },
                state.enable_texturing as u32,
                state.active_clips().len() as u32,
                a8_mask,
            ],
            scalars,
            vectors: state.uniform_vector.map(|v| v.to_array()),
            clip,
        }
    }
}

/// Distance between consecutive uniforms in the dynamic-offset buffer.
pub(super) fn uniform_stride(min_alignment: u32) -> u64 {
    let size = std::mem::size_of::<StateUniform>() as u64;
    let align = u64::from(min_alignment.max(1));
    size.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec4;
    use crate::protocol::{RenderBufferId, TextureId};

    fn state() -> GpuState {
        GpuState::new(RenderBufferId::new(1).unwrap(), 100, 50)
    }

    #[test]
    fn stride_respects_alignment() {
        assert_eq!(uniform_stride(256), 768);
        assert_eq!(uniform_stride(512), 1024);
        assert_eq!(uniform_stride(0), 768);
    }

    #[test]
    fn mvp_maps_target_corners() {
        let u = StateUniform::new(&state(), 100, 50, [None; 3]);
        let m = Matrix4x4::from_cols_array(bytemuck::cast(u.mvp));
        let p = m.transform_point(100.0, 50.0);
        assert!((p[0] - 1.0).abs() < 1e-6 && (p[1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn flags_and_uniforms_are_packed() {
        let mut s = state().with_texture(TextureId::new(2).unwrap()).with_shader(ShaderType::FillPath);
        s.uniform_scalar[5] = 3.0;
        s.uniform_vector[7] = Vec4::new(1.0, 2.0, 3.0, 4.0);
        s.push_clip(Matrix4x4::scale(2.0, 2.0));
        let u = StateUniform::new(&s, 10, 10, [Some(BitmapFormat::A8Unorm), None, Some(BitmapFormat::A8Unorm)]);
        assert_eq!(u.flags, [1, 1, 1, 0b101]);
        assert_eq!(u.scalars[1][1], 3.0);
        assert_eq!(u.vectors[7], [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(u.clip[0][0][0], 2.0);
        assert_eq!(u.clip[1], [[0.0; 4]; 4]);
    }
}
