//! C ABI surface: packed wire structs, a callback-table driver and exported helpers.

mod callbacks;
mod raw;

pub use callbacks::{
    CallbackDriver, CreateRenderBufferCallback, DestroyCallback, GeometryCallback, GpuDriverCallbacks,
    NextIdCallback, SynchronizeCallback, TextureCallback, UpdateCommandListCallback,
};
pub use raw::{
    RawBitmap, RawCommand, RawCommandBuffer, RawCommandList, RawConversionError, RawGpuState,
    RawIndexBuffer, RawIntRect, RawMatrix4x4, RawRenderBuffer, RawVertexBuffer,
};

use crate::math::apply_projection;

/// `ortho(viewport) * transform` for C hosts. See [`apply_projection`].
#[unsafe(no_mangle)]
pub extern "C" fn lumen_apply_projection(
    transform: RawMatrix4x4,
    viewport_width: f32,
    viewport_height: f32,
    flip_y: bool,
) -> RawMatrix4x4 {
    apply_projection(transform.into(), viewport_width, viewport_height, flip_y).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Matrix4x4;

    #[test]
    fn exported_projection_matches_the_rust_helper() {
        let t = Matrix4x4::translation(5.0, 7.0);
        let raw = lumen_apply_projection(t.into(), 200.0, 100.0, true);
        assert_eq!(Matrix4x4::from(raw), apply_projection(t, 200.0, 100.0, true));
    }
}
