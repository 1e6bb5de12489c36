use super::Matrix4x4;

/// Screen-space orthographic projection for a `width x height` pixel viewport.
///
/// Pixel `(0, 0)` maps to clip `(-1, +1)` and `(width, height)` to `(+1, -1)`.
/// With `flip_y` the Y mapping is inverted (`(0, 0)` → `(-1, -1)`), which is what
/// OpenGL-style render-to-texture expects. Z passes through unchanged.
pub fn orthographic_projection(viewport_width: f32, viewport_height: f32, flip_y: bool) -> Matrix4x4 {
    let sx = 2.0 / viewport_width as f64;
    let (sy, ty) = if flip_y {
        (2.0 / viewport_height as f64, -1.0)
    } else {
        (-2.0 / viewport_height as f64, 1.0)
    };

    Matrix4x4::from_cols_array([
        sx as f32, 0.0, 0.0, 0.0, //
        0.0, sy as f32, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        -1.0, ty as f32, 0.0, 1.0,
    ])
}

/// Combines `transform` with the viewport projection: `ortho * transform`.
///
/// `transform` is applied first (model space), then the projection. The result is
/// what a vertex shader should receive for a `GpuState`.
pub fn apply_projection(
    transform: Matrix4x4,
    viewport_width: f32,
    viewport_height: f32,
    flip_y: bool,
) -> Matrix4x4 {
    orthographic_projection(viewport_width, viewport_height, flip_y) * transform
}
