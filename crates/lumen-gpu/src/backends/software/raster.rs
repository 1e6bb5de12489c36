//! Scanline-free triangle rasterizer over BGRA8 bitmaps.
//!
//! Pixel centers at `+0.5`, top-left fill rule, colors premultiplied.

use crate::bitmap::{Bitmap, BitmapFormat};
use crate::coords::IntRect;

/// A vertex in target pixel space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(super) struct RasterVertex {
    pub x: f32,
    pub y: f32,
    /// Premultiplied RGBA in `0..=1`.
    pub color: [f32; 4],
    pub uv: [f32; 2],
}

/// Per-draw fixed-function state.
pub(super) struct DrawParams<'a> {
    pub clip: IntRect,
    pub texture: Option<&'a Bitmap>,
    pub blend: bool,
}

pub(super) fn clear(target: &mut Bitmap) {
    target.pixels_mut().fill(0);
}

#[inline]
fn edge(ax: f32, ay: f32, bx: f32, by: f32, px: f32, py: f32) -> f32 {
    (bx - ax) * (py - ay) - (by - ay) * (px - ax)
}

/// Top edge (horizontal, pointing right) or left edge (pointing up) of a
/// positively wound triangle in y-down space.
#[inline]
fn is_top_left(ax: f32, ay: f32, bx: f32, by: f32) -> bool {
    (ay == by && bx > ax) || by < ay
}

#[inline]
fn covers(w: f32, top_left: bool) -> bool {
    w > 0.0 || (w == 0.0 && top_left)
}

/// Fills one triangle into `target`. Returns the number of pixels written.
pub(super) fn fill_triangle(target: &mut Bitmap, tri: [RasterVertex; 3], params: &DrawParams<'_>) -> u64 {
    let [v0, mut v1, mut v2] = tri;
    let mut area = edge(v0.x, v0.y, v1.x, v1.y, v2.x, v2.y);
    if area == 0.0 || !area.is_finite() {
        return 0;
    }
    if area < 0.0 {
        std::mem::swap(&mut v1, &mut v2);
        area = -area;
    }

    // Float to int casts saturate, so far-off vertices pin to the i32 range.
    let bounds = IntRect::new(
        v0.x.min(v1.x).min(v2.x).floor() as i32,
        v0.y.min(v1.y).min(v2.y).floor() as i32,
        (v0.x.max(v1.x).max(v2.x).ceil() as i32).saturating_add(1),
        (v0.y.max(v1.y).max(v2.y).ceil() as i32).saturating_add(1),
    );
    let Some(bounds) = bounds.intersect(params.clip) else {
        return 0;
    };

    let tl0 = is_top_left(v1.x, v1.y, v2.x, v2.y);
    let tl1 = is_top_left(v2.x, v2.y, v0.x, v0.y);
    let tl2 = is_top_left(v0.x, v0.y, v1.x, v1.y);

    let mut written = 0;
    for y in bounds.top..bounds.bottom {
        let py = y as f32 + 0.5;
        for x in bounds.left..bounds.right {
            let px = x as f32 + 0.5;
            let w0 = edge(v1.x, v1.y, v2.x, v2.y, px, py);
            let w1 = edge(v2.x, v2.y, v0.x, v0.y, px, py);
            let w2 = edge(v0.x, v0.y, v1.x, v1.y, px, py);
            if !(covers(w0, tl0) && covers(w1, tl1) && covers(w2, tl2)) {
                continue;
            }
            let (l0, l1, l2) = (w0 / area, w1 / area, w2 / area);

            let mut color = [0.0f32; 4];
            for (c, out) in color.iter_mut().enumerate() {
                *out = v0.color[c] * l0 + v1.color[c] * l1 + v2.color[c] * l2;
            }
            if let Some(texture) = params.texture {
                let u = v0.uv[0] * l0 + v1.uv[0] * l1 + v2.uv[0] * l2;
                let v = v0.uv[1] * l0 + v1.uv[1] * l1 + v2.uv[1] * l2;
                let texel = sample_nearest(texture, u, v);
                for c in 0..4 {
                    color[c] *= texel[c];
                }
            }

            if let Some(dst) = target.pixel_mut(x as u32, y as u32) {
                write_pixel(dst, color, params.blend);
                written += 1;
            }
        }
    }
    written
}

/// Premultiplied RGBA of the texel nearest to `(u, v)`; coordinates are clamped.
pub(super) fn sample_nearest(texture: &Bitmap, u: f32, v: f32) -> [f32; 4] {
    if texture.is_empty() {
        return [0.0; 4];
    }
    let tx = ((u * texture.width() as f32).floor().max(0.0) as u32).min(texture.width() - 1);
    let ty = ((v * texture.height() as f32).floor().max(0.0) as u32).min(texture.height() - 1);
    let Some(px) = texture.pixel(tx, ty) else {
        return [0.0; 4];
    };
    match texture.format() {
        BitmapFormat::A8Unorm => {
            let a = unorm(px[0]);
            [a, a, a, a]
        }
        BitmapFormat::Bgra8UnormSrgb => [unorm(px[2]), unorm(px[1]), unorm(px[0]), unorm(px[3])],
    }
}

/// Writes premultiplied RGBA `src` into a BGRA pixel.
fn write_pixel(dst: &mut [u8], src: [f32; 4], blend: bool) {
    let out = if blend {
        let d = [unorm(dst[2]), unorm(dst[1]), unorm(dst[0]), unorm(dst[3])];
        let k = 1.0 - src[3];
        [src[0] + d[0] * k, src[1] + d[1] * k, src[2] + d[2] * k, src[3] + d[3] * k]
    } else {
        src
    };
    dst[0] = to_unorm8(out[2]);
    dst[1] = to_unorm8(out[1]);
    dst[2] = to_unorm8(out[0]);
    dst[3] = to_unorm8(out[3]);
}

#[inline]
pub(super) fn unorm(v: u8) -> f32 {
    v as f32 / 255.0
}

#[inline]
fn to_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
