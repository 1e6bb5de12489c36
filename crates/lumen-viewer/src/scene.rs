//! Scripted demo scene: one render target, a checkerboard texture, a textured quad and
//! an animated path.

use std::f32::consts::TAU;

use lumen_gpu::bitmap::{Bitmap, BitmapFormat};
use lumen_gpu::coords::IntRect;
use lumen_gpu::math::Matrix4x4;
use lumen_gpu::protocol::{
    CommandList, GeometryId, GpuDriver, GpuState, IndexBuffer, IndexType, PathVertex, QuadVertex,
    RenderBufferId, ShaderType, SyncScope, TextureId, VertexBuffer,
};

const CHECKER_CELLS: u32 = 8;
const STAR_POINTS: usize = 5;

pub struct DemoScene {
    width: u32,
    height: u32,
    target: TextureId,
    render_buffer: RenderBufferId,
    checker: TextureId,
    quad: GeometryId,
    star: GeometryId,
}

impl DemoScene {
    /// Creates every resource the scene draws with.
    pub fn create<D: GpuDriver + ?Sized>(pass: &mut SyncScope<'_, D>, width: u32, height: u32) -> Self {
        let target = pass.create_render_target();
        let render_buffer = pass.create_render_buffer(target, width, height);
        let checker = pass.create_texture(&checkerboard(CHECKER_CELLS * 4));

        let side = width.min(height) as f32 * 0.5;
        let quad_vertices = [
            QuadVertex::new([0.0, 0.0], [255; 4], [0.0, 0.0]),
            QuadVertex::new([side, 0.0], [255; 4], [1.0, 0.0]),
            QuadVertex::new([side, side], [255; 4], [1.0, 1.0]),
            QuadVertex::new([0.0, side], [255; 4], [0.0, 1.0]),
        ];
        let quad_indices: [IndexType; 6] = [0, 1, 2, 0, 2, 3];
        let quad = pass.create_geometry(
            VertexBuffer::from_quad_vertices(&quad_vertices),
            IndexBuffer::from_indices(&quad_indices),
        );

        let (star_vertices, star_indices) = star(0.0, side * 0.45);
        let star = pass.create_geometry(
            VertexBuffer::from_path_vertices(&star_vertices),
            IndexBuffer::from_indices(&star_indices),
        );

        log::info!("scene created: {width}x{height} target {target}, {render_buffer}");
        Self { width, height, target, render_buffer, checker, quad, star }
    }

    #[inline]
    pub fn render_buffer(&self) -> RenderBufferId {
        self.render_buffer
    }

    /// Re-tessellates the star for `frame` and publishes that frame's command list.
    pub fn frame<D: GpuDriver + ?Sized>(&self, pass: &mut SyncScope<'_, D>, frame: u32) {
        let (w, h) = (self.width, self.height);
        let side = w.min(h) as f32 * 0.5;
        let angle = frame as f32 * TAU / 60.0;

        let (star_vertices, star_indices) = star(angle, side * 0.45);
        pass.update_geometry(
            self.star,
            VertexBuffer::from_path_vertices(&star_vertices),
            IndexBuffer::from_indices(&star_indices),
        );

        let base = GpuState::new(self.render_buffer, w, h);
        let mut list = CommandList::with_capacity(4);
        list.clear_render_buffer(base.clone());
        list.draw_geometry(
            base.clone()
                .with_texture(self.checker)
                .with_transform(Matrix4x4::translation(w as f32 * 0.1, h as f32 * 0.1)),
            self.quad,
            6,
            0,
        );
        // Bottom half only, opaque overwrite.
        list.draw_geometry(
            base.clone()
                .with_blend(false)
                .with_scissor(IntRect::new(0, h as i32 / 2, w as i32, h as i32))
                .with_transform(Matrix4x4::translation(w as f32 * 0.45, h as f32 * 0.35)),
            self.quad,
            6,
            0,
        );
        list.draw_geometry(
            base.with_shader(ShaderType::FillPath)
                .with_transform(Matrix4x4::translation(w as f32 * 0.5, h as f32 * 0.5)),
            self.star,
            (STAR_POINTS * 2 * 3) as u32,
            0,
        );
        pass.update_command_list(&list);
    }

    /// Destroys every resource, render buffer before its texture.
    pub fn destroy<D: GpuDriver + ?Sized>(self, pass: &mut SyncScope<'_, D>) {
        pass.destroy_geometry(self.star);
        pass.destroy_geometry(self.quad);
        pass.destroy_render_buffer(self.render_buffer);
        pass.destroy_texture(self.checker);
        pass.destroy_texture(self.target);
        log::debug!("scene destroyed");
    }
}

fn checkerboard(size: u32) -> Bitmap {
    let cell = (size / CHECKER_CELLS).max(1);
    let mut bitmap = Bitmap::new(size, size, BitmapFormat::Bgra8UnormSrgb);
    for y in 0..size {
        for x in 0..size {
            let bgra = if (x / cell + y / cell) % 2 == 0 { [235, 206, 135, 255] } else { [60, 20, 20, 255] };
            if let Some(px) = bitmap.pixel_mut(x, y) {
                px.copy_from_slice(&bgra);
            }
        }
    }
    bitmap
}

/// Triangle-fan star centered on the origin, translucent orange (premultiplied).
fn star(angle: f32, radius: f32) -> (Vec<PathVertex>, Vec<IndexType>) {
    const COLOR: [u8; 4] = [200, 100, 0, 200];
    let rim = STAR_POINTS * 2;

    let mut vertices = Vec::with_capacity(rim + 1);
    vertices.push(PathVertex::new([0.0, 0.0], COLOR));
    for i in 0..rim {
        let r = if i % 2 == 0 { radius } else { radius * 0.45 };
        let a = angle + i as f32 * TAU / rim as f32;
        vertices.push(PathVertex::new([r * a.cos(), r * a.sin()], COLOR));
    }

    let mut indices = Vec::with_capacity(rim * 3);
    for i in 0..rim as IndexType {
        indices.extend_from_slice(&[0, 1 + i, 1 + (i + 1) % rim as IndexType]);
    }
    (vertices, indices)
}
