//! CPU reference backend.
//!
//! Executes command lists deterministically into BGRA8 bitmaps. Render buffers
//! draw straight into their backing texture's pixels, so a texture created with
//! pixel data and then used as a render buffer starts out with that content.
//!
//! Clip stacks and uniforms are carried but not interpreted.

mod raster;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::bitmap::{Bitmap, BitmapFormat};
use crate::coords::IntRect;
use crate::math::apply_projection;
use crate::protocol::{
    Command, CommandList, DriverConfig, GeometryId, GpuDriver, GpuState, IndexBuffer, IndexType,
    LiveCounts, PathVertex, ProtocolError, QuadVertex, RenderBufferDesc, RenderBufferId,
    ResourceKind, ResourceRegistry, ShaderType, SyncState, TextureEntry, TextureId, VertexBuffer,
    VertexBufferFormat, Violations, read_indices, read_vertex,
};

use raster::{DrawParams, RasterVertex};

/// Pixel storage of one texture. Empty until a render buffer allocates it.
#[derive(Debug, Default)]
pub struct SoftwareTexture {
    pixels: RwLock<Bitmap>,
}

impl SoftwareTexture {
    fn from_bitmap(bitmap: &Bitmap) -> Self {
        Self { pixels: RwLock::new(bitmap.clone()) }
    }
}

/// Owned copy of a geometry's buffers.
#[derive(Debug)]
pub struct SoftwareGeometry {
    format: VertexBufferFormat,
    vertices: Vec<u8>,
    indices: Vec<IndexType>,
}

impl SoftwareGeometry {
    fn copy(vertices: VertexBuffer<'_>, indices: IndexBuffer<'_>) -> Self {
        Self {
            format: vertices.format,
            vertices: vertices.data.to_vec(),
            indices: read_indices(indices.data),
        }
    }

    fn vertex(&self, i: IndexType) -> Option<(f32, f32, [u8; 4], [f32; 2])> {
        match self.format {
            VertexBufferFormat::Path => {
                read_vertex::<PathVertex>(&self.vertices, i as usize).map(|v| (v.pos[0], v.pos[1], v.color, [0.0; 2]))
            }
            VertexBufferFormat::Quad => {
                read_vertex::<QuadVertex>(&self.vertices, i as usize).map(|v| (v.pos[0], v.pos[1], v.color, v.tex))
            }
        }
    }
}

/// Work done by one [`SoftwareDriver::draw_command_list`] call.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DrawStats {
    pub clears: u32,
    /// Indexed draw calls executed.
    pub draws: u32,
    pub indices: u64,
    pub pixels_written: u64,
    /// Commands dropped because a referenced resource was gone at draw time.
    pub skipped: u32,
}

/// CPU implementation of [`GpuDriver`].
#[derive(Debug)]
pub struct SoftwareDriver {
    registry: ResourceRegistry<SoftwareTexture, SoftwareGeometry>,
    sync: SyncState,
    violations: Violations,
    pending: Option<CommandList>,
    lists_drawn: u64,
}

impl Default for SoftwareDriver {
    fn default() -> Self {
        Self::new(&DriverConfig::default())
    }
}

impl SoftwareDriver {
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            registry: ResourceRegistry::new(),
            sync: SyncState::new(),
            violations: Violations::new(config),
            pending: None,
            lists_drawn: 0,
        }
    }

    #[inline]
    pub fn violations(&self) -> &Violations {
        &self.violations
    }

    #[inline]
    pub fn live_counts(&self) -> LiveCounts {
        self.registry.live_counts()
    }

    /// True when a published list has not been drawn yet.
    #[inline]
    pub fn has_commands_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|l| !l.is_empty())
    }

    /// Number of lists executed so far.
    #[inline]
    pub fn lists_drawn(&self) -> u64 {
        self.lists_drawn
    }

    /// Copy of a render buffer's pixels (BGRA8, `width x height` of its description).
    pub fn read_render_buffer(&self, id: RenderBufferId) -> Option<Bitmap> {
        let entry = self.registry.render_buffer(id)?;
        let pixels = entry.texture.backing.pixels.read();
        Some(crop(&pixels, entry.desc.width, entry.desc.height))
    }

    /// Copy of a texture's pixels as stored.
    pub fn read_texture(&self, id: TextureId) -> Option<Bitmap> {
        self.registry.texture(id).map(|t| t.backing.pixels.read().clone())
    }

    /// Executes the pending command list in order.
    ///
    /// Call outside a synchronization pass, after `end_synchronize`. Does nothing when
    /// no list is pending.
    pub fn draw_command_list(&mut self) -> DrawStats {
        let mut stats = DrawStats::default();
        let Some(list) = self.pending.take() else {
            return stats;
        };
        if self.sync.is_open() {
            log::warn!("drawing a command list while a synchronization pass is open");
        }

        for command in &list {
            // Resources may have been destroyed after the list was published.
            if let Err(e) = self.registry.validate_command(command) {
                self.violations.report(e);
                stats.skipped += 1;
                continue;
            }
            match command {
                Command::ClearRenderBuffer { state } => {
                    self.with_target(state, |target, _| raster::clear(target));
                    stats.clears += 1;
                }
                Command::DrawGeometry { state, geometry_id, indices_count, indices_offset } => {
                    stats.pixels_written += self.draw(state, *geometry_id, *indices_offset, *indices_count);
                    stats.draws += 1;
                    stats.indices += *indices_count as u64;
                }
            }
        }

        self.lists_drawn += 1;
        log::trace!("command list {} drawn: {stats:?}", self.lists_drawn);
        stats
    }

    fn with_target<R>(&self, state: &GpuState, f: impl FnOnce(&mut Bitmap, IntRect) -> R) -> Option<R> {
        let rb = self.registry.render_buffer(state.render_buffer_id)?;
        let mut pixels = rb.texture.backing.pixels.write();
        let bounds = IntRect::from_size(rb.desc.width.min(pixels.width()), rb.desc.height.min(pixels.height()));
        Some(f(&mut pixels, bounds))
    }

    fn draw(&self, state: &GpuState, geometry_id: GeometryId, offset: u32, count: u32) -> u64 {
        let Some(geometry) = self.registry.geometry(geometry_id) else {
            return 0;
        };

        let viewport = state.viewport();
        let mvp = apply_projection(state.transform, viewport.width, viewport.height, false);
        let (vw, vh) = (viewport.width, viewport.height);
        let to_pixels = |i: IndexType| -> Option<RasterVertex> {
            let (x, y, color, uv) = geometry.backing.vertex(i)?;
            let p = mvp.transform_point(x, y);
            if p[3] == 0.0 {
                return None;
            }
            let (nx, ny) = (p[0] / p[3], p[1] / p[3]);
            Some(RasterVertex {
                x: (nx + 1.0) * 0.5 * vw,
                y: (1.0 - ny) * 0.5 * vh,
                color: color.map(raster::unorm),
                uv,
            })
        };

        let sampled: Option<Arc<TextureEntry<SoftwareTexture>>> = match state.shader_type {
            ShaderType::Fill => state.primary_texture().and_then(|t| self.registry.texture(t).cloned()),
            ShaderType::FillPath => None,
        };
        let sampled_pixels = sampled.as_ref().map(|t| t.backing.pixels.read());

        let start = offset as usize;
        let Some(indices) = geometry.backing.indices.get(start..start + count as usize) else {
            return 0;
        };

        self.with_target(state, |target, bounds| {
            let clip = if state.enable_scissor {
                match state.scissor_rect.intersect(bounds) {
                    Some(r) => r,
                    None => return 0,
                }
            } else {
                bounds
            };
            let params = DrawParams {
                clip,
                texture: sampled_pixels.as_deref(),
                blend: state.enable_blend,
            };

            let mut written = 0;
            for tri in indices.chunks_exact(3) {
                let (Some(a), Some(b), Some(c)) = (to_pixels(tri[0]), to_pixels(tri[1]), to_pixels(tri[2])) else {
                    log::debug!("{geometry_id}: triangle references a vertex out of range; skipped");
                    continue;
                };
                written += raster::fill_triangle(target, [a, b, c], &params);
            }
            written
        })
        .unwrap_or(0)
    }

    fn admit(&mut self, call: &'static str) -> bool {
        let r = self.sync.require_open(call);
        self.violations.check(r).is_some()
    }
}

/// Top-left `width x height` region of `src`, or a clone when the sizes match.
fn crop(src: &Bitmap, width: u32, height: u32) -> Bitmap {
    if src.width() == width && src.height() == height {
        return src.clone();
    }
    let (w, h) = (width.min(src.width()), height.min(src.height()));
    let mut out = Bitmap::new(w, h, src.format());
    let row = (w * src.bpp()) as usize;
    for y in 0..h {
        let start = (y * out.row_bytes()) as usize;
        out.pixels_mut()[start..start + row].copy_from_slice(&src.row(y)[..row]);
    }
    out
}

impl GpuDriver for SoftwareDriver {
    fn begin_synchronize(&mut self) {
        let r = self.sync.begin();
        self.violations.check(r);
    }

    fn end_synchronize(&mut self) {
        let r = self.sync.end();
        self.violations.check(r);
    }

    fn next_texture_id(&mut self) -> TextureId {
        self.registry.next_texture_id()
    }

    fn create_texture(&mut self, texture_id: TextureId, bitmap: &Bitmap) {
        if !self.admit("create_texture") {
            return;
        }
        let r = self
            .registry
            .create_texture(texture_id, bitmap, SoftwareTexture::from_bitmap)
            .map(|_| ());
        self.violations.check(r);
    }

    fn update_texture(&mut self, texture_id: TextureId, bitmap: &Bitmap) {
        if !self.admit("update_texture") {
            return;
        }
        match self.registry.update_texture(texture_id, bitmap) {
            Ok(entry) => *entry.backing.pixels.write() = bitmap.clone(),
            Err(e) => self.violations.report(e),
        }
    }

    fn destroy_texture(&mut self, texture_id: TextureId) {
        if !self.admit("destroy_texture") {
            return;
        }
        let r = self.registry.destroy_texture(texture_id).map(|_| ());
        self.violations.check(r);
    }

    fn next_render_buffer_id(&mut self) -> RenderBufferId {
        self.registry.next_render_buffer_id()
    }

    fn create_render_buffer(&mut self, id: RenderBufferId, desc: &RenderBufferDesc) {
        if !self.admit("create_render_buffer") {
            return;
        }
        let entry = match self.registry.create_render_buffer(id, desc) {
            Ok(entry) => entry,
            Err(e) => return self.violations.report(e),
        };
        let mut pixels = entry.texture.backing.pixels.write();
        let fits = pixels.format() == BitmapFormat::Bgra8UnormSrgb
            && pixels.width() >= desc.width
            && pixels.height() >= desc.height;
        if !fits {
            if !pixels.is_empty() {
                log::warn!(
                    "{id}: backing {} ({}x{} {:?}) cannot hold {}x{} BGRA; storage reallocated",
                    desc.texture_id,
                    pixels.width(),
                    pixels.height(),
                    pixels.format(),
                    desc.width,
                    desc.height
                );
            }
            match Bitmap::try_new(desc.width, desc.height, BitmapFormat::Bgra8UnormSrgb) {
                Ok(storage) => *pixels = storage,
                Err(e) => log::error!("{id}: storage not allocated: {e}"),
            }
        }
    }

    fn destroy_render_buffer(&mut self, id: RenderBufferId) {
        if !self.admit("destroy_render_buffer") {
            return;
        }
        let r = self.registry.destroy_render_buffer(id).map(|_| ());
        self.violations.check(r);
    }

    fn next_geometry_id(&mut self) -> GeometryId {
        self.registry.next_geometry_id()
    }

    fn create_geometry(&mut self, id: GeometryId, v: VertexBuffer<'_>, i: IndexBuffer<'_>) {
        if !self.admit("create_geometry") {
            return;
        }
        let r = self.registry.create_geometry(id, v, i, SoftwareGeometry::copy).map(|_| ());
        self.violations.check(r);
    }

    fn update_geometry(&mut self, id: GeometryId, v: VertexBuffer<'_>, i: IndexBuffer<'_>) {
        if !self.admit("update_geometry") {
            return;
        }
        let r = self
            .registry
            .update_geometry(id, v, i, |g, v, i| *g = SoftwareGeometry::copy(v, i))
            .map(|_| ());
        self.violations.check(r);
    }

    fn destroy_geometry(&mut self, id: GeometryId) {
        if !self.admit("destroy_geometry") {
            return;
        }
        let r = self.registry.destroy_geometry(id).map(|_| ());
        self.violations.check(r);
    }

    fn update_command_list(&mut self, list: &CommandList) {
        let r = self.sync.note_command_list();
        if self.violations.check(r).is_none() {
            return;
        }
        let mut kept = list.clone();
        let mut rejected: Vec<ProtocolError> = Vec::new();
        kept.retain(|cmd| match self.registry.validate_command(cmd) {
            Ok(()) => true,
            Err(e) => {
                rejected.push(e);
                false
            }
        });
        for e in rejected {
            self.violations.report(e);
        }
        if self.pending.is_some() {
            log::debug!("undrawn command list replaced");
        }
        self.pending = Some(kept);
    }
}

impl SoftwareDriver {
    /// Whether `raw` names a live resource of `kind`.
    pub fn is_live(&self, kind: ResourceKind, raw: u32) -> bool {
        match kind {
            ResourceKind::Texture => TextureId::new(raw).is_some_and(|id| self.registry.texture(id).is_some()),
            ResourceKind::RenderBuffer => {
                RenderBufferId::new(raw).is_some_and(|id| self.registry.render_buffer(id).is_some())
            }
            ResourceKind::Geometry => GeometryId::new(raw).is_some_and(|id| self.registry.geometry(id).is_some()),
        }
    }
}
