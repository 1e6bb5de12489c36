//! Hardware backend on a headless wgpu device.
//!
//! Textures and geometry are real GPU objects. A published command list is
//! executed by [`WgpuDriver::draw_command_list`]: state uniforms are uploaded in one
//! buffer and bound with dynamic offsets, and consecutive commands that target the
//! same render buffer share a render pass.

mod device;
mod pipeline;
mod readback;
mod uniform;

pub use device::{HeadlessGpu, WgpuInit};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use wgpu::util::DeviceExt;

use crate::bitmap::{Bitmap, BitmapFormat};
use crate::coords::IntRect;
use crate::protocol::{
    Command, CommandList, DriverConfig, GeometryId, GpuDriver, IndexBuffer, LiveCounts,
    ProtocolError, RenderBufferDesc, RenderBufferId, ResourceRegistry, SyncState, TextureId,
    VertexBuffer, VertexBufferFormat, Violations,
};

use pipeline::{PipelineKey, Pipelines, TARGET_FORMAT};
use uniform::{StateUniform, uniform_stride};

/// Allocated GPU storage of a texture.
#[derive(Debug, Clone)]
struct GpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: BitmapFormat,
}

/// Texture payload. Render targets have no storage until a render buffer is created.
#[derive(Debug, Default)]
pub struct WgpuTexture {
    image: Mutex<Option<GpuImage>>,
}

impl WgpuTexture {
    fn image(&self) -> Option<GpuImage> {
        self.image.lock().clone()
    }
}

/// Geometry payload.
#[derive(Debug)]
pub struct WgpuGeometry {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    format: VertexBufferFormat,
}

/// Work done by one [`WgpuDriver::draw_command_list`] call.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GpuFrameStats {
    pub render_passes: u32,
    pub clears: u32,
    pub draws: u32,
    pub skipped: u32,
}

fn texture_format(format: BitmapFormat) -> wgpu::TextureFormat {
    match format {
        BitmapFormat::A8Unorm => wgpu::TextureFormat::R8Unorm,
        BitmapFormat::Bgra8UnormSrgb => TARGET_FORMAT,
    }
}

fn texture_usage(format: BitmapFormat) -> wgpu::TextureUsages {
    let base = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
    match format {
        BitmapFormat::A8Unorm => base,
        BitmapFormat::Bgra8UnormSrgb => {
            base | wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC
        }
    }
}

/// Buffers may not be empty or unaligned; pad to a multiple of 4 bytes.
fn buffer_contents(data: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    if !data.is_empty() && data.len() % align == 0 {
        return data.into();
    }
    let mut padded = data.to_vec();
    padded.resize(data.len().max(1).div_ceil(align) * align, 0);
    padded.into()
}

/// Creates a texture sized to `bitmap` and uploads its pixels, if any.
fn upload_image(gpu: &HeadlessGpu, bitmap: &Bitmap) -> GpuImage {
    let format = bitmap.format();
    let size = wgpu::Extent3d {
        width: bitmap.width(),
        height: bitmap.height(),
        depth_or_array_layers: 1,
    };
    let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("lumen texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: texture_format(format),
        usage: texture_usage(format),
        view_formats: &[],
    });
    if !bitmap.is_empty() {
        gpu.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bitmap.pixels(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bitmap.row_bytes()),
                rows_per_image: Some(bitmap.height()),
            },
            size,
        );
    }
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuImage { texture, view, width: bitmap.width(), height: bitmap.height(), format }
}

/// One command ready for encoding.
enum Prepared {
    Clear {
        target: RenderBufferId,
        view: wgpu::TextureView,
    },
    Draw {
        target: RenderBufferId,
        view: wgpu::TextureView,
        key: PipelineKey,
        uniform_offset: u32,
        textures: wgpu::BindGroup,
        vertices: wgpu::Buffer,
        indices: wgpu::Buffer,
        range: std::ops::Range<u32>,
        scissor: (u32, u32, u32, u32),
    },
}

impl Prepared {
    fn target(&self) -> RenderBufferId {
        match self {
            Prepared::Clear { target, .. } | Prepared::Draw { target, .. } => *target,
        }
    }
}

/// wgpu implementation of [`GpuDriver`].
pub struct WgpuDriver {
    gpu: HeadlessGpu,
    pipelines: Pipelines,
    sampler: wgpu::Sampler,
    blank: wgpu::TextureView,

    uniforms: Option<wgpu::Buffer>,
    uniform_capacity: usize,
    uniform_stride: u64,

    registry: ResourceRegistry<WgpuTexture, WgpuGeometry>,
    sync: SyncState,
    violations: Violations,
    pending: Option<CommandList>,
}

impl WgpuDriver {
    pub fn new(gpu: HeadlessGpu, config: &DriverConfig) -> Self {
        let device = gpu.device();
        let pipelines = Pipelines::new(device);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lumen nearest sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        // Bound to empty texture slots.
        let blank = device
            .create_texture_with_data(
                gpu.queue(),
                &wgpu::TextureDescriptor {
                    label: Some("lumen blank texture"),
                    size: wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: TARGET_FORMAT,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &[255, 255, 255, 255],
            )
            .create_view(&wgpu::TextureViewDescriptor::default());

        let uniform_stride = uniform_stride(device.limits().min_uniform_buffer_offset_alignment);

        Self {
            pipelines,
            sampler,
            blank,
            uniforms: None,
            uniform_capacity: 0,
            uniform_stride,
            registry: ResourceRegistry::new(),
            sync: SyncState::new(),
            violations: Violations::new(config),
            pending: None,
            gpu,
        }
    }

    /// Acquires a headless device and builds the driver on it.
    pub fn new_blocking(init: WgpuInit, config: &DriverConfig) -> Result<Self> {
        Ok(Self::new(HeadlessGpu::new_blocking(init)?, config))
    }

    #[inline]
    pub fn gpu(&self) -> &HeadlessGpu {
        &self.gpu
    }

    #[inline]
    pub fn violations(&self) -> &Violations {
        &self.violations
    }

    #[inline]
    pub fn live_counts(&self) -> LiveCounts {
        self.registry.live_counts()
    }

    #[inline]
    pub fn has_commands_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|l| !l.is_empty())
    }

    /// Reads a render buffer back to the CPU (BGRA8).
    pub fn read_render_buffer(&self, id: RenderBufferId) -> Result<Bitmap> {
        let entry = self
            .registry
            .render_buffer(id)
            .with_context(|| format!("{id} does not exist"))?;
        let image = entry
            .texture
            .backing
            .image()
            .with_context(|| format!("{id} has no storage"))?;
        let (w, h) = (entry.desc.width.min(image.width), entry.desc.height.min(image.height));
        readback::read_texture(self.gpu.device(), self.gpu.queue(), &image.texture, w, h)
    }

    // ── resources ─────────────────────────────────────────────────────────

    fn upload_geometry(device: &wgpu::Device, v: VertexBuffer<'_>, i: IndexBuffer<'_>) -> WgpuGeometry {
        WgpuGeometry {
            vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("lumen geometry vbo"),
                contents: &buffer_contents(v.data),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            }),
            indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("lumen geometry ibo"),
                contents: &buffer_contents(i.data),
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            }),
            format: v.format,
        }
    }

    fn admit(&mut self, call: &'static str) -> bool {
        let r = self.sync.require_open(call);
        self.violations.check(r).is_some()
    }

    fn ensure_uniform_capacity(&mut self, required: usize) {
        if required <= self.uniform_capacity && self.uniforms.is_some() {
            return;
        }
        let cap = required.next_power_of_two().max(16);
        self.uniforms = Some(self.gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen state ubo"),
            size: cap as u64 * self.uniform_stride,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.uniform_capacity = cap;
    }

    // ── drawing ───────────────────────────────────────────────────────────

    fn texture_bind_group(&self, slots: &[Option<GpuImage>; 3]) -> wgpu::BindGroup {
        let view = |i: usize| slots[i].as_ref().map_or(&self.blank, |img| &img.view);
        self.gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen texture bind group"),
            layout: &self.pipelines.texture_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(view(0)) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(view(1)) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(view(2)) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(&self.sampler) },
            ],
        })
    }

    fn prepare(&self, command: &Command, index: usize, uniforms: &mut Vec<StateUniform>) -> Option<Prepared> {
        let state = command.state();
        let rb = self.registry.render_buffer(state.render_buffer_id)?;
        let target = rb.texture.backing.image()?;
        let view = target.view.clone();
        let (tw, th) = (rb.desc.width.min(target.width), rb.desc.height.min(target.height));

        let Command::DrawGeometry { geometry_id, indices_count, indices_offset, .. } = command else {
            return Some(Prepared::Clear { target: rb.id, view });
        };

        let geometry = self.registry.geometry(*geometry_id)?;

        let mut slots: [Option<GpuImage>; 3] = [None, None, None];
        for (slot, id) in slots.iter_mut().zip(state.textures) {
            *slot = id
                .and_then(|id| self.registry.texture(id))
                .and_then(|t| t.backing.image());
        }

        let bounds = IntRect::from_size(tw, th);
        let clip = if state.enable_scissor { state.scissor_rect.intersect(bounds)? } else { bounds };

        uniforms.push(StateUniform::new(state, tw, th, slots.each_ref().map(|s| s.as_ref().map(|i| i.format))));
        log::trace!("command {index}: draw {geometry_id} x{indices_count}");

        Some(Prepared::Draw {
            target: rb.id,
            view,
            key: PipelineKey { format: geometry.format, shader: state.shader_type, blend: state.enable_blend },
            uniform_offset: ((uniforms.len() - 1) as u64 * self.uniform_stride) as u32,
            textures: self.texture_bind_group(&slots),
            vertices: geometry.backing.vertices.clone(),
            indices: geometry.backing.indices.clone(),
            range: *indices_offset..indices_offset + indices_count,
            scissor: (clip.left as u32, clip.top as u32, clip.width() as u32, clip.height() as u32),
        })
    }

    /// Executes the pending command list and submits it to the queue.
    pub fn draw_command_list(&mut self) -> GpuFrameStats {
        let mut stats = GpuFrameStats::default();
        let Some(list) = self.pending.take() else {
            return stats;
        };

        let mut uniforms = Vec::new();
        let mut prepared = Vec::with_capacity(list.len());
        for (index, command) in list.iter().enumerate() {
            if let Err(e) = self.registry.validate_command(command) {
                self.violations.report(e);
                stats.skipped += 1;
                continue;
            }
            match self.prepare(command, index, &mut uniforms) {
                Some(p) => prepared.push(p),
                None => stats.skipped += 1,
            }
        }
        if prepared.is_empty() {
            return stats;
        }

        self.ensure_uniform_capacity(uniforms.len());
        let Some(ubo) = self.uniforms.clone() else { return stats };
        for (i, u) in uniforms.iter().enumerate() {
            self.gpu.queue().write_buffer(&ubo, i as u64 * self.uniform_stride, bytemuck::bytes_of(u));
        }
        let state_group = self.gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen state bind group"),
            layout: &self.pipelines.state_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &ubo,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<StateUniform>() as u64),
                }),
            }],
        });

        for p in &prepared {
            if let Prepared::Draw { key, .. } = p {
                self.pipelines.get(self.gpu.device(), *key);
            }
        }

        let mut encoder = self.gpu.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lumen command list encoder"),
        });

        // A clear always opens a pass; otherwise a pass lasts while the target is unchanged.
        let mut start = 0;
        while start < prepared.len() {
            let target = prepared[start].target();
            let mut end = start + 1;
            while end < prepared.len()
                && prepared[end].target() == target
                && matches!(prepared[end], Prepared::Draw { .. })
            {
                end += 1;
            }

            let (view, load) = match &prepared[start] {
                Prepared::Clear { view, .. } => (view, wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)),
                Prepared::Draw { view, .. } => (view, wgpu::LoadOp::Load),
            };

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen command pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            stats.render_passes += 1;

            for p in &prepared[start..end] {
                match p {
                    Prepared::Clear { .. } => stats.clears += 1,
                    Prepared::Draw { key, uniform_offset, textures, vertices, indices, range, scissor, .. } => {
                        let Some(pipeline) = self.pipelines.cached(key) else { continue };
                        rpass.set_pipeline(pipeline);
                        rpass.set_bind_group(0, &state_group, &[*uniform_offset]);
                        rpass.set_bind_group(1, textures, &[]);
                        rpass.set_vertex_buffer(0, vertices.slice(..));
                        rpass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                        let (x, y, w, h) = *scissor;
                        rpass.set_scissor_rect(x, y, w, h);
                        rpass.draw_indexed(range.clone(), 0, 0..1);
                        stats.draws += 1;
                    }
                }
            }
            drop(rpass);
            start = end;
        }

        self.gpu.queue().submit(std::iter::once(encoder.finish()));
        log::trace!("command list submitted: {stats:?}");
        stats
    }
}

impl GpuDriver for WgpuDriver {
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
        let gpu = &self.gpu;
        let r = self
            .registry
            .create_texture(texture_id, bitmap, |b| WgpuTexture {
                image: Mutex::new((!b.is_empty()).then(|| upload_image(gpu, b))),
            })
            .map(|_| ());
        self.violations.check(r);
    }

    fn update_texture(&mut self, texture_id: TextureId, bitmap: &Bitmap) {
        if !self.admit("update_texture") {
            return;
        }
        if let Err(e) = self.registry.update_texture(texture_id, bitmap) {
            return self.violations.report(e);
        }
        let image = upload_image(&self.gpu, bitmap);
        if let Some(entry) = self.registry.texture(texture_id) {
            *entry.backing.image.lock() = Some(image);
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
        let backing = match self.registry.create_render_buffer(id, desc) {
            Ok(entry) => entry.texture.clone(),
            Err(e) => return self.violations.report(e),
        };
        let fits = backing.backing.image().is_some_and(|img| {
            img.format == BitmapFormat::Bgra8UnormSrgb && img.width >= desc.width && img.height >= desc.height
        });
        if !fits {
            let storage = match Bitmap::try_new(desc.width, desc.height, BitmapFormat::Bgra8UnormSrgb) {
                Ok(storage) => storage,
                Err(e) => {
                    log::error!("{id}: storage not allocated: {e}");
                    return;
                }
            };
            let image = upload_image(&self.gpu, &storage);
            *backing.backing.image.lock() = Some(image);
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
        let device = self.gpu.device();
        let r = self
            .registry
            .create_geometry(id, v, i, |v, i| Self::upload_geometry(device, v, i))
            .map(|_| ());
        self.violations.check(r);
    }

    fn update_geometry(&mut self, id: GeometryId, v: VertexBuffer<'_>, i: IndexBuffer<'_>) {
        if !self.admit("update_geometry") {
            return;
        }
        let (device, queue) = (self.gpu.device(), self.gpu.queue());
        let r = self
            .registry
            .update_geometry(id, v, i, |g, v, i| {
                let vdata = buffer_contents(v.data);
                let idata = buffer_contents(i.data);
                if g.vertices.size() >= vdata.len() as u64 && g.indices.size() >= idata.len() as u64 {
                    queue.write_buffer(&g.vertices, 0, &vdata);
                    queue.write_buffer(&g.indices, 0, &idata);
                    g.format = v.format;
                } else {
                    *g = Self::upload_geometry(device, v, i);
                }
            })
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
        self.pending = Some(kept);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_contents_pads_to_four_bytes() {
        assert_eq!(buffer_contents(&[]).len(), 4);
        assert_eq!(buffer_contents(&[1, 2, 3, 4, 5]).len(), 8);
        assert!(matches!(buffer_contents(&[0; 20]), std::borrow::Cow::Borrowed(_)));
    }

    #[test]
    fn formats_map_to_gpu_formats() {
        assert_eq!(texture_format(BitmapFormat::A8Unorm), wgpu::TextureFormat::R8Unorm);
        assert_eq!(texture_format(BitmapFormat::Bgra8UnormSrgb), wgpu::TextureFormat::Bgra8Unorm);
        assert!(texture_usage(BitmapFormat::Bgra8UnormSrgb).contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(!texture_usage(BitmapFormat::A8Unorm).contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
    }
}
