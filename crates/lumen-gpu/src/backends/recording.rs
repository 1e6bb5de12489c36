use std::collections::HashMap;

use crate::bitmap::Bitmap;
use crate::protocol::{
    Command, CommandList, DriverConfig, GeometryId, GpuDriver, IndexBuffer, LiveCounts,
    RenderBufferDesc, RenderBufferId, TextureId, VertexBuffer, VertexBufferFormat, Violations,
};

use super::{NullDriver, ValidatingDriver};

/// One driver call with owned copies of its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    BeginSynchronize,
    EndSynchronize,
    NextTextureId(TextureId),
    CreateTexture { id: TextureId, bitmap: Bitmap },
    UpdateTexture { id: TextureId, bitmap: Bitmap },
    DestroyTexture(TextureId),
    NextRenderBufferId(RenderBufferId),
    CreateRenderBuffer { id: RenderBufferId, desc: RenderBufferDesc },
    DestroyRenderBuffer(RenderBufferId),
    NextGeometryId(GeometryId),
    CreateGeometry { id: GeometryId, format: VertexBufferFormat, vertices: Vec<u8>, indices: Vec<u8> },
    UpdateGeometry { id: GeometryId, format: VertexBufferFormat, vertices: Vec<u8>, indices: Vec<u8> },
    DestroyGeometry(GeometryId),
    UpdateCommandList(CommandList),
}

/// Outcome of [`Trace::audit`].
#[derive(Debug)]
pub struct AuditReport {
    pub violations: Violations,
    /// Resources still live when the trace ends.
    pub leaked: LiveCounts,
}

impl AuditReport {
    /// No violations and every created resource destroyed.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.leaked == LiveCounts::default()
    }
}

/// Maps ids of a recorded session to the ids a replay target issued.
#[derive(Debug, Default)]
struct IdRemap {
    textures: HashMap<TextureId, TextureId>,
    render_buffers: HashMap<RenderBufferId, RenderBufferId>,
    geometry: HashMap<GeometryId, GeometryId>,
}

impl IdRemap {
    // Ids the trace never allocated pass through unchanged so the target sees them.
    fn texture(&self, id: TextureId) -> TextureId {
        self.textures.get(&id).copied().unwrap_or(id)
    }

    fn render_buffer(&self, id: RenderBufferId) -> RenderBufferId {
        self.render_buffers.get(&id).copied().unwrap_or(id)
    }

    fn geometry(&self, id: GeometryId) -> GeometryId {
        self.geometry.get(&id).copied().unwrap_or(id)
    }

    fn command_list(&self, list: &CommandList) -> CommandList {
        let mut list = list.clone();
        for cmd in list.iter_mut() {
            if let Command::DrawGeometry { geometry_id, .. } = cmd {
                *geometry_id = self.geometry(*geometry_id);
            }
            let state = match cmd {
                Command::ClearRenderBuffer { state } | Command::DrawGeometry { state, .. } => state,
            };
            state.render_buffer_id = self.render_buffer(state.render_buffer_id);
            for slot in state.textures.iter_mut().flatten() {
                *slot = self.texture(*slot);
            }
        }
        list
    }
}

/// An owned, replayable driver call stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    calls: Vec<RecordedCall>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn push(&mut self, call: RecordedCall) {
        self.calls.push(call);
    }

    /// Number of closed passes in the trace.
    pub fn passes(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, RecordedCall::EndSynchronize)).count()
    }

    /// Re-issues every call on `target` in order.
    ///
    /// Each recorded `next_*_id` is answered by `target`'s own allocator and later
    /// references are rewritten to the new ids.
    pub fn replay(&self, target: &mut dyn GpuDriver) {
        let mut map = IdRemap::default();
        for call in &self.calls {
            match call {
                RecordedCall::BeginSynchronize => target.begin_synchronize(),
                RecordedCall::EndSynchronize => target.end_synchronize(),
                RecordedCall::NextTextureId(old) => {
                    let new = target.next_texture_id();
                    map.textures.insert(*old, new);
                }
                RecordedCall::CreateTexture { id, bitmap } => target.create_texture(map.texture(*id), bitmap),
                RecordedCall::UpdateTexture { id, bitmap } => target.update_texture(map.texture(*id), bitmap),
                RecordedCall::DestroyTexture(id) => target.destroy_texture(map.texture(*id)),
                RecordedCall::NextRenderBufferId(old) => {
                    let new = target.next_render_buffer_id();
                    map.render_buffers.insert(*old, new);
                }
                RecordedCall::CreateRenderBuffer { id, desc } => {
                    let desc = RenderBufferDesc { texture_id: map.texture(desc.texture_id), ..*desc };
                    target.create_render_buffer(map.render_buffer(*id), &desc);
                }
                RecordedCall::DestroyRenderBuffer(id) => target.destroy_render_buffer(map.render_buffer(*id)),
                RecordedCall::NextGeometryId(old) => {
                    let new = target.next_geometry_id();
                    map.geometry.insert(*old, new);
                }
                RecordedCall::CreateGeometry { id, format, vertices, indices } => target.create_geometry(
                    map.geometry(*id),
                    VertexBuffer::new(*format, vertices),
                    IndexBuffer::new(indices),
                ),
                RecordedCall::UpdateGeometry { id, format, vertices, indices } => target.update_geometry(
                    map.geometry(*id),
                    VertexBuffer::new(*format, vertices),
                    IndexBuffer::new(indices),
                ),
                RecordedCall::DestroyGeometry(id) => target.destroy_geometry(map.geometry(*id)),
                RecordedCall::UpdateCommandList(list) => target.update_command_list(&map.command_list(list)),
            }
        }
    }

    /// Replays into a lenient validator and reports violations and leaks.
    pub fn audit(&self) -> AuditReport {
        let mut validator = ValidatingDriver::new(NullDriver::new(), &DriverConfig::lenient());
        self.replay(&mut validator);
        let (_, monitor) = validator.finish();
        let leaked = monitor.live_counts();
        AuditReport { violations: monitor.into_violations(), leaked }
    }
}

/// Records every call it receives and forwards it to `D`.
///
/// Ids come from `D`. With the default [`NullDriver`] this is a pure recorder.
#[derive(Debug, Default)]
pub struct RecordingDriver<D = NullDriver> {
    inner: D,
    trace: Trace,
}

impl RecordingDriver<NullDriver> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: GpuDriver> RecordingDriver<D> {
    pub fn wrap(inner: D) -> Self {
        Self { inner, trace: Trace::new() }
    }

    #[inline]
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Takes the trace recorded so far, leaving an empty one.
    pub fn take_trace(&mut self) -> Trace {
        std::mem::take(&mut self.trace)
    }

    #[inline]
    pub fn inner(&self) -> &D {
        &self.inner
    }

    #[inline]
    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    pub fn into_parts(self) -> (D, Trace) {
        (self.inner, self.trace)
    }
}

impl<D: GpuDriver> GpuDriver for RecordingDriver<D> {
    fn begin_synchronize(&mut self) {
        self.trace.push(RecordedCall::BeginSynchronize);
        self.inner.begin_synchronize();
    }

    fn end_synchronize(&mut self) {
        self.trace.push(RecordedCall::EndSynchronize);
        self.inner.end_synchronize();
    }

    fn next_texture_id(&mut self) -> TextureId {
        let id = self.inner.next_texture_id();
        self.trace.push(RecordedCall::NextTextureId(id));
        id
    }

    fn create_texture(&mut self, id: TextureId, bitmap: &Bitmap) {
        self.trace.push(RecordedCall::CreateTexture { id, bitmap: bitmap.clone() });
        self.inner.create_texture(id, bitmap);
    }

    fn update_texture(&mut self, id: TextureId, bitmap: &Bitmap) {
        self.trace.push(RecordedCall::UpdateTexture { id, bitmap: bitmap.clone() });
        self.inner.update_texture(id, bitmap);
    }

    fn destroy_texture(&mut self, id: TextureId) {
        self.trace.push(RecordedCall::DestroyTexture(id));
        self.inner.destroy_texture(id);
    }

    fn next_render_buffer_id(&mut self) -> RenderBufferId {
        let id = self.inner.next_render_buffer_id();
        self.trace.push(RecordedCall::NextRenderBufferId(id));
        id
    }

    fn create_render_buffer(&mut self, id: RenderBufferId, desc: &RenderBufferDesc) {
        self.trace.push(RecordedCall::CreateRenderBuffer { id, desc: *desc });
        self.inner.create_render_buffer(id, desc);
    }

    fn destroy_render_buffer(&mut self, id: RenderBufferId) {
        self.trace.push(RecordedCall::DestroyRenderBuffer(id));
        self.inner.destroy_render_buffer(id);
    }

    fn next_geometry_id(&mut self) -> GeometryId {
        let id = self.inner.next_geometry_id();
        self.trace.push(RecordedCall::NextGeometryId(id));
        id
    }

    fn create_geometry(&mut self, id: GeometryId, v: VertexBuffer<'_>, i: IndexBuffer<'_>) {
        self.trace.push(RecordedCall::CreateGeometry {
            id,
            format: v.format,
            vertices: v.data.to_vec(),
            indices: i.data.to_vec(),
        });
        self.inner.create_geometry(id, v, i);
    }

    fn update_geometry(&mut self, id: GeometryId, v: VertexBuffer<'_>, i: IndexBuffer<'_>) {
        self.trace.push(RecordedCall::UpdateGeometry {
            id,
            format: v.format,
            vertices: v.data.to_vec(),
            indices: i.data.to_vec(),
        });
        self.inner.update_geometry(id, v, i);
    }

    fn destroy_geometry(&mut self, id: GeometryId) {
        self.trace.push(RecordedCall::DestroyGeometry(id));
        self.inner.destroy_geometry(id);
    }

    fn update_command_list(&mut self, list: &CommandList) {
        self.trace.push(RecordedCall::UpdateCommandList(list.clone()));
        self.inner.update_command_list(list);
    }
}
