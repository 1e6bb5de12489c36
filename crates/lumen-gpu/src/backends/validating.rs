use crate::bitmap::Bitmap;
use crate::protocol::{
    CommandList, DriverConfig, GeometryId, GpuDriver, IndexBuffer, LiveCounts, ProtocolMonitor,
    RenderBufferDesc, RenderBufferId, ResourceKind, TextureId, VertexBuffer, Violations,
};

/// Checks every call against the protocol before it reaches `D`.
///
/// Violations go through the configured policy: panic, or log and drop the call.
/// Invalid commands are removed from a published list; the rest are forwarded.
#[derive(Debug)]
pub struct ValidatingDriver<D> {
    inner: D,
    monitor: ProtocolMonitor,
}

impl<D: GpuDriver> ValidatingDriver<D> {
    pub fn new(inner: D, config: &DriverConfig) -> Self {
        Self { inner, monitor: ProtocolMonitor::new(config) }
    }

    #[inline]
    pub fn inner(&self) -> &D {
        &self.inner
    }

    #[inline]
    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    #[inline]
    pub fn monitor(&self) -> &ProtocolMonitor {
        &self.monitor
    }

    #[inline]
    pub fn violations(&self) -> &Violations {
        self.monitor.violations()
    }

    #[inline]
    pub fn live_counts(&self) -> LiveCounts {
        self.monitor.live_counts()
    }

    /// Flags a pass left open and returns the monitor for inspection.
    pub fn finish(mut self) -> (D, ProtocolMonitor) {
        self.monitor.on_stream_end();
        (self.inner, self.monitor)
    }
}

impl<D: GpuDriver> GpuDriver for ValidatingDriver<D> {
    fn begin_synchronize(&mut self) {
        if self.monitor.on_begin_synchronize() {
            self.inner.begin_synchronize();
        }
    }

    fn end_synchronize(&mut self) {
        if self.monitor.on_end_synchronize() {
            self.inner.end_synchronize();
        }
    }

    fn next_texture_id(&mut self) -> TextureId {
        let id = self.inner.next_texture_id();
        self.monitor.observe_id(ResourceKind::Texture, id.get());
        id
    }

    fn create_texture(&mut self, texture_id: TextureId, bitmap: &Bitmap) {
        if self.monitor.on_create_texture(texture_id, bitmap) {
            self.inner.create_texture(texture_id, bitmap);
        }
    }

    fn update_texture(&mut self, texture_id: TextureId, bitmap: &Bitmap) {
        if self.monitor.on_update_texture(texture_id, bitmap) {
            self.inner.update_texture(texture_id, bitmap);
        }
    }

    fn destroy_texture(&mut self, texture_id: TextureId) {
        if self.monitor.on_destroy_texture(texture_id) {
            self.inner.destroy_texture(texture_id);
        }
    }

    fn next_render_buffer_id(&mut self) -> RenderBufferId {
        let id = self.inner.next_render_buffer_id();
        self.monitor.observe_id(ResourceKind::RenderBuffer, id.get());
        id
    }

    fn create_render_buffer(&mut self, id: RenderBufferId, desc: &RenderBufferDesc) {
        if self.monitor.on_create_render_buffer(id, desc) {
            self.inner.create_render_buffer(id, desc);
        }
    }

    fn destroy_render_buffer(&mut self, id: RenderBufferId) {
        if self.monitor.on_destroy_render_buffer(id) {
            self.inner.destroy_render_buffer(id);
        }
    }

    fn next_geometry_id(&mut self) -> GeometryId {
        let id = self.inner.next_geometry_id();
        self.monitor.observe_id(ResourceKind::Geometry, id.get());
        id
    }

    fn create_geometry(&mut self, id: GeometryId, v: VertexBuffer<'_>, i: IndexBuffer<'_>) {
        if self.monitor.on_create_geometry(id, v, i) {
            self.inner.create_geometry(id, v, i);
        }
    }

    fn update_geometry(&mut self, id: GeometryId, v: VertexBuffer<'_>, i: IndexBuffer<'_>) {
        if self.monitor.on_update_geometry(id, v, i) {
            self.inner.update_geometry(id, v, i);
        }
    }

    fn destroy_geometry(&mut self, id: GeometryId) {
        if self.monitor.on_destroy_geometry(id) {
            self.inner.destroy_geometry(id);
        }
    }

    fn update_command_list(&mut self, list: &CommandList) {
        if let Some(list) = self.monitor.on_update_command_list(list) {
            self.inner.update_command_list(&list);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::NullDriver;
    use crate::protocol::{synchronize, GpuState, ProtocolError, ViolationPolicy};

    fn lenient() -> ValidatingDriver<NullDriver> {
        ValidatingDriver::new(NullDriver::new(), &DriverConfig::lenient())
    }

    #[test]
    fn skipped_calls_do_not_reach_inner() {
        let mut d = lenient();
        let tex = d.next_texture_id();
        d.create_texture(tex, &Bitmap::empty());
        assert_eq!(d.inner().counts().texture_calls, 0);
        assert_eq!(d.violations().total(), 1);
    }

    #[test]
    fn clean_session_forwards_everything() {
        let mut d = lenient();
        {
            let mut pass = synchronize(&mut d);
            let tex = pass.create_render_target();
            let rb = pass.create_render_buffer(tex, 16, 16);
            let mut list = CommandList::new();
            list.clear_render_buffer(GpuState::new(rb, 16, 16));
            pass.update_command_list(&list);
        }
        assert!(d.violations().is_empty());
        assert_eq!(d.inner().counts().commands, 1);
        assert_eq!(d.live_counts().render_buffers, 1);
    }

    #[test]
    fn destroyed_geometry_draw_is_dropped() {
        let mut d = lenient();
        let verts = [crate::protocol::PathVertex::default(); 3];
        let mut pass = synchronize(&mut d);
        let tex = pass.create_render_target();
        let rb = pass.create_render_buffer(tex, 4, 4);
        let geo = pass.create_geometry(
            VertexBuffer::from_path_vertices(&verts),
            IndexBuffer::from_indices(&[0, 1, 2]),
        );
        pass.destroy_geometry(geo);
        let mut list = CommandList::new();
        list.draw_geometry(GpuState::new(rb, 4, 4), geo, 3, 0);
        pass.update_command_list(&list);
        pass.finish();

        assert_eq!(d.inner().counts().commands, 0);
        assert!(matches!(
            d.violations().last(),
            Some(ProtocolError::UnknownId { kind: ResourceKind::Geometry, .. })
        ));
    }

    #[test]
    fn open_pass_is_flagged_at_finish() {
        let mut d = lenient();
        d.begin_synchronize();
        let (_, monitor) = d.finish();
        assert_eq!(monitor.violations().last(), Some(&ProtocolError::UnclosedSynchronize));
    }

    #[test]
    #[should_panic(expected = "begin_synchronize called while a pass is already open")]
    fn panic_policy_catches_nesting() {
        let config = DriverConfig { violation_policy: ViolationPolicy::Panic, ..DriverConfig::default() };
        let mut d = ValidatingDriver::new(NullDriver::new(), &config);
        d.begin_synchronize();
        d.begin_synchronize();
    }
}
