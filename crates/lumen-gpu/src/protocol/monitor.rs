use std::borrow::Cow;
use std::collections::VecDeque;

use crate::bitmap::Bitmap;

use super::{
    CommandList, GeometryId, IndexBuffer, LiveCounts, ProtocolError, RenderBufferDesc,
    RenderBufferId, ResourceKind, ResourceRegistry, SyncState, TextureId, VertexBuffer,
};

/// What a backend does with a protocol violation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ViolationPolicy {
    /// Panic with the violation. Development default.
    Panic,
    /// Log it with `log::error!`, record it, and skip the offending call.
    Skip,
}

impl Default for ViolationPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) { ViolationPolicy::Panic } else { ViolationPolicy::Skip }
    }
}

/// Backend configuration shared by every driver in this crate.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub violation_policy: ViolationPolicy,
    /// How many recent violations are kept for inspection.
    pub violation_history: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            violation_policy: ViolationPolicy::default(),
            violation_history: 32,
        }
    }
}

impl DriverConfig {
    /// `Skip` policy regardless of build profile.
    pub fn lenient() -> Self {
        Self { violation_policy: ViolationPolicy::Skip, ..Self::default() }
    }
}

/// Applies a [`ViolationPolicy`] and keeps a bounded record of what it saw.
#[derive(Debug, Clone)]
pub struct Violations {
    policy: ViolationPolicy,
    capacity: usize,
    total: u64,
    recent: VecDeque<ProtocolError>,
}

impl Violations {
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            policy: config.violation_policy,
            capacity: config.violation_history,
            total: 0,
            recent: VecDeque::with_capacity(config.violation_history.min(64)),
        }
    }

    #[inline]
    pub fn policy(&self) -> ViolationPolicy {
        self.policy
    }

    /// Panics or logs and records `error`, depending on the policy.
    #[track_caller]
    pub fn report(&mut self, error: ProtocolError) {
        match self.policy {
            ViolationPolicy::Panic => panic!("GPU protocol violation: {error}"),
            ViolationPolicy::Skip => {
                log::error!("GPU protocol violation (call skipped): {error}");
                self.total += 1;
                if self.capacity == 0 {
                    return;
                }
                if self.recent.len() == self.capacity {
                    self.recent.pop_front();
                }
                self.recent.push_back(error);
            }
        }
    }

    /// `Some(value)` on success; reports and returns `None` on error.
    #[track_caller]
    pub fn check<T>(&mut self, result: Result<T, ProtocolError>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    /// Violations seen since creation, including ones evicted from the history.
    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Most recent violations, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &ProtocolError> {
        self.recent.iter()
    }

    #[inline]
    pub fn last(&self) -> Option<&ProtocolError> {
        self.recent.back()
    }

    pub fn clear(&mut self) {
        self.total = 0;
        self.recent.clear();
    }
}

/// Checks a driver call stream without doing any GPU work.
///
/// Each `on_*` method validates one call, reports any violation and returns whether
/// the call should reach the backend.
///
/// A published list is drawn after the pass that published it closes, so it is checked
/// again at `end_synchronize` against whatever that pass destroyed after publishing.
#[derive(Debug)]
pub struct ProtocolMonitor {
    registry: ResourceRegistry<(), ()>,
    sync: SyncState,
    violations: Violations,
    published: Option<CommandList>,
}

impl ProtocolMonitor {
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            registry: ResourceRegistry::new(),
            sync: SyncState::new(),
            violations: Violations::new(config),
            published: None,
        }
    }

    #[inline]
    pub fn violations(&self) -> &Violations {
        &self.violations
    }

    #[inline]
    pub fn sync(&self) -> &SyncState {
        &self.sync
    }

    /// Resources created and not yet destroyed.
    #[inline]
    pub fn live_counts(&self) -> LiveCounts {
        self.registry.live_counts()
    }

    pub fn into_violations(self) -> Violations {
        self.violations
    }

    // ── envelope ──────────────────────────────────────────────────────────

    pub fn on_begin_synchronize(&mut self) -> bool {
        let r = self.sync.begin();
        self.violations.check(r).is_some()
    }

    pub fn on_end_synchronize(&mut self) -> bool {
        let r = self.sync.end();
        let closed = self.violations.check(r).is_some();
        if let Some(list) = self.published.take() {
            for cmd in &list {
                let r = self.registry.validate_command(cmd);
                self.violations.check(r);
            }
        }
        closed
    }

    /// Reports a pass left open at the end of a call stream.
    pub fn on_stream_end(&mut self) {
        if self.sync.is_open() {
            self.violations.report(ProtocolError::UnclosedSynchronize);
        }
    }

    // ── ids ───────────────────────────────────────────────────────────────

    /// Records an id handed out by the backend.
    pub fn observe_id(&mut self, kind: ResourceKind, raw: u32) {
        let r = self.registry.ids_mut().accept(kind, raw);
        self.violations.check(r);
    }

    // ── resources ─────────────────────────────────────────────────────────

    fn open(&mut self, call: &'static str) -> bool {
        let r = self.sync.require_open(call);
        self.violations.check(r).is_some()
    }

    pub fn on_create_texture(&mut self, id: TextureId, bitmap: &Bitmap) -> bool {
        if !self.open("create_texture") {
            return false;
        }
        let r = self.registry.create_texture(id, bitmap, |_| ()).map(|_| ());
        self.violations.check(r).is_some()
    }

    pub fn on_update_texture(&mut self, id: TextureId, bitmap: &Bitmap) -> bool {
        if !self.open("update_texture") {
            return false;
        }
        let r = self.registry.update_texture(id, bitmap).map(|_| ());
        self.violations.check(r).is_some()
    }

    pub fn on_destroy_texture(&mut self, id: TextureId) -> bool {
        if !self.open("destroy_texture") {
            return false;
        }
        let r = self.registry.destroy_texture(id).map(|_| ());
        self.violations.check(r).is_some()
    }

    pub fn on_create_render_buffer(&mut self, id: RenderBufferId, desc: &RenderBufferDesc) -> bool {
        if !self.open("create_render_buffer") {
            return false;
        }
        let r = self.registry.create_render_buffer(id, desc).map(|_| ());
        self.violations.check(r).is_some()
    }

    pub fn on_destroy_render_buffer(&mut self, id: RenderBufferId) -> bool {
        if !self.open("destroy_render_buffer") {
            return false;
        }
        let r = self.registry.destroy_render_buffer(id).map(|_| ());
        self.violations.check(r).is_some()
    }

    pub fn on_create_geometry(&mut self, id: GeometryId, v: VertexBuffer<'_>, i: IndexBuffer<'_>) -> bool {
        if !self.open("create_geometry") {
            return false;
        }
        let r = self.registry.create_geometry(id, v, i, |_, _| ()).map(|_| ());
        self.violations.check(r).is_some()
    }

    pub fn on_update_geometry(&mut self, id: GeometryId, v: VertexBuffer<'_>, i: IndexBuffer<'_>) -> bool {
        if !self.open("update_geometry") {
            return false;
        }
        let r = self.registry.update_geometry(id, v, i, |_, _, _| ()).map(|_| ());
        self.violations.check(r).is_some()
    }

    pub fn on_destroy_geometry(&mut self, id: GeometryId) -> bool {
        if !self.open("destroy_geometry") {
            return false;
        }
        let r = self.registry.destroy_geometry(id).map(|_| ());
        self.violations.check(r).is_some()
    }

    // ── commands ──────────────────────────────────────────────────────────

    /// Validates a published list. Returns the list to forward with invalid commands
    /// removed, or `None` when the call itself is out of place.
    pub fn on_update_command_list<'a>(&mut self, list: &'a CommandList) -> Option<Cow<'a, CommandList>> {
        let r = self.sync.note_command_list();
        self.violations.check(r)?;

        let verdicts: Vec<Result<(), ProtocolError>> =
            list.iter().map(|c| self.registry.validate_command(c)).collect();
        if verdicts.iter().all(Result::is_ok) {
            self.published = Some(list.clone());
            return Some(Cow::Borrowed(list));
        }

        let mut kept = CommandList::with_capacity(list.len());
        for (cmd, verdict) in list.iter().zip(verdicts) {
            if self.violations.check(verdict).is_some() {
                kept.push(cmd.clone());
            }
        }
        self.published = Some(kept.clone());
        Some(Cow::Owned(kept))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Command, GpuState, PathVertex};

    fn monitor() -> ProtocolMonitor {
        ProtocolMonitor::new(&DriverConfig::lenient())
    }

    fn tex(raw: u32) -> TextureId {
        TextureId::new(raw).unwrap()
    }

    // ── Violations ────────────────────────────────────────────────────────

    #[test]
    fn history_is_bounded() {
        let mut v = Violations::new(&DriverConfig { violation_policy: ViolationPolicy::Skip, violation_history: 2 });
        v.report(ProtocolError::NestedSynchronize);
        v.report(ProtocolError::EndWithoutBegin);
        v.report(ProtocolError::IndexStride { len: 3 });
        assert_eq!(v.total(), 3);
        assert_eq!(v.recent().count(), 2);
        assert_eq!(v.last(), Some(&ProtocolError::IndexStride { len: 3 }));
    }

    #[test]
    #[should_panic(expected = "GPU protocol violation")]
    fn panic_policy_panics() {
        let mut v = Violations::new(&DriverConfig { violation_policy: ViolationPolicy::Panic, violation_history: 4 });
        v.report(ProtocolError::EndWithoutBegin);
    }

    // ── ProtocolMonitor ───────────────────────────────────────────────────

    #[test]
    fn mutation_outside_pass_is_skipped() {
        let mut m = monitor();
        m.observe_id(ResourceKind::Texture, 1);
        assert!(!m.on_create_texture(tex(1), &Bitmap::empty()));
        assert_eq!(
            m.violations().last(),
            Some(&ProtocolError::OutsideSynchronize { call: "create_texture" })
        );
        assert_eq!(m.live_counts().textures, 0);
    }

    #[test]
    fn well_formed_pass_has_no_violations() {
        let mut m = monitor();
        assert!(m.on_begin_synchronize());
        m.observe_id(ResourceKind::Texture, 1);
        assert!(m.on_create_texture(tex(1), &Bitmap::empty()));
        m.observe_id(ResourceKind::RenderBuffer, 1);
        let rb = RenderBufferId::new(1).unwrap();
        assert!(m.on_create_render_buffer(rb, &RenderBufferDesc::new(tex(1), 4, 4)));
        let mut list = CommandList::new();
        list.clear_render_buffer(GpuState::new(rb, 4, 4));
        let forwarded = m.on_update_command_list(&list).unwrap();
        assert!(matches!(forwarded, Cow::Borrowed(_)));
        assert!(m.on_end_synchronize());
        assert!(m.violations().is_empty());
    }

    #[test]
    fn invalid_commands_are_filtered() {
        let mut m = monitor();
        m.on_begin_synchronize();
        m.observe_id(ResourceKind::Texture, 1);
        m.on_create_texture(tex(1), &Bitmap::empty());
        m.observe_id(ResourceKind::RenderBuffer, 1);
        let rb = RenderBufferId::new(1).unwrap();
        m.on_create_render_buffer(rb, &RenderBufferDesc::new(tex(1), 4, 4));
        m.observe_id(ResourceKind::Geometry, 1);
        let geo = GeometryId::new(1).unwrap();
        let verts = [PathVertex::default(); 3];
        m.on_create_geometry(geo, VertexBuffer::from_path_vertices(&verts), IndexBuffer::from_indices(&[0, 1, 2]));

        let state = GpuState::new(rb, 4, 4);
        let mut list = CommandList::new();
        list.clear_render_buffer(state.clone());
        list.draw_geometry(state.clone(), geo, 6, 0);
        list.draw_geometry(state, geo, 3, 0);

        let forwarded = m.on_update_command_list(&list).unwrap().into_owned();
        assert_eq!(forwarded.len(), 2);
        assert_eq!(m.violations().total(), 1);
    }

    #[test]
    fn destroy_after_publish_is_reported_when_the_pass_closes() {
        let mut m = monitor();
        m.on_begin_synchronize();
        m.observe_id(ResourceKind::Texture, 1);
        m.on_create_texture(tex(1), &Bitmap::empty());
        m.observe_id(ResourceKind::RenderBuffer, 1);
        let rb = RenderBufferId::new(1).unwrap();
        m.on_create_render_buffer(rb, &RenderBufferDesc::new(tex(1), 4, 4));
        m.observe_id(ResourceKind::Geometry, 1);
        let geo = GeometryId::new(1).unwrap();
        let verts = [PathVertex::default(); 3];
        m.on_create_geometry(geo, VertexBuffer::from_path_vertices(&verts), IndexBuffer::from_indices(&[0, 1, 2]));

        let mut list = CommandList::new();
        list.draw_geometry(GpuState::new(rb, 4, 4), geo, 3, 0);
        m.on_update_command_list(&list);
        assert!(m.on_destroy_geometry(geo));
        assert!(m.violations().is_empty());

        assert!(m.on_end_synchronize());
        assert_eq!(
            m.violations().last(),
            Some(&ProtocolError::UnknownId { kind: ResourceKind::Geometry, id: 1 })
        );

        // Drawn once the pass closed; a later teardown is fine.
        m.on_begin_synchronize();
        m.on_destroy_render_buffer(rb);
        m.on_destroy_texture(tex(1));
        m.on_end_synchronize();
        assert_eq!(m.violations().total(), 1);
    }

    #[test]
    fn non_monotonic_backend_id_is_reported() {
        let mut m = monitor();
        m.observe_id(ResourceKind::Geometry, 2);
        m.observe_id(ResourceKind::Geometry, 2);
        assert!(matches!(m.violations().last(), Some(ProtocolError::NonMonotonicId { .. })));
    }
}
