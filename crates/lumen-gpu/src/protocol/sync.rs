//! Synchronization envelope.
//!
//! ```text
//! Idle --begin--> Synchronizing --(create/update/destroy)*--> Synchronizing
//! Synchronizing --update_command_list--> Synchronizing   (once per pass by convention)
//! Synchronizing --end--> Idle
//! ```
//!
//! [`SyncState`] is the backend-side checker. [`SyncScope`] is the producer side: it
//! opens a pass on creation and closes it on drop, so a pass cannot be left open.

use crate::bitmap::Bitmap;

use super::{
    CommandList, GeometryId, GpuDriver, IndexBuffer, ProtocolError, RenderBufferDesc,
    RenderBufferId, TextureId, VertexBuffer,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Synchronizing,
}

/// Tracks the envelope a backend is in.
#[derive(Debug, Default, Clone)]
pub struct SyncState {
    phase: SyncPhase,
    passes_completed: u64,
    lists_this_pass: u32,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.phase == SyncPhase::Synchronizing
    }

    /// Number of closed passes so far.
    #[inline]
    pub fn passes_completed(&self) -> u64 {
        self.passes_completed
    }

    pub fn begin(&mut self) -> Result<(), ProtocolError> {
        if self.is_open() {
            return Err(ProtocolError::NestedSynchronize);
        }
        self.phase = SyncPhase::Synchronizing;
        self.lists_this_pass = 0;
        Ok(())
    }

    pub fn end(&mut self) -> Result<(), ProtocolError> {
        if !self.is_open() {
            return Err(ProtocolError::EndWithoutBegin);
        }
        self.phase = SyncPhase::Idle;
        self.passes_completed += 1;
        Ok(())
    }

    /// Fails unless a pass is open.
    pub fn require_open(&self, call: &'static str) -> Result<(), ProtocolError> {
        if self.is_open() { Ok(()) } else { Err(ProtocolError::OutsideSynchronize { call }) }
    }

    /// Records a command list publication. More than one per pass is allowed but unusual.
    pub fn note_command_list(&mut self) -> Result<(), ProtocolError> {
        self.require_open("update_command_list")?;
        self.lists_this_pass += 1;
        if self.lists_this_pass > 1 {
            log::warn!(
                "pass {}: {} command lists published; only the last one is kept",
                self.passes_completed,
                self.lists_this_pass
            );
        }
        Ok(())
    }
}

/// One open synchronization pass on a driver (producer side).
///
/// Allocates ids from the driver and issues calls in program order. Dropping the
/// scope calls `end_synchronize`.
pub struct SyncScope<'d, D: GpuDriver + ?Sized> {
    driver: &'d mut D,
    published: bool,
}

/// Opens a pass on `driver`.
pub fn synchronize<D: GpuDriver + ?Sized>(driver: &mut D) -> SyncScope<'_, D> {
    driver.begin_synchronize();
    SyncScope { driver, published: false }
}

impl<D: GpuDriver + ?Sized> SyncScope<'_, D> {
    /// Allocates an id and uploads `bitmap` as a pixel texture.
    pub fn create_texture(&mut self, bitmap: &Bitmap) -> TextureId {
        let id = self.driver.next_texture_id();
        self.driver.create_texture(id, bitmap);
        id
    }

    /// Allocates a render-target texture (storage comes with its render buffer).
    pub fn create_render_target(&mut self) -> TextureId {
        self.create_texture(&Bitmap::empty())
    }

    pub fn update_texture(&mut self, id: TextureId, bitmap: &Bitmap) {
        self.driver.update_texture(id, bitmap);
    }

    pub fn destroy_texture(&mut self, id: TextureId) {
        self.driver.destroy_texture(id);
    }

    pub fn create_render_buffer(&mut self, texture: TextureId, width: u32, height: u32) -> RenderBufferId {
        let id = self.driver.next_render_buffer_id();
        self.driver.create_render_buffer(id, &RenderBufferDesc::new(texture, width, height));
        id
    }

    pub fn destroy_render_buffer(&mut self, id: RenderBufferId) {
        self.driver.destroy_render_buffer(id);
    }

    pub fn create_geometry(&mut self, vertices: VertexBuffer<'_>, indices: IndexBuffer<'_>) -> GeometryId {
        let id = self.driver.next_geometry_id();
        self.driver.create_geometry(id, vertices, indices);
        id
    }

    pub fn update_geometry(&mut self, id: GeometryId, vertices: VertexBuffer<'_>, indices: IndexBuffer<'_>) {
        self.driver.update_geometry(id, vertices, indices);
    }

    pub fn destroy_geometry(&mut self, id: GeometryId) {
        self.driver.destroy_geometry(id);
    }

    /// Publishes the pass's command list.
    pub fn update_command_list(&mut self, list: &CommandList) {
        if self.published {
            log::warn!("command list published twice in one pass; the second replaces the first");
        }
        self.published = true;
        self.driver.update_command_list(list);
    }

    /// Whether a command list has been published in this pass.
    #[inline]
    pub fn has_published(&self) -> bool {
        self.published
    }

    /// Closes the pass now.
    pub fn finish(self) {}
}

impl<D: GpuDriver + ?Sized> Drop for SyncScope<'_, D> {
    fn drop(&mut self) {
        self.driver.end_synchronize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{NullDriver, RecordedCall, RecordingDriver};

    // ── SyncState ─────────────────────────────────────────────────────────

    #[test]
    fn begin_end_round_trip() {
        let mut s = SyncState::new();
        assert!(s.require_open("create_texture").is_err());
        s.begin().unwrap();
        assert!(s.require_open("create_texture").is_ok());
        s.end().unwrap();
        assert_eq!(s.phase(), SyncPhase::Idle);
        assert_eq!(s.passes_completed(), 1);
    }

    #[test]
    fn nested_begin_is_rejected() {
        let mut s = SyncState::new();
        s.begin().unwrap();
        assert_eq!(s.begin(), Err(ProtocolError::NestedSynchronize));
        assert!(s.is_open());
    }

    #[test]
    fn end_without_begin_is_rejected() {
        assert_eq!(SyncState::new().end(), Err(ProtocolError::EndWithoutBegin));
    }

    #[test]
    fn command_list_outside_pass_is_rejected() {
        let mut s = SyncState::new();
        assert_eq!(
            s.note_command_list(),
            Err(ProtocolError::OutsideSynchronize { call: "update_command_list" })
        );
        s.begin().unwrap();
        assert!(s.note_command_list().is_ok());
        assert!(s.note_command_list().is_ok());
    }

    // ── SyncScope ─────────────────────────────────────────────────────────

    #[test]
    fn scope_closes_pass_on_drop() {
        let mut d = NullDriver::new();
        {
            let mut pass = synchronize(&mut d);
            let tex = pass.create_render_target();
            pass.create_render_buffer(tex, 4, 4);
        }
        assert_eq!(d.counts().passes, 1);
        assert_eq!(d.counts().texture_calls, 1);
        assert_eq!(d.counts().render_buffer_calls, 1);
    }

    #[test]
    fn scope_issues_calls_in_order_and_ends_once() {
        let mut d = RecordingDriver::new();
        let pass = synchronize(&mut d);
        assert!(!pass.has_published());
        pass.finish();

        let mut pass = synchronize(&mut d);
        pass.update_command_list(&CommandList::new());
        assert!(pass.has_published());
        drop(pass);

        assert_eq!(
            d.trace().calls(),
            [
                RecordedCall::BeginSynchronize,
                RecordedCall::EndSynchronize,
                RecordedCall::BeginSynchronize,
                RecordedCall::UpdateCommandList(CommandList::new()),
                RecordedCall::EndSynchronize,
            ]
        );
    }
}
