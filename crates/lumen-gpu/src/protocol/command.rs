use super::{GeometryId, GpuState, RenderBufferId, TextureId};

/// Command discriminant (wire tag).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    ClearRenderBuffer = 0,
    DrawGeometry = 1,
}

/// One GPU command. Each carries the full state it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Clears `state.render_buffer_id` to transparent black.
    ClearRenderBuffer { state: GpuState },
    /// Draws `indices_count` indices of `geometry_id` starting at `indices_offset`
    /// into `state.render_buffer_id`.
    DrawGeometry {
        state: GpuState,
        geometry_id: GeometryId,
        indices_count: u32,
        indices_offset: u32,
    },
}

impl Command {
    #[inline]
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::ClearRenderBuffer { .. } => CommandType::ClearRenderBuffer,
            Command::DrawGeometry { .. } => CommandType::DrawGeometry,
        }
    }

    #[inline]
    pub fn state(&self) -> &GpuState {
        match self {
            Command::ClearRenderBuffer { state } | Command::DrawGeometry { state, .. } => state,
        }
    }

    #[inline]
    pub fn render_buffer_id(&self) -> RenderBufferId {
        self.state().render_buffer_id
    }

    #[inline]
    pub fn geometry_id(&self) -> Option<GeometryId> {
        match self {
            Command::DrawGeometry { geometry_id, .. } => Some(*geometry_id),
            Command::ClearRenderBuffer { .. } => None,
        }
    }

    /// Textures the command samples. Clears sample nothing.
    pub fn sampled_textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        let state = match self {
            Command::DrawGeometry { state, .. } => Some(state),
            Command::ClearRenderBuffer { .. } => None,
        };
        state.into_iter().flat_map(|s| s.bound_textures())
    }
}

/// Ordered command stream for one synchronization pass.
///
/// Published with `update_command_list`, which replaces whatever the backend held
/// before. Cloning is the deep copy a deferred backend keeps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { commands: Vec::with_capacity(capacity) }
    }

    #[inline]
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Records a clear of `state.render_buffer_id`.
    #[inline]
    pub fn clear_render_buffer(&mut self, state: GpuState) {
        self.push(Command::ClearRenderBuffer { state });
    }

    /// Records an indexed draw of `indices_count` indices from `indices_offset`.
    #[inline]
    pub fn draw_geometry(
        &mut self,
        state: GpuState,
        geometry_id: GeometryId,
        indices_count: u32,
        indices_offset: u32,
    ) {
        self.push(Command::DrawGeometry { state, geometry_id, indices_count, indices_offset });
    }

    /// Removes all commands. Keeps allocated capacity for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Command> {
        self.commands.iter_mut()
    }

    /// Keeps only commands for which `keep` returns true, preserving order.
    pub fn retain(&mut self, keep: impl FnMut(&Command) -> bool) {
        self.commands.retain(keep);
    }
}

impl From<Vec<Command>> for CommandList {
    fn from(commands: Vec<Command>) -> Self {
        Self { commands }
    }
}

impl FromIterator<Command> for CommandList {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self { commands: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rb() -> RenderBufferId {
        RenderBufferId::new(1).unwrap()
    }

    #[test]
    fn commands_keep_insertion_order() {
        let geo = GeometryId::new(2).unwrap();
        let mut list = CommandList::new();
        list.clear_render_buffer(GpuState::new(rb(), 8, 8));
        list.draw_geometry(GpuState::new(rb(), 8, 8), geo, 6, 0);
        list.draw_geometry(GpuState::new(rb(), 8, 8), geo, 3, 6);

        let kinds: Vec<_> = list.iter().map(Command::command_type).collect();
        assert_eq!(
            kinds,
            [CommandType::ClearRenderBuffer, CommandType::DrawGeometry, CommandType::DrawGeometry]
        );
        assert!(matches!(list.commands()[2], Command::DrawGeometry { indices_offset: 6, .. }));
    }

    #[test]
    fn clears_sample_no_textures() {
        let tex = TextureId::new(3).unwrap();
        let clear = Command::ClearRenderBuffer { state: GpuState::new(rb(), 8, 8).with_texture(tex) };
        assert_eq!(clear.sampled_textures().count(), 0);
        assert_eq!(clear.geometry_id(), None);
    }

    #[test]
    fn draws_report_their_bindings() {
        let tex = TextureId::new(3).unwrap();
        let geo = GeometryId::new(9).unwrap();
        let draw = Command::DrawGeometry {
            state: GpuState::new(rb(), 8, 8).with_texture(tex),
            geometry_id: geo,
            indices_count: 3,
            indices_offset: 0,
        };
        assert_eq!(draw.sampled_textures().collect::<Vec<_>>(), vec![tex]);
        assert_eq!(draw.geometry_id(), Some(geo));
        assert_eq!(draw.render_buffer_id(), rb());
    }

    #[test]
    fn clone_is_a_deep_copy() {
        let mut list = CommandList::new();
        list.clear_render_buffer(GpuState::new(rb(), 8, 8));
        let kept = list.clone();
        list.clear();
        assert!(list.is_empty());
        assert_eq!(kept.len(), 1);
    }
}
