//! The GPU command-list protocol.
//!
//! A renderer core (the producer) drives a [`GpuDriver`] (the consumer) inside
//! synchronization passes: it allocates ids, creates and updates textures, render
//! buffers and geometry, and publishes one [`CommandList`] per pass. Every
//! [`Command`] carries a complete [`GpuState`].

mod command;
mod driver;
mod error;
mod ids;
mod monitor;
mod registry;
mod state;
mod sync;
mod vertex;

pub use command::{Command, CommandList, CommandType};
pub use driver::{GpuDriver, RenderBufferDesc};
pub use error::ProtocolError;
pub use ids::{GeometryId, IdAllocator, RenderBufferId, ResourceKind, TextureId};
pub use monitor::{DriverConfig, ProtocolMonitor, ViolationPolicy, Violations};
pub use registry::{
    GeometryEntry, LiveCounts, RenderBufferEntry, ResourceRegistry, TextureEntry, TextureKind,
};
pub use state::{GpuState, ShaderType, MAX_CLIP_STACK, TEXTURE_SLOTS, UNIFORM_SLOTS};
pub use sync::{synchronize, SyncPhase, SyncScope, SyncState};
pub use vertex::{
    read_indices, read_vertex, validate_geometry, IndexBuffer, IndexType, PathVertex, QuadVertex,
    VertexBuffer, VertexBufferFormat, INDEX_STRIDE,
};
