use thiserror::Error;

use super::{ResourceKind, VertexBufferFormat};

/// Every way a driver call sequence can break the protocol.
///
/// These are caller bugs. Driver methods do not return them; backends hand them to
/// their `ViolationPolicy`, which either panics or logs and skips the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("{call} called outside a begin_synchronize/end_synchronize pass")]
    OutsideSynchronize { call: &'static str },

    #[error("begin_synchronize called while a pass is already open")]
    NestedSynchronize,

    #[error("end_synchronize called without a matching begin_synchronize")]
    EndWithoutBegin,

    #[error("call stream ended inside an open synchronization pass")]
    UnclosedSynchronize,

    #[error("{kind} id 0 is reserved for \"none\"")]
    ZeroId { kind: ResourceKind },

    #[error("{kind} id {id} does not follow {previous}; ids must strictly increase")]
    NonMonotonicId { kind: ResourceKind, id: u32, previous: u32 },

    #[error("{kind} {id} was never issued by the driver")]
    UnallocatedId { kind: ResourceKind, id: u32 },

    #[error("{kind} {id} already exists")]
    DuplicateId { kind: ResourceKind, id: u32 },

    #[error("{kind} {id} does not exist (never created or already destroyed)")]
    UnknownId { kind: ResourceKind, id: u32 },

    #[error("texture {id} is a render target and cannot receive pixel data")]
    RenderTargetUpdate { id: u32 },

    #[error("texture {id} cannot be updated with an empty bitmap")]
    EmptyUpdate { id: u32 },

    #[error("render buffer {id} has a zero-sized extent ({width}x{height})")]
    EmptyRenderBuffer { id: u32, width: u32, height: u32 },

    #[error("vertex buffer of {len} bytes is not a multiple of the {format:?} stride ({stride})")]
    VertexStride { format: VertexBufferFormat, len: usize, stride: usize },

    #[error("index buffer of {len} bytes is not a multiple of 4")]
    IndexStride { len: usize },

    #[error("draw of {count} indices at offset {offset} exceeds the {available} indices of geometry {geometry}")]
    IndexRange { geometry: u32, offset: u32, count: u32, available: u32 },

    #[error("clip stack size {size} exceeds the maximum of 8")]
    ClipStackOverflow { size: u8 },

    #[error("viewport {width}x{height} is degenerate")]
    InvalidViewport { width: u32, height: u32 },

    #[error("texture {texture} is sampled while rendering into render buffer {render_buffer} that it backs")]
    FeedbackLoop { texture: u32, render_buffer: u32 },
}

impl ProtocolError {
    pub(crate) fn unknown(kind: ResourceKind, id: u32) -> Self {
        ProtocolError::UnknownId { kind, id }
    }
}
