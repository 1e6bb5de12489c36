use std::fmt;
use std::num::NonZeroU32;

use super::ProtocolError;

/// Resource classes with independent id spaces.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    RenderBuffer,
    Geometry,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Texture => "texture",
            ResourceKind::RenderBuffer => "render buffer",
            ResourceKind::Geometry => "geometry",
        })
    }
}

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(NonZeroU32);

        impl $name {
            pub const KIND: ResourceKind = $kind;

            /// `None` for the reserved value 0.
            #[inline]
            pub const fn new(raw: u32) -> Option<Self> {
                match NonZeroU32::new(raw) {
                    Some(v) => Some(Self(v)),
                    None => None,
                }
            }

            #[inline]
            pub const fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl From<NonZeroU32> for $name {
            #[inline]
            fn from(v: NonZeroU32) -> Self {
                Self(v)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", Self::KIND, self.0)
            }
        }
    };
}

resource_id!(
    /// Texture handle. Valid from `create_texture` until `destroy_texture`.
    TextureId => ResourceKind::Texture
);
resource_id!(
    /// Render buffer handle. Valid from `create_render_buffer` until `destroy_render_buffer`.
    RenderBufferId => ResourceKind::RenderBuffer
);
resource_id!(
    /// Geometry handle. Valid from `create_geometry` until `destroy_geometry`.
    GeometryId => ResourceKind::Geometry
);

/// Monotonic counter for one resource class.
#[derive(Debug, Default, Copy, Clone)]
struct IdCounter {
    last: u32,
}

impl IdCounter {
    fn issue(&mut self, kind: ResourceKind) -> NonZeroU32 {
        if self.last == u32::MAX {
            log::error!("{kind} id space exhausted; id {} is being reissued", u32::MAX);
        }
        let id = NonZeroU32::MIN.saturating_add(self.last);
        self.last = id.get();
        id
    }

    fn accept(&mut self, kind: ResourceKind, raw: u32) -> Result<NonZeroU32, ProtocolError> {
        let Some(id) = NonZeroU32::new(raw) else {
            return Err(ProtocolError::ZeroId { kind });
        };
        if raw <= self.last {
            return Err(ProtocolError::NonMonotonicId { kind, id: raw, previous: self.last });
        }
        self.last = raw;
        Ok(id)
    }
}

/// Issues ids for the three resource classes.
///
/// Numbering starts at 1 in each class, increases strictly and never reuses a value,
/// even after the resource is destroyed. 0 is never issued.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    textures: IdCounter,
    render_buffers: IdCounter,
    geometry: IdCounter,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_texture_id(&mut self) -> TextureId {
        TextureId(self.textures.issue(ResourceKind::Texture))
    }

    pub fn next_render_buffer_id(&mut self) -> RenderBufferId {
        RenderBufferId(self.render_buffers.issue(ResourceKind::RenderBuffer))
    }

    pub fn next_geometry_id(&mut self) -> GeometryId {
        GeometryId(self.geometry.issue(ResourceKind::Geometry))
    }

    /// Records an id issued by someone else (e.g. a wrapped driver).
    ///
    /// Rejects 0 and any value not strictly greater than the previous one.
    pub fn accept(&mut self, kind: ResourceKind, raw: u32) -> Result<NonZeroU32, ProtocolError> {
        self.counter_mut(kind).accept(kind, raw)
    }

    /// True when `raw` is non-zero and at or below the high-water mark of `kind`.
    pub fn was_issued(&self, kind: ResourceKind, raw: u32) -> bool {
        raw != 0 && raw <= self.counter(kind).last
    }

    /// The most recently issued id of `kind` (0 if none).
    pub fn last_issued(&self, kind: ResourceKind) -> u32 {
        self.counter(kind).last
    }

    fn counter(&self, kind: ResourceKind) -> &IdCounter {
        match kind {
            ResourceKind::Texture => &self.textures,
            ResourceKind::RenderBuffer => &self.render_buffers,
            ResourceKind::Geometry => &self.geometry,
        }
    }

    fn counter_mut(&mut self, kind: ResourceKind) -> &mut IdCounter {
        match kind {
            ResourceKind::Texture => &mut self.textures,
            ResourceKind::RenderBuffer => &mut self.render_buffers,
            ResourceKind::Geometry => &mut self.geometry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn numbering_starts_at_one() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_texture_id().get(), 1);
        assert_eq!(ids.next_render_buffer_id().get(), 1);
        assert_eq!(ids.next_geometry_id().get(), 1);
    }

    #[test]
    fn classes_are_independent() {
        let mut ids = IdAllocator::new();
        ids.next_texture_id();
        ids.next_texture_id();
        assert_eq!(ids.next_geometry_id().get(), 1);
        assert_eq!(ids.next_texture_id().get(), 3);
    }

    #[test]
    fn zero_is_not_representable() {
        assert!(TextureId::new(0).is_none());
        assert_eq!(std::mem::size_of::<Option<TextureId>>(), 4);
    }

    #[test]
    fn accept_rejects_zero_and_regressions() {
        let mut ids = IdAllocator::new();
        assert_eq!(
            ids.accept(ResourceKind::Geometry, 0),
            Err(ProtocolError::ZeroId { kind: ResourceKind::Geometry })
        );
        assert!(ids.accept(ResourceKind::Geometry, 5).is_ok());
        assert_eq!(
            ids.accept(ResourceKind::Geometry, 5),
            Err(ProtocolError::NonMonotonicId { kind: ResourceKind::Geometry, id: 5, previous: 5 })
        );
        assert!(ids.was_issued(ResourceKind::Geometry, 5));
        assert!(!ids.was_issued(ResourceKind::Geometry, 6));
    }

    #[test]
    fn display_names_the_class() {
        assert_eq!(RenderBufferId::new(7).map(|id| id.to_string()), Some("render buffer#7".into()));
    }

    proptest! {
        #[test]
        fn issued_ids_are_distinct_nonzero_and_increasing(n in 1usize..512) {
            let mut ids = IdAllocator::new();
            let mut previous = 0;
            for _ in 0..n {
                let id = ids.next_texture_id().get();
                prop_assert!(id != 0);
                prop_assert!(id > previous);
                previous = id;
            }
            prop_assert_eq!(previous as usize, n);
        }
    }
}
