/// Pixel formats a texture can be created from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BitmapFormat {
    /// Single 8-bit alpha channel.
    A8Unorm = 0,
    /// 8-bit BGRA, premultiplied alpha, sRGB-encoded.
    #[default]
    Bgra8UnormSrgb = 1,
}

impl BitmapFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            BitmapFormat::A8Unorm => 1,
            BitmapFormat::Bgra8UnormSrgb => 4,
        }
    }

    /// Decodes the wire tag.
    pub const fn from_raw(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(BitmapFormat::A8Unorm),
            1 => Some(BitmapFormat::Bgra8UnormSrgb),
            _ => None,
        }
    }
}
