//! Opaque pixel source handed to texture create/update calls.
//!
//! Only what the protocol needs: dimensions, format, row pitch and the pixel bytes.
//! An empty bitmap means "allocate a render target, upload nothing".

mod format;

pub use format::BitmapFormat;

use thiserror::Error;

/// Invalid bitmap construction parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitmapError {
    #[error("row_bytes {row_bytes} is smaller than width {width} x {bpp} bytes per pixel")]
    RowTooShort { width: u32, bpp: u32, row_bytes: u32 },
    #[error("pixel buffer holds {actual} bytes, {expected} required for {height} rows of {row_bytes}")]
    BufferTooSmall { expected: usize, actual: usize, height: u32, row_bytes: u32 },
    #[error("{width}x{height} at {bpp} bytes per pixel does not fit in memory")]
    TooLarge { width: u32, height: u32, bpp: u32 },
}

/// CPU pixel buffer with an explicit row pitch.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    format: BitmapFormat,
    row_bytes: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// The empty bitmap (no pixels). Creating a texture from it yields a render target.
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            format: BitmapFormat::Bgra8UnormSrgb,
            row_bytes: 0,
            pixels: Vec::new(),
        }
    }

    /// Tightly packed, zero-filled bitmap.
    ///
    /// # Panics
    /// When the row pitch overflows `u32` or the buffer size overflows `usize`. Use
    /// [`Bitmap::try_new`] for sizes that come from outside.
    pub fn new(width: u32, height: u32, format: BitmapFormat) -> Self {
        match Self::try_new(width, height, format) {
            Ok(bitmap) => bitmap,
            Err(e) => panic!("{e}"),
        }
    }

    /// Tightly packed, zero-filled bitmap, or `TooLarge` when the size overflows.
    pub fn try_new(width: u32, height: u32, format: BitmapFormat) -> Result<Self, BitmapError> {
        let bpp = format.bytes_per_pixel();
        let too_large = BitmapError::TooLarge { width, height, bpp };
        let row_bytes = width.checked_mul(bpp).ok_or(too_large.clone())?;
        let len = (row_bytes as usize).checked_mul(height as usize).ok_or(too_large)?;
        Ok(Self { width, height, format, row_bytes, pixels: vec![0; len] })
    }

    /// Wraps existing pixels. `pixels` may be longer than `row_bytes * height`.
    pub fn from_pixels(
        width: u32,
        height: u32,
        format: BitmapFormat,
        row_bytes: u32,
        pixels: Vec<u8>,
    ) -> Result<Self, BitmapError> {
        let bpp = format.bytes_per_pixel();
        if (row_bytes as u64) < width as u64 * bpp as u64 {
            return Err(BitmapError::RowTooShort { width, bpp, row_bytes });
        }
        let expected = (row_bytes as usize)
            .checked_mul(height as usize)
            .ok_or(BitmapError::TooLarge { width, height, bpp })?;
        if pixels.len() < expected {
            return Err(BitmapError::BufferTooSmall {
                expected,
                actual: pixels.len(),
                height,
                row_bytes,
            });
        }
        Ok(Self { width, height, format, row_bytes, pixels })
    }

    /// Tightly packed BGRA bitmap filled with one pixel value (`[b, g, r, a]`).
    pub fn solid_bgra(width: u32, height: u32, bgra: [u8; 4]) -> Self {
        let mut bitmap = Self::new(width, height, BitmapFormat::Bgra8UnormSrgb);
        for px in bitmap.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&bgra);
        }
        bitmap
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> BitmapFormat {
        self.format
    }

    #[inline]
    pub fn bpp(&self) -> u32 {
        self.format.bytes_per_pixel()
    }

    #[inline]
    pub fn row_bytes(&self) -> u32 {
        self.row_bytes
    }

    /// No pixels allocated (zero width or height).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// The visible bytes of row `y` (without pitch padding).
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.row_bytes as usize;
        &self.pixels[start..start + (self.width * self.bpp()) as usize]
    }

    /// Bytes of the pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.bpp() as usize;
        let start = y as usize * self.row_bytes as usize + x as usize * bpp;
        self.pixels.get(start..start + bpp)
    }

    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.bpp() as usize;
        let start = y as usize * self.row_bytes as usize + x as usize * bpp;
        self.pixels.get_mut(start..start + bpp)
    }

    /// Copies the visible rows into a tightly packed buffer.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity((self.width * self.height * self.bpp()) as usize);
        for y in 0..self.height {
            out.extend_from_slice(self.row(y));
        }
        out
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("row_bytes", &self.row_bytes)
            .field("len", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bitmap_reports_empty() {
        assert!(Bitmap::empty().is_empty());
        assert!(Bitmap::new(0, 4, BitmapFormat::A8Unorm).is_empty());
        assert!(!Bitmap::new(1, 1, BitmapFormat::A8Unorm).is_empty());
    }

    #[test]
    fn new_is_tightly_packed() {
        let b = Bitmap::new(3, 2, BitmapFormat::Bgra8UnormSrgb);
        assert_eq!(b.row_bytes(), 12);
        assert_eq!(b.pixels().len(), 24);
    }

    #[test]
    fn from_pixels_rejects_short_rows() {
        let err = Bitmap::from_pixels(4, 1, BitmapFormat::Bgra8UnormSrgb, 8, vec![0; 16]).unwrap_err();
        assert!(matches!(err, BitmapError::RowTooShort { .. }));
    }

    #[test]
    fn from_pixels_rejects_short_buffer() {
        let err = Bitmap::from_pixels(2, 2, BitmapFormat::A8Unorm, 4, vec![0; 5]).unwrap_err();
        assert!(matches!(err, BitmapError::BufferTooSmall { expected: 8, actual: 5, .. }));
    }

    #[test]
    fn oversized_dimensions_are_rejected_not_wrapped() {
        let err = Bitmap::try_new(u32::MAX, 1, BitmapFormat::Bgra8UnormSrgb).unwrap_err();
        assert_eq!(err, BitmapError::TooLarge { width: u32::MAX, height: 1, bpp: 4 });
        // u32::MAX * 4 wraps to u32::MAX - 3 in u32; that must not pass as a valid pitch.
        let err = Bitmap::from_pixels(u32::MAX, 1, BitmapFormat::Bgra8UnormSrgb, u32::MAX - 3, vec![]).unwrap_err();
        assert!(matches!(err, BitmapError::RowTooShort { .. }));
    }

    #[test]
    #[should_panic(expected = "does not fit in memory")]
    fn new_panics_on_overflow() {
        Bitmap::new(1 << 30, 1, BitmapFormat::Bgra8UnormSrgb);
    }

    #[test]
    fn padded_rows_are_skipped() {
        let pixels = vec![1, 2, 0xEE, 0xEE, 3, 4, 0xEE, 0xEE];
        let b = Bitmap::from_pixels(2, 2, BitmapFormat::A8Unorm, 4, pixels).unwrap();
        assert_eq!(b.row(1), &[3, 4]);
        assert_eq!(b.pixel(1, 0), Some(&[2u8][..]));
        assert_eq!(b.to_packed(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn solid_fill_writes_every_pixel() {
        let b = Bitmap::solid_bgra(4, 4, [0, 0, 255, 255]);
        assert!(b.pixels().chunks_exact(4).all(|p| p == [0, 0, 255, 255]));
        assert_eq!(b.pixel(4, 0), None);
    }
}
