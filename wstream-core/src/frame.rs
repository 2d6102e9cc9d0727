//! Frame and dimension types shared by every pipeline stage.
//!
//! A [`Frame`] is always tightly packed BGRA: `width * 4` bytes per row,
//! no padding, origin at the top-left. Pixels are addressed as `u32`
//! values in `0xAARRGGBB` form and stored little-endian, so the bytes in
//! memory read Blue, Green, Red, Alpha.

use std::fmt;

/// Bytes used by one BGRA pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Alpha mask for a fully opaque pixel.
pub const OPAQUE: u32 = 0xFF00_0000;

// ── Dimensions ───────────────────────────────────────────────────

/// Pixel size of a view, frame, or capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` when either side is zero. Empty frames are never submitted.
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size in bytes of a packed BGRA buffer with these dimensions.
    pub const fn byte_len(self) -> usize {
        self.pixel_count() * BYTES_PER_PIXEL
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// A packed BGRA bitmap, premultiplied alpha.
///
/// Frames are produced once per paint cycle and moved into the
/// presentation surface on submission; nothing keeps a copy around.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    dims: Dimensions,
    data: Vec<u8>,
}

impl Frame {
    /// Allocate a zeroed (fully transparent) frame.
    pub fn new(dims: Dimensions) -> Self {
        Self {
            dims,
            data: vec![0; dims.byte_len()],
        }
    }

    /// Allocate a frame filled with one color.
    pub fn solid(dims: Dimensions, argb: u32) -> Self {
        let mut frame = Self::new(dims);
        frame.fill(argb);
        frame
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    pub fn width(&self) -> u32 {
        self.dims.width
    }

    pub fn height(&self) -> u32 {
        self.dims.height
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Row pitch in bytes. Always `width * 4`.
    pub fn stride(&self) -> usize {
        self.dims.width as usize * BYTES_PER_PIXEL
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the frame and hand back its pixel buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Bytes of row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }

    /// Overwrite every pixel with `argb`.
    pub fn fill(&mut self, argb: u32) {
        let bytes = argb.to_le_bytes();
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&bytes);
        }
    }

    /// Pixel at `(x, y)` as `0xAARRGGBB`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        let offset = self.offset(x, y)?;
        let px: [u8; 4] = self.data[offset..offset + BYTES_PER_PIXEL].try_into().ok()?;
        Some(u32::from_le_bytes(px))
    }

    /// Write one pixel. Out-of-bounds writes are clipped silently.
    pub fn put_pixel(&mut self, x: u32, y: u32, argb: u32) {
        if let Some(offset) = self.offset(x, y) {
            self.data[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&argb.to_le_bytes());
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.dims.width || y >= self.dims.height {
            return None;
        }
        Some((y as usize * self.dims.width as usize + x as usize) * BYTES_PER_PIXEL)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("dims", &self.dims)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────
