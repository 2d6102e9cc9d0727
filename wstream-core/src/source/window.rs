//! Window capture path of the frame source.
//!
//! The OS-specific part (validating the handle, blitting the client area)
//! sits behind [`WindowCapturer`]. Fitting the captured pixels into the
//! requested frame is done here, independent of the platform.

use crate::error::StreamError;
use crate::frame::{BYTES_PER_PIXEL, Dimensions, Frame, OPAQUE};

/// Client-area pixels of a captured window.
///
/// `pixels` holds `dims.height` rows of exactly `dims.width` pixels in
/// `0xAARRGGBB` form. The alpha byte is whatever the OS left there.
#[derive(Debug, Clone, Copy)]
pub struct CapturedImage<'a> {
    pub dims: Dimensions,
    pub pixels: &'a [u32],
}

/// Grabs the visible client area of a window.
///
/// Implementations own their off-screen buffers and reuse them across
/// calls; every OS resource acquired during a call must be released
/// before it returns, on success and on failure.
pub trait WindowCapturer {
    fn capture(&mut self, handle: u64) -> Result<CapturedImage<'_>, StreamError>;
}

/// Capturer for platforms without a window-compositing backend.
#[derive(Debug, Default)]
pub struct UnsupportedCapturer;

impl WindowCapturer for UnsupportedCapturer {
    fn capture(&mut self, _handle: u64) -> Result<CapturedImage<'_>, StreamError> {
        Err(StreamError::Unsupported("window capture"))
    }
}

/// The capturer used by default on this platform.
#[cfg(target_os = "windows")]
pub type PlatformCapturer = crate::source::gdi::GdiCapturer;

/// The capturer used by default on this platform.
#[cfg(not(target_os = "windows"))]
pub type PlatformCapturer = UnsupportedCapturer;

/// Window capture frame acquisition.
#[derive(Debug, Default)]
pub struct WindowCapture<C: WindowCapturer = PlatformCapturer> {
    capturer: C,
}

impl<C: WindowCapturer> WindowCapture<C> {
    pub fn new(capturer: C) -> Self {
        Self { capturer }
    }

    pub fn capturer(&self) -> &C {
        &self.capturer
    }

    /// Capture `handle` and fit the result into `frame`.
    pub fn acquire(&mut self, handle: u64, frame: &mut Frame) -> Result<(), StreamError> {
        let image = self.capturer.capture(handle)?;
        blit(&image, frame);
        Ok(())
    }
}

/// Copy a captured image into `frame`, top-left aligned.
///
/// When the widths agree the rows are copied in bulk and alpha is kept as
/// captured. Otherwise each pixel is remapped individually and forced
/// opaque, since GDI leaves no meaningful alpha. Parts of `frame` the
/// capture does not cover are left untouched.
pub fn blit(image: &CapturedImage<'_>, frame: &mut Frame) {
    let out = frame.dimensions();
    let src = image.dims;
    let rows = src.height.min(out.height) as usize;

    if src.width == out.width {
        let count = (rows * src.width as usize).min(image.pixels.len());
        let dst = &mut frame.as_bytes_mut()[..count * BYTES_PER_PIXEL];
        for (px, value) in dst
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .zip(&image.pixels[..count])
        {
            px.copy_from_slice(&value.to_le_bytes());
        }
        return;
    }

    let stride = src.width as usize;
    if stride == 0 {
        return;
    }
    let cols = stride.min(out.width as usize);
    // A short pixel buffer only covers its complete rows.
    for (y, src_row) in image.pixels.chunks_exact(stride).take(rows).enumerate() {
        let dst_row = frame.row_mut(y as u32);
        for (px, value) in dst_row.chunks_exact_mut(BYTES_PER_PIXEL).zip(&src_row[..cols]) {
            px.copy_from_slice(&(value | OPAQUE).to_le_bytes());
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
