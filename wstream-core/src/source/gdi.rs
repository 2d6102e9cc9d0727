//! GDI window capture for Windows.
//!
//! Each capture:
//!
//! 1. Validates the handle (`IsWindow`, `IsWindowVisible`).
//! 2. Reads the client size (`GetClientRect`).
//! 3. Blits the window DC into a cached off-screen bitmap (`BitBlt`).
//! 4. Copies the bitmap into a reused `u32` buffer (`GetDIBits`).
//!
//! The window DC and the bitmap selection are scoped to one call through
//! drop guards, so every early return releases them. The off-screen
//! memory DC and bitmap are owned by the capturer and rebuilt only when
//! the client size changes.

use std::ffi::c_void;

use tracing::debug;
use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BitBlt, CreateCompatibleBitmap, CreateCompatibleDC,
    DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, GetDIBits, HBITMAP, HDC, HGDIOBJ, ReleaseDC,
    SRCCOPY, SelectObject,
};
use windows::Win32::UI::WindowsAndMessaging::{GetClientRect, IsWindow, IsWindowVisible};

use crate::error::StreamError;
use crate::frame::Dimensions;
use crate::source::window::{CapturedImage, WindowCapturer};

// ── Guards ───────────────────────────────────────────────────────

/// `GetDC` result, released with `ReleaseDC`.
struct WindowDc {
    hwnd: HWND,
    hdc: HDC,
}

impl WindowDc {
    fn get(hwnd: HWND) -> Result<Self, StreamError> {
        let hdc = unsafe { GetDC(hwnd) };
        if hdc.is_invalid() {
            return Err(StreamError::CaptureFailed("GetDC failed".into()));
        }
        Ok(Self { hwnd, hdc })
    }
}

impl Drop for WindowDc {
    fn drop(&mut self) {
        unsafe { ReleaseDC(self.hwnd, self.hdc) };
    }
}

/// A bitmap selected into a DC; the previous object is restored on drop.
struct Selection {
    dc: HDC,
    previous: HGDIOBJ,
}

impl Selection {
    fn select(dc: HDC, bitmap: HBITMAP) -> Self {
        let previous = unsafe { SelectObject(dc, HGDIOBJ(bitmap.0)) };
        Self { dc, previous }
    }
}

impl Drop for Selection {
    fn drop(&mut self) {
        unsafe { SelectObject(self.dc, self.previous) };
    }
}

/// Off-screen memory DC plus a bitmap matching the last client size.
struct Surface {
    dc: HDC,
    bitmap: HBITMAP,
    dims: Dimensions,
}

impl Surface {
    fn create(window_dc: HDC, dims: Dimensions) -> Result<Self, StreamError> {
        let dc = unsafe { CreateCompatibleDC(window_dc) };
        if dc.is_invalid() {
            return Err(StreamError::CaptureFailed("CreateCompatibleDC failed".into()));
        }
        let bitmap =
            unsafe { CreateCompatibleBitmap(window_dc, dims.width as i32, dims.height as i32) };
        if bitmap.is_invalid() {
            unsafe {
                let _ = DeleteDC(dc);
            }
            return Err(StreamError::CaptureFailed(format!(
                "CreateCompatibleBitmap({dims}) failed"
            )));
        }
        Ok(Self { dc, bitmap, dims })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteObject(HGDIOBJ(self.bitmap.0));
            let _ = DeleteDC(self.dc);
        }
    }
}

// ── GdiCapturer ──────────────────────────────────────────────────

/// GDI `BitBlt` capture of a window's client area.
#[derive(Default)]
pub struct GdiCapturer {
    surface: Option<Surface>,
    pixels: Vec<u32>,
}

impl GdiCapturer {
    pub fn new() -> Self {
        Self::default()
    }

    fn surface<'s>(
        slot: &'s mut Option<Surface>,
        window_dc: &WindowDc,
        dims: Dimensions,
    ) -> Result<&'s Surface, StreamError> {
        if slot.as_ref().is_some_and(|s| s.dims == dims) {
            if let Some(surface) = slot.as_ref() {
                return Ok(surface);
            }
        }
        // Release the old surface before building the new one.
        *slot = None;
        debug!(%dims, "rebuilding capture surface");
        Ok(slot.insert(Surface::create(window_dc.hdc, dims)?))
    }
}

impl WindowCapturer for GdiCapturer {
    fn capture(&mut self, handle: u64) -> Result<CapturedImage<'_>, StreamError> {
        let hwnd = HWND(handle as usize as *mut c_void);
        if handle == 0 || !unsafe { IsWindow(hwnd) }.as_bool() {
            return Err(StreamError::NoWindowHandle);
        }
        if !unsafe { IsWindowVisible(hwnd) }.as_bool() {
            return Err(StreamError::WindowInvisible);
        }

        let mut rect = RECT::default();
        unsafe { GetClientRect(hwnd, &mut rect) }
            .map_err(|e| StreamError::CaptureFailed(format!("GetClientRect failed: {e}")))?;
        let width = rect.right - rect.left;
        let height = rect.bottom - rect.top;
        if width < 1 || height < 1 {
            return Err(StreamError::EmptyClientArea(Dimensions::new(
                width.max(0) as u32,
                height.max(0) as u32,
            )));
        }
        let dims = Dimensions::new(width as u32, height as u32);

        let window_dc = WindowDc::get(hwnd)?;
        let surface = Self::surface(&mut self.surface, &window_dc, dims)?;

        {
            let _selected = Selection::select(surface.dc, surface.bitmap);
            unsafe {
                BitBlt(
                    surface.dc,
                    0,
                    0,
                    width,
                    height,
                    window_dc.hdc,
                    0,
                    0,
                    SRCCOPY,
                )
            }
            .map_err(|e| StreamError::CaptureFailed(format!("BitBlt failed: {e}")))?;
        }

        // GetDIBits wants the bitmap deselected, hence the scope above.
        let count = dims.pixel_count();
        if self.pixels.len() < count {
            self.pixels.resize(count, 0);
        }
        let mut info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                // Negative height = top-down rows.
                biHeight: -height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let lines = unsafe {
            GetDIBits(
                surface.dc,
                surface.bitmap,
                0,
                height as u32,
                Some(self.pixels.as_mut_ptr() as *mut c_void),
                &mut info,
                DIB_RGB_COLORS,
            )
        };
        if lines == 0 {
            return Err(StreamError::CaptureFailed("GetDIBits failed".into()));
        }

        Ok(CapturedImage {
            dims,
            pixels: &self.pixels[..count],
        })
    }
}

impl std::fmt::Debug for GdiCapturer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GdiCapturer")
            .field("surface", &self.surface.as_ref().map(|s| s.dims))
            .field("buffer_pixels", &self.pixels.len())
            .finish()
    }
}
