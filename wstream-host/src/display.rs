//! GDI presentation surface: blits frames into a native window.
//!
//! Uses `StretchDIBits` with a top-down DIB. Frames normally match the
//! client area exactly; during a resize the last frame is stretched until
//! a frame of the new size arrives.

use tracing::info;
use wstream_core::{Dimensions, Frame, StreamError};

use crate::surface::{Presenter, SurfaceEvent};
use crate::window::{NativeWindow, WindowEvent};

#[cfg(target_os = "windows")]
mod platform {
    use windows::Win32::Foundation::*;
    use windows::Win32::Graphics::Gdi::*;
    use wstream_core::{Dimensions, Frame};

    /// Renders BGRA frames into an HWND using GDI.
    pub struct DisplayRenderer {
        hwnd: HWND,
        target: Dimensions,
    }

    impl DisplayRenderer {
        /// Create a renderer targeting the given window.
        pub fn new(hwnd: HWND, target: Dimensions) -> Self {
            Self { hwnd, target }
        }

        /// Update the target size (call after WM_SIZE).
        pub fn resize(&mut self, target: Dimensions) {
            self.target = target;
        }

        pub fn render(&self, frame: &Frame) -> Result<(), String> {
            if frame.is_empty() || self.target.is_empty() {
                return Ok(());
            }

            let bmi = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: frame.width() as i32,
                    // Negative height = top-down DIB (origin at top-left).
                    biHeight: -(frame.height() as i32),
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                bmiColors: [RGBQUAD::default(); 1],
            };

            unsafe {
                let hdc = GetDC(self.hwnd);
                if hdc.is_invalid() {
                    return Err("GetDC failed".into());
                }

                let lines = StretchDIBits(
                    hdc,
                    0,
                    0,
                    self.target.width as i32,
                    self.target.height as i32,
                    0,
                    0,
                    frame.width() as i32,
                    frame.height() as i32,
                    Some(frame.as_bytes().as_ptr() as *const _),
                    &bmi,
                    DIB_RGB_COLORS,
                    SRCCOPY,
                );

                ReleaseDC(self.hwnd, hdc);

                if lines == 0 {
                    return Err("StretchDIBits failed".into());
                }
            }

            Ok(())
        }
    }
}

#[cfg(target_os = "windows")]
pub use platform::*;

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
pub mod stub {
    use wstream_core::{Dimensions, Frame};

    pub struct DisplayRenderer;

    impl DisplayRenderer {
        pub fn new(_hwnd: (), _target: Dimensions) -> Self {
            Self
        }

        pub fn resize(&mut self, _target: Dimensions) {}

        pub fn render(&self, _frame: &Frame) -> Result<(), String> {
            Err("display rendering is only supported on Windows".into())
        }
    }
}

#[cfg(not(target_os = "windows"))]
pub use stub::*;

// ── GdiPresenter ─────────────────────────────────────────────────

/// A native window plus its renderer.
pub struct GdiPresenter {
    window: NativeWindow,
    renderer: DisplayRenderer,
}

impl GdiPresenter {
    /// Open a window with a `dims` client area.
    pub fn open(title: &str, dims: Dimensions) -> Result<Self, StreamError> {
        let window = NativeWindow::create(title, dims.width, dims.height)
            .map_err(StreamError::SurfaceUnavailable)?;
        let renderer = DisplayRenderer::new(window.hwnd(), dims);
        info!(
            handle = window.raw_handle(),
            %dims,
            "presentation window open"
        );
        Ok(Self { window, renderer })
    }

    /// The window's handle, usable as a capture target.
    pub fn raw_handle(&self) -> u64 {
        self.window.raw_handle()
    }
}

impl Presenter for GdiPresenter {
    fn bind(&mut self, dims: Dimensions) -> Result<(), StreamError> {
        self.renderer.resize(dims);
        Ok(())
    }

    fn present(&mut self, frame: Frame) -> Result<(), StreamError> {
        self.renderer
            .render(&frame)
            .map_err(StreamError::SurfaceUnavailable)
    }

    fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        self.window
            .poll_events()
            .into_iter()
            .map(|event| match event {
                WindowEvent::Close => SurfaceEvent::Closed,
                WindowEvent::Resize(w, h) => SurfaceEvent::Resized(Dimensions::new(w, h)),
            })
            .collect()
    }
}
