//! # wstream-host
//!
//! Owns a presentation surface (a native GDI window, or nothing at all in
//! headless mode), reads control commands from stdin and runs the paint
//! scheduler on a single-threaded Tokio event loop.

pub mod app;
pub mod config;
pub mod display;
pub mod surface;
pub mod window;
