//! Test patterns published by the producer.

use clap::ValueEnum;
use wstream_core::frame::OPAQUE;
use wstream_core::{Dimensions, Frame, overlay};

/// What each published frame looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Pattern {
    /// Diagonal gradient scrolling one pixel per frame.
    Gradient,
    /// Vertical white bar sweeping across a dark background.
    Bar,
    /// One solid color cycling through hues.
    Solid,
}

/// Render frame number `n` of `pattern` at `dims`, with a caption.
pub fn render(pattern: Pattern, dims: Dimensions, n: u64) -> Frame {
    let mut frame = Frame::new(dims);
    if dims.is_empty() {
        return frame;
    }
    let t = n as u32;
    match pattern {
        Pattern::Gradient => {
            for y in 0..dims.height {
                for x in 0..dims.width {
                    let r = (x.wrapping_add(t)) & 0xFF;
                    let g = (y.wrapping_add(t)) & 0xFF;
                    let b = t & 0xFF;
                    frame.put_pixel(x, y, OPAQUE | (r << 16) | (g << 8) | b);
                }
            }
        }
        Pattern::Bar => {
            frame.fill(OPAQUE | 0x0010_1010);
            let x0 = t % dims.width;
            let w = (dims.width / 16).max(1);
            for y in 0..dims.height {
                for x in x0..x0 + w {
                    frame.put_pixel(x, y, 0xFFFF_FFFF);
                }
            }
        }
        Pattern::Solid => frame.fill(hue(t)),
    }
    overlay::render(&format!("frame {n}\n{dims}"), &mut frame, false);
    frame
}

/// Fully saturated color on a 1536-step hue wheel.
fn hue(t: u32) -> u32 {
    let step = t % 1536;
    let ramp = step % 256;
    let (r, g, b) = match step / 256 {
        0 => (255, ramp, 0),
        1 => (255 - ramp, 255, 0),
        2 => (0, 255, ramp),
        3 => (0, 255 - ramp, 255),
        4 => (ramp, 0, 255),
        _ => (255, 0, 255 - ramp),
    };
    OPAQUE | (r << 16) | (g << 8) | b
}
