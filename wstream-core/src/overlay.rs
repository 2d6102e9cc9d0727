//! Diagnostic text overlay.
//!
//! Every acquisition failure ends up here so the viewer sees what went
//! wrong instead of a frozen or blank frame. Text is drawn with the
//! public-domain 8×8 bitmap font from `font8x8`.

use font8x8::{BASIC_FONTS, UnicodeFonts};

use crate::frame::Frame;

/// Neutral background used when the overlay clears the frame.
pub const BACKGROUND: u32 = 0xFF30_3030;

/// Opaque text color.
pub const FOREGROUND: u32 = 0xFFFF_FFFF;

/// Top-left corner of the first glyph.
pub const ANCHOR: (u32, u32) = (8, 8);

/// Each font pixel becomes a `SCALE`×`SCALE` block.
pub const SCALE: u32 = 2;

const GLYPH: u32 = 8;
const LINE_GAP: u32 = 2;

/// Draw `message` into `frame` at [`ANCHOR`].
///
/// With `clear` the whole frame is first filled with [`BACKGROUND`];
/// otherwise the text goes over the existing pixels. `\n` starts a new
/// line. Characters without a glyph are drawn as `?`. Anything past the
/// frame edge is clipped.
pub fn render(message: &str, frame: &mut Frame, clear: bool) {
    if clear {
        frame.fill(BACKGROUND);
    }

    let advance = GLYPH * SCALE;
    let line_height = advance + LINE_GAP * SCALE;
    let (x0, mut y) = ANCHOR;

    for line in message.lines() {
        let mut x = x0;
        for ch in line.chars() {
            draw_glyph(frame, ch, x, y);
            x = x.saturating_add(advance);
        }
        y = y.saturating_add(line_height);
    }
}

fn draw_glyph(frame: &mut Frame, ch: char, x: u32, y: u32) {
    let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
        return;
    };
    for (row, bits) in glyph.iter().enumerate() {
        for col in 0..GLYPH {
            if (*bits >> col) & 1 == 0 {
                continue;
            }
            let px = x + col * SCALE;
            let py = y + row as u32 * SCALE;
            for sy in 0..SCALE {
                for sx in 0..SCALE {
                    frame.put_pixel(px + sx, py + sy, FOREGROUND);
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
