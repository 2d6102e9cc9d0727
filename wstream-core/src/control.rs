//! Text control commands from the host.
//!
//! Commands are single space-delimited lines; the first token names the
//! command. They are parsed once into [`Command`] and never matched as
//! strings past this point.
//!
//! ```text
//! setWindowHandle 132456      # decimal u64, 0 clears
//! setStreamName preview       # shared channel name
//! setDefaultColor 0xFF336699  # ARGB, 0x / 0o / 0b / leading-0 prefixes
//! clearWindowHandle
//! clearStreamName
//! ```

use std::fmt;

/// A parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Capture this window. `0` means no window.
    SetWindowHandle(u64),
    /// Read frames from the shared channel with this name.
    SetStreamName(String),
    /// Fill color used when no source is configured.
    SetDefaultColor(u32),
    ClearWindowHandle,
    ClearStreamName,
    /// Unknown command or malformed arguments.
    Ignored,
}

impl Command {
    /// Parse one control line. Never fails; anything unrecognised becomes
    /// [`Command::Ignored`].
    pub fn parse(line: &str) -> Self {
        let tokens: Vec<&str> = line.trim().split(' ').filter(|t| !t.is_empty()).collect();
        // Argument counts are exact: trailing tokens reject the whole line
        // rather than being dropped.
        match tokens.as_slice() {
            ["setWindowHandle", value] => value
                .parse::<u64>()
                .map(Self::SetWindowHandle)
                .unwrap_or(Self::Ignored),
            ["setStreamName", name] => Self::SetStreamName((*name).to_string()),
            ["setDefaultColor", value] => parse_u32_any_base(value)
                .map(Self::SetDefaultColor)
                .unwrap_or(Self::Ignored),
            ["clearWindowHandle"] => Self::ClearWindowHandle,
            ["clearStreamName"] => Self::ClearStreamName,
            _ => Self::Ignored,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetWindowHandle(handle) => write!(f, "setWindowHandle {handle}"),
            Self::SetStreamName(name) => write!(f, "setStreamName {name}"),
            Self::SetDefaultColor(argb) => write!(f, "setDefaultColor {argb:#010X}"),
            Self::ClearWindowHandle => write!(f, "clearWindowHandle"),
            Self::ClearStreamName => write!(f, "clearStreamName"),
            Self::Ignored => write!(f, "<ignored>"),
        }
    }
}

/// `strtoul(.., 0)`-style parse: `0x`/`0X` hex, `0b`/`0B` binary, `0o` or
/// a leading `0` octal, decimal otherwise.
fn parse_u32_any_base(text: &str) -> Option<u32> {
    let (digits, radix) = if let Some(rest) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        (rest, 16)
    } else if let Some(rest) = text
        .strip_prefix("0b")
        .or_else(|| text.strip_prefix("0B"))
    {
        (rest, 2)
    } else if let Some(rest) = text.strip_prefix("0o") {
        (rest, 8)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };
    if digits.is_empty() || digits.starts_with('+') {
        return None;
    }
    u32::from_str_radix(digits, radix).ok()
}

// ── Tests ────────────────────────────────────────────────────────
