//! Value types for composition: colors and pixel regions.
//!
//! ## Types
//!
//! - [`Color`]: RGBA color parsed from `#RGB`, `#RRGGBB`, `#RRGGBBAA` or a
//!   CSS basic color name.
//! - [`Region`]: an axis-aligned pixel rectangle on the template canvas,
//!   used for the artwork window.

use image::Rgba;
use serde::{Deserialize, Serialize};

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0x00, 0x00, 0x00]),
    ("silver", [0xC0, 0xC0, 0xC0]),
    ("gray", [0x80, 0x80, 0x80]),
    ("grey", [0x80, 0x80, 0x80]),
    ("white", [0xFF, 0xFF, 0xFF]),
    ("maroon", [0x80, 0x00, 0x00]),
    ("red", [0xFF, 0x00, 0x00]),
    ("purple", [0x80, 0x00, 0x80]),
    ("fuchsia", [0xFF, 0x00, 0xFF]),
    ("magenta", [0xFF, 0x00, 0xFF]),
    ("green", [0x00, 0x80, 0x00]),
    ("lime", [0x00, 0xFF, 0x00]),
    ("olive", [0x80, 0x80, 0x00]),
    ("yellow", [0xFF, 0xFF, 0x00]),
    ("navy", [0x00, 0x00, 0x80]),
    ("blue", [0x00, 0x00, 0xFF]),
    ("teal", [0x00, 0x80, 0x80]),
    ("aqua", [0x00, 0xFF, 0xFF]),
    ("cyan", [0x00, 0xFF, 0xFF]),
    ("orange", [0xFF, 0xA5, 0x00]),
    ("gold", [0xFF, 0xD7, 0x00]),
];

impl Color {
    /// Parse a hex or named color. Names are case-insensitive.
    pub fn parse(value: &str) -> Option<Color> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex);
        }
        NAMED_COLORS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(value))
            .map(|(_, [r, g, b])| Color([*r, *g, *b, 0xFF]))
    }

    pub fn rgba(self) -> Rgba<u8> {
        Rgba(self.0)
    }

    pub fn alpha(self) -> u8 {
        self.0[3]
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Color([nibble(0)?, nibble(1)?, nibble(2)?, 0xFF])),
        6 => Some(Color([byte(0)?, byte(2)?, byte(4)?, 0xFF])),
        8 => Some(Color([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

/// A pixel rectangle on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Shrink the region so it lies inside a `width`×`height` canvas.
    pub fn clamp_to(self, width: u32, height: u32) -> Region {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Region {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!(Color::parse("#FF4444"), Some(Color([255, 68, 68, 255])));
        assert_eq!(Color::parse("#333"), Some(Color([51, 51, 51, 255])));
        assert_eq!(Color::parse("#00000080"), Some(Color([0, 0, 0, 128])));
    }

    #[test]
    fn parses_named_colors_case_insensitively() {
        assert_eq!(Color::parse("blue"), Some(Color([0, 0, 255, 255])));
        assert_eq!(Color::parse("Gold"), Some(Color([255, 215, 0, 255])));
    }

    #[test]
    fn rejects_malformed_colors() {
        assert_eq!(Color::parse(""), None);
        assert_eq!(Color::parse("#12"), None);
        assert_eq!(Color::parse("#GGGGGG"), None);
        assert_eq!(Color::parse("#ééé"), None);
        assert_eq!(Color::parse("chartreuse-ish"), None);
    }

    #[test]
    fn region_clamps_to_canvas() {
        let r = Region::new(50, 60, 100, 100).clamp_to(120, 100);
        assert_eq!(r, Region::new(50, 60, 70, 40));
    }

    #[test]
    fn region_outside_canvas_becomes_empty() {
        let r = Region::new(500, 10, 20, 20).clamp_to(100, 100);
        assert!(r.is_empty());
    }
}
