//! Text measurement and rasterisation.
//!
//! A [`FontBook`] maps family names from `[fonts]` in `engine.toml` to font
//! files, rasterised with `ab_glyph`. A family with no configured file uses
//! the built-in 8×8 bitmap face from `font8x8`, scaled to the requested
//! size. Rendering therefore never depends on which fonts happen to be
//! installed on the machine, and a given book always produces the same
//! pixels.
//!
//! All drawing goes through a [`Clip`] rectangle; pixels outside it are
//! dropped, which is how body overflow is clipped.

use super::backend::BackendError;
use super::params::Color;
use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::RgbaImage;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Pixel rectangle that drawing is confined to. Right and bottom are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clip {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Clip {
    /// The whole canvas.
    pub fn canvas(image: &RgbaImage) -> Clip {
        Clip {
            left: 0,
            top: 0,
            right: image.width() as i64,
            bottom: image.height() as i64,
        }
    }

    /// A box given in layout units, snapped outward to whole pixels.
    pub fn from_box(x: f64, y: f64, width: f64, height: f64) -> Clip {
        Clip {
            left: x.floor() as i64,
            top: y.floor() as i64,
            right: (x + width).ceil() as i64,
            bottom: (y + height).ceil() as i64,
        }
    }

    pub fn intersect(self, other: Clip) -> Clip {
        Clip {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

/// Blend `color` at `coverage` (0–1) over the canvas pixel at `(x, y)`.
fn blend(canvas: &mut RgbaImage, x: i64, y: i64, color: Color, coverage: f32, clip: Clip) {
    if !clip.contains(x, y) || coverage <= 0.0 {
        return;
    }
    let a = coverage.min(1.0) * color.alpha() as f32 / 255.0;
    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    for c in 0..3 {
        let mixed = color.0[c] as f32 * a + dst[c] as f32 * (1.0 - a);
        dst[c] = mixed.round().clamp(0.0, 255.0) as u8;
    }
    let alpha = 255.0 * a + dst[3] as f32 * (1.0 - a);
    dst[3] = alpha.round().clamp(0.0, 255.0) as u8;
}

/// Font families available to composition.
#[derive(Default)]
pub struct FontBook {
    faces: HashMap<String, LoadedFont>,
}

struct LoadedFont {
    path: PathBuf,
    font: FontVec,
}

impl FontBook {
    /// A book with no font files: every family renders with the built-in face.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Load every configured family. Relative paths resolve against `base_dir`.
    ///
    /// A configured file that is missing or not a font is an error here, at
    /// startup, rather than a silent fallback at render time.
    pub fn load(fonts: &BTreeMap<String, String>, base_dir: &Path) -> Result<Self, BackendError> {
        let mut faces = HashMap::new();
        for (family, file) in fonts {
            let path = base_dir.join(file);
            let bytes = std::fs::read(&path).map_err(|e| BackendError::Font {
                family: family.clone(),
                path: path.clone(),
                reason: e.to_string(),
            })?;
            let font = FontVec::try_from_vec(bytes).map_err(|e| BackendError::Font {
                family: family.clone(),
                path: path.clone(),
                reason: e.to_string(),
            })?;
            debug!("Loaded font '{}' from {}", family, path.display());
            faces.insert(family.clone(), LoadedFont { path, font });
        }
        Ok(Self { faces })
    }

    pub fn face(&self, family: &str) -> Face<'_> {
        match self.faces.get(family) {
            Some(loaded) => Face::Outline(&loaded.font),
            None => Face::Builtin,
        }
    }

    /// Stable description of what a family renders with, for cache fingerprints.
    pub fn identity(&self, family: &str) -> String {
        match self.faces.get(family) {
            Some(loaded) => format!("{}={}", family, loaded.path.display()),
            None => format!("{family}=builtin"),
        }
    }

    pub fn families(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.faces.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// A resolved typeface.
#[derive(Clone, Copy)]
pub enum Face<'a> {
    Outline(&'a FontVec),
    Builtin,
}

impl Face<'_> {
    /// Advance width of `text` at `size` pixels.
    pub fn measure(&self, text: &str, size: f64) -> f64 {
        match self {
            Face::Outline(font) => {
                let scaled = font.as_scaled(PxScale::from(size as f32));
                let mut width = 0.0f32;
                let mut prev = None;
                for ch in text.chars() {
                    let id = scaled.glyph_id(ch);
                    if let Some(p) = prev {
                        width += scaled.kern(p, id);
                    }
                    width += scaled.h_advance(id);
                    prev = Some(id);
                }
                width as f64
            }
            Face::Builtin => text.chars().count() as f64 * size,
        }
    }

    /// Natural line height at `size` pixels, before line spacing.
    pub fn line_height(&self, size: f64) -> f64 {
        match self {
            Face::Outline(font) => {
                let scaled = font.as_scaled(PxScale::from(size as f32));
                (scaled.ascent() - scaled.descent() + scaled.line_gap()) as f64
            }
            Face::Builtin => size,
        }
    }

    /// Draw one line of text with its top-left corner at `(x, y)`.
    pub fn draw(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        (x, y): (f64, f64),
        size: f64,
        color: Color,
        clip: Clip,
    ) {
        let clip = clip.intersect(Clip::canvas(canvas));
        match self {
            Face::Outline(font) => draw_outline(font, canvas, text, (x, y), size, color, clip),
            Face::Builtin => draw_bitmap(canvas, text, (x, y), size, color, clip),
        }
    }
}

fn draw_outline(
    font: &FontVec,
    canvas: &mut RgbaImage,
    text: &str,
    (x, y): (f64, f64),
    size: f64,
    color: Color,
    clip: Clip,
) {
    let scale = PxScale::from(size as f32);
    let scaled = font.as_scaled(scale);
    let baseline = y as f32 + scaled.ascent();
    let mut caret = x as f32;
    let mut prev = None;
    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(p) = prev {
            caret += scaled.kern(p, id);
        }
        let glyph = id.with_scale_and_position(scale, point(caret, baseline));
        caret += scaled.h_advance(id);
        prev = Some(id);

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i64 + gx as i64;
                let py = bounds.min.y as i64 + gy as i64;
                blend(canvas, px, py, color, coverage, clip);
            });
        }
    }
}

fn bitmap_glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Each glyph bit becomes a `size/8` square block; bit 0 is the leftmost column.
fn draw_bitmap(
    canvas: &mut RgbaImage,
    text: &str,
    (x, y): (f64, f64),
    size: f64,
    color: Color,
    clip: Clip,
) {
    let cell = size / 8.0;
    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as f64 * size;
        for (row, bits) in bitmap_glyph(ch).iter().enumerate() {
            for col in 0..8 {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let x0 = (origin_x + col as f64 * cell).floor() as i64;
                let y0 = (y + row as f64 * cell).floor() as i64;
                let x1 = ((origin_x + (col + 1) as f64 * cell).floor() as i64).max(x0 + 1);
                let y1 = ((y + (row + 1) as f64 * cell).floor() as i64).max(y0 + 1);
                for py in y0..y1 {
                    for px in x0..x1 {
                        blend(canvas, px, py, color, 1.0, clip);
                    }
                }
            }
        }
    }
}
