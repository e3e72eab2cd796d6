//! Shared test utilities for the cardsmith test suite.
//!
//! [`Fixture`] is an isolated project directory with three discovered
//! rarity templates. Template and artwork PNGs are generated on the fly with
//! the `image` crate, so tests never depend on checked-in binaries.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let fx = Fixture::new();
//! let card = sample_card(&fx, 1, "Common");
//! let outcome = fx.engine().compose(&card).unwrap();
//! ```

use image::{Rgba, RgbaImage};
use std::path::Path;
use tempfile::TempDir;

use crate::compose::CompositionEngine;
use crate::config::EngineConfig;
use crate::formatting::{BodyStyle, FormattingModel, TextStyle};
use crate::store::{LIBRARY_FILENAME, Library};
use crate::types::{Card, CardId, Rarity, SourceImage};

pub const TEMPLATE_WIDTH: u32 = 120;
pub const TEMPLATE_HEIGHT: u32 = 168;

// =========================================================================
// Fixture setup
// =========================================================================

/// A temp project with `templates/010-Common.png`, `020-Rare.png` and
/// `030-Legendary.png`, each a distinct solid frame.
pub struct Fixture {
    tmp: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("templates");
        std::fs::create_dir_all(&dir).unwrap();
        for (file, color) in [
            ("010-Common.png", [150, 150, 150, 255]),
            ("020-Rare.png", [40, 90, 200, 255]),
            ("030-Legendary.png", [220, 160, 20, 255]),
        ] {
            RgbaImage::from_pixel(TEMPLATE_WIDTH, TEMPLATE_HEIGHT, Rgba(color))
                .save(dir.join(file))
                .unwrap();
        }
        Self { tmp }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    /// Stock config with formatting scaled to the fixture templates.
    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            formatting: small_formatting(),
            ..EngineConfig::default()
        }
    }

    pub fn engine(&self) -> CompositionEngine {
        CompositionEngine::open(self.root(), self.config()).unwrap()
    }

    /// Empty library saving into the fixture root.
    pub fn library(&self) -> Library {
        Library::new(self.root().join(LIBRARY_FILENAME))
    }

    /// Write a deterministic gradient PNG at `rel` and return its reference.
    pub fn write_art(&self, rel: &str, seed: u8) -> SourceImage {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbaImage::from_fn(48, 36, |x, y| {
            Rgba([
                (x * 5) as u8 ^ seed,
                (y * 7) as u8,
                seed.wrapping_mul(3),
                255,
            ])
        })
        .save(&path)
        .unwrap();
        SourceImage::new(rel)
    }

    /// Create a card in `library` with freshly written artwork.
    pub fn add_card(&self, library: &mut Library, name: &str, rarity: &str) -> CardId {
        let rel = format!("art/{}.png", name.to_lowercase().replace(' ', "-"));
        let source = self.write_art(&rel, name.len() as u8);
        library
            .create_card(
                name,
                Rarity::new(rarity),
                2,
                source,
                small_formatting(),
            )
            .unwrap()
    }
}

/// Formatting that fits a 120×168 template.
pub fn small_formatting() -> FormattingModel {
    FormattingModel {
        title: TextStyle {
            x: 8.0,
            y: 6.0,
            size: 10.0,
            ..TextStyle::default()
        },
        body: BodyStyle {
            x: 8.0,
            y: 104.0,
            width: 104.0,
            height: 48.0,
            size: 8.0,
            ..BodyStyle::default()
        },
        cost_badge: TextStyle {
            x: 100.0,
            y: 6.0,
            size: 10.0,
            color: "#FFFFFF".to_string(),
            ..TextStyle::default()
        },
    }
}

/// A card with id `id` whose artwork lives at `art/card-{id}.png`.
pub fn sample_card(fx: &Fixture, id: u32, rarity: &str) -> Card {
    let source = fx.write_art(&format!("art/card-{id}.png"), id as u8);
    Card::new(CardId(id), format!("Card {id}"), Rarity::new(rarity), 3, source)
        .with_description("Deals damage to every enemy standing in the way.")
        .with_formatting(small_formatting())
}
