//! # Cardsmith
//!
//! A trading-card composition and export engine. Each card pairs an original
//! artwork file with a rarity, text and formatting; the engine layers the
//! artwork onto the rarity's template, draws the text, and writes the result.
//! The card library (cards, actors and the links between them) exports to a
//! brace-delimited text format consumed by a game engine.
//!
//! # Architecture: Two Independent Paths
//!
//! ```text
//! change (rarity, formatting) ─► validate ─► compose ─► save_card
//!                                               │
//!                   source art + template + text └─► rendered/card-NNNN.png
//!
//! export request ─► snapshot store ─► group by actor ─► export text
//! ```
//!
//! Composition runs only when rarity or formatting changes. Export reads
//! whatever is persisted and never composes.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Card, actor and image-reference types |
//! | [`formatting`] | Typed text placement per region, with field-level validation |
//! | [`templates`] | Rarity label → template asset resolution, discovery and reload |
//! | [`imaging`] | Pure-Rust decode, compositing, text rendering and PNG encoding |
//! | [`compose`] | The composition engine: single writer per card, atomic output |
//! | [`cache`] | Content-addressed render cache |
//! | [`associations`] | Many-to-many card ↔ actor index |
//! | [`store`] | `CardStore` data-access trait and the JSON `Library` |
//! | [`export`] | Export writer, reader and grouping |
//! | [`service`] | Applies changes: validate, compose, persist |
//! | [`config`] | `engine.toml` loading, merging and validation |
//! | [`naming`] | `NNN-Label` template filename parser |
//! | [`persist`] | Write-to-temp-then-rename file replacement |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Source and Rendered Are Different Types
//!
//! [`types::SourceImage`] is set once when a card is created and has no
//! setter. [`types::RenderedImage`] is always derived and freely
//! overwritten. The compositor only accepts a `SourceImage` for artwork, so
//! there is no code path that composites on top of a previous render: cycling
//! a card's rarity A → B → A reproduces the direct A render byte for byte.
//!
//! ## Rarity Is Configuration
//!
//! Rarity is an open string label resolved through the
//! [`templates::TemplateRegistry`]. Dropping `040-Mythic.png` into the
//! template directory, or adding a `[rarities]` entry, adds a tier without
//! recompiling.
//!
//! ## Absent Versus Invalid Formatting
//!
//! A formatting key that is missing takes its documented default. A key that
//! is present but wrong (negative size, unknown color, empty font) is
//! rejected with the dotted field path, before anything is persisted or
//! composed. Nothing is silently coerced.
//!
//! ## Deterministic Output
//!
//! Text is rendered either with a configured outline font or with a built-in
//! bitmap face, so a render never depends on which fonts happen to be
//! installed. Identical inputs give identical PNG bytes, which is what lets
//! the render cache skip work and lets tests compare checksums.

pub mod associations;
pub mod cache;
pub mod compose;
pub mod config;
pub mod export;
pub mod formatting;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod persist;
pub mod service;
pub mod store;
pub mod templates;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
