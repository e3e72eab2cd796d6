//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the pixel-I/O seam of composition: decode
//! the source artwork, decode a rarity template, encode the finished canvas.
//! Layering itself is pure and lives in [`operations`](super::operations).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use the
//! [`MockBackend`](tests::MockBackend) below, which records every call so a
//! test can assert exactly which files a composition read.
//!
//! Artwork is decoded through `&SourceImage` only. The trait has no way to
//! decode a rendered image back into a composition input.

use crate::templates::TemplateAsset;
use crate::types::SourceImage;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("PNG encode failed: {0}")]
    Encode(String),
    #[error("Font '{family}' could not be loaded from {path}: {reason}")]
    Font {
        family: String,
        path: PathBuf,
        reason: String,
    },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Pixel I/O used by the composition engine.
///
/// `Sync` so one backend can serve a rayon batch.
pub trait ImageBackend: Sync {
    /// Read image dimensions without a full decode.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the pristine artwork of a card.
    fn decode_source(&self, source: &SourceImage) -> Result<RgbaImage, BackendError>;

    /// Decode the border/overlay image of a rarity tier.
    fn decode_template(&self, template: &TemplateAsset) -> Result<RgbaImage, BackendError>;

    /// Encode a finished canvas. Equal canvases must encode to equal bytes.
    fn encode_png(&self, image: &RgbaImage) -> Result<Vec<u8>, BackendError>;
}
