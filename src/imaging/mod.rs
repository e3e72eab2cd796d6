//! Imaging: decode, layer, draw text, encode. Pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (PNG, JPEG, TIFF, WebP) |
//! | **Art fill** | `imageops::resize` (Lanczos3) + center crop |
//! | **Text** | `ab_glyph` outlines, `font8x8` built-in face |
//! | **Encode** | `PngEncoder` |
//!
//! The module is split into:
//! - **Calculations**: pure layout math (unit testable)
//! - **Parameters**: colors and pixel regions
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Text**: [`FontBook`] and glyph rasterisation
//! - **Operations**: [`composite`], the layering itself

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;
pub mod text;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::default_art_region;
pub use operations::{CardText, composite};
pub use params::{Color, Region};
pub use rust_backend::{RustBackend, is_supported_image, supported_input_extensions};
pub use text::FontBook;
