//! Card composition: the layering itself.
//!
//! [`composite`] is pure. It takes already-decoded pixels and returns a new
//! canvas; decoding and encoding stay behind the
//! [`ImageBackend`](super::ImageBackend) seam. Layer order is fixed:
//!
//! 1. the rarity template, as the base layer
//! 2. the source artwork, resized to fill the art region and center-cropped
//! 3. title text
//! 4. body text, wrapped and aligned inside its box and clipped to it
//! 5. cost badge text

use super::backend::BackendError;
use super::calculations::{
    Line, align_offset, calculate_fill_dimensions, center_crop_offset, justify_gap,
    visible_line_count, wrap_lines,
};
use super::params::{Color, Region};
use super::text::{Clip, Face, FontBook};
use crate::formatting::{Align, BodyStyle, FormattingModel, TextStyle};
use image::RgbaImage;
use image::imageops::{self, FilterType};

/// The text content drawn onto a card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardText {
    pub title: String,
    pub body: String,
    pub cost: String,
}

/// A body line positioned in canvas coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub line: Line,
    pub x: f64,
    pub y: f64,
    /// Word gap when the line is justified.
    pub gap: Option<f64>,
}

fn color_of(field: &str, value: &str) -> Result<Color, BackendError> {
    Color::parse(value)
        .ok_or_else(|| BackendError::ProcessingFailed(format!("{field}: invalid color '{value}'")))
}

/// Lay out body text inside its box.
///
/// Lines that start below the box are dropped; a line straddling the bottom
/// edge is kept and clipped when drawn. Text is never shrunk to fit.
pub fn layout_body(body: &BodyStyle, text: &str, face: Face<'_>) -> Vec<PlacedLine> {
    let measure = |s: &str| face.measure(s, body.size);
    let max_width = body.wrap.then_some(body.width);
    let line_height = face.line_height(body.size) * body.line_spacing;
    let visible = visible_line_count(body.height, line_height);

    wrap_lines(text, max_width, measure)
        .into_iter()
        .take(visible)
        .enumerate()
        .map(|(i, line)| {
            let words_width: f64 = line.words.iter().map(|w| measure(w)).sum();
            let gap = match body.align {
                Align::Justify => justify_gap(&line, body.width, words_width),
                _ => None,
            };
            let natural = measure(&line.text());
            PlacedLine {
                x: body.x + align_offset(body.align, body.width, natural),
                y: body.y + i as f64 * line_height,
                gap,
                line,
            }
        })
        .collect()
}

fn draw_single(
    canvas: &mut RgbaImage,
    style: &TextStyle,
    field: &str,
    text: &str,
    fonts: &FontBook,
) -> Result<(), BackendError> {
    let color = color_of(field, &style.color)?;
    let clip = Clip::canvas(canvas);
    fonts
        .face(&style.font)
        .draw(canvas, text, (style.x, style.y), style.size, color, clip);
    Ok(())
}

fn draw_body(
    canvas: &mut RgbaImage,
    body: &BodyStyle,
    text: &str,
    fonts: &FontBook,
) -> Result<(), BackendError> {
    let color = color_of("body.color", &body.color)?;
    let face = fonts.face(&body.font);
    let clip = Clip::from_box(body.x, body.y, body.width, body.height);

    for placed in layout_body(body, text, face) {
        match placed.gap {
            Some(gap) => {
                let mut x = placed.x;
                for word in &placed.line.words {
                    face.draw(canvas, word, (x, placed.y), body.size, color, clip);
                    x += face.measure(word, body.size) + gap;
                }
            }
            None => face.draw(
                canvas,
                &placed.line.text(),
                (placed.x, placed.y),
                body.size,
                color,
                clip,
            ),
        }
    }
    Ok(())
}

/// Copy `art` into `region` of `canvas`, covering it completely.
fn place_art(canvas: &mut RgbaImage, art: &RgbaImage, region: Region) {
    let region = region.clamp_to(canvas.width(), canvas.height());
    if region.is_empty() || art.width() == 0 || art.height() == 0 {
        return;
    }
    let target = (region.width, region.height);
    let (fill_w, fill_h) = calculate_fill_dimensions(art.dimensions(), target);
    let filled = imageops::resize(art, fill_w, fill_h, FilterType::Lanczos3);
    let (off_x, off_y) = center_crop_offset((fill_w, fill_h), target);
    let cropped = imageops::crop_imm(&filled, off_x, off_y, region.width, region.height).to_image();
    imageops::replace(canvas, &cropped, region.x as i64, region.y as i64);
}

/// Build a rendered card in memory.
pub fn composite(
    template: &RgbaImage,
    art: &RgbaImage,
    region: Region,
    text: &CardText,
    formatting: &FormattingModel,
    fonts: &FontBook,
) -> Result<RgbaImage, BackendError> {
    let mut canvas = template.clone();
    place_art(&mut canvas, art, region);
    draw_single(&mut canvas, &formatting.title, "title.color", &text.title, fonts)?;
    draw_body(&mut canvas, &formatting.body, &text.body, fonts)?;
    draw_single(
        &mut canvas,
        &formatting.cost_badge,
        "costBadge.color",
        &text.cost,
        fonts,
    )?;
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 200, 0, 255]);

    fn text() -> CardText {
        CardText {
            title: "Fireball".to_string(),
            body: "Deals 3 damage.".to_string(),
            cost: "3".to_string(),
        }
    }

    fn body(align: Align, wrap: bool) -> BodyStyle {
        BodyStyle {
            x: 10.0,
            y: 100.0,
            width: 80.0,
            height: 40.0,
            size: 8.0,
            align,
            line_spacing: 1.0,
            wrap,
            ..BodyStyle::default()
        }
    }

    // =========================================================================
    // Body layout
    // =========================================================================

    #[test]
    fn body_wraps_inside_box_width() {
        // Builtin face: 8px per char at size 8, so 10 chars per 80px line.
        let lines = layout_body(&body(Align::Left, true), "aaaa bbbb cccc dddd", Face::Builtin);
        let texts: Vec<String> = lines.iter().map(|p| p.line.text()).collect();
        assert_eq!(texts, vec!["aaaa bbbb", "cccc dddd"]);
        assert_eq!(lines[0].y, 100.0);
        assert_eq!(lines[1].y, 108.0);
    }

    #[test]
    fn body_overflow_is_clipped_not_shrunk() {
        let text = "aaaa bbbb cccc dddd eeee ffff gggg hhhh iiii jjjj kkkk llll";
        let lines = layout_body(&body(Align::Left, true), text, Face::Builtin);
        // 40px box / 8px lines = 5 visible lines
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn line_spacing_moves_lines_apart() {
        let mut style = body(Align::Left, true);
        style.line_spacing = 1.5;
        let lines = layout_body(&style, "aaaa bbbb cccc", Face::Builtin);
        assert_eq!(lines[1].y - lines[0].y, 12.0);
    }

    #[test]
    fn right_and_center_alignment_offsets() {
        let right = layout_body(&body(Align::Right, true), "abc", Face::Builtin);
        assert_eq!(right[0].x, 10.0 + 80.0 - 24.0);
        let center = layout_body(&body(Align::Center, true), "abc", Face::Builtin);
        assert_eq!(center[0].x, 10.0 + 28.0);
    }

    #[test]
    fn justify_spreads_all_but_last_line() {
        let lines = layout_body(&body(Align::Justify, true), "aaa bbb ccc ddd", Face::Builtin);
        assert_eq!(lines.len(), 2);
        // "aaa bbb" packs, words 48px wide, so the single gap is 32px
        assert_eq!(lines[0].gap, Some(32.0));
        assert_eq!(lines[1].gap, None);
    }

    #[test]
    fn unwrapped_body_keeps_one_line_per_paragraph() {
        let lines = layout_body(
            &body(Align::Left, false),
            "a line far wider than the box",
            Face::Builtin,
        );
        assert_eq!(lines.len(), 1);
    }

    // =========================================================================
    // Composite
    // =========================================================================

    #[test]
    fn art_fills_region_and_nothing_else() {
        let template = RgbaImage::from_pixel(100, 140, WHITE);
        let art = RgbaImage::from_pixel(30, 10, GREEN);
        let mut formatting = FormattingModel::default();
        // push all text off the art region
        formatting.title.y = 130.0;
        formatting.cost_badge.y = 130.0;
        formatting.body.y = 135.0;
        let region = Region::new(10, 20, 50, 40);
        let out = composite(
            &template,
            &art,
            region,
            &text(),
            &formatting,
            &FontBook::builtin(),
        )
        .unwrap();

        assert_eq!(out.dimensions(), (100, 140));
        assert_eq!(*out.get_pixel(10, 20), GREEN);
        assert_eq!(*out.get_pixel(59, 59), GREEN);
        assert_eq!(*out.get_pixel(9, 20), WHITE);
        assert_eq!(*out.get_pixel(60, 20), WHITE);
        assert_eq!(*out.get_pixel(10, 60), WHITE);
    }

    #[test]
    fn title_is_drawn_in_its_color() {
        let template = RgbaImage::from_pixel(200, 100, WHITE);
        let mut formatting = FormattingModel::default();
        formatting.title.x = 0.0;
        formatting.title.y = 0.0;
        formatting.title.size = 16.0;
        formatting.title.color = "#FF0000".to_string();
        let out = composite(
            &template,
            &RgbaImage::new(1, 1),
            Region::new(0, 0, 0, 0),
            &text(),
            &formatting,
            &FontBook::builtin(),
        )
        .unwrap();
        let red_pixels = out
            .enumerate_pixels()
            .filter(|(x, y, p)| *x < 128 && *y < 16 && **p == Rgba([255, 0, 0, 255]))
            .count();
        assert!(red_pixels > 0);
    }

    #[test]
    fn body_never_paints_outside_its_box() {
        let template = RgbaImage::from_pixel(200, 200, WHITE);
        let mut formatting = FormattingModel::default();
        formatting.title.y = 190.0;
        formatting.title.x = 190.0;
        formatting.cost_badge.y = 190.0;
        formatting.cost_badge.x = 190.0;
        formatting.body = body(Align::Left, true);
        let long = CardText {
            body: "wwww ".repeat(40),
            ..text()
        };
        let out = composite(
            &template,
            &RgbaImage::new(1, 1),
            Region::new(0, 0, 0, 0),
            &long,
            &formatting,
            &FontBook::builtin(),
        )
        .unwrap();
        for (x, y, p) in out.enumerate_pixels() {
            if *p != WHITE && y < 190 {
                assert!((10..90).contains(&x) && (100..140).contains(&y), "({x},{y})");
            }
        }
    }

    #[test]
    fn composite_is_deterministic() {
        let template = RgbaImage::from_fn(60, 80, |x, y| Rgba([x as u8, y as u8, 90, 255]));
        let art = RgbaImage::from_fn(17, 23, |x, y| Rgba([200, x as u8 * 9, y as u8 * 7, 255]));
        let region = Region::new(5, 8, 40, 30);
        let formatting = FormattingModel::default();
        let fonts = FontBook::builtin();
        let a = composite(&template, &art, region, &text(), &formatting, &fonts).unwrap();
        let b = composite(&template, &art, region, &text(), &formatting, &fonts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_color_is_an_error_not_a_fallback() {
        let mut formatting = FormattingModel::default();
        formatting.body.color = "mauve-ish".to_string();
        let result = composite(
            &RgbaImage::new(10, 10),
            &RgbaImage::new(1, 1),
            Region::new(0, 0, 0, 0),
            &text(),
            &formatting,
            &FontBook::builtin(),
        );
        assert!(matches!(result, Err(BackendError::ProcessingFailed(m)) if m.contains("body.color")));
    }
}
