//! Pure layout math for composition.
//!
//! All functions here are pure and testable without any I/O or images. Text
//! measurement is injected as a closure so wrapping can be tested with a
//! fixed-width stand-in.

use super::params::Region;
use crate::formatting::Align;

/// The artwork window used when neither the rarity nor the config sets one.
///
/// Inset 8% horizontally, starting 14% down, 45% of the card tall: the
/// classic upper-half art box.
pub fn default_art_region(canvas: (u32, u32)) -> Region {
    let (w, h) = canvas;
    let x = (w as f64 * 0.08).round() as u32;
    let y = (h as f64 * 0.14).round() as u32;
    Region {
        x,
        y,
        width: w.saturating_sub(2 * x),
        height: (h as f64 * 0.45).round() as u32,
    }
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(tgt_h);
        (w, h)
    }
}

/// Offset of a centered `target` crop inside `filled`.
pub fn center_crop_offset(filled: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    (
        filled.0.saturating_sub(target.0) / 2,
        filled.1.saturating_sub(target.1) / 2,
    )
}

/// One laid-out line of body text.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub words: Vec<String>,
    /// Last line of a paragraph; never stretched when justifying.
    pub paragraph_end: bool,
}

impl Line {
    pub fn text(&self) -> String {
        self.words.join(" ")
    }
}

/// Break text into lines.
///
/// Explicit newlines always start a new paragraph. With `max_width` set,
/// words are packed greedily; a single word wider than the box gets a line
/// of its own (and is clipped when drawn). With `max_width` unset, each
/// paragraph is exactly one line.
pub fn wrap_lines(text: &str, max_width: Option<f64>, measure: impl Fn(&str) -> f64) -> Vec<Line> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(Line {
                words: Vec::new(),
                paragraph_end: true,
            });
            continue;
        }

        let Some(max_width) = max_width else {
            lines.push(Line {
                words: words.iter().map(|w| w.to_string()).collect(),
                paragraph_end: true,
            });
            continue;
        };

        let mut current: Vec<&str> = Vec::new();
        for word in words {
            if current.is_empty() {
                current.push(word);
                continue;
            }
            let candidate = format!("{} {}", current.join(" "), word);
            if measure(&candidate) <= max_width {
                current.push(word);
            } else {
                lines.push(Line {
                    words: current.iter().map(|w| w.to_string()).collect(),
                    paragraph_end: false,
                });
                current = vec![word];
            }
        }
        lines.push(Line {
            words: current.iter().map(|w| w.to_string()).collect(),
            paragraph_end: true,
        });
    }
    lines
}

/// Horizontal start of a line of `line_width` inside a box of `box_width`.
///
/// Lines wider than the box start at the box edge whatever the alignment,
/// so overflow is clipped on the right.
pub fn align_offset(align: Align, box_width: f64, line_width: f64) -> f64 {
    let slack = (box_width - line_width).max(0.0);
    match align {
        Align::Left | Align::Justify => 0.0,
        Align::Center => slack / 2.0,
        Align::Right => slack,
    }
}

/// Gap between words when justifying, or `None` when the line stays ragged.
///
/// Paragraph-final lines and single-word lines are not stretched.
pub fn justify_gap(line: &Line, box_width: f64, words_width: f64) -> Option<f64> {
    if line.paragraph_end || line.words.len() < 2 {
        return None;
    }
    let gaps = (line.words.len() - 1) as f64;
    Some(((box_width - words_width) / gaps).max(0.0))
}

/// Number of lines that are at least partially inside a box of `box_height`.
pub fn visible_line_count(box_height: f64, line_height: f64) -> usize {
    if line_height <= 0.0 || box_height <= 0.0 {
        return 0;
    }
    (box_height / line_height).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is 10 units wide.
    fn fixed(s: &str) -> f64 {
        s.chars().count() as f64 * 10.0
    }

    // =========================================================================
    // Art placement
    // =========================================================================

    #[test]
    fn default_art_region_is_inset() {
        let r = default_art_region((300, 420));
        assert_eq!(r, Region::new(24, 59, 252, 189));
    }

    #[test]
    fn fill_dimensions_landscape_source_into_portrait_box() {
        assert_eq!(calculate_fill_dimensions((400, 200), (100, 100)), (200, 100));
    }

    #[test]
    fn fill_dimensions_portrait_source_into_landscape_box() {
        assert_eq!(calculate_fill_dimensions((200, 400), (200, 100)), (200, 400));
    }

    #[test]
    fn fill_dimensions_never_undershoot_target() {
        let (w, h) = calculate_fill_dimensions((333, 101), (252, 189));
        assert!(w >= 252 && h >= 189);
    }

    #[test]
    fn center_crop_offset_centers() {
        assert_eq!(center_crop_offset((200, 100), (100, 100)), (50, 0));
        assert_eq!(center_crop_offset((100, 100), (100, 100)), (0, 0));
    }

    // =========================================================================
    // Wrapping
    // =========================================================================

    #[test]
    fn wraps_greedily() {
        let lines = wrap_lines("aa bb cc dd", Some(50.0), fixed);
        let texts: Vec<String> = lines.iter().map(Line::text).collect();
        assert_eq!(texts, vec!["aa bb", "cc dd"]);
        assert!(!lines[0].paragraph_end);
        assert!(lines[1].paragraph_end);
    }

    #[test]
    fn long_word_gets_its_own_line() {
        let lines = wrap_lines("a incomprehensibilities b", Some(50.0), fixed);
        let texts: Vec<String> = lines.iter().map(Line::text).collect();
        assert_eq!(texts, vec!["a", "incomprehensibilities", "b"]);
    }

    #[test]
    fn newlines_split_paragraphs() {
        let lines = wrap_lines("one\n\ntwo", Some(500.0), fixed);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.paragraph_end));
        assert!(lines[1].words.is_empty());
    }

    #[test]
    fn no_wrap_keeps_paragraph_on_one_line() {
        let lines = wrap_lines("a very long line indeed", None, fixed);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "a very long line indeed");
    }

    #[test]
    fn collapses_runs_of_whitespace() {
        let lines = wrap_lines("  deals \t 3   damage ", Some(500.0), fixed);
        assert_eq!(lines[0].text(), "deals 3 damage");
    }

    // =========================================================================
    // Alignment
    // =========================================================================

    #[test]
    fn align_offsets() {
        assert_eq!(align_offset(Align::Left, 100.0, 40.0), 0.0);
        assert_eq!(align_offset(Align::Center, 100.0, 40.0), 30.0);
        assert_eq!(align_offset(Align::Right, 100.0, 40.0), 60.0);
        assert_eq!(align_offset(Align::Justify, 100.0, 40.0), 0.0);
    }

    #[test]
    fn overflowing_line_starts_at_box_edge() {
        assert_eq!(align_offset(Align::Right, 100.0, 140.0), 0.0);
    }

    #[test]
    fn justify_stretches_inner_lines_only() {
        let inner = Line {
            words: vec!["aa".into(), "bb".into(), "cc".into()],
            paragraph_end: false,
        };
        assert_eq!(justify_gap(&inner, 100.0, 60.0), Some(20.0));

        let last = Line {
            paragraph_end: true,
            ..inner.clone()
        };
        assert_eq!(justify_gap(&last, 100.0, 60.0), None);

        let single = Line {
            words: vec!["aa".into()],
            paragraph_end: false,
        };
        assert_eq!(justify_gap(&single, 100.0, 20.0), None);
    }

    #[test]
    fn visible_lines_include_partial_last_line() {
        assert_eq!(visible_line_count(120.0, 13.2), 10);
        assert_eq!(visible_line_count(26.0, 13.0), 2);
        assert_eq!(visible_line_count(0.0, 13.2), 0);
    }
}
