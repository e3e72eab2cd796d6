//! Per-card text placement: title, body and cost badge.
//!
//! A [`FormattingModel`] is a pure value. Its only behaviour is
//! [`validate`](FormattingModel::validate), which runs before a model is
//! persisted and before it is composed.
//!
//! ## Absent vs. invalid
//!
//! Keys that are *absent* from a stored record or a formatting file take the
//! documented defaults below. Keys that are *present* but invalid are
//! rejected with a [`FieldError`] naming the dotted field path
//! (`title.size`, `body.lineSpacing`). Nothing is clamped or coerced.
//!
//! | Region | x | y | size | color | extra |
//! |--------|---|---|------|-------|-------|
//! | `title` | 20 | 16 | 18 | `#000000` | |
//! | `body` | 24 | 250 | 11 | `#333333` | 252×120 box, `left`, line spacing 1.2, wrap |
//! | `costBadge` | 250 | 16 | 16 | `#FFFFFF` | |
//!
//! All regions default to the `Sans` family. A region that is partially
//! specified takes the missing keys from that region's row above, so a
//! stored `costBadge = { font = "Serif" }` keeps its white badge position.

use crate::imaging::Color;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

/// Horizontal alignment of body text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Align {
    pub fn as_str(self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
            Align::Justify => "justify",
        }
    }
}

/// A single-line text region (title, cost badge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextStyle {
    pub x: f64,
    pub y: f64,
    pub font: String,
    pub size: f64,
    pub color: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            font: "Sans".to_string(),
            size: 14.0,
            color: "#000000".to_string(),
        }
    }
}

impl TextStyle {
    fn default_title() -> Self {
        Self {
            x: 20.0,
            y: 16.0,
            size: 18.0,
            ..Self::default()
        }
    }

    fn default_cost_badge() -> Self {
        Self {
            x: 250.0,
            y: 16.0,
            size: 16.0,
            color: "#FFFFFF".to_string(),
            ..Self::default()
        }
    }

    fn check(&self, region: &str, errors: &mut Vec<FieldError>) {
        check_position(region, "x", self.x, errors);
        check_position(region, "y", self.y, errors);
        check_font(region, &self.font, errors);
        check_size(region, "size", self.size, errors);
        check_color(region, &self.color, errors);
    }
}

/// The keys present in a stored title or cost badge.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialTextStyle {
    x: Option<f64>,
    y: Option<f64>,
    font: Option<String>,
    size: Option<f64>,
    color: Option<String>,
}

impl PartialTextStyle {
    fn over(self, base: TextStyle) -> TextStyle {
        TextStyle {
            x: self.x.unwrap_or(base.x),
            y: self.y.unwrap_or(base.y),
            font: self.font.unwrap_or(base.font),
            size: self.size.unwrap_or(base.size),
            color: self.color.unwrap_or(base.color),
        }
    }
}

fn title_style<'de, D: Deserializer<'de>>(d: D) -> Result<TextStyle, D::Error> {
    Ok(PartialTextStyle::deserialize(d)?.over(TextStyle::default_title()))
}

fn cost_badge_style<'de, D: Deserializer<'de>>(d: D) -> Result<TextStyle, D::Error> {
    Ok(PartialTextStyle::deserialize(d)?.over(TextStyle::default_cost_badge()))
}

/// The wrapped, boxed description region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct BodyStyle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub font: String,
    pub size: f64,
    pub color: String,
    pub align: Align,
    pub line_spacing: f64,
    pub wrap: bool,
}

impl Default for BodyStyle {
    fn default() -> Self {
        Self {
            x: 24.0,
            y: 250.0,
            width: 252.0,
            height: 120.0,
            font: "Sans".to_string(),
            size: 11.0,
            color: "#333333".to_string(),
            align: Align::Left,
            line_spacing: 1.2,
            wrap: true,
        }
    }
}

impl BodyStyle {
    fn check(&self, errors: &mut Vec<FieldError>) {
        check_position("body", "x", self.x, errors);
        check_position("body", "y", self.y, errors);
        check_size("body", "width", self.width, errors);
        check_size("body", "height", self.height, errors);
        check_font("body", &self.font, errors);
        check_size("body", "size", self.size, errors);
        check_color("body", &self.color, errors);
        check_size("body", "lineSpacing", self.line_spacing, errors);
    }
}

/// Text placement for the three regions of a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct FormattingModel {
    #[serde(deserialize_with = "title_style")]
    pub title: TextStyle,
    pub body: BodyStyle,
    #[serde(deserialize_with = "cost_badge_style")]
    pub cost_badge: TextStyle,
}

impl Default for FormattingModel {
    fn default() -> Self {
        Self {
            title: TextStyle::default_title(),
            body: BodyStyle::default(),
            cost_badge: TextStyle::default_cost_badge(),
        }
    }
}

impl FormattingModel {
    /// Check every field, collecting all failures rather than stopping at the first.
    pub fn validate(&self) -> Result<(), FormattingErrors> {
        let mut errors = Vec::new();
        self.title.check("title", &mut errors);
        self.body.check(&mut errors);
        self.cost_badge.check("costBadge", &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FormattingErrors(errors))
        }
    }

    /// Font families referenced by any region, deduplicated, in region order.
    pub fn families(&self) -> Vec<&str> {
        let mut families: Vec<&str> = Vec::with_capacity(3);
        for family in [
            self.title.font.as_str(),
            self.body.font.as_str(),
            self.cost_badge.font.as_str(),
        ] {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }
}

/// Parse a formatting model from TOML and validate it.
pub fn parse_toml(content: &str) -> Result<FormattingModel, FormattingError> {
    let model: FormattingModel = toml::from_str(content)?;
    model.validate()?;
    Ok(model)
}

#[derive(Error, Debug)]
pub enum FormattingError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(#[from] FormattingErrors),
}

/// One failed formatting rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path, e.g. `title.size`.
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All rule failures of one [`FormattingModel::validate`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattingErrors(pub Vec<FieldError>);

impl FormattingErrors {
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.field.as_str())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields().any(|f| f == field)
    }
}

impl fmt::Display for FormattingErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for FormattingErrors {}

fn push(errors: &mut Vec<FieldError>, region: &str, key: &str, message: impl Into<String>) {
    errors.push(FieldError {
        field: format!("{region}.{key}"),
        message: message.into(),
    });
}

fn check_position(region: &str, key: &str, value: f64, errors: &mut Vec<FieldError>) {
    if !value.is_finite() || value < 0.0 {
        push(
            errors,
            region,
            key,
            format!("must be a finite non-negative number, got {value}"),
        );
    }
}

fn check_size(region: &str, key: &str, value: f64, errors: &mut Vec<FieldError>) {
    if !value.is_finite() || value <= 0.0 {
        push(
            errors,
            region,
            key,
            format!("must be a finite number greater than zero, got {value}"),
        );
    }
}

fn check_font(region: &str, font: &str, errors: &mut Vec<FieldError>) {
    if font.trim().is_empty() {
        push(errors, region, "font", "must not be empty");
    }
}

fn check_color(region: &str, color: &str, errors: &mut Vec<FieldError>) {
    if Color::parse(color).is_none() {
        push(
            errors,
            region,
            "color",
            format!("'{color}' is not a hex color or a known color name"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_is_valid() {
        assert!(FormattingModel::default().validate().is_ok());
    }

    #[test]
    fn negative_title_size_names_the_field() {
        let mut model = FormattingModel::default();
        model.title.size = -5.0;
        let errors = model.validate().unwrap_err();
        assert_eq!(errors.0.len(), 1);
        assert!(errors.contains("title.size"));
        assert!(errors.to_string().starts_with("title.size:"));
    }

    #[test]
    fn zero_size_is_rejected_but_zero_position_is_not() {
        let mut model = FormattingModel::default();
        model.cost_badge.x = 0.0;
        model.cost_badge.y = 0.0;
        assert!(model.validate().is_ok());

        model.cost_badge.size = 0.0;
        assert!(model.validate().unwrap_err().contains("costBadge.size"));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut model = FormattingModel::default();
        model.body.x = f64::NAN;
        model.body.width = f64::INFINITY;
        model.body.line_spacing = 0.0;
        let errors = model.validate().unwrap_err();
        assert!(errors.contains("body.x"));
        assert!(errors.contains("body.width"));
        assert!(errors.contains("body.lineSpacing"));
    }

    #[test]
    fn blank_font_and_unknown_color_are_rejected() {
        let mut model = FormattingModel::default();
        model.title.font = "   ".to_string();
        model.body.color = "not-a-color".to_string();
        let errors = model.validate().unwrap_err();
        assert!(errors.contains("title.font"));
        assert!(errors.contains("body.color"));
    }

    #[test]
    fn all_failures_are_collected() {
        let mut model = FormattingModel::default();
        model.title.size = -1.0;
        model.body.height = -1.0;
        model.cost_badge.font = String::new();
        assert_eq!(model.validate().unwrap_err().0.len(), 3);
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn absent_regions_take_region_defaults() {
        let model = parse_toml(
            r##"
[title]
x = 80
y = 25
font = "Arial Black"
size = 18
color = "#FF4444"
"##,
        )
        .unwrap();
        assert_eq!(model.title.font, "Arial Black");
        assert_eq!(model.body, BodyStyle::default());
        assert_eq!(model.cost_badge, TextStyle::default_cost_badge());
    }

    #[test]
    fn partial_regions_fill_from_their_own_defaults() {
        let model = parse_toml(
            r#"
[title]
font = "Serif"

[costBadge]
font = "X"
"#,
        )
        .unwrap();
        assert_eq!(
            model.cost_badge,
            TextStyle {
                font: "X".to_string(),
                ..TextStyle::default_cost_badge()
            }
        );
        assert_eq!(
            model.title,
            TextStyle {
                font: "Serif".to_string(),
                ..TextStyle::default_title()
            }
        );
    }

    #[test]
    fn partial_cost_badge_in_stored_card_keeps_badge_defaults() {
        let model: FormattingModel =
            serde_json::from_str(r#"{"costBadge": {"font": "X"}}"#).unwrap();
        assert_eq!(model.cost_badge.color, "#FFFFFF");
        assert_eq!((model.cost_badge.x, model.cost_badge.y), (250.0, 16.0));
    }

    #[test]
    fn unknown_region_key_is_rejected() {
        assert!(matches!(
            parse_toml("[title]\nweight = 3\n"),
            Err(FormattingError::Toml(_))
        ));
    }

    #[test]
    fn camel_case_keys_parse() {
        let model = parse_toml(
            r#"
[body]
align = "justify"
lineSpacing = 1.3
wrap = false

[costBadge]
color = "blue"
"#,
        )
        .unwrap();
        assert_eq!(model.body.align, Align::Justify);
        assert_eq!(model.body.line_spacing, 1.3);
        assert!(!model.body.wrap);
        assert_eq!(model.cost_badge.color, "blue");
    }

    #[test]
    fn unknown_alignment_is_a_parse_error() {
        let result = parse_toml(
            r#"
[body]
align = "diagonal"
"#,
        );
        assert!(matches!(result, Err(FormattingError::Toml(_))));
    }

    #[test]
    fn invalid_present_value_is_rejected_not_defaulted() {
        let result = parse_toml(
            r#"
[title]
size = -5
"#,
        );
        match result {
            Err(FormattingError::Invalid(errors)) => assert!(errors.contains("title.size")),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn unknown_key_rejected() {
        let result = parse_toml(
            r#"
[title]
sise = 12
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn families_are_deduplicated() {
        let mut model = FormattingModel::default();
        model.body.font = "Serif".to_string();
        assert_eq!(model.families(), vec!["Sans", "Serif"]);
    }

    #[test]
    fn json_uses_export_key_names() {
        let json = serde_json::to_value(FormattingModel::default()).unwrap();
        assert!(json.get("costBadge").is_some());
        assert!(json["body"].get("lineSpacing").is_some());
        assert_eq!(json["body"]["align"], "left");
    }
}
