//! Engine configuration module.
//!
//! Handles loading, validating, and merging `engine.toml`. Stock defaults
//! are the base layer; the file at the project root overrides them key by
//! key. There is no global state: the resolved [`EngineConfig`] is passed
//! explicitly to the [`TemplateRegistry`](crate::templates::TemplateRegistry),
//! the [`FontBook`](crate::imaging::FontBook) and the
//! [`CompositionEngine`](crate::compose::CompositionEngine).
//!
//! ## Config File Location
//!
//! ```text
//! project/
//! ├── engine.toml              # Overrides stock defaults
//! ├── library.json             # Cards, actors, links
//! ├── templates/
//! │   ├── 010-Common.png       # Discovered rarity "Common", tier 10
//! │   ├── 020-Rare.png
//! │   └── 030-Legendary.png
//! └── rendered/                # Composited cards
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! rendered_dir = "rendered"     # Where composited cards are written
//! template_dir = "templates"    # Scanned for NNN-Label.png rarity templates
//!
//! [rarities]                    # Explicit rarity → template mappings
//! Mythic = "art/frames/mythic.png"
//! Promo = { path = "promo.png", art = { x = 20, y = 40, width = 260, height = 180 } }
//!
//! [art]                         # Default artwork window (omit for 8%/14%/45% inset)
//! x = 24
//! y = 59
//! width = 252
//! height = 189
//!
//! [fonts]                       # Family name → font file
//! "Arial Black" = "fonts/ArialBlack.ttf"
//!
//! [formatting.title]            # Defaults for formatting keys cards omit
//! size = 18
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Rarity labels are open: adding a
//! `[rarities]` entry or dropping a new file into `template_dir` adds a tier
//! without recompiling. Unknown keys are rejected to catch typos early.

use crate::formatting::FormattingModel;
use crate::imaging::Region;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file at the project root.
pub const CONFIG_FILENAME: &str = "engine.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Engine configuration loaded from `engine.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory rendered cards are written to, relative to the project root.
    pub rendered_dir: String,
    /// Directory scanned for rarity templates, relative to the project root.
    /// A missing directory simply contributes no rarities.
    pub template_dir: String,
    /// Default artwork window for every rarity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art: Option<Region>,
    /// Explicit rarity label → template mappings. Override discovered ones.
    pub rarities: BTreeMap<String, RaritySpec>,
    /// Font family → font file.
    pub fonts: BTreeMap<String, String>,
    /// Formatting defaults for cards created without explicit formatting.
    pub formatting: FormattingModel,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rendered_dir: "rendered".to_string(),
            template_dir: "templates".to_string(),
            art: None,
            rarities: BTreeMap::new(),
            fonts: BTreeMap::new(),
            formatting: FormattingModel::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

/// One `[rarities]` entry: a bare path or a path with its own art window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RaritySpec {
    Path(String),
    Detailed {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        art: Option<Region>,
    },
}

impl RaritySpec {
    pub fn path(&self) -> &str {
        match self {
            RaritySpec::Path(path) => path,
            RaritySpec::Detailed { path, .. } => path,
        }
    }

    pub fn art(&self) -> Option<Region> {
        match self {
            RaritySpec::Path(_) => None,
            RaritySpec::Detailed { art, .. } => *art,
        }
    }
}

impl EngineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rendered_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "rendered_dir must not be empty".into(),
            ));
        }
        if let Some(art) = self.art
            && art.is_empty()
        {
            return Err(ConfigError::Validation(
                "art width and height must be non-zero".into(),
            ));
        }
        for (label, spec) in &self.rarities {
            if label.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "rarity labels must not be empty".into(),
                ));
            }
            if spec.path().trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "rarities.{label}: path must not be empty"
                )));
            }
            if spec.art().is_some_and(|r| r.is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "rarities.{label}: art width and height must be non-zero"
                )));
            }
        }
        for (family, file) in &self.fonts {
            if family.trim().is_empty() || file.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "fonts entries need a family name and a file".into(),
                ));
            }
        }
        self.formatting
            .validate()
            .map_err(|errors| ConfigError::Validation(format!("formatting: {errors}")))?;
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Absolute rendered directory for a project rooted at `root`.
    pub fn rendered_path(&self, root: &Path) -> PathBuf {
        root.join(&self.rendered_dir)
    }

    /// Absolute template directory for a project rooted at `root`.
    pub fn template_path(&self, root: &Path) -> PathBuf {
        root.join(&self.template_dir)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel composition workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(EngineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
///
/// A partially specified formatting region therefore keeps the stock
/// defaults of that region for every key it omits.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read `engine.toml` from `root`, if present, without deserializing it.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay on top of `base`, deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<EngineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: EngineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective config for the project at `root`.
pub fn load_config(root: &Path) -> Result<EngineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Apply a sparse formatting TOML document on top of `base`.
///
/// Keys the document omits keep their value from `base`. The result is not
/// validated; callers validate before persisting or composing.
pub fn overlay_formatting(
    base: &FormattingModel,
    overlay: &str,
) -> Result<FormattingModel, ConfigError> {
    let base = toml::Value::try_from(base)?;
    let overlay: toml::Value = toml::from_str(overlay)?;
    Ok(merge_toml(base, overlay).try_into()?)
}

/// A fully commented `engine.toml` documenting every option and its default.
pub fn stock_config_toml() -> &'static str {
    r##"# Card Engine Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# Where composited cards are written, relative to the project root.
rendered_dir = "rendered"

# Scanned recursively for rarity templates. A file named "010-Common.png"
# registers the rarity "Common" at tier 10; "Promo.png" registers "Promo"
# with no tier. A missing directory contributes no rarities.
template_dir = "templates"

# ---------------------------------------------------------------------------
# Explicit rarities
# ---------------------------------------------------------------------------
# Map a rarity label to a template file. Entries here override discovered
# templates of the same label. A table form can set its own art window.
[rarities]
# Mythic = "frames/mythic.png"
# Promo = { path = "frames/promo.png", art = { x = 20, y = 40, width = 260, height = 180 } }

# ---------------------------------------------------------------------------
# Artwork window
# ---------------------------------------------------------------------------
# Pixel rectangle on the template the source artwork fills. When omitted,
# the window is inset 8% horizontally, starts 14% down and is 45% tall.
# [art]
# x = 24
# y = 59
# width = 252
# height = 189

# ---------------------------------------------------------------------------
# Fonts
# ---------------------------------------------------------------------------
# Map font family names used in formatting to TrueType/OpenType files.
# Families without a file render with the built-in bitmap face.
[fonts]
# "Arial Black" = "fonts/ArialBlack.ttf"

# ---------------------------------------------------------------------------
# Formatting defaults
# ---------------------------------------------------------------------------
# Used for any formatting key a card does not set.
[formatting.title]
x = 20.0
y = 16.0
font = "Sans"
size = 18.0
color = "#000000"

[formatting.body]
x = 24.0
y = 250.0
width = 252.0
height = 120.0
font = "Sans"
size = 11.0
color = "#333333"
align = "left"          # left | center | right | justify
lineSpacing = 1.2
wrap = true

[formatting.costBadge]
x = 250.0
y = 16.0
font = "Sans"
size = 16.0
color = "#FFFFFF"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel composition workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
