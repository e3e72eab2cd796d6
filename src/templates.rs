//! Rarity tier → template asset resolution.
//!
//! The registry is built from two sources, in this order:
//!
//! 1. **Discovery**: `template_dir` is walked recursively. Every supported
//!    image named `NNN-Label.ext` (or just `Label.ext`) registers rarity
//!    `Label`, with `NNN` as its tier for ordering. See [`naming`](crate::naming).
//! 2. **Explicit entries**: `[rarities]` in `engine.toml`. These override
//!    discovered templates with the same label and may carry their own art
//!    window.
//!
//! ```text
//! templates/
//! ├── 010-Common.png     → "Common", tier 10
//! ├── 020-Rare.png       → "Rare", tier 20
//! ├── events/
//! │   └── 090-Promo.png  → "Promo", tier 90
//! └── notes.txt          (ignored)
//! ```
//!
//! Rarity labels are data, never an enum: a new tier is a new file or a new
//! config line. [`TemplateRegistry::reload`] rebuilds the catalog in place,
//! so a long-running caller picks up new tiers without restarting.
//!
//! Lookup is exact first, then ASCII case-insensitive, so a card stored as
//! `rare` still finds `Rare`. [`resolve`](TemplateRegistry::resolve) opens
//! the file before returning it; a mapping to a missing file is an error
//! at resolve time, not a decode failure later.

use crate::config::EngineConfig;
use crate::imaging::{Region, is_supported_image};
use crate::naming::parse_template_stem;
use crate::types::Rarity;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Unknown rarity '{rarity}' (known: {})", .known.join(", "))]
    UnknownRarity { rarity: String, known: Vec<String> },
    #[error("Template for rarity '{rarity}' at {path} is not readable: {source}")]
    Unreadable {
        rarity: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Rarity '{label}' is defined by both {first} and {second}")]
    DuplicateLabel {
        label: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("Template discovery failed: {0}")]
    Discovery(#[from] walkdir::Error),
}

/// A resolved rarity template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateAsset {
    pub rarity: Rarity,
    pub path: PathBuf,
    /// Art window specific to this template, if configured.
    pub art: Option<Region>,
    /// Ordering key from the `NNN-` filename prefix.
    pub tier: Option<u32>,
}

/// Rarity → template lookup, reloadable in place.
#[derive(Debug)]
pub struct TemplateRegistry {
    root: PathBuf,
    entries: RwLock<BTreeMap<String, TemplateAsset>>,
}

impl TemplateRegistry {
    /// Build the registry for a project rooted at `root`.
    pub fn from_config(config: &EngineConfig, root: &Path) -> Result<Self, TemplateError> {
        let entries = build_catalog(config, root)?;
        Ok(Self {
            root: root.to_path_buf(),
            entries: RwLock::new(entries),
        })
    }

    /// Rebuild the catalog from `config`. Returns the number of rarities.
    ///
    /// On error the previous catalog stays in place.
    pub fn reload(&self, config: &EngineConfig) -> Result<usize, TemplateError> {
        let fresh = build_catalog(config, &self.root)?;
        let count = fresh.len();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        *entries = fresh;
        debug!("Template registry reloaded: {count} rarities");
        Ok(count)
    }

    /// Resolve a rarity to a readable template.
    pub fn resolve(&self, rarity: &Rarity) -> Result<TemplateAsset, TemplateError> {
        let asset = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries
                .get(rarity.as_str())
                .or_else(|| {
                    entries
                        .iter()
                        .find(|(label, _)| label.eq_ignore_ascii_case(rarity.as_str()))
                        .map(|(_, asset)| asset)
                })
                .cloned()
                .ok_or_else(|| TemplateError::UnknownRarity {
                    rarity: rarity.as_str().to_string(),
                    known: sorted_labels(&entries),
                })?
        };
        check_readable(&asset)?;
        Ok(asset)
    }

    /// Known rarity labels in tier order (unnumbered last, then by label).
    pub fn labels(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        sorted_labels(&entries)
    }

    /// All templates in tier order.
    pub fn assets(&self) -> Vec<TemplateAsset> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut assets: Vec<TemplateAsset> = entries.values().cloned().collect();
        assets.sort_by(|a, b| tier_key(a).cmp(&tier_key(b)));
        assets
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn tier_key(asset: &TemplateAsset) -> (u32, &str) {
    (asset.tier.unwrap_or(u32::MAX), asset.rarity.as_str())
}

fn sorted_labels(entries: &BTreeMap<String, TemplateAsset>) -> Vec<String> {
    let mut assets: Vec<&TemplateAsset> = entries.values().collect();
    assets.sort_by(|a, b| tier_key(a).cmp(&tier_key(b)));
    assets.iter().map(|a| a.rarity.as_str().to_string()).collect()
}

fn check_readable(asset: &TemplateAsset) -> Result<(), TemplateError> {
    let unreadable = |source: io::Error| TemplateError::Unreadable {
        rarity: asset.rarity.as_str().to_string(),
        path: asset.path.clone(),
        source,
    };
    let file = fs::File::open(&asset.path).map_err(unreadable)?;
    let metadata = file.metadata().map_err(unreadable)?;
    if !metadata.is_file() {
        return Err(unreadable(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    Ok(())
}

fn build_catalog(
    config: &EngineConfig,
    root: &Path,
) -> Result<BTreeMap<String, TemplateAsset>, TemplateError> {
    let mut entries = discover(&config.template_path(root))?;

    for (label, spec) in &config.rarities {
        let rarity = Rarity::new(label.as_str());
        let tier = entries.get(rarity.as_str()).and_then(|a| a.tier);
        let asset = TemplateAsset {
            path: root.join(spec.path()),
            art: spec.art(),
            tier,
            rarity: rarity.clone(),
        };
        if let Some(previous) = entries.insert(rarity.as_str().to_string(), asset) {
            debug!(
                "Rarity '{}' from config overrides {}",
                rarity,
                previous.path.display()
            );
        }
    }
    Ok(entries)
}

/// Walk `dir` for `NNN-Label.ext` templates. A missing directory yields nothing.
fn discover(dir: &Path) -> Result<BTreeMap<String, TemplateAsset>, TemplateError> {
    let mut entries: BTreeMap<String, TemplateAsset> = BTreeMap::new();
    if !dir.is_dir() {
        debug!("No template directory at {}", dir.display());
        return Ok(entries);
    }

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !entry.file_type().is_file() || hidden || !is_supported_image(path) {
            continue;
        }
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy()) else {
            continue;
        };
        let parsed = parse_template_stem(&stem);
        if parsed.label.is_empty() {
            warn!("Skipping template without a label: {}", path.display());
            continue;
        }

        let rarity = Rarity::new(parsed.label);
        if let Some(existing) = entries.get(rarity.as_str()) {
            return Err(TemplateError::DuplicateLabel {
                label: rarity.as_str().to_string(),
                first: existing.path.clone(),
                second: path.to_path_buf(),
            });
        }
        entries.insert(
            rarity.as_str().to_string(),
            TemplateAsset {
                rarity,
                path: path.to_path_buf(),
                art: None,
                tier: parsed.tier,
            },
        );
    }
    Ok(entries)
}
