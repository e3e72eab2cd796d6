//! Card-graph types shared by every module.
//!
//! These are the records persisted by the [`store`](crate::store), composed by
//! the [`compose`](crate::compose) engine and serialized by
//! [`export`](crate::export).
//!
//! ## Source vs. rendered artwork
//!
//! A card references its artwork through two distinct types:
//!
//! | Type | Set | Mutation |
//! |------|-----|----------|
//! | [`SourceImage`] | once, at [`Card::new`] | never; no setter exists |
//! | [`RenderedImage`] | after the first composition | overwritten in place on every recomposition |
//!
//! There is no conversion from [`RenderedImage`] to [`SourceImage`], and the
//! imaging backend only decodes artwork through a `&SourceImage`, so a
//! composite can never be built on top of a previous composite.

use crate::formatting::FormattingModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable card identity, immutable after creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u32);

impl CardId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "card #{}", self.0)
    }
}

/// Stable actor identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u32);

impl ActorId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor #{}", self.0)
    }
}

/// A rarity tier label such as `Common` or `Mythic`.
///
/// The set of tiers is open: a label is only meaningful once the
/// [`TemplateRegistry`](crate::templates::TemplateRegistry) maps it to a
/// template asset.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rarity(String);

impl Rarity {
    pub fn new(label: impl Into<String>) -> Self {
        let label: String = label.into();
        Self(label.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to the pristine artwork a card is based on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceImage(PathBuf);

impl SourceImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Anchor a relative reference at `root`. Absolute references are kept.
    pub fn resolve(&self, root: &Path) -> SourceImage {
        SourceImage(root.join(&self.0))
    }
}

/// Reference to the last composited bitmap of a card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderedImage(PathBuf);

impl RenderedImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// The location a card renders to before it has ever been composed.
    pub fn default_for(card: CardId, rendered_dir: &Path) -> Self {
        Self(rendered_dir.join(format!("card-{:04}.png", card.raw())))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn resolve(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for RenderedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A card record as persisted by the data-access layer.
///
/// `id` and the source artwork are private: they are fixed by [`Card::new`]
/// and readable through accessors only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    id: CardId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rarity: Rarity,
    pub cost: i64,
    #[serde(rename = "source_image")]
    source: SourceImage,
    #[serde(
        rename = "rendered_image",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    rendered: Option<RenderedImage>,
    /// Absent keys in stored records fall back to the documented defaults.
    #[serde(default)]
    pub formatting: FormattingModel,
}

impl Card {
    pub fn new(
        id: CardId,
        name: impl Into<String>,
        rarity: Rarity,
        cost: i64,
        source: SourceImage,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            rarity,
            cost,
            source,
            rendered: None,
            formatting: FormattingModel::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_formatting(mut self, formatting: FormattingModel) -> Self {
        self.formatting = formatting;
        self
    }

    pub fn id(&self) -> CardId {
        self.id
    }

    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    pub fn rendered(&self) -> Option<&RenderedImage> {
        self.rendered.as_ref()
    }

    /// Record where the last composition was written.
    pub fn set_rendered(&mut self, rendered: RenderedImage) {
        self.rendered = Some(rendered);
    }

    /// Whether the rendered reference names the source artwork file.
    pub fn renders_over_source(&self) -> bool {
        self.rendered
            .as_ref()
            .is_some_and(|r| r.path() == self.source.path())
    }
}

/// A named grouping entity (character, faction, deck owner) cards link to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Actor {
    pub fn new(id: ActorId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            color: String::new(),
            icon: String::new(),
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rarity_trims_label() {
        assert_eq!(Rarity::new("  Rare ").as_str(), "Rare");
    }

    #[test]
    fn default_rendered_location_is_per_card() {
        let r = RenderedImage::default_for(CardId(12), Path::new("rendered"));
        assert_eq!(r.path(), Path::new("rendered/card-0012.png"));
    }

    #[test]
    fn source_resolve_keeps_absolute_paths() {
        let src = SourceImage::new("/abs/art.png");
        assert_eq!(
            src.resolve(Path::new("/project")).path(),
            Path::new("/abs/art.png")
        );
        let rel = SourceImage::new("art/fireball.png");
        assert_eq!(
            rel.resolve(Path::new("/project")).path(),
            Path::new("/project/art/fireball.png")
        );
    }

    #[test]
    fn new_card_has_no_rendered_image() {
        let card = Card::new(
            CardId(1),
            "Fireball",
            Rarity::new("Common"),
            3,
            SourceImage::new("art.png"),
        );
        assert!(card.rendered().is_none());
        assert_eq!(card.source().path(), Path::new("art.png"));
    }

    #[test]
    fn card_json_without_formatting_uses_defaults() {
        let json = r#"{
            "id": 4,
            "name": "Spark",
            "rarity": "Common",
            "cost": 1,
            "source_image": "art/spark.png"
        }"#;
        let card: Card = serde_json::from_str(json).unwrap();
        assert_eq!(card.id(), CardId(4));
        assert_eq!(card.description, "");
        assert_eq!(card.formatting, FormattingModel::default());
    }

    #[test]
    fn actor_defaults_to_active() {
        let actor: Actor = serde_json::from_str(r#"{"id": 1, "name": "Pyromancer"}"#).unwrap();
        assert!(actor.active);
    }
}
