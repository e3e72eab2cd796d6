//! Card data access.
//!
//! [`CardStore`] is the narrow interface the rest of the engine reads and
//! writes cards through. [`save_card`](CardStore::save_card) is the only
//! write path for a card's rendered reference and formatting; it refuses to
//! change a stored card's source artwork and refuses invalid formatting.
//!
//! [`Library`] implements it as one JSON document (`library.json`) holding
//! cards, actors and card↔actor links:
//!
//! ```json
//! {
//!   "version": 1,
//!   "next_card_id": 3,
//!   "next_actor_id": 2,
//!   "cards": [ { "id": 1, "name": "Fireball", "rarity": "Rare", ... } ],
//!   "actors": [ { "id": 1, "name": "Pyromancer", "active": true } ],
//!   "links": [ { "card": 1, "actor": 1 } ]
//! }
//! ```
//!
//! Saving writes the whole document atomically.

use crate::associations::{AssociationIndex, CardActorLink, LinkError};
use crate::formatting::{FormattingErrors, FormattingModel};
use crate::persist::write_atomic;
use crate::types::{Actor, ActorId, Card, CardId, Rarity, SourceImage};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the library document at the project root.
pub const LIBRARY_FILENAME: &str = "library.json";

const LIBRARY_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown {0}")]
    UnknownCard(CardId),
    #[error("Unknown {0}")]
    UnknownActor(ActorId),
    #[error("An actor named '{0}' already exists")]
    DuplicateActorName(String),
    #[error("{card}: source image is fixed at creation and cannot change")]
    SourceImmutable { card: CardId },
    #[error("{card}: rendered image would overwrite the source artwork")]
    RenderedIsSource { card: CardId },
    #[error("No {kind} ids left after {last}")]
    IdsExhausted { kind: &'static str, last: u32 },
    #[error("{card}: invalid formatting: {errors}")]
    InvalidFormatting {
        card: CardId,
        errors: FormattingErrors,
    },
    #[error("{0}")]
    Link(#[from] LinkError),
    #[error("Unsupported library version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Data-access interface for card records.
pub trait CardStore {
    fn get_card(&self, id: CardId) -> Result<Card, StoreError>;

    /// Persist an existing card. Its source artwork must be unchanged.
    fn save_card(&mut self, card: Card) -> Result<(), StoreError>;

    /// Actors linked to `id`, ordered by actor name.
    fn list_actors_for_card(&self, id: CardId) -> Result<Vec<ActorId>, StoreError>;

    /// Cards linked to `id`, ordered by card name.
    fn list_cards_for_actor(&self, id: ActorId) -> Result<Vec<CardId>, StoreError>;

    fn get_actor(&self, id: ActorId) -> Result<Actor, StoreError>;

    fn card_ids(&self) -> Vec<CardId>;

    fn actor_ids(&self) -> Vec<ActorId>;
}

/// On-disk shape of the library.
#[derive(Debug, Serialize, Deserialize)]
struct LibraryDocument {
    version: u32,
    next_card_id: u32,
    next_actor_id: u32,
    #[serde(default)]
    cards: Vec<Card>,
    #[serde(default)]
    actors: Vec<Actor>,
    #[serde(default)]
    links: Vec<CardActorLink>,
}

/// JSON-document card store.
#[derive(Debug, Clone)]
pub struct Library {
    path: PathBuf,
    next_card_id: u32,
    next_actor_id: u32,
    cards: BTreeMap<CardId, Card>,
    actors: BTreeMap<ActorId, Actor>,
    links: AssociationIndex,
}

impl Library {
    /// An empty library that will save to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            next_card_id: 1,
            next_actor_id: 1,
            cards: BTreeMap::new(),
            actors: BTreeMap::new(),
            links: AssociationIndex::new(),
        }
    }

    /// Load the library at `path`. A missing file is an empty library.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!("No library at {}, starting empty", path.display());
            return Ok(Self::new(path));
        }
        let content = std::fs::read_to_string(path)?;
        let doc: LibraryDocument = serde_json::from_str(&content)?;
        if doc.version != LIBRARY_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: doc.version,
                expected: LIBRARY_VERSION,
            });
        }

        if let Some(card) = doc.cards.iter().find(|c| c.renders_over_source()) {
            return Err(StoreError::RenderedIsSource { card: card.id() });
        }
        let cards: BTreeMap<CardId, Card> = doc.cards.into_iter().map(|c| (c.id(), c)).collect();
        let actors: BTreeMap<ActorId, Actor> =
            doc.actors.into_iter().map(|a| (a.id, a)).collect();
        // Links to records that no longer exist are dropped on load.
        let links = AssociationIndex::from_links(
            doc.links
                .into_iter()
                .filter(|l| cards.contains_key(&l.card) && actors.contains_key(&l.actor)),
        );
        let next_card_id = next_id("card", cards.keys().map(|id| id.raw()))?.max(doc.next_card_id);
        let next_actor_id =
            next_id("actor", actors.keys().map(|id| id.raw()))?.max(doc.next_actor_id);

        Ok(Self {
            path: path.to_path_buf(),
            next_card_id,
            next_actor_id,
            cards,
            actors,
            links,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the library back to where it was opened from.
    pub fn save(&self) -> Result<(), StoreError> {
        self.save_to(&self.path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        let doc = LibraryDocument {
            version: LIBRARY_VERSION,
            next_card_id: self.next_card_id,
            next_actor_id: self.next_actor_id,
            cards: self.cards.values().cloned().collect(),
            actors: self.actors.values().cloned().collect(),
            links: self.links.pairs(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        write_atomic(path, json.as_bytes())?;
        Ok(())
    }

    /// Create a card with a fresh id. The source reference is fixed from here on.
    pub fn create_card(
        &mut self,
        name: impl Into<String>,
        rarity: Rarity,
        cost: i64,
        source: SourceImage,
        formatting: FormattingModel,
    ) -> Result<CardId, StoreError> {
        let id = CardId::new(self.next_card_id);
        formatting
            .validate()
            .map_err(|errors| StoreError::InvalidFormatting { card: id, errors })?;
        self.next_card_id = bump("card", self.next_card_id)?;
        let card = Card::new(id, name, rarity, cost, source).with_formatting(formatting);
        self.cards.insert(id, card);
        Ok(id)
    }

    /// Add an actor. Names are unique.
    pub fn add_actor(&mut self, mut actor: Actor) -> Result<ActorId, StoreError> {
        if self.find_actor_by_name(&actor.name).is_some() {
            return Err(StoreError::DuplicateActorName(actor.name));
        }
        let id = ActorId::new(self.next_actor_id);
        self.next_actor_id = bump("actor", self.next_actor_id)?;
        actor.id = id;
        self.actors.insert(id, actor);
        Ok(id)
    }

    pub fn find_actor_by_name(&self, name: &str) -> Option<&Actor> {
        self.actors.values().find(|a| a.name == name)
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.values()
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn associations(&self) -> &AssociationIndex {
        &self.links
    }

    fn check_pair(&self, card: CardId, actor: ActorId) -> Result<(), StoreError> {
        if !self.cards.contains_key(&card) {
            return Err(StoreError::UnknownCard(card));
        }
        if !self.actors.contains_key(&actor) {
            return Err(StoreError::UnknownActor(actor));
        }
        Ok(())
    }

    pub fn link(&mut self, card: CardId, actor: ActorId) -> Result<(), StoreError> {
        self.check_pair(card, actor)?;
        Ok(self.links.link(card, actor)?)
    }

    pub fn link_idempotent(&mut self, card: CardId, actor: ActorId) -> Result<bool, StoreError> {
        self.check_pair(card, actor)?;
        Ok(self.links.link_idempotent(card, actor))
    }

    pub fn unlink(&mut self, card: CardId, actor: ActorId) -> Result<(), StoreError> {
        self.check_pair(card, actor)?;
        Ok(self.links.unlink(card, actor)?)
    }

    /// Delete a card and all of its links.
    pub fn delete_card(&mut self, id: CardId) -> Result<Card, StoreError> {
        let card = self.cards.remove(&id).ok_or(StoreError::UnknownCard(id))?;
        let cleared = self.links.remove_card(id);
        debug!("Deleted {id}, cleared {cleared} links");
        Ok(card)
    }

    /// Delete an actor and all of its links.
    pub fn delete_actor(&mut self, id: ActorId) -> Result<Actor, StoreError> {
        let actor = self.actors.remove(&id).ok_or(StoreError::UnknownActor(id))?;
        let cleared = self.links.remove_actor(id);
        debug!("Deleted {id}, cleared {cleared} links");
        Ok(actor)
    }
}

fn bump(kind: &'static str, id: u32) -> Result<u32, StoreError> {
    id.checked_add(1)
        .ok_or(StoreError::IdsExhausted { kind, last: id })
}

/// First free id after the highest one in use, or 1 for an empty set.
fn next_id(kind: &'static str, ids: impl Iterator<Item = u32>) -> Result<u32, StoreError> {
    match ids.max() {
        Some(last) => bump(kind, last),
        None => Ok(1),
    }
}

impl CardStore for Library {
    fn get_card(&self, id: CardId) -> Result<Card, StoreError> {
        self.cards.get(&id).cloned().ok_or(StoreError::UnknownCard(id))
    }

    fn save_card(&mut self, card: Card) -> Result<(), StoreError> {
        let id = card.id();
        let stored = self.cards.get(&id).ok_or(StoreError::UnknownCard(id))?;
        if stored.source() != card.source() {
            return Err(StoreError::SourceImmutable { card: id });
        }
        if card.renders_over_source() {
            return Err(StoreError::RenderedIsSource { card: id });
        }
        card.formatting
            .validate()
            .map_err(|errors| StoreError::InvalidFormatting { card: id, errors })?;
        self.cards.insert(id, card);
        Ok(())
    }

    fn list_actors_for_card(&self, id: CardId) -> Result<Vec<ActorId>, StoreError> {
        if !self.cards.contains_key(&id) {
            return Err(StoreError::UnknownCard(id));
        }
        Ok(self
            .links
            .actors_of(id, |a| self.actors.get(&a))
            .iter()
            .map(|a| a.id)
            .collect())
    }

    fn list_cards_for_actor(&self, id: ActorId) -> Result<Vec<CardId>, StoreError> {
        if !self.actors.contains_key(&id) {
            return Err(StoreError::UnknownActor(id));
        }
        Ok(self.links.cards_of(id, |c| self.cards.get(&c)))
    }

    fn get_actor(&self, id: ActorId) -> Result<Actor, StoreError> {
        self.actors.get(&id).cloned().ok_or(StoreError::UnknownActor(id))
    }

    fn card_ids(&self) -> Vec<CardId> {
        self.cards.keys().copied().collect()
    }

    fn actor_ids(&self) -> Vec<ActorId> {
        self.actors.keys().copied().collect()
    }
}
