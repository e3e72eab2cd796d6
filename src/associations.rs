//! Many-to-many card ↔ actor links.
//!
//! The index holds each `(card, actor)` pair at most once and keeps both
//! directions in sync, so "actors of a card" and "cards of an actor" are
//! both map lookups. Deleting a card or an actor clears all of its links
//! through [`remove_card`](AssociationIndex::remove_card) /
//! [`remove_actor`](AssociationIndex::remove_actor).
//!
//! Ordering is deterministic everywhere: raw id lists are ascending, and
//! the record-resolving queries sort by name with the id as tiebreaker.

use crate::types::{Actor, ActorId, Card, CardId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("{card} is already linked to {actor}")]
    AlreadyLinked { card: CardId, actor: ActorId },
    #[error("{card} is not linked to {actor}")]
    NotLinked { card: CardId, actor: ActorId },
}

/// One stored link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardActorLink {
    pub card: CardId,
    pub actor: ActorId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationIndex {
    by_card: BTreeMap<CardId, BTreeSet<ActorId>>,
    by_actor: BTreeMap<ActorId, BTreeSet<CardId>>,
}

impl AssociationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored links. A repeated pair is kept once.
    pub fn from_links(links: impl IntoIterator<Item = CardActorLink>) -> Self {
        let mut index = Self::new();
        for link in links {
            index.link_idempotent(link.card, link.actor);
        }
        index
    }

    pub fn link(&mut self, card: CardId, actor: ActorId) -> Result<(), LinkError> {
        if self.contains(card, actor) {
            return Err(LinkError::AlreadyLinked { card, actor });
        }
        self.insert(card, actor);
        Ok(())
    }

    /// Link unless already linked. Returns whether a link was added.
    pub fn link_idempotent(&mut self, card: CardId, actor: ActorId) -> bool {
        if self.contains(card, actor) {
            return false;
        }
        self.insert(card, actor);
        true
    }

    fn insert(&mut self, card: CardId, actor: ActorId) {
        self.by_card.entry(card).or_default().insert(actor);
        self.by_actor.entry(actor).or_default().insert(card);
    }

    pub fn unlink(&mut self, card: CardId, actor: ActorId) -> Result<(), LinkError> {
        let removed = self
            .by_card
            .get_mut(&card)
            .is_some_and(|actors| actors.remove(&actor));
        if !removed {
            return Err(LinkError::NotLinked { card, actor });
        }
        if self.by_card.get(&card).is_some_and(BTreeSet::is_empty) {
            self.by_card.remove(&card);
        }
        if let Some(cards) = self.by_actor.get_mut(&actor) {
            cards.remove(&card);
            if cards.is_empty() {
                self.by_actor.remove(&actor);
            }
        }
        Ok(())
    }

    pub fn contains(&self, card: CardId, actor: ActorId) -> bool {
        self.by_card
            .get(&card)
            .is_some_and(|actors| actors.contains(&actor))
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.by_card.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_card.is_empty()
    }

    /// Actor ids linked to `card`, ascending.
    pub fn actor_ids_of(&self, card: CardId) -> Vec<ActorId> {
        self.by_card
            .get(&card)
            .map(|actors| actors.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Card ids linked to `actor`, ascending.
    pub fn card_ids_of(&self, actor: ActorId) -> Vec<CardId> {
        self.by_actor
            .get(&actor)
            .map(|cards| cards.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Actors linked to `card`, ordered by name. Ids `lookup` cannot
    /// resolve are skipped.
    pub fn actors_of<'a>(
        &self,
        card: CardId,
        lookup: impl Fn(ActorId) -> Option<&'a Actor>,
    ) -> Vec<&'a Actor> {
        let mut actors: Vec<&Actor> = self
            .actor_ids_of(card)
            .into_iter()
            .filter_map(lookup)
            .collect();
        actors.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        actors
    }

    /// Card ids linked to `actor`, ordered by card name.
    pub fn cards_of<'a>(
        &self,
        actor: ActorId,
        lookup: impl Fn(CardId) -> Option<&'a Card>,
    ) -> Vec<CardId> {
        let mut cards: Vec<&Card> = self
            .card_ids_of(actor)
            .into_iter()
            .filter_map(lookup)
            .collect();
        cards.sort_by(|a, b| a.name.cmp(&b.name).then(a.id().cmp(&b.id())));
        cards.iter().map(|c| c.id()).collect()
    }

    /// Drop every link of `card`. Returns how many were removed.
    pub fn remove_card(&mut self, card: CardId) -> usize {
        let Some(actors) = self.by_card.remove(&card) else {
            return 0;
        };
        for actor in &actors {
            if let Some(cards) = self.by_actor.get_mut(actor) {
                cards.remove(&card);
                if cards.is_empty() {
                    self.by_actor.remove(actor);
                }
            }
        }
        actors.len()
    }

    /// Drop every link of `actor`. Returns how many were removed.
    pub fn remove_actor(&mut self, actor: ActorId) -> usize {
        let Some(cards) = self.by_actor.remove(&actor) else {
            return 0;
        };
        for card in &cards {
            if let Some(actors) = self.by_card.get_mut(card) {
                actors.remove(&actor);
                if actors.is_empty() {
                    self.by_card.remove(card);
                }
            }
        }
        cards.len()
    }

    /// All links, ordered by card then actor.
    pub fn pairs(&self) -> Vec<CardActorLink> {
        self.by_card
            .iter()
            .flat_map(|(card, actors)| {
                actors.iter().map(move |actor| CardActorLink {
                    card: *card,
                    actor: *actor,
                })
            })
            .collect()
    }
}
