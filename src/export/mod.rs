//! Export of cards, formatting and actor groupings.
//!
//! Export reads persisted card state through a [`Snapshot`] and never
//! triggers composition. Every invocation is independent: the same snapshot
//! and scope always produce the same text.
//!
//! ## Card block
//!
//! ```text
//! {
//!   id = 12,
//!   name = "Fireball",
//!   rarity = "Rare",
//!   cost = 3,
//!   description = "Deals 3 damage.",
//!   image = "rendered/card-0012.png",
//!   actors = { "Pyromancer" },
//!   formatting = {
//!     title = { x=80, y=25, font="Arial Black", size=18, color="#FF4444" },
//!     body = { x=30, y=120, width=180, height=120, font="Times New Roman", size=11, color="#333333", align="justify", lineSpacing=1.3, wrap=true },
//!     costBadge = { x=240, y=25, font="Arial", size=14, color="blue" }
//!   }
//! }
//! ```
//!
//! `image` is present only once the card has been rendered. The key names
//! are a versioned contract: documents carry `version = FORMAT_VERSION` and
//! any rename must bump it.
//!
//! ## Documents
//!
//! | Scope | Layout |
//! |---|---|
//! | all actors | `{ version, actors = { { id, name, ..., cards = {...} }, ... }, unassigned = {...} }` |
//! | one actor | `{ version, actor = { id, name, ... }, cards = {...} }` |
//! | unassigned | `{ version, unassigned = {...} }` |
//!
//! Actors are ordered by name, cards within a group by card name, both with
//! the id as tiebreaker. A card linked to several actors appears under each
//! of them. Cards with no actor appear once in `unassigned`.

mod escape;
pub mod reader;
mod value;

pub use reader::{ReadError, parse};
pub use value::{RenderError, Value};

use crate::associations::AssociationIndex;
use crate::formatting::{BodyStyle, FormattingModel, TextStyle};
use crate::store::{CardStore, StoreError};
use crate::types::{Actor, ActorId, Card, CardId};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Version of the export key contract.
pub const FORMAT_VERSION: i64 = 1;

/// Record a serialization failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Card(CardId),
    Actor(ActorId),
    Document,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Card(id) => write!(f, "{id}"),
            Owner::Actor(id) => write!(f, "{id}"),
            Owner::Document => write!(f, "document"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("{owner}: field '{field}' contains unsupported control character {character:?}")]
    Serialization {
        owner: Owner,
        field: String,
        character: char,
    },
    #[error("{owner}: field '{field}' is not a finite number")]
    NonFinite { owner: Owner, field: String },
    #[error("Unknown {0}")]
    UnknownActor(ActorId),
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl ExportError {
    fn from_render(owner: Owner, err: RenderError) -> Self {
        match err {
            RenderError::Unsupported { field, character } => ExportError::Serialization {
                owner,
                field,
                character,
            },
            RenderError::NonFinite { field } => ExportError::NonFinite { owner, field },
        }
    }
}

/// Which part of the card graph a batch export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    AllActors,
    Actor(ActorId),
    Unassigned,
}

/// Counts describing an export document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub version: Option<i64>,
    pub actor_groups: usize,
    /// Card blocks across all groups, counting a multiply-linked card once
    /// per group, plus the unassigned bucket.
    pub card_blocks: usize,
    pub unassigned: usize,
}

impl ExportSummary {
    /// Count the groups and card blocks of a parsed document.
    pub fn of(doc: &Value) -> Self {
        let mut summary = ExportSummary {
            version: doc.get("version").and_then(Value::as_i64),
            ..Default::default()
        };
        // A single card block: its `actors` are names, not groups.
        if doc.get("formatting").is_some() && doc.get("id").is_some() {
            summary.card_blocks = 1;
            return summary;
        }
        let list_len = |v: Option<&Value>| v.and_then(Value::as_list).map_or(0, <[Value]>::len);

        if let Some(actors) = doc.get("actors").and_then(Value::as_list) {
            summary.actor_groups = actors.len();
            summary.card_blocks += actors.iter().map(|a| list_len(a.get("cards"))).sum::<usize>();
        }
        if doc.get("actor").is_some() {
            summary.actor_groups = 1;
            summary.card_blocks += list_len(doc.get("cards"));
        }
        summary.unassigned = list_len(doc.get("unassigned"));
        summary.card_blocks += summary.unassigned;
        summary
    }
}

#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub text: String,
    pub summary: ExportSummary,
}

/// Point-in-time copy of the records an export reads.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    cards: BTreeMap<CardId, Card>,
    actors: BTreeMap<ActorId, Actor>,
    links: AssociationIndex,
}

impl Snapshot {
    /// Snapshot every card and actor in `store`.
    pub fn capture(store: &impl CardStore) -> Result<Self, ExportError> {
        Self::capture_cards(store, &store.card_ids())
    }

    /// Snapshot the given cards, every actor, and the links between them.
    pub fn capture_cards(store: &impl CardStore, ids: &[CardId]) -> Result<Self, ExportError> {
        let mut snapshot = Snapshot::default();
        for id in store.actor_ids() {
            snapshot.actors.insert(id, store.get_actor(id)?);
        }
        for &id in ids {
            let card = store.get_card(id)?;
            for actor in store.list_actors_for_card(id)? {
                snapshot.links.link_idempotent(id, actor);
            }
            snapshot.cards.insert(id, card);
        }
        Ok(snapshot)
    }

    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.get(&id)
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    fn actors_of(&self, card: CardId) -> Vec<&Actor> {
        self.links.actors_of(card, |id| self.actors.get(&id))
    }

    fn cards_of(&self, actor: ActorId) -> Vec<&Card> {
        self.links
            .cards_of(actor, |id| self.cards.get(&id))
            .into_iter()
            .filter_map(|id| self.cards.get(&id))
            .collect()
    }

    fn sorted_actors(&self) -> Vec<&Actor> {
        let mut actors: Vec<&Actor> = self.actors.values().collect();
        actors.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        actors
    }

    /// Cards with no linked actor, ordered by name.
    fn unassigned(&self) -> Vec<&Card> {
        let mut cards: Vec<&Card> = self
            .cards
            .values()
            .filter(|c| self.links.actor_ids_of(c.id()).is_empty())
            .collect();
        cards.sort_by(|a, b| a.name.cmp(&b.name).then(a.id().cmp(&b.id())));
        cards
    }
}

fn text_style_value(style: &TextStyle) -> Value {
    Value::table([
        ("x", Value::Num(style.x)),
        ("y", Value::Num(style.y)),
        ("font", Value::str(&style.font)),
        ("size", Value::Num(style.size)),
        ("color", Value::str(&style.color)),
    ])
}

fn body_style_value(style: &BodyStyle) -> Value {
    Value::table([
        ("x", Value::Num(style.x)),
        ("y", Value::Num(style.y)),
        ("width", Value::Num(style.width)),
        ("height", Value::Num(style.height)),
        ("font", Value::str(&style.font)),
        ("size", Value::Num(style.size)),
        ("color", Value::str(&style.color)),
        ("align", Value::str(style.align.as_str())),
        ("lineSpacing", Value::Num(style.line_spacing)),
        ("wrap", Value::Bool(style.wrap)),
    ])
}

/// The `formatting` sub-block.
pub fn formatting_value(formatting: &FormattingModel) -> Value {
    Value::table([
        ("title", text_style_value(&formatting.title)),
        ("body", body_style_value(&formatting.body)),
        ("costBadge", text_style_value(&formatting.cost_badge)),
    ])
}

fn card_value(
    card: &Card,
    formatting: &FormattingModel,
    actors: &[&Actor],
) -> Result<Value, ExportError> {
    let mut names: Vec<&Actor> = actors.to_vec();
    names.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

    let mut entries = vec![
        ("id", Value::Int(i64::from(card.id().raw()))),
        ("name", Value::str(&card.name)),
        ("rarity", Value::str(card.rarity.as_str())),
        ("cost", Value::Int(card.cost)),
        ("description", Value::str(&card.description)),
    ];
    if let Some(rendered) = card.rendered() {
        entries.push((
            "image",
            Value::str(rendered.path().to_string_lossy().replace('\\', "/")),
        ));
    }
    entries.push((
        "actors",
        Value::List(names.iter().map(|a| Value::str(&a.name)).collect()),
    ));
    entries.push(("formatting", formatting_value(formatting)));

    let value = Value::table(entries);
    checked(value, Owner::Card(card.id()))
}

fn actor_fields(actor: &Actor) -> Vec<(&'static str, Value)> {
    vec![
        ("id", Value::Int(i64::from(actor.id.raw()))),
        ("name", Value::str(&actor.name)),
        ("description", Value::str(&actor.description)),
        ("color", Value::str(&actor.color)),
        ("icon", Value::str(&actor.icon)),
        ("active", Value::Bool(actor.active)),
    ]
}

/// Render once to surface escaping failures against the record that owns
/// the field.
fn checked(value: Value, owner: Owner) -> Result<Value, ExportError> {
    value
        .render()
        .map_err(|e| ExportError::from_render(owner, e))?;
    Ok(value)
}

fn card_list(snapshot: &Snapshot, cards: &[&Card]) -> Result<Value, ExportError> {
    let blocks = cards
        .iter()
        .map(|card| card_value(card, &card.formatting, &snapshot.actors_of(card.id())))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::List(blocks))
}

/// Export one card block, using `formatting` in place of the card's stored
/// formatting. `actors` are listed by name.
pub fn export_card(
    card: &Card,
    formatting: &FormattingModel,
    actors: &[&Actor],
) -> Result<String, ExportError> {
    let value = card_value(card, formatting, actors)?;
    finish(value)
}

/// Export a stored card with its linked actors, as currently persisted.
pub fn export_stored_card(store: &impl CardStore, id: CardId) -> Result<String, ExportError> {
    let snapshot = Snapshot::capture_cards(store, &[id])?;
    let card = snapshot
        .card(id)
        .ok_or(ExportError::Store(StoreError::UnknownCard(id)))?;
    export_card(card, &card.formatting, &snapshot.actors_of(id))
}

/// Export a group of cards as one document.
pub fn export_batch(snapshot: &Snapshot, scope: ExportScope) -> Result<ExportDocument, ExportError> {
    let mut entries = vec![("version", Value::Int(FORMAT_VERSION))];
    let mut summary = ExportSummary {
        version: Some(FORMAT_VERSION),
        ..Default::default()
    };

    match scope {
        ExportScope::AllActors => {
            let mut groups = Vec::new();
            for actor in snapshot.sorted_actors() {
                let cards = snapshot.cards_of(actor.id);
                summary.card_blocks += cards.len();
                let mut fields = actor_fields(actor);
                fields.push(("cards", card_list(snapshot, &cards)?));
                groups.push(checked(Value::table(fields), Owner::Actor(actor.id))?);
            }
            summary.actor_groups = groups.len();
            entries.push(("actors", Value::List(groups)));
            push_unassigned(snapshot, &mut entries, &mut summary)?;
        }
        ExportScope::Actor(id) => {
            let actor = snapshot.actor(id).ok_or(ExportError::UnknownActor(id))?;
            let cards = snapshot.cards_of(id);
            summary.actor_groups = 1;
            summary.card_blocks = cards.len();
            entries.push((
                "actor",
                checked(Value::table(actor_fields(actor)), Owner::Actor(id))?,
            ));
            entries.push(("cards", card_list(snapshot, &cards)?));
        }
        ExportScope::Unassigned => {
            push_unassigned(snapshot, &mut entries, &mut summary)?;
        }
    }

    let text = finish(Value::table(entries))?;
    Ok(ExportDocument { text, summary })
}

fn push_unassigned(
    snapshot: &Snapshot,
    entries: &mut Vec<(&'static str, Value)>,
    summary: &mut ExportSummary,
) -> Result<(), ExportError> {
    let cards = snapshot.unassigned();
    summary.unassigned = cards.len();
    summary.card_blocks += cards.len();
    entries.push(("unassigned", card_list(snapshot, &cards)?));
    Ok(())
}

fn finish(value: Value) -> Result<String, ExportError> {
    let mut text = value
        .render()
        .map_err(|e| ExportError::from_render(Owner::Document, e))?;
    text.push('\n');
    Ok(text)
}
