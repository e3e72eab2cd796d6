//! Card change handling.
//!
//! [`CardService`] ties the store, the composition engine and the exporter
//! together. A rarity or formatting change is applied to a copy of the
//! stored card, validated, composed, and only then written back through
//! [`CardStore::save_card`]. If any step fails the stored card is left as it
//! was and the rendered file is untouched.
//!
//! Export never triggers composition; it reads whatever is currently stored.

use crate::cache::CacheStats;
use crate::compose::{ComposeError, ComposeEvent, ComposeOutcome, CompositionEngine};
use crate::export::{self, ExportDocument, ExportError, ExportScope, Snapshot};
use crate::formatting::FormattingModel;
use crate::imaging::{ImageBackend, RustBackend};
use crate::store::{CardStore, StoreError};
use crate::types::{CardId, Rarity};
use log::info;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Compose(#[from] ComposeError),
    #[error("{0}")]
    Export(#[from] ExportError),
}

/// A change to a card that requires recomposition.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Rarity(Rarity),
    Formatting(FormattingModel),
}

pub struct CardService<S: CardStore, B: ImageBackend = RustBackend> {
    store: S,
    engine: CompositionEngine<B>,
}

impl<S: CardStore, B: ImageBackend> CardService<S, B> {
    pub fn new(store: S, engine: CompositionEngine<B>) -> Self {
        Self { store, engine }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn engine(&self) -> &CompositionEngine<B> {
        &self.engine
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Apply `change` to a card and recompose it.
    pub fn apply(&mut self, id: CardId, change: Change) -> Result<ComposeOutcome, ServiceError> {
        let mut card = self.store.get_card(id)?;
        match change {
            Change::Rarity(rarity) => card.rarity = rarity,
            Change::Formatting(formatting) => {
                formatting
                    .validate()
                    .map_err(|errors| ComposeError::InvalidFormatting { card: id, errors })?;
                card.formatting = formatting;
            }
        }

        let outcome = self.engine.compose(&card)?;
        card.set_rendered(outcome.rendered.clone());
        self.store.save_card(card)?;
        info!("{id}: recomposed to {}", outcome.rendered);
        Ok(outcome)
    }

    /// Compose a card as stored, e.g. its first render.
    pub fn recompose(&mut self, id: CardId) -> Result<ComposeOutcome, ServiceError> {
        let mut card = self.store.get_card(id)?;
        let outcome = self.engine.compose(&card)?;
        if card.rendered() != Some(&outcome.rendered) {
            card.set_rendered(outcome.rendered.clone());
            self.store.save_card(card)?;
        }
        Ok(outcome)
    }

    /// Compose several stored cards in parallel and record each new
    /// rendered reference. Per-card failures are returned, not raised.
    pub fn compose_many(
        &mut self,
        ids: &[CardId],
        events: Option<Sender<ComposeEvent>>,
    ) -> Result<(Vec<Result<ComposeOutcome, ComposeError>>, CacheStats), ServiceError> {
        let cards = ids
            .iter()
            .map(|id| self.store.get_card(*id))
            .collect::<Result<Vec<_>, _>>()?;
        let (results, stats) = self.engine.compose_batch(&cards, events);
        for (mut card, result) in cards.into_iter().zip(&results) {
            if let Ok(outcome) = result
                && card.rendered() != Some(&outcome.rendered)
            {
                card.set_rendered(outcome.rendered.clone());
                self.store.save_card(card)?;
            }
        }
        Ok((results, stats))
    }

    /// Export one card with its linked actors.
    pub fn export_card(&self, id: CardId) -> Result<String, ServiceError> {
        Ok(export::export_stored_card(&self.store, id)?)
    }

    pub fn export(&self, scope: ExportScope) -> Result<ExportDocument, ServiceError> {
        let snapshot = Snapshot::capture(&self.store)?;
        Ok(export::export_batch(&snapshot, scope)?)
    }
}
