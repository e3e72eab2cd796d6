//! Card composition engine.
//!
//! [`CompositionEngine::compose`] turns a card record into its rendered
//! image. The work happens in a fixed order, and every check that can fail
//! runs before anything is written:
//!
//! ```text
//! claim card ─► validate formatting ─► resolve template ─► read source
//!      │                                                        │
//!      │                     cache hit? ◄── fingerprint inputs ◄┘
//!      │                        │ no
//!      │                        ▼
//!      │        decode ─► composite ─► encode PNG ─► atomic replace
//!      └──────────────── released on every exit path ──────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Source only**: artwork is always decoded from the card's
//!   [`SourceImage`], never from its rendered image, so the output is a pure
//!   function of (source bytes, rarity template, formatting, text, fonts).
//!   Cycling rarity A → B → A reproduces the direct A render byte for byte.
//! - **Non-destructive failure**: an unknown rarity, missing artwork or
//!   invalid formatting returns an error before the rendered file is touched.
//!   The final write is a temp-file-and-rename, so even a failed write leaves
//!   the previous render intact.
//! - **Single writer**: a card already being composed is rejected with
//!   [`ComposeError::CompositionInProgress`]; the claim is released when the
//!   call returns, whatever the outcome.
//!
//! [`compose_batch`](CompositionEngine::compose_batch) runs distinct cards in
//! parallel on the rayon pool and streams [`ComposeEvent`]s for progress
//! output.

use crate::cache::{CacheStats, Fingerprint, RenderCache, hash_bytes};
use crate::config::EngineConfig;
use crate::formatting::FormattingErrors;
use crate::imaging::{
    BackendError, CardText, Dimensions, FontBook, ImageBackend, RustBackend, composite,
    default_art_region,
};
use crate::persist::write_atomic;
use crate::templates::{TemplateAsset, TemplateError, TemplateRegistry};
use crate::types::{Card, CardId, RenderedImage, SourceImage};
use log::{debug, info};
use rayon::prelude::*;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("{card}: template not found: {source}")]
    TemplateNotFound {
        card: CardId,
        #[source]
        source: TemplateError,
    },
    #[error("{card}: source image {path} is missing or unreadable: {reason}")]
    SourceImageMissing {
        card: CardId,
        path: PathBuf,
        reason: String,
    },
    #[error("{card}: invalid formatting: {errors}")]
    InvalidFormatting {
        card: CardId,
        errors: FormattingErrors,
    },
    #[error("{card}: composition already in progress")]
    CompositionInProgress { card: CardId },
    #[error("{card}: rendered image {path} is the source artwork; refusing to overwrite it")]
    RenderedIsSource { card: CardId, path: PathBuf },
    #[error("{card}: rendering failed: {source}")]
    Render {
        card: CardId,
        #[source]
        source: BackendError,
    },
    #[error("{card}: failed to write {path}: {source}")]
    Write {
        card: CardId,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ComposeError {
    pub fn card(&self) -> CardId {
        match self {
            ComposeError::TemplateNotFound { card, .. }
            | ComposeError::SourceImageMissing { card, .. }
            | ComposeError::InvalidFormatting { card, .. }
            | ComposeError::CompositionInProgress { card }
            | ComposeError::RenderedIsSource { card, .. }
            | ComposeError::Render { card, .. }
            | ComposeError::Write { card, .. } => *card,
        }
    }
}

/// Failure to bring the engine up.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Template registry: {0}")]
    Templates(#[from] TemplateError),
    #[error("Fonts: {0}")]
    Fonts(#[from] BackendError),
}

/// Whether a composition produced new bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeStatus {
    Rendered,
    /// Inputs unchanged and the file on disk intact; nothing was written.
    Cached,
}

/// Result of a successful composition.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeOutcome {
    pub card: CardId,
    /// Where the render lives. Equal to the card's existing reference once
    /// it has been composed.
    pub rendered: RenderedImage,
    pub status: ComposeStatus,
    /// SHA-256 of the rendered PNG.
    pub checksum: String,
}

/// Progress event from [`CompositionEngine::compose_batch`].
#[derive(Debug, Clone)]
pub enum ComposeEvent {
    Composed {
        card: CardId,
        name: String,
        rendered: RenderedImage,
        status: ComposeStatus,
    },
    Failed {
        card: CardId,
        name: String,
        error: String,
    },
}

/// A template together with its pixel size, for listings.
#[derive(Debug, Clone)]
pub struct TemplateInfo {
    pub asset: TemplateAsset,
    pub dimensions: Option<Dimensions>,
}

/// Claim on a card; released on drop.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<CardId>>,
    card: CardId,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a Mutex<HashSet<CardId>>, card: CardId) -> Option<Self> {
        let mut claimed = set.lock().unwrap_or_else(|e| e.into_inner());
        if claimed.insert(card) {
            Some(Self { set, card })
        } else {
            None
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut claimed = self.set.lock().unwrap_or_else(|e| e.into_inner());
        claimed.remove(&self.card);
    }
}

/// Lexical match, or both paths exist and canonicalize to the same file.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

pub struct CompositionEngine<B: ImageBackend = RustBackend> {
    root: PathBuf,
    config: EngineConfig,
    templates: TemplateRegistry,
    fonts: FontBook,
    backend: B,
    in_flight: Mutex<HashSet<CardId>>,
    cache: Option<Mutex<RenderCache>>,
}

impl CompositionEngine<RustBackend> {
    /// Engine for the project at `root` using the production backend.
    pub fn open(root: &Path, config: EngineConfig) -> Result<Self, SetupError> {
        Self::new(root, config, RustBackend::new())
    }
}

impl<B: ImageBackend> CompositionEngine<B> {
    pub fn new(root: &Path, config: EngineConfig, backend: B) -> Result<Self, SetupError> {
        let templates = TemplateRegistry::from_config(&config, root)?;
        let fonts = FontBook::load(&config.fonts, root)?;
        info!(
            "Composition engine ready: {} rarities, {} font files",
            templates.len(),
            fonts.families().len()
        );
        Ok(Self {
            root: root.to_path_buf(),
            config,
            templates,
            fonts,
            backend,
            in_flight: Mutex::new(HashSet::new()),
            cache: None,
        })
    }

    /// Enable the render cache, loading any manifest already on disk.
    pub fn with_cache(mut self) -> Self {
        let manifest = RenderCache::load(&self.rendered_dir());
        self.cache = Some(Mutex::new(manifest));
        self
    }

    /// Persist the render cache manifest, if caching is enabled.
    pub fn save_cache(&self) -> io::Result<()> {
        if let Some(cache) = &self.cache {
            let cache = cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.save(&self.rendered_dir())?;
        }
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Re-read templates from the current configuration.
    pub fn reload_templates(&self) -> Result<usize, TemplateError> {
        self.templates.reload(&self.config)
    }

    fn rendered_dir(&self) -> PathBuf {
        self.config.rendered_path(&self.root)
    }

    /// Every known template with its size (`None` if it cannot be read).
    pub fn describe_templates(&self) -> Vec<TemplateInfo> {
        self.templates
            .assets()
            .into_iter()
            .map(|asset| TemplateInfo {
                dimensions: self.backend.identify(&asset.path).ok(),
                asset,
            })
            .collect()
    }

    /// Where `card` renders to: its existing reference, or the default slot.
    pub fn rendered_ref(&self, card: &Card) -> RenderedImage {
        card.rendered().cloned().unwrap_or_else(|| {
            RenderedImage::default_for(card.id(), Path::new(&self.config.rendered_dir))
        })
    }

    /// Compose one card.
    pub fn compose(&self, card: &Card) -> Result<ComposeOutcome, ComposeError> {
        let id = card.id();
        let _claim = InFlight::acquire(&self.in_flight, id)
            .ok_or(ComposeError::CompositionInProgress { card: id })?;

        card.formatting
            .validate()
            .map_err(|errors| ComposeError::InvalidFormatting { card: id, errors })?;

        let template = self
            .templates
            .resolve(&card.rarity)
            .map_err(|source| ComposeError::TemplateNotFound { card: id, source })?;

        let source = card.source().resolve(&self.root);
        let source_bytes =
            std::fs::read(source.path()).map_err(|e| ComposeError::SourceImageMissing {
                card: id,
                path: source.path().to_path_buf(),
                reason: e.to_string(),
            })?;
        let template_bytes = std::fs::read(&template.path).map_err(|e| {
            ComposeError::TemplateNotFound {
                card: id,
                source: TemplateError::Unreadable {
                    rarity: template.rarity.as_str().to_string(),
                    path: template.path.clone(),
                    source: e,
                },
            }
        })?;

        let rendered = self.rendered_ref(card);
        let out_path = rendered.resolve(&self.root);
        if same_file(&out_path, source.path()) {
            return Err(ComposeError::RenderedIsSource {
                card: id,
                path: out_path,
            });
        }
        let key = rendered.path().to_string_lossy().to_string();
        let fingerprint = self.fingerprint(card, &template, &source_bytes, &template_bytes);

        if let Some(cache) = &self.cache {
            let cache = cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(checksum) = cache.lookup(&key, &fingerprint, &out_path) {
                debug!("{id}: inputs unchanged, keeping {}", out_path.display());
                return Ok(ComposeOutcome {
                    card: id,
                    rendered,
                    status: ComposeStatus::Cached,
                    checksum,
                });
            }
        }

        let bytes = self.render(card, &template, &source)?;
        write_atomic(&out_path, &bytes).map_err(|source| ComposeError::Write {
            card: id,
            path: out_path.clone(),
            source,
        })?;
        let checksum = hash_bytes(&bytes);
        debug!("{id}: wrote {} ({})", out_path.display(), &checksum[..12]);

        if let Some(cache) = &self.cache {
            let mut cache = cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.insert(key, fingerprint, checksum.clone());
        }

        Ok(ComposeOutcome {
            card: id,
            rendered,
            status: ComposeStatus::Rendered,
            checksum,
        })
    }

    /// Decode, layer and encode. Nothing here touches the rendered file.
    fn render(
        &self,
        card: &Card,
        template: &TemplateAsset,
        source: &SourceImage,
    ) -> Result<Vec<u8>, ComposeError> {
        let id = card.id();
        let render_err = |source: BackendError| ComposeError::Render { card: id, source };

        let art = self
            .backend
            .decode_source(source)
            .map_err(|e| ComposeError::SourceImageMissing {
                card: id,
                path: source.path().to_path_buf(),
                reason: e.to_string(),
            })?;
        let base = self.backend.decode_template(template).map_err(render_err)?;

        let region = template
            .art
            .or(self.config.art)
            .unwrap_or_else(|| default_art_region(base.dimensions()));
        let text = CardText {
            title: card.name.clone(),
            body: card.description.clone(),
            cost: card.cost.to_string(),
        };
        let canvas = composite(&base, &art, region, &text, &card.formatting, &self.fonts)
            .map_err(render_err)?;
        self.backend.encode_png(&canvas).map_err(render_err)
    }

    fn fingerprint(
        &self,
        card: &Card,
        template: &TemplateAsset,
        source_bytes: &[u8],
        template_bytes: &[u8],
    ) -> String {
        let region = format!("{:?}", template.art.or(self.config.art));
        let formatting = format!("{:?}", card.formatting);
        let fonts: Vec<String> = card
            .formatting
            .families()
            .into_iter()
            .map(|family| self.fonts.identity(family))
            .collect();
        Fingerprint::new()
            .update("source", source_bytes)
            .update("template", template_bytes)
            .update("art", region.as_bytes())
            .update("formatting", formatting.as_bytes())
            .update("fonts", fonts.join("\n").as_bytes())
            .update("name", card.name.as_bytes())
            .update("description", card.description.as_bytes())
            .update("cost", card.cost.to_string().as_bytes())
            .finish()
    }

    /// Compose many cards in parallel, in input order.
    ///
    /// A card id that appears more than once is composed once; later
    /// occurrences fail with [`ComposeError::CompositionInProgress`].
    pub fn compose_batch(
        &self,
        cards: &[Card],
        events: Option<Sender<ComposeEvent>>,
    ) -> (Vec<Result<ComposeOutcome, ComposeError>>, CacheStats) {
        let mut seen = HashSet::new();
        let first: Vec<bool> = cards.iter().map(|c| seen.insert(c.id())).collect();

        let results: Vec<Result<ComposeOutcome, ComposeError>> = cards
            .par_iter()
            .zip(first.par_iter())
            .map_with(events, |tx, (card, &is_first)| {
                let result = if is_first {
                    self.compose(card)
                } else {
                    Err(ComposeError::CompositionInProgress { card: card.id() })
                };
                if let Some(tx) = tx {
                    let event = match &result {
                        Ok(outcome) => ComposeEvent::Composed {
                            card: card.id(),
                            name: card.name.clone(),
                            rendered: outcome.rendered.clone(),
                            status: outcome.status,
                        },
                        Err(e) => ComposeEvent::Failed {
                            card: card.id(),
                            name: card.name.clone(),
                            error: e.to_string(),
                        },
                    };
                    tx.send(event).ok();
                }
                result
            })
            .collect();

        let mut stats = CacheStats::default();
        for outcome in results.iter().flatten() {
            match outcome.status {
                ComposeStatus::Cached => stats.hit(),
                ComposeStatus::Rendered => stats.miss(),
            }
        }
        (results, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash_file;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::test_helpers::{Fixture, sample_card};
    use crate::types::Rarity;
    use image::{Rgba, RgbaImage};
    use std::fs;

    fn mock() -> MockBackend {
        MockBackend::with_images(
            RgbaImage::from_pixel(8, 8, Rgba([0, 0, 200, 255])),
            RgbaImage::from_pixel(60, 84, Rgba([240, 240, 240, 255])),
        )
    }

    // =========================================================================
    // Happy path
    // =========================================================================

    #[test]
    fn first_composition_writes_default_slot() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let card = sample_card(&fx, 1, "Common");

        let outcome = engine.compose(&card).unwrap();
        assert_eq!(outcome.status, ComposeStatus::Rendered);
        assert_eq!(
            outcome.rendered.path(),
            Path::new("rendered/card-0001.png")
        );
        let on_disk = outcome.rendered.resolve(fx.root());
        assert_eq!(hash_file(&on_disk).unwrap(), outcome.checksum);
    }

    #[test]
    fn existing_rendered_ref_is_overwritten_in_place() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let mut card = sample_card(&fx, 1, "Common");
        card.set_rendered(RenderedImage::new("rendered/custom.png"));

        let outcome = engine.compose(&card).unwrap();
        assert_eq!(outcome.rendered, RenderedImage::new("rendered/custom.png"));
        assert!(fx.root().join("rendered/custom.png").is_file());
    }

    #[test]
    fn rarity_cycle_reproduces_original_bytes() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let mut card = sample_card(&fx, 1, "Common");

        let c1 = engine.compose(&card).unwrap().checksum;
        card.rarity = Rarity::new("Rare");
        let c2 = engine.compose(&card).unwrap().checksum;
        card.rarity = Rarity::new("Common");
        let c3 = engine.compose(&card).unwrap().checksum;

        assert_ne!(c1, c2);
        assert_eq!(c1, c3);
    }

    #[test]
    fn artwork_is_decoded_from_source_never_rendered() {
        let fx = Fixture::new();
        let engine = CompositionEngine::new(fx.root(), fx.config(), mock()).unwrap();
        let mut card = sample_card(&fx, 3, "Rare");
        card.set_rendered(RenderedImage::new("rendered/card-0003.png"));

        engine.compose(&card).unwrap();
        engine.compose(&card).unwrap();

        let ops = engine.backend().get_operations();
        let sources: Vec<&String> = ops
            .iter()
            .filter_map(|op| match op {
                RecordedOp::DecodeSource(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(sources.len(), 2);
        assert!(sources.iter().all(|p| p.ends_with("art/card-3.png")));
        assert!(
            ops.iter()
                .all(|op| !matches!(op, RecordedOp::DecodeTemplate(p) | RecordedOp::DecodeSource(p) if p.contains("rendered")))
        );
    }

    #[test]
    fn configured_art_region_changes_render() {
        let fx = Fixture::new();
        let card = sample_card(&fx, 1, "Common");
        let default = fx.engine().compose(&card).unwrap().checksum;

        let mut config = fx.config();
        config.art = Some(crate::imaging::Region::new(0, 0, 20, 20));
        let engine = CompositionEngine::open(fx.root(), config).unwrap();
        let custom = engine.compose(&card).unwrap().checksum;
        assert_ne!(default, custom);
    }

    // =========================================================================
    // Failure paths
    // =========================================================================

    #[test]
    fn unknown_rarity_leaves_render_untouched() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let mut card = sample_card(&fx, 1, "Common");
        let outcome = engine.compose(&card).unwrap();
        let path = outcome.rendered.resolve(fx.root());

        card.set_rendered(outcome.rendered);
        card.rarity = Rarity::new("Mythic");
        let err = engine.compose(&card).unwrap_err();
        assert!(matches!(err, ComposeError::TemplateNotFound { card, .. } if card == CardId(1)));
        assert_eq!(hash_file(&path).unwrap(), outcome.checksum);
    }

    #[test]
    fn missing_source_leaves_render_untouched() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let card = sample_card(&fx, 1, "Common");
        let outcome = engine.compose(&card).unwrap();
        let path = outcome.rendered.resolve(fx.root());

        fs::remove_file(card.source().resolve(fx.root()).path()).unwrap();
        let err = engine.compose(&card).unwrap_err();
        assert!(matches!(err, ComposeError::SourceImageMissing { .. }));
        assert_eq!(hash_file(&path).unwrap(), outcome.checksum);
    }

    #[test]
    fn undecodable_source_is_source_missing() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let card = sample_card(&fx, 1, "Common");
        fs::write(card.source().resolve(fx.root()).path(), b"not an image").unwrap();
        assert!(matches!(
            engine.compose(&card),
            Err(ComposeError::SourceImageMissing { .. })
        ));
    }

    #[test]
    fn invalid_formatting_fails_before_backend() {
        let fx = Fixture::new();
        let engine = CompositionEngine::new(fx.root(), fx.config(), mock()).unwrap();
        let mut card = sample_card(&fx, 1, "Common");
        card.formatting.title.size = -5.0;

        let err = engine.compose(&card).unwrap_err();
        match err {
            ComposeError::InvalidFormatting { card, errors } => {
                assert_eq!(card, CardId(1));
                assert!(errors.contains("title.size"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(engine.backend().get_operations().is_empty());
    }

    #[test]
    fn busy_card_is_rejected_and_released() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let card = sample_card(&fx, 1, "Common");
        {
            let _held = InFlight::acquire(&engine.in_flight, card.id()).unwrap();
            assert!(matches!(
                engine.compose(&card),
                Err(ComposeError::CompositionInProgress { .. })
            ));
        }
        assert!(engine.compose(&card).is_ok());
    }

    #[test]
    fn concurrent_compose_of_same_card_is_rejected() {
        let fx = Fixture::new();
        let (backend, entered, release) = MockBackend::paused(
            RgbaImage::from_pixel(8, 8, Rgba([0, 0, 200, 255])),
            RgbaImage::from_pixel(60, 84, Rgba([240, 240, 240, 255])),
        );
        let engine = CompositionEngine::new(fx.root(), fx.config(), backend).unwrap();
        let card = sample_card(&fx, 1, "Common");
        let other = sample_card(&fx, 2, "Common");

        std::thread::scope(|s| {
            let first = s.spawn(|| engine.compose(&card));
            entered.recv().unwrap();

            assert!(matches!(
                engine.compose(&card),
                Err(ComposeError::CompositionInProgress { card }) if card == CardId(1)
            ));
            // Other cards are not held up by the busy one.
            assert!(engine.compose(&other).is_ok());

            release.send(()).unwrap();
            assert!(first.join().unwrap().is_ok());
        });
        assert!(engine.compose(&card).is_ok());
    }

    #[test]
    fn rendered_ref_on_source_is_refused() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let mut card = sample_card(&fx, 1, "Common");
        let art = card.source().resolve(fx.root());
        let before = hash_file(art.path()).unwrap();

        card.set_rendered(RenderedImage::new(card.source().path()));
        assert!(matches!(
            engine.compose(&card),
            Err(ComposeError::RenderedIsSource { .. })
        ));

        // A differently spelled path to the same file is caught too.
        card.set_rendered(RenderedImage::new("art/../art/card-1.png"));
        assert!(matches!(
            engine.compose(&card),
            Err(ComposeError::RenderedIsSource { .. })
        ));
        assert_eq!(hash_file(art.path()).unwrap(), before);
    }

    #[test]
    fn reloaded_templates_compose_new_rarity() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let mut card = sample_card(&fx, 1, "Mythic");
        assert!(matches!(
            engine.compose(&card),
            Err(ComposeError::TemplateNotFound { .. })
        ));

        RgbaImage::from_pixel(120, 168, Rgba([120, 0, 160, 255]))
            .save(fx.root().join("templates/040-Mythic.png"))
            .unwrap();
        assert_eq!(engine.reload_templates().unwrap(), 4);
        assert!(engine.compose(&card).is_ok());

        card.rarity = Rarity::new("Common");
        assert!(engine.compose(&card).is_ok());
    }

    #[test]
    fn failed_composition_releases_claim() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let mut card = sample_card(&fx, 1, "Nope");
        assert!(engine.compose(&card).is_err());
        card.rarity = Rarity::new("Common");
        assert!(engine.compose(&card).is_ok());
    }

    #[test]
    fn error_reports_card_id() {
        let err = ComposeError::CompositionInProgress { card: CardId(9) };
        assert_eq!(err.card(), CardId(9));
        assert_eq!(err.to_string(), "card #9: composition already in progress");
    }

    // =========================================================================
    // Cache
    // =========================================================================

    #[test]
    fn unchanged_card_is_cached() {
        let fx = Fixture::new();
        let engine = fx.engine().with_cache();
        let card = sample_card(&fx, 1, "Common");

        let first = engine.compose(&card).unwrap();
        let second = engine.compose(&card).unwrap();
        assert_eq!(first.status, ComposeStatus::Rendered);
        assert_eq!(second.status, ComposeStatus::Cached);
        assert_eq!(first.checksum, second.checksum);
    }

    #[test]
    fn cache_survives_restart() {
        let fx = Fixture::new();
        let card = sample_card(&fx, 1, "Common");
        {
            let engine = fx.engine().with_cache();
            engine.compose(&card).unwrap();
            engine.save_cache().unwrap();
        }
        let engine = fx.engine().with_cache();
        assert_eq!(engine.compose(&card).unwrap().status, ComposeStatus::Cached);
    }

    #[test]
    fn tampered_render_is_recomposed() {
        let fx = Fixture::new();
        let engine = fx.engine().with_cache();
        let card = sample_card(&fx, 1, "Common");
        let first = engine.compose(&card).unwrap();
        fs::write(first.rendered.resolve(fx.root()), b"scribbled").unwrap();

        let second = engine.compose(&card).unwrap();
        assert_eq!(second.status, ComposeStatus::Rendered);
        assert_eq!(second.checksum, first.checksum);
    }

    #[test]
    fn formatting_change_misses_cache() {
        let fx = Fixture::new();
        let engine = fx.engine().with_cache();
        let mut card = sample_card(&fx, 1, "Common");
        engine.compose(&card).unwrap();
        card.formatting.title.color = "gold".to_string();
        assert_eq!(engine.compose(&card).unwrap().status, ComposeStatus::Rendered);
    }

    // =========================================================================
    // Batch
    // =========================================================================

    #[test]
    fn batch_preserves_order_and_streams_events() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let cards = vec![
            sample_card(&fx, 1, "Common"),
            sample_card(&fx, 2, "Mythic"),
            sample_card(&fx, 3, "Rare"),
        ];
        let (tx, rx) = std::sync::mpsc::channel();
        let (results, stats) = engine.compose_batch(&cards, Some(tx));
        let events: Vec<ComposeEvent> = rx.into_iter().collect();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ComposeError::TemplateNotFound { .. })));
        assert!(results[2].is_ok());
        assert_eq!(stats.rendered, 2);
        assert_eq!(events.len(), 3);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, ComposeEvent::Failed { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn batch_composes_duplicate_ids_once() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let card = sample_card(&fx, 1, "Common");
        let (results, _) = engine.compose_batch(&[card.clone(), card], None);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ComposeError::CompositionInProgress { .. })
        ));
    }

    #[test]
    fn describe_templates_reports_sizes() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let infos = engine.describe_templates();
        assert_eq!(infos.len(), 3);
        assert!(infos.iter().all(|i| i.dimensions.is_some()));
        assert_eq!(infos[0].asset.rarity.as_str(), "Common");
    }
}
