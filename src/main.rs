use clap::{Parser, Subcommand};
use cardsmith::compose::CompositionEngine;
use cardsmith::config;
use cardsmith::export::{self, ExportScope, ExportSummary};
use cardsmith::output;
use cardsmith::persist::write_atomic;
use cardsmith::service::{CardService, Change};
use cardsmith::store::{CardStore, LIBRARY_FILENAME, Library};
use cardsmith::types::{Actor, ActorId, CardId, Rarity, SourceImage};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Shared flags for commands that compose cards.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the render cache and recompose every card
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "cardsmith")]
#[command(about = "Compose trading-card images and export the card library")]
#[command(long_about = "\
Compose trading-card images and export the card library

Each card keeps its original artwork untouched. Rendering layers the
artwork onto the template of the card's rarity and draws the title, body
text and cost on top. Changing rarity or formatting recomposes from the
original artwork, so switching back and forth never stacks templates.

Project structure:

  project/
  ├── engine.toml                  # Engine config (optional)
  ├── library.json                 # Cards, actors and their links
  ├── templates/
  │   ├── 010-Common.png           # Rarity \"Common\", tier 10
  │   ├── 020-Rare.png
  │   └── 030-Legendary.png
  ├── art/                         # Original artwork (never modified)
  └── rendered/                    # Composited cards (always regenerated)

Run 'cardsmith gen-config' to generate a documented engine.toml.")]
#[command(version)]
struct Cli {
    /// Project directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a card from an artwork file
    AddCard {
        name: String,
        /// Rarity label; must match a template when the card is composed
        #[arg(long)]
        rarity: String,
        /// Artwork path, relative to the project root
        #[arg(long)]
        art: PathBuf,
        #[arg(long, default_value_t = 0)]
        cost: i64,
        #[arg(long, default_value = "")]
        description: String,
        /// TOML file with formatting overrides; absent keys use engine.toml defaults
        #[arg(long)]
        formatting: Option<PathBuf>,
    },
    /// Create an actor
    AddActor {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        color: String,
        #[arg(long, default_value = "")]
        icon: String,
        #[arg(long)]
        inactive: bool,
    },
    /// Delete a card and its links
    RemoveCard { card: u32 },
    /// Delete an actor and its links
    RemoveActor { actor: String },
    /// Link a card to an actor
    Link {
        card: u32,
        actor: String,
        /// Succeed quietly if the link already exists
        #[arg(long)]
        if_missing: bool,
    },
    /// Remove a card-actor link
    Unlink { card: u32, actor: String },
    /// Change a card's rarity and recompose it
    SetRarity { card: u32, rarity: String },
    /// Apply a formatting TOML file to a card and recompose it
    SetFormatting { card: u32, file: PathBuf },
    /// Compose cards (all cards when none are given)
    Compose {
        cards: Vec<u32>,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// List rarity templates
    Templates,
    /// List cards and actors
    List,
    /// Export cards to the structured text format
    Export {
        /// Export only this actor's cards
        #[arg(long, conflicts_with_all = ["unassigned", "card"])]
        actor: Option<String>,
        /// Export only cards with no actor
        #[arg(long, conflicts_with = "card")]
        unassigned: bool,
        /// Export a single card block
        #[arg(long)]
        card: Option<u32>,
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Parse an export file and report its contents
    Verify { file: PathBuf },
    /// Print a stock engine.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let root = cli.root.as_path();
    let library_path = root.join(LIBRARY_FILENAME);

    match cli.command {
        Command::AddCard {
            name,
            rarity,
            art,
            cost,
            description,
            formatting,
        } => {
            let config = config::load_config(root)?;
            let formatting = match formatting {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)?;
                    config::overlay_formatting(&config.formatting, &content)?
                }
                None => config.formatting.clone(),
            };
            if let Err(errors) = formatting.validate() {
                return Err(invalid_formatting(&errors));
            }
            if !root.join(&art).is_file() {
                warn!("Artwork {} does not exist yet", art.display());
            }
            let mut library = Library::open(&library_path)?;
            let id = library.create_card(
                name,
                Rarity::new(rarity),
                cost,
                SourceImage::new(art),
                formatting,
            )?;
            let mut card = library.get_card(id)?;
            card.description = description;
            library.save_card(card)?;
            library.save()?;
            println!("Created {id}");
        }
        Command::AddActor {
            name,
            description,
            color,
            icon,
            inactive,
        } => {
            let mut library = Library::open(&library_path)?;
            let actor = Actor {
                description,
                color,
                icon,
                active: !inactive,
                ..Actor::new(ActorId::new(0), name)
            };
            let id = library.add_actor(actor)?;
            library.save()?;
            println!("Created {id}");
        }
        Command::RemoveCard { card } => {
            let mut library = Library::open(&library_path)?;
            let removed = library.delete_card(CardId::new(card))?;
            library.save()?;
            println!("Removed {} ({})", removed.id(), removed.name);
        }
        Command::RemoveActor { actor } => {
            let mut library = Library::open(&library_path)?;
            let id = actor_id(&library, &actor)?;
            library.delete_actor(id)?;
            library.save()?;
            println!("Removed {id} ({actor})");
        }
        Command::Link {
            card,
            actor,
            if_missing,
        } => {
            let mut library = Library::open(&library_path)?;
            let actor_id = actor_id(&library, &actor)?;
            let card = CardId::new(card);
            if if_missing {
                if !library.link_idempotent(card, actor_id)? {
                    println!("{card} already linked to {actor}");
                    return Ok(());
                }
            } else {
                library.link(card, actor_id)?;
            }
            library.save()?;
            println!("Linked {card} to {actor}");
        }
        Command::Unlink { card, actor } => {
            let mut library = Library::open(&library_path)?;
            let actor_id = actor_id(&library, &actor)?;
            let card = CardId::new(card);
            library.unlink(card, actor_id)?;
            library.save()?;
            println!("Unlinked {card} from {actor}");
        }
        Command::SetRarity { card, rarity } => {
            let mut service = open_service(root, &library_path, false)?;
            let outcome = service.apply(CardId::new(card), Change::Rarity(Rarity::new(rarity)))?;
            service.store().save()?;
            println!("{}: {}", outcome.card, outcome.rendered);
        }
        Command::SetFormatting { card, file } => {
            let mut service = open_service(root, &library_path, false)?;
            let id = CardId::new(card);
            let current = service.store().get_card(id)?;
            let content = std::fs::read_to_string(&file)?;
            let formatting = config::overlay_formatting(&current.formatting, &content)?;
            if let Err(errors) = formatting.validate() {
                return Err(invalid_formatting(&errors));
            }
            let outcome = service.apply(id, Change::Formatting(formatting))?;
            service.store().save()?;
            println!("{}: {}", outcome.card, outcome.rendered);
        }
        Command::Compose { cards, cache } => {
            let mut service = open_service(root, &library_path, !cache.no_cache)?;
            let ids: Vec<CardId> = if cards.is_empty() {
                service.store().card_ids()
            } else {
                cards.into_iter().map(CardId::new).collect()
            };
            init_thread_pool(&service.engine().config().processing);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_compose_event(&event);
                }
            });
            let (results, stats) = service.compose_many(&ids, Some(tx))?;
            printer.join().map_err(|_| "output thread panicked")?;

            service.store().save()?;
            service.engine().save_cache()?;
            let failed = results.iter().filter(|r| r.is_err()).count();
            println!();
            println!("{}", output::format_compose_summary(&stats, failed));
            if failed > 0 {
                return Err(format!("{failed} card(s) failed to compose").into());
            }
        }
        Command::Templates => {
            let config = config::load_config(root)?;
            let engine = CompositionEngine::open(root, config)?;
            output::print_template_listing(&engine.describe_templates(), root);
        }
        Command::List => {
            let library = Library::open(&library_path)?;
            output::print_library(&library);
        }
        Command::Export {
            actor,
            unassigned,
            card,
            output: dest,
        } => {
            let library = Library::open(&library_path)?;
            let (text, summary) = match card {
                Some(id) => {
                    let text = export::export_stored_card(&library, CardId::new(id))?;
                    let summary = ExportSummary {
                        card_blocks: 1,
                        ..Default::default()
                    };
                    (text, summary)
                }
                None => {
                    let scope = match (actor, unassigned) {
                        (Some(name), _) => ExportScope::Actor(actor_id(&library, &name)?),
                        (None, true) => ExportScope::Unassigned,
                        (None, false) => ExportScope::AllActors,
                    };
                    let snapshot = export::Snapshot::capture(&library)?;
                    let doc = export::export_batch(&snapshot, scope)?;
                    (doc.text, doc.summary)
                }
            };
            match &dest {
                Some(path) => {
                    write_atomic(path, text.as_bytes())?;
                    output::print_export_summary(&summary, Some(path));
                }
                None => print!("{text}"),
            }
        }
        Command::Verify { file } => {
            let text = std::fs::read_to_string(&file)?;
            let doc = export::parse(&text)?;
            let summary = ExportSummary::of(&doc);
            if summary.version.is_some_and(|v| v != export::FORMAT_VERSION) {
                warn!(
                    "{} declares version {:?}, this build writes {}",
                    file.display(),
                    summary.version,
                    export::FORMAT_VERSION
                );
            }
            output::print_verify_summary(&summary);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Library and engine for the project at `root`.
fn open_service(
    root: &Path,
    library_path: &Path,
    use_cache: bool,
) -> Result<CardService<Library>, Box<dyn std::error::Error>> {
    let config = config::load_config(root)?;
    let library = Library::open(library_path)?;
    let mut engine = CompositionEngine::open(root, config)?;
    if use_cache {
        engine = engine.with_cache();
    }
    debug!("Opened {} with {} cards", root.display(), library.card_ids().len());
    Ok(CardService::new(library, engine))
}

fn actor_id(library: &Library, name: &str) -> Result<ActorId, Box<dyn std::error::Error>> {
    library
        .find_actor_by_name(name)
        .map(|a| a.id)
        .ok_or_else(|| format!("No actor named '{name}'").into())
}

fn invalid_formatting(errors: &cardsmith::formatting::FormattingErrors) -> Box<dyn std::error::Error> {
    for line in output::format_field_errors(errors) {
        eprintln!("{}", line);
    }
    "formatting rejected; nothing was composed".into()
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores: users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
