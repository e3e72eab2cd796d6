//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Every entity (card, actor, template) leads with its identity: a
//! zero-padded id or tier plus its name. Paths and status are secondary
//! context on indented lines underneath, so the output reads as an inventory
//! while still letting users trace each entry back to a file.
//!
//! # Output Format
//!
//! ## Compose
//!
//! ```text
//! 001 Fireball
//!     Rendered: rendered/card-0001.png (rendered)
//! 002 Frost Nova
//!     Error: card #2: template not found: unknown rarity 'Mythic' (known: Common, Rare)
//!
//! Composed 1 rendered, 1 failed
//! ```
//!
//! ## Templates
//!
//! ```text
//! Templates
//! 010 Common (300x420)
//!     Source: templates/010-Common.png
//! --- Promo (300x420)
//!     Source: promo.png
//!     Art: 20,40 260x180
//! ```
//!
//! ## List
//!
//! ```text
//! Cards
//! 001 Fireball [Rare, cost 3]
//!     Source: art/fireball.png
//!     Rendered: rendered/card-0001.png
//!     Actors: Pyromancer
//!
//! Actors
//! 001 Pyromancer (1 card)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::compose::{ComposeEvent, ComposeStatus, TemplateInfo};
use crate::cache::CacheStats;
use crate::export::ExportSummary;
use crate::formatting::FormattingErrors;
use crate::store::{CardStore, Library};
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a positional index or id as 3-digit zero-padded.
fn format_index(pos: u32) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

// ============================================================================
// Compose
// ============================================================================

/// Format one compose progress event.
pub fn format_compose_event(event: &ComposeEvent) -> Vec<String> {
    match event {
        ComposeEvent::Composed {
            card,
            name,
            rendered,
            status,
        } => {
            let status = match status {
                ComposeStatus::Rendered => "rendered",
                ComposeStatus::Cached => "cached",
            };
            vec![
                format!("{} {}", format_index(card.raw()), name),
                format!("{}Rendered: {} ({})", indent(1), rendered, status),
            ]
        }
        ComposeEvent::Failed { card, name, error } => vec![
            format!("{} {}", format_index(card.raw()), name),
            format!("{}Error: {}", indent(1), error),
        ],
    }
}

pub fn print_compose_event(event: &ComposeEvent) {
    for line in format_compose_event(event) {
        println!("{}", line);
    }
}

pub fn format_compose_summary(stats: &CacheStats, failed: usize) -> String {
    if failed > 0 {
        format!("Composed {}, {} failed", stats, failed)
    } else {
        format!("Composed {}", stats)
    }
}

// ============================================================================
// Templates
// ============================================================================

/// Format the template catalog in tier order.
pub fn format_template_listing(templates: &[TemplateInfo], root: &Path) -> Vec<String> {
    let mut lines = vec!["Templates".to_string()];
    if templates.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
        return lines;
    }
    for info in templates {
        let tier = info
            .asset
            .tier
            .map(format_index)
            .unwrap_or_else(|| "---".to_string());
        let size = match info.dimensions {
            Some(d) => format!(" ({}x{})", d.width, d.height),
            None => " (unreadable)".to_string(),
        };
        lines.push(format!("{} {}{}", tier, info.asset.rarity, size));
        lines.push(format!(
            "{}Source: {}",
            indent(1),
            display_path(&info.asset.path, root)
        ));
        if let Some(art) = info.asset.art {
            lines.push(format!(
                "{}Art: {},{} {}x{}",
                indent(1),
                art.x,
                art.y,
                art.width,
                art.height
            ));
        }
    }
    lines
}

pub fn print_template_listing(templates: &[TemplateInfo], root: &Path) {
    for line in format_template_listing(templates, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Library
// ============================================================================

/// Format every card and actor in the library.
pub fn format_library(library: &Library) -> Vec<String> {
    let mut lines = vec!["Cards".to_string()];
    for card in library.cards() {
        lines.push(format!(
            "{} {} [{}, cost {}]",
            format_index(card.id().raw()),
            card.name,
            card.rarity,
            card.cost
        ));
        if !card.description.is_empty() {
            lines.push(format!(
                "{}Description: {}",
                indent(1),
                truncate_desc(&card.description, 40)
            ));
        }
        lines.push(format!("{}Source: {}", indent(1), card.source().path().display()));
        match card.rendered() {
            Some(rendered) => lines.push(format!("{}Rendered: {}", indent(1), rendered)),
            None => lines.push(format!("{}Rendered: (not composed)", indent(1))),
        }
        let actors: Vec<String> = library
            .associations()
            .actors_of(card.id(), |id| library.actors().find(|a| a.id == id))
            .iter()
            .map(|a| a.name.clone())
            .collect();
        if !actors.is_empty() {
            lines.push(format!("{}Actors: {}", indent(1), actors.join(", ")));
        }
    }

    lines.push(String::new());
    lines.push("Actors".to_string());
    for actor in library.actors() {
        let count = library
            .list_cards_for_actor(actor.id)
            .map(|cards| cards.len())
            .unwrap_or(0);
        let inactive = if actor.active { "" } else { " inactive" };
        lines.push(format!(
            "{} {} ({}){}",
            format_index(actor.id.raw()),
            actor.name,
            plural(count, "card"),
            inactive
        ));
    }
    lines
}

pub fn print_library(library: &Library) {
    for line in format_library(library) {
        println!("{}", line);
    }
}

// ============================================================================
// Formatting errors
// ============================================================================

pub fn format_field_errors(errors: &FormattingErrors) -> Vec<String> {
    let mut lines = vec!["Invalid formatting".to_string()];
    for error in &errors.0 {
        lines.push(format!("{}{}: {}", indent(1), error.field, error.message));
    }
    lines
}

// ============================================================================
// Export and verify
// ============================================================================

pub fn format_export_summary(summary: &ExportSummary, dest: Option<&Path>) -> Vec<String> {
    let mut line = format!(
        "Exported {} in {}, {} unassigned",
        plural(summary.card_blocks, "card block"),
        plural(summary.actor_groups, "actor group"),
        summary.unassigned
    );
    if let Some(dest) = dest {
        line.push_str(&format!(" → {}", dest.display()));
    }
    vec![line]
}

pub fn print_export_summary(summary: &ExportSummary, dest: Option<&Path>) {
    for line in format_export_summary(summary, dest) {
        eprintln!("{}", line);
    }
}

pub fn format_verify_summary(summary: &ExportSummary) -> Vec<String> {
    let version = summary
        .version
        .map(|v| v.to_string())
        .unwrap_or_else(|| "none".to_string());
    vec![
        format!("Valid export (version {})", version),
        format!("{}{}", indent(1), plural(summary.actor_groups, "actor group")),
        format!("{}{}", indent(1), plural(summary.card_blocks, "card block")),
        format!("{}{} unassigned", indent(1), summary.unassigned),
    ]
}

pub fn print_verify_summary(summary: &ExportSummary) {
    for line in format_verify_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
