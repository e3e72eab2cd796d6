//! Render cache for incremental composition.
//!
//! Composition is a pure function of its inputs, so a card whose inputs
//! have not changed since the last render does not need to be decoded,
//! layered and re-encoded. This module records, per rendered file, a
//! fingerprint of those inputs and a checksum of the bytes that were
//! written.
//!
//! ## Cache keys
//!
//! The **fingerprint** is a SHA-256 over every input that affects pixels:
//!
//! - source artwork bytes (content, not mtime, so it survives `git checkout`)
//! - template bytes and the effective art window
//! - the formatting model and the text drawn (name, description, cost)
//! - the identity of every font family used
//!
//! The **checksum** is the SHA-256 of the rendered PNG.
//!
//! A hit requires:
//! 1. An entry for the rendered path with the same fingerprint
//! 2. The rendered file on disk still hashing to the recorded checksum
//!
//! A rendered file edited or replaced by hand therefore misses and is
//! re-rendered. Skipping never changes output bytes, only the work done.
//!
//! ## Storage
//!
//! The manifest is a JSON file at `<rendered_dir>/.render-cache.json`,
//! written atomically. A missing, corrupt or wrong-version manifest loads
//! as empty. `--no-cache` skips it entirely.

use crate::persist::write_atomic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the rendered directory.
const MANIFEST_FILENAME: &str = ".render-cache.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or fingerprint computation changes.
const MANIFEST_VERSION: u32 = 1;

/// A single cached rendered file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub checksum: String,
}

/// On-disk manifest mapping rendered paths to their cache entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderCache {
    pub version: u32,
    pub entries: BTreeMap<String, CacheEntry>,
}

impl RenderCache {
    /// Create an empty manifest (used for `--no-cache` or a first render).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Load from the rendered directory. Returns an empty manifest if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(rendered_dir: &Path) -> Self {
        let path = manifest_path(rendered_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Ignoring unreadable render cache {}: {e}", path.display());
                return Self::empty();
            }
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest
    }

    /// Save to the rendered directory.
    pub fn save(&self, rendered_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&manifest_path(rendered_dir), json.as_bytes())
    }

    /// The recorded checksum for `key` if `fingerprint` matches and the file
    /// at `rendered` still has that checksum.
    pub fn lookup(&self, key: &str, fingerprint: &str, rendered: &Path) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.fingerprint != fingerprint {
            return None;
        }
        let on_disk = hash_file(rendered).ok()?;
        (on_disk == entry.checksum).then(|| entry.checksum.clone())
    }

    /// Record the inputs and output of a render.
    pub fn insert(&mut self, key: String, fingerprint: String, checksum: String) {
        self.entries.insert(
            key,
            CacheEntry {
                fingerprint,
                checksum,
            },
        );
    }
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

/// SHA-256 hash of a byte slice, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Incremental fingerprint over labelled inputs.
///
/// Each input is framed by its label and length, so moving bytes from one
/// input to the next changes the result.
pub struct Fingerprint(Sha256);

impl Fingerprint {
    pub fn new() -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"cardsmith-render\0");
        hasher.update(MANIFEST_VERSION.to_le_bytes());
        Self(hasher)
    }

    pub fn update(mut self, label: &str, bytes: &[u8]) -> Self {
        self.0.update(label.as_bytes());
        self.0.update(b"\0");
        self.0.update((bytes.len() as u64).to_le_bytes());
        self.0.update(bytes);
        self
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.0.finalize())
    }
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of cache performance for a batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub cached: u32,
    pub rendered: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.cached += 1;
    }

    pub fn miss(&mut self) {
        self.rendered += 1;
    }

    pub fn total(&self) -> u32 {
        self.cached + self.rendered
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cached > 0 {
            write!(
                f,
                "{} cached, {} rendered ({} total)",
                self.cached,
                self.rendered,
                self.total()
            )
        } else {
            write!(f, "{} rendered", self.rendered)
        }
    }
}

/// Resolve the cache manifest path for a rendered directory.
pub fn manifest_path(rendered_dir: &Path) -> PathBuf {
    rendered_dir.join(MANIFEST_FILENAME)
}
