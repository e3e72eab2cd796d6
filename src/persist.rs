//! Atomic file replacement.
//!
//! Every artifact the engine writes (rendered cards, the library document,
//! the render cache manifest) goes through [`write_atomic`]: bytes land in a
//! temporary file in the destination directory, are flushed to disk, and
//! the temporary file is renamed over the destination. Readers see the old
//! file or the new file, never a partial one, and a failed write leaves the
//! old file untouched.

use std::io::{self, Write};
use std::path::Path;

/// Write `bytes` to `path` via a same-directory temporary file and rename.
///
/// Creates the parent directory if needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .suffix(".part")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
