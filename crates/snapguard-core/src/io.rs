use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// A crash mid-write leaves the previous file intact.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write a file only if it does not already exist. Returns true if written.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write(path, data)?;
    Ok(true)
}

/// Append `entry` as a line of the file at `path` unless an identical line exists.
///
/// Creates the file (and parents) if missing. Returns true if the line was added.
pub fn ensure_line(path: &Path, entry: &str) -> Result<bool> {
    let existing = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    // Exact line match, not substring.
    if existing.lines().any(|l| l == entry) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let sep = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(f, "{sep}{entry}")?;
    Ok(true)
}
