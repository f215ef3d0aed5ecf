//! Metadata Store: the on-disk catalog of snapshot records.
//!
//! The catalog is a single JSON array, newest record first. It is the only
//! record of which checkpoints this tool created; the git stash list is
//! consulted separately to locate them.
//!
//! Reads never fail on bad content. A missing or corrupt document reads as
//! an empty catalog so a damaged file cannot block the caller. Writes go
//! through [`crate::io::atomic_write`].
//!
//! Callers that read, modify, and write the catalog hold a [`CatalogLock`]
//! for the whole cycle. The lock is advisory (`flock`) and only protects
//! against other snapguard processes.

use crate::error::Result;
use crate::io::atomic_write;
use crate::paths;
use crate::snapshot::SnapshotRecord;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// CatalogLock
// ---------------------------------------------------------------------------

/// Exclusive lock on the catalog sidecar file, released on drop.
pub struct CatalogLock {
    file: File,
    path: PathBuf,
}

impl CatalogLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CatalogLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release catalog lock");
        }
    }
}

// ---------------------------------------------------------------------------
// MetadataStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        paths::lock_path(&self.path)
    }

    /// Read the catalog. Absent or unparsable content yields an empty catalog.
    pub fn read(&self) -> Vec<SnapshotRecord> {
        let data = match fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "catalog unreadable, treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_str(&data) {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "catalog corrupt, treating as empty");
                Vec::new()
            }
        }
    }

    /// Overwrite the catalog with `catalog`, creating the directory if needed.
    pub fn write(&self, catalog: &[SnapshotRecord]) -> Result<()> {
        let data = serde_json::to_string_pretty(catalog)?;
        atomic_write(&self.path, data.as_bytes())
    }

    /// Block until this process holds the catalog lock.
    pub fn lock(&self) -> Result<CatalogLock> {
        let path = self.lock_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.lock_exclusive()?;
        tracing::debug!(path = %path.display(), "acquired catalog lock");
        Ok(CatalogLock { file, path })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{insert_newest, Origin};
    use chrono::Utc;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> MetadataStore {
        MetadataStore::open(dir.path().join(".opencode/.snapshots.json"))
    }

    #[test]
    fn absent_document_reads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).read().is_empty());
    }

    #[test]
    fn invalid_document_reads_empty() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        std::fs::create_dir_all(s.path().parent().unwrap()).unwrap();
        std::fs::write(s.path(), "{ this is not json").unwrap();
        assert!(s.read().is_empty());
    }

    #[test]
    fn wrong_shape_reads_empty() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        std::fs::create_dir_all(s.path().parent().unwrap()).unwrap();
        std::fs::write(s.path(), r#"{"id": "0"}"#).unwrap();
        assert!(s.read().is_empty());
    }

    #[test]
    fn write_creates_directory_and_preserves_order() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let mut catalog = Vec::new();
        insert_newest(&mut catalog, SnapshotRecord::new(Origin::Manual, "first", Utc::now()));
        insert_newest(&mut catalog, SnapshotRecord::new(Origin::Auto, "second", Utc::now()));
        s.write(&catalog).unwrap();

        let back = s.read();
        assert_eq!(back, catalog);
        assert!(back[0].auto);
        assert_eq!(back[1].description, "first");
    }

    #[test]
    fn document_is_a_pretty_json_array() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.write(&[SnapshotRecord::new(Origin::Manual, "x", Utc::now())])
            .unwrap();
        let raw = std::fs::read_to_string(s.path()).unwrap();
        assert!(raw.starts_with("[\n"));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["id"], "0");
        assert_eq!(value[0]["auto"], false);
    }

    #[test]
    fn lock_is_reacquirable_after_drop() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        {
            let lock = s.lock().unwrap();
            assert!(lock.path().ends_with(".snapshots.json.lock"));
        }
        let _again = s.lock().unwrap();
    }

    #[test]
    fn held_lock_shuts_out_other_handles() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let lock = s.lock().unwrap();

        let other = OpenOptions::new().write(true).open(s.lock_path()).unwrap();
        assert!(other.try_lock_exclusive().is_err());

        drop(lock);
        other.try_lock_exclusive().unwrap();
        FileExt::unlock(&other).unwrap();
    }
}
