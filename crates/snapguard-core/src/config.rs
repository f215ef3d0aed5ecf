use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Project-level settings read from `.opencode/snapguard.yaml`.
///
/// Every field has a default, so a missing file or a partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Catalog document, relative to the project root unless absolute.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
    /// Minimum gap between the newest snapshot and a new automatic one. 0 disables it.
    #[serde(default = "default_dedupe_window_secs")]
    pub dedupe_window_secs: u64,
    /// Automatic snapshots kept before the oldest is evicted.
    #[serde(default = "default_max_auto_snapshots")]
    pub max_auto_snapshots: usize,
    /// Shelve untracked files too (`git stash push -u`).
    #[serde(default = "default_true")]
    pub include_untracked: bool,
    /// Re-apply a new shelf right away so the working tree is left untouched.
    #[serde(default = "default_true")]
    pub keep_working_tree: bool,
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_CATALOG_FILE)
}

fn default_dedupe_window_secs() -> u64 {
    5 * 60
}

fn default_max_auto_snapshots() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            dedupe_window_secs: default_dedupe_window_secs(),
            max_auto_snapshots: default_max_auto_snapshots(),
            include_untracked: true,
            keep_working_tree: true,
        }
    }
}

impl Config {
    /// Load the config for `root`, falling back to defaults when the file is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn dedupe_window(&self) -> Duration {
        Duration::from_secs(self.dedupe_window_secs)
    }

    /// Absolute location of the catalog document.
    pub fn catalog_file(&self, root: &Path) -> PathBuf {
        paths::catalog_path(root, &self.catalog_path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.dedupe_window(), Duration::from_secs(300));
        assert_eq!(cfg.max_auto_snapshots, 10);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".opencode")).unwrap();
        std::fs::write(
            dir.path().join(".opencode/snapguard.yaml"),
            "max_auto_snapshots: 3\nkeep_working_tree: false\n",
        )
        .unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.max_auto_snapshots, 3);
        assert!(!cfg.keep_working_tree);
        assert!(cfg.include_untracked);
        assert_eq!(cfg.catalog_path, PathBuf::from(".opencode/.snapshots.json"));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = TempDir::new().unwrap();
        let cfg = Config {
            dedupe_window_secs: 60,
            ..Config::default()
        };
        cfg.save(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), cfg);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".opencode")).unwrap();
        std::fs::write(
            dir.path().join(".opencode/snapguard.yaml"),
            "max_auto_snapshots: [not, a, number]\n",
        )
        .unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
