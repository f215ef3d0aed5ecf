//! Project initialization: make a directory ready for snapshots.

use crate::config::Config;
use crate::error::Result;
use crate::io;
use crate::paths;
use crate::store::MetadataStore;
use crate::vcs::{find_repo_root, Vcs};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize)]
pub struct InitReport {
    /// `git init` was run because no repository existed.
    pub git_initialized: bool,
    pub config_written: bool,
    /// Lines added to `.git/info/exclude`.
    pub excludes_added: Vec<String>,
}

/// Whether `root` sits inside a repository snapshots can be taken in.
pub fn is_vcs_ready(root: &Path) -> bool {
    find_repo_root(root).is_some()
}

/// Ensure a repository exists, write the default config if absent, and keep
/// the catalog files out of `git status` via the repository-local exclude file.
pub fn init(root: &Path, vcs: &impl Vcs) -> Result<InitReport> {
    let mut report = InitReport::default();

    if !vcs.is_repo() {
        vcs.init()?;
        report.git_initialized = true;
        tracing::info!(root = %root.display(), "initialized git repository");
    }

    let config_yaml = serde_yaml::to_string(&Config::default())?;
    report.config_written =
        io::write_if_missing(&paths::config_path(root), config_yaml.as_bytes())?;

    let config = Config::load(root)?;
    let store = MetadataStore::open(config.catalog_file(root));
    let info_exclude = paths::git_dir(root).join("info").join("exclude");
    if paths::git_dir(root).is_dir() {
        for path in [store.path().to_path_buf(), store.lock_path()] {
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let entry = format!("/{}", rel.to_string_lossy().replace('\\', "/"));
            if io::ensure_line(&info_exclude, &entry)? {
                report.excludes_added.push(entry);
            }
        }
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
