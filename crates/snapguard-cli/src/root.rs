use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `SNAPGUARD_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.git/`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    snapguard_core::vcs::find_repo_root(&cwd).unwrap_or(cwd)
}
