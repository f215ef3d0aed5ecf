use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const OPENCODE_DIR: &str = ".opencode";
pub const CONFIG_FILE: &str = ".opencode/snapguard.yaml";
pub const DEFAULT_CATALOG_FILE: &str = ".opencode/.snapshots.json";
pub const GIT_DIR: &str = ".git";

const LOCK_SUFFIX: &str = ".lock";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn git_dir(root: &Path) -> PathBuf {
    root.join(GIT_DIR)
}

/// Resolve a catalog path from config. Relative paths are taken from `root`.
pub fn catalog_path(root: &Path, catalog: &Path) -> PathBuf {
    if catalog.is_absolute() {
        catalog.to_path_buf()
    } else {
        root.join(catalog)
    }
}

/// Sidecar lock file guarding the catalog's read-modify-write cycle.
pub fn lock_path(catalog: &Path) -> PathBuf {
    let mut name = catalog.as_os_str().to_os_string();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.opencode/snapguard.yaml")
        );
        assert_eq!(
            catalog_path(root, Path::new(DEFAULT_CATALOG_FILE)),
            PathBuf::from("/tmp/proj/.opencode/.snapshots.json")
        );
        assert_eq!(
            catalog_path(root, Path::new("/var/tmp/cat.json")),
            PathBuf::from("/var/tmp/cat.json")
        );
    }

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path(Path::new("/tmp/proj/.opencode/.snapshots.json")),
            PathBuf::from("/tmp/proj/.opencode/.snapshots.json.lock")
        );
    }
}
