//! VCS Adapter: the shelving capability the engine needs, and its git binding.
//!
//! The engine only talks to [`Vcs`]. [`GitVcs`] maps each operation onto one
//! `git` invocation run from the project root; a non-zero exit becomes
//! [`SnapError::VcsCommandFailure`] carrying the command line and git's
//! diagnostic output.

use crate::error::{Result, SnapError};
use crate::paths;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One entry of the shelf list as it stands right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShelfEntry {
    pub index: usize,
    pub message: String,
}

pub trait Vcs {
    /// Whether the project root is inside a repository. Must not spawn anything.
    fn is_repo(&self) -> bool;
    fn is_dirty(&self) -> Result<bool>;
    fn shelve(&self, message: &str) -> Result<()>;
    /// Current shelf list, index 0 first.
    fn list_shelves(&self) -> Result<Vec<ShelfEntry>>;
    fn apply(&self, index: usize) -> Result<()>;
    /// Apply and remove.
    fn pop(&self, index: usize) -> Result<()>;
    /// Remove without applying.
    fn drop_shelf(&self, index: usize) -> Result<()>;
    fn init(&self) -> Result<()>;
}

/// Find the enclosing repository by looking for `.git` (directory, or file
/// for worktrees and submodules) in `root` and its ancestors.
pub fn find_repo_root(root: &Path) -> Option<PathBuf> {
    root.ancestors()
        .find(|dir| paths::git_dir(dir).exists())
        .map(Path::to_path_buf)
}

// ---------------------------------------------------------------------------
// GitVcs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GitVcs {
    git: PathBuf,
    root: PathBuf,
    include_untracked: bool,
    /// Paths (relative to `root`) that are never reported dirty nor shelved.
    excluded: Vec<String>,
}

impl GitVcs {
    pub fn new(root: &Path) -> Result<Self> {
        let git = which::which("git").map_err(|_| SnapError::GitNotFound)?;
        Ok(Self {
            git,
            root: root.to_path_buf(),
            include_untracked: true,
            excluded: Vec::new(),
        })
    }

    pub fn include_untracked(mut self, yes: bool) -> Self {
        self.include_untracked = yes;
        self
    }

    /// Keep `path` out of dirty checks and shelves. Paths outside the root are ignored.
    pub fn exclude(mut self, path: &Path) -> Self {
        let rel = if path.is_absolute() {
            match path.strip_prefix(&self.root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => return self,
            }
        } else {
            path.to_path_buf()
        };
        self.excluded.push(rel.to_string_lossy().replace('\\', "/"));
        self
    }

    /// `-- . :(exclude)<path>...` for the excluded paths that currently exist
    /// and that git does not already ignore. `stash push --include-untracked`
    /// refuses a pathspec naming an ignored file.
    fn pathspecs(&self) -> Vec<String> {
        let mut specs = vec!["--".to_string(), ".".to_string()];
        specs.extend(
            self.excluded
                .iter()
                .filter(|p| self.root.join(p.as_str()).exists())
                .filter(|p| !self.is_ignored(p))
                .map(|p| format!(":(exclude){p}")),
        );
        specs
    }

    /// `git check-ignore` exits 0 only for ignored paths; anything else,
    /// including running outside a repository, counts as not ignored.
    fn is_ignored(&self, rel: &str) -> bool {
        let status = Command::new(&self.git)
            .args(["check-ignore", "-q", "--", rel])
            .current_dir(&self.root)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        let ignored = matches!(status.map(|s| s.code()), Ok(Some(0)));
        tracing::debug!(path = rel, ignored, "checked ignore rules");
        ignored
    }

    fn run(&self, args: &[String]) -> Result<String> {
        let command = format!("git {}", args.join(" "));
        tracing::debug!(%command, cwd = %self.root.display(), "running git");
        let output = Command::new(&self.git)
            .args(args)
            .current_dir(&self.root)
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let output = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            return Err(SnapError::VcsCommandFailure { command, output });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn stash(&self, verb: &str, index: usize) -> Result<()> {
        self.run(&[
            "stash".to_string(),
            verb.to_string(),
            shelf_ref(index),
        ])?;
        Ok(())
    }
}

impl Vcs for GitVcs {
    fn is_repo(&self) -> bool {
        find_repo_root(&self.root).is_some()
    }

    fn is_dirty(&self) -> Result<bool> {
        let mut args = vec!["status".to_string(), "--porcelain".to_string()];
        args.extend(self.pathspecs());
        Ok(!self.run(&args)?.trim().is_empty())
    }

    fn shelve(&self, message: &str) -> Result<()> {
        let mut args = vec!["stash".to_string(), "push".to_string()];
        if self.include_untracked {
            args.push("--include-untracked".to_string());
        }
        args.push("-m".to_string());
        args.push(message.to_string());
        args.extend(self.pathspecs());
        self.run(&args)?;
        Ok(())
    }

    fn list_shelves(&self) -> Result<Vec<ShelfEntry>> {
        let out = self.run(&[
            "stash".to_string(),
            "list".to_string(),
            "--format=%gd%x1f%s".to_string(),
        ])?;
        Ok(parse_stash_list(&out))
    }

    fn apply(&self, index: usize) -> Result<()> {
        self.stash("apply", index)
    }

    fn pop(&self, index: usize) -> Result<()> {
        self.stash("pop", index)
    }

    fn drop_shelf(&self, index: usize) -> Result<()> {
        self.stash("drop", index)
    }

    fn init(&self) -> Result<()> {
        self.run(&["init".to_string()])?;
        Ok(())
    }
}

pub fn shelf_ref(index: usize) -> String {
    format!("stash@{{{index}}}")
}

// ---------------------------------------------------------------------------
// Stash list parsing
// ---------------------------------------------------------------------------

static SELECTOR_RE: OnceLock<Regex> = OnceLock::new();

fn selector_re() -> &'static Regex {
    SELECTOR_RE.get_or_init(|| Regex::new(r"^stash@\{(\d+)\}$").unwrap())
}

/// Parse `git stash list --format=%gd%x1f%s` output.
///
/// The subject reads `On <branch>: <message>` for stashes created with `-m`
/// and `WIP on <branch>: <sha> <commit subject>` otherwise. Branch names
/// cannot contain `:`, so the first `": "` ends the prefix.
pub fn parse_stash_list(out: &str) -> Vec<ShelfEntry> {
    out.lines()
        .filter_map(|line| {
            let (selector, subject) = line.split_once('\u{1f}')?;
            let caps = selector_re().captures(selector.trim())?;
            let index = caps[1].parse().ok()?;
            let message = if subject.starts_with("On ") || subject.starts_with("WIP on ") {
                subject
                    .split_once(": ")
                    .map(|(_, m)| m)
                    .unwrap_or(subject)
            } else {
                subject
            };
            Some(ShelfEntry {
                index,
                message: message.to_string(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// In-memory fake
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
