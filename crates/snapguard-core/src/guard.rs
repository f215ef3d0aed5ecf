//! Auto-Snapshot Guard: the advisory check an agent runs before a risky edit.
//!
//! The guard never fails its caller. Every error becomes an outcome with
//! `success = false` and a message, and the edit is expected to go ahead
//! either way.

use crate::engine::{CreateOutcome, Engine};
use crate::error::{Result, SnapError};
use crate::snapshot::SnapshotRecord;
use crate::vcs::{find_repo_root, GitVcs, Vcs};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardAction {
    /// Not inside a repository.
    Skipped,
    /// A snapshot inside the dedupe window already covers this edit.
    Reused,
    /// Nothing uncommitted to protect.
    Clean,
    Created,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuardOutcome {
    pub success: bool,
    pub action: GuardAction,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotRecord>,
}

impl GuardOutcome {
    fn ok(action: GuardAction, message: impl Into<String>) -> Self {
        Self {
            success: true,
            action,
            message: message.into(),
            snapshot: None,
        }
    }

    fn failed(error: &SnapError) -> Self {
        Self {
            success: false,
            action: GuardAction::Failed,
            message: format!("checkpoint failed, proceeding without one: {error}"),
            snapshot: None,
        }
    }
}

pub struct Guard<'a, V> {
    engine: &'a Engine<V>,
}

impl<'a, V: Vcs> Guard<'a, V> {
    pub fn new(engine: &'a Engine<V>) -> Self {
        Self { engine }
    }

    pub fn run(&self, operation: &str) -> GuardOutcome {
        self.run_at(operation, Utc::now())
    }

    /// Same as [`Guard::run`] with an explicit clock for the dedupe window.
    pub fn run_at(&self, operation: &str, now: DateTime<Utc>) -> GuardOutcome {
        match self.check(operation, now) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, operation, "auto-snapshot failed");
                GuardOutcome::failed(&e)
            }
        }
    }

    fn check(&self, operation: &str, now: DateTime<Utc>) -> Result<GuardOutcome> {
        let vcs = self.engine.vcs();
        if !vcs.is_repo() {
            return Ok(skipped());
        }

        let catalog = self.engine.store().read();
        if let Some(newest) = catalog.first() {
            let age = now.signed_duration_since(newest.timestamp);
            let window = chrono::Duration::from_std(self.engine.config().dedupe_window())
                .unwrap_or(chrono::Duration::MAX);
            if !window.is_zero() && age < window {
                return Ok(GuardOutcome::ok(
                    GuardAction::Reused,
                    format!(
                        "reused existing checkpoint '{}' from {}s ago",
                        newest.description,
                        age.num_seconds().max(0)
                    ),
                ));
            }
        }

        if !vcs.is_dirty()? {
            return Ok(clean());
        }

        match self.engine.create_auto(operation)? {
            CreateOutcome::Created(record) => Ok(GuardOutcome {
                success: true,
                action: GuardAction::Created,
                message: format!(
                    "checkpoint created [stash@{{{}}}] key {}",
                    record.id,
                    record.key.as_deref().unwrap_or("-")
                ),
                snapshot: Some(record),
            }),
            CreateOutcome::NothingToSnapshot => Ok(clean()),
        }
    }
}

fn skipped() -> GuardOutcome {
    GuardOutcome::ok(GuardAction::Skipped, "skipped, not a git repository")
}

fn clean() -> GuardOutcome {
    GuardOutcome::ok(
        GuardAction::Clean,
        "working tree clean, nothing to checkpoint",
    )
}

/// Guard entry point for a project root. A directory outside any repository
/// is skipped before git or the config is touched.
pub fn auto_snapshot(root: &Path, operation: &str) -> GuardOutcome {
    if find_repo_root(root).is_none() {
        return skipped();
    }
    match Engine::<GitVcs>::open(root) {
        Ok(engine) => Guard::new(&engine).run(operation),
        Err(e) => {
            tracing::warn!(error = %e, "auto-snapshot could not start");
            GuardOutcome::failed(&e)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
