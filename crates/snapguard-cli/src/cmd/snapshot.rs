use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::SecondsFormat;
use snapguard_core::{
    vcs::shelf_ref, CreateOutcome, Engine, SnapError, SnapshotRecord, SnapshotView,
};
use std::path::Path;

fn open(root: &Path) -> anyhow::Result<Engine<snapguard_core::vcs::GitVcs>> {
    Engine::open(root).with_context(|| format!("cannot open snapshots in {}", root.display()))
}

fn key_of(record: &SnapshotRecord) -> &str {
    record.key.as_deref().unwrap_or("-")
}

fn time_of(record: &SnapshotRecord) -> String {
    record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn create(root: &Path, description: &str, json: bool) -> anyhow::Result<()> {
    let engine = open(root)?;
    let outcome = match engine.create(description) {
        Err(SnapError::NotAVcsRepo) => {
            if json {
                print_json(&serde_json::json!({ "created": false, "reason": "not_a_repo" }))?;
            } else {
                println!("Skipped: {} is not inside a git repository.", root.display());
            }
            return Ok(());
        }
        other => other.context("failed to create snapshot")?,
    };

    match outcome {
        CreateOutcome::Created(record) => {
            if json {
                print_json(&record)?;
            } else {
                println!(
                    "Created snapshot [{}] key {}",
                    shelf_ref(record.index().unwrap_or(0)),
                    key_of(&record)
                );
                println!("  description: {}", record.description);
                println!("  time:        {}", time_of(&record));
            }
        }
        CreateOutcome::NothingToSnapshot => {
            if json {
                print_json(&serde_json::json!({ "created": false, "reason": "clean" }))?;
            } else {
                println!("Working tree clean, nothing to snapshot.");
            }
        }
    }
    Ok(())
}

pub fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let engine = open(root)?;
    let views = engine.list().context("failed to list snapshots")?;

    if json {
        print_json(&views)?;
        return Ok(());
    }

    if views.is_empty() {
        println!("No snapshots.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = views
        .iter()
        .enumerate()
        .map(|(n, SnapshotView { record, orphaned })| {
            vec![
                (n + 1).to_string(),
                if *orphaned {
                    "missing".to_string()
                } else {
                    record.id.clone()
                },
                key_of(record).to_string(),
                record.origin().to_string(),
                time_of(record),
                record.description.clone(),
            ]
        })
        .collect();
    print_table(&["#", "ID", "KEY", "KIND", "CREATED", "DESCRIPTION"], rows);

    if views.iter().any(|v| v.orphaned) {
        println!();
        println!("Some stash entries were removed outside snapguard; run `snapguard prune`.");
    }
    Ok(())
}

pub fn restore(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let engine = open(root)?;
    let record = engine
        .restore(id)
        .with_context(|| format!("failed to restore snapshot '{id}'"))?;
    report(&record, "restored", "Restored", json)
}

pub fn rollback(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let engine = open(root)?;
    let record = engine
        .rollback(id)
        .with_context(|| format!("failed to roll back snapshot '{id}'"))?;
    report(&record, "rolled_back", "Rolled back to", json)
}

pub fn delete(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let engine = open(root)?;
    let record = engine
        .delete(id)
        .with_context(|| format!("failed to delete snapshot '{id}'"))?;
    report(&record, "deleted", "Deleted", json)
}

pub fn prune(root: &Path, json: bool) -> anyhow::Result<()> {
    let engine = open(root)?;
    let pruned = engine.prune().context("failed to prune snapshots")?;
    if json {
        print_json(&pruned)?;
    } else if pruned.is_empty() {
        println!("Nothing to prune.");
    } else {
        for record in &pruned {
            println!("Pruned [{}] {}", key_of(record), record.description);
        }
    }
    Ok(())
}

fn report(record: &SnapshotRecord, action: &str, verb: &str, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(&serde_json::json!({
            "action": action,
            "snapshot": record,
        }))?;
    } else {
        println!(
            "{verb} snapshot [{}] {} ({})",
            key_of(record),
            record.description,
            time_of(record)
        );
    }
    Ok(())
}
