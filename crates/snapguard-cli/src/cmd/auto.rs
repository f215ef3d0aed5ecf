use crate::output::print_json;
use snapguard_core::auto_snapshot;
use std::path::Path;

/// Returns whether the guard succeeded; the caller maps `false` to exit code 1.
pub fn run(root: &Path, operation: &str, json: bool) -> anyhow::Result<bool> {
    let outcome = auto_snapshot(root, operation);
    if json {
        print_json(&outcome)?;
    } else {
        println!("{}", outcome.message);
    }
    Ok(outcome.success)
}
