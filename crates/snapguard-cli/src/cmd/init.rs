use crate::output::print_json;
use anyhow::Context;
use snapguard_core::{project, vcs::GitVcs};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let vcs = GitVcs::new(root).context("snapguard needs git")?;
    let report = project::init(root, &vcs)
        .with_context(|| format!("failed to initialize {}", root.display()))?;
    let ready = project::is_vcs_ready(root);

    if json {
        print_json(&serde_json::json!({
            "ready": ready,
            "report": report,
        }))?;
        return Ok(());
    }

    if report.git_initialized {
        println!("Initialized git repository in {}", root.display());
    }
    if report.config_written {
        println!("Wrote default config .opencode/snapguard.yaml");
    }
    for entry in &report.excludes_added {
        println!("Excluded {entry} via .git/info/exclude");
    }
    if ready {
        println!("snapguard ready.");
    } else {
        println!("snapguard not ready: no git repository found.");
    }
    Ok(())
}
