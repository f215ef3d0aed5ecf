mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "snapguard",
    about = "Checkpoint uncommitted work before risky edits, then restore, roll back, or discard it",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .git/)
    #[arg(long, global = true, env = "SNAPGUARD_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Make the project snapshot-ready (git init if needed, default config)
    Init,

    /// Snapshot uncommitted changes
    Create {
        /// What this checkpoint protects
        #[arg(default_value = "Manual backup")]
        description: String,
    },

    /// List snapshots, newest first
    List,

    /// Apply a snapshot and keep it
    Restore {
        /// Position shown by `list`, or a key prefix; all-digit targets shorter than a full key are positions
        id: String,
    },

    /// Apply a snapshot and remove it
    Rollback {
        /// Position shown by `list`, or a key prefix; all-digit targets shorter than a full key are positions
        id: String,
    },

    /// Discard a snapshot without applying it
    Delete {
        /// Position shown by `list`, or a key prefix; all-digit targets shorter than a full key are positions
        id: String,
    },

    /// Forget snapshots whose stash entry was removed outside snapguard
    Prune,

    /// Advisory checkpoint before a file operation; exits 1 only if it failed
    Auto {
        /// The operation about to run
        #[arg(default_value = "file operation")]
        operation: String,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Create { description } => cmd::snapshot::create(&root, &description, cli.json),
        Commands::List => cmd::snapshot::list(&root, cli.json),
        Commands::Restore { id } => cmd::snapshot::restore(&root, &id, cli.json),
        Commands::Rollback { id } => cmd::snapshot::rollback(&root, &id, cli.json),
        Commands::Delete { id } => cmd::snapshot::delete(&root, &id, cli.json),
        Commands::Prune => cmd::snapshot::prune(&root, cli.json),
        Commands::Auto { operation } => match cmd::auto::run(&root, &operation, cli.json) {
            Ok(true) => Ok(()),
            Ok(false) => std::process::exit(1),
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
