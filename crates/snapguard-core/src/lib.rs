pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod io;
pub mod paths;
pub mod project;
pub mod snapshot;
pub mod store;
pub mod vcs;

pub use engine::{CreateOutcome, Engine, SnapshotView};
pub use error::{Result, SnapError};
pub use guard::{auto_snapshot, Guard, GuardAction, GuardOutcome};
pub use snapshot::SnapshotRecord;
