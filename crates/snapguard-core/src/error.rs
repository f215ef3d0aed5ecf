use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapError {
    #[error("not a git repository (or any parent directory)")]
    NotAVcsRepo,

    #[error("git executable not found on PATH")]
    GitNotFound,

    #[error("command failed: {command}\n{output}")]
    VcsCommandFailure { command: String, output: String },

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("'{0}' matches more than one snapshot; use a longer key")]
    AmbiguousTarget(String),

    #[error("shelf entry for '{0}' missing right after shelving")]
    ShelfMissing(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SnapError>;
