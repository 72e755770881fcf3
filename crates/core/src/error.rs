use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no directory selected")]
    NoDirectory,
    #[error("invalid directory: {0}")]
    InvalidDirectory(PathBuf),
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    #[error("file not in the current grouping: {0}")]
    FileNotFound(String),
    #[error("scan failed: {0}")]
    Scan(#[from] anyhow::Error),
}

/// Organize preconditions; raised before anything on disk changes.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("directory does not exist: {0}")]
    Missing(PathBuf),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("no write access to {path}: {source}")]
    NotWritable {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum UndoError {
    #[error("no actions to undo")]
    NoHistory,
    #[error("history journal failed: {0}")]
    Journal(#[from] anyhow::Error),
}
