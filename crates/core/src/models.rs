use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// A regular file seen by the most recent directory scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub name: String,
    /// Modification time in nanoseconds since the Unix epoch.
    pub mtime: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// One organize batch: the unit of undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub moves: Vec<MoveRecord>,
    pub created_folders: BTreeSet<PathBuf>,
    pub created_at: i64,
}

impl Transaction {
    pub fn new(moves: Vec<MoveRecord>, created_folders: BTreeSet<PathBuf>) -> Self {
        Self {
            moves,
            created_folders,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}
