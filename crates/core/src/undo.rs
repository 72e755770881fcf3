use crate::error::UndoError;
use crate::models::Transaction;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use storage::Journal;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct UndoFailure {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct UndoReport {
    pub restored: Vec<PathBuf>,
    pub failures: Vec<UndoFailure>,
    pub removed_folders: Vec<PathBuf>,
    /// Created folders left in place because something else now lives there.
    pub kept_folders: Vec<PathBuf>,
}

/// LIFO stack of organize transactions. With a journal attached, the stack
/// mirrors the journal so history survives restarts.
#[derive(Default)]
pub struct UndoManager {
    stack: Vec<(Option<i64>, Transaction)>,
    journal: Option<Journal>,
}

impl UndoManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_journal(journal: Journal) -> Result<Self, UndoError> {
        let stack = journal
            .entries::<Transaction>()
            .await?
            .into_iter()
            .map(|entry| (Some(entry.id), entry.payload))
            .collect();
        Ok(Self {
            stack,
            journal: Some(journal),
        })
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub async fn push(&mut self, tx: Transaction) -> Result<(), UndoError> {
        let id = match &self.journal {
            Some(journal) => Some(journal.append(&tx).await?),
            None => None,
        };
        self.stack.push((id, tx));
        Ok(())
    }

    /// Reverses the most recent transaction. Individual failures are reported
    /// and do not stop the remaining reversals; the transaction is consumed
    /// either way.
    pub async fn undo(&mut self) -> Result<UndoReport, UndoError> {
        let Some((id, tx)) = self.stack.pop() else {
            return Err(UndoError::NoHistory);
        };
        if let (Some(journal), Some(id)) = (&self.journal, id) {
            if let Err(e) = journal.remove(id).await {
                self.stack.push((Some(id), tx));
                return Err(e.into());
            }
        }
        Ok(reverse(&tx))
    }
}

fn reverse(tx: &Transaction) -> UndoReport {
    let mut report = UndoReport::default();
    for mv in tx.moves.iter().rev() {
        let result = if mv.source.exists() {
            Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "original location is occupied",
            ))
        } else {
            restore(&mv.destination, &mv.source)
        };
        match result {
            Ok(()) => {
                info!("Restored {:?} -> {:?}", mv.destination, mv.source);
                report.restored.push(mv.source.clone());
            }
            Err(e) => {
                warn!("Failed to restore {:?}: {e}", mv.destination);
                report.failures.push(UndoFailure {
                    source: mv.source.clone(),
                    destination: mv.destination.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    // Deepest first so nested folders empty out before their parents.
    let mut folders: Vec<&PathBuf> = tx.created_folders.iter().collect();
    folders.sort_by_key(|f| std::cmp::Reverse(f.components().count()));
    for folder in folders {
        if !folder.exists() {
            continue;
        }
        match fs::remove_dir(folder) {
            Ok(()) => {
                info!("Removed folder {:?}", folder);
                report.removed_folders.push(folder.clone());
            }
            Err(e) => {
                warn!("Keeping folder {:?}: {e}", folder);
                report.kept_folders.push(folder.clone());
            }
        }
    }
    report
}

fn restore(from: &std::path::Path, to: &std::path::Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(from, to)
}
