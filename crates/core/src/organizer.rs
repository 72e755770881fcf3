//! Moves classified files into per-category subfolders and records the moves
//! as a reversible [`Transaction`].

use crate::error::OrganizeError;
use crate::grouping::CategoryGrouping;
use crate::labels;
use crate::models::{MoveRecord, Transaction};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    pub file: String,
    pub source: PathBuf,
    /// `None` when neither label of the file's bucket names a usable folder.
    pub folder: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveFailure {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct OrganizeReport {
    /// Present when at least one file moved; the caller pushes it for undo.
    pub transaction: Option<Transaction>,
    pub failures: Vec<MoveFailure>,
}

impl OrganizeReport {
    pub fn moved(&self) -> usize {
        self.transaction.as_ref().map_or(0, |tx| tx.moves.len())
    }
}

/// Folder label for a bucket: the remote label when remote classification is
/// active and produced a real category, otherwise the local one.
pub fn destination_label<'a>(primary: &'a str, secondary: &'a str, remote_active: bool) -> Option<&'a str> {
    if remote_active && !labels::is_sentinel(secondary) && is_plain_component(secondary) {
        return Some(secondary);
    }
    is_plain_component(primary).then_some(primary)
}

fn is_plain_component(label: &str) -> bool {
    let mut components = Path::new(label).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == label
    )
}

/// The moves `organize` would attempt, in grouping order. Touches nothing.
pub fn plan(grouping: &CategoryGrouping, base: &Path, remote_active: bool) -> Vec<PlannedMove> {
    grouping
        .buckets()
        .flat_map(|bucket| {
            let folder = destination_label(bucket.primary, bucket.secondary, remote_active)
                .map(|label| base.join(label));
            bucket.files.iter().map(move |file| PlannedMove {
                file: file.clone(),
                source: base.join(file),
                folder: folder.clone(),
            })
        })
        .collect()
}

pub fn organize(
    grouping: &CategoryGrouping,
    base: &Path,
    remote_active: bool,
) -> Result<OrganizeReport, OrganizeError> {
    check_preconditions(base)?;

    let mut moves = Vec::new();
    let mut created_folders = BTreeSet::new();
    let mut failures = Vec::new();

    for planned in plan(grouping, base, remote_active) {
        let Some(folder) = planned.folder else {
            warn!("No usable folder name for {}; leaving it in place", planned.file);
            failures.push(MoveFailure {
                source: planned.source,
                destination: None,
                error: "no usable category folder name".into(),
            });
            continue;
        };
        if !folder.is_dir() {
            match fs::create_dir(&folder) {
                Ok(()) => {
                    created_folders.insert(folder.clone());
                }
                Err(e) if folder.is_dir() => {
                    tracing::debug!("{:?} appeared concurrently: {e}", folder);
                }
                Err(e) => {
                    warn!("Failed to create folder {:?}: {e}", folder);
                    failures.push(MoveFailure {
                        source: planned.source,
                        destination: Some(folder),
                        error: e.to_string(),
                    });
                    continue;
                }
            }
        }

        let mut destination = folder.join(&planned.file);
        if destination.exists() {
            destination = resolve_conflict(&destination);
        }
        match fs::rename(&planned.source, &destination) {
            Ok(()) => {
                info!("Moved {:?} -> {:?}", planned.source, destination);
                moves.push(MoveRecord {
                    source: planned.source,
                    destination,
                });
            }
            Err(e) => {
                warn!("Failed to move {:?}: {e}", planned.source);
                failures.push(MoveFailure {
                    source: planned.source,
                    destination: Some(destination),
                    error: e.to_string(),
                });
            }
        }
    }

    if moves.is_empty() {
        for folder in created_folders.iter().rev() {
            if let Err(e) = fs::remove_dir(folder) {
                warn!("Failed to remove unused folder {:?}: {e}", folder);
            }
        }
        return Ok(OrganizeReport {
            transaction: None,
            failures,
        });
    }

    info!(
        moved = moves.len(),
        failed = failures.len(),
        folders = created_folders.len(),
        "Organize complete"
    );
    Ok(OrganizeReport {
        transaction: Some(Transaction::new(moves, created_folders)),
        failures,
    })
}

fn check_preconditions(base: &Path) -> Result<(), OrganizeError> {
    if !base.exists() {
        return Err(OrganizeError::Missing(base.to_path_buf()));
    }
    if !base.is_dir() {
        return Err(OrganizeError::NotADirectory(base.to_path_buf()));
    }
    tempfile::tempfile_in(base).map_err(|source| OrganizeError::NotWritable {
        path: base.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// First free `stem_N.ext` sibling of `dest`.
fn resolve_conflict(dest: &Path) -> PathBuf {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let ext = dest.extension().map(|e| e.to_string_lossy().into_owned());
    let mut counter = 1;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem}_{counter}.{ext}"),
            None => format!("{stem}_{counter}"),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_label_wins_only_when_genuine() {
        assert_eq!(destination_label("Documents", "Invoices", true), Some("Invoices"));
        assert_eq!(destination_label("Documents", "Invoices", false), Some("Documents"));
        assert_eq!(destination_label("Documents", "API Error", true), Some("Documents"));
        assert_eq!(destination_label("Documents", "API Disabled", true), Some("Documents"));
        assert_eq!(destination_label("Documents", "Manual", true), Some("Documents"));
    }

    #[test]
    fn unusable_labels_fall_back_or_fail() {
        assert_eq!(destination_label("Documents", "../etc", true), Some("Documents"));
        assert_eq!(destination_label("Documents", "a/b", true), Some("Documents"));
        assert_eq!(destination_label("..", "API Disabled", false), None);
        assert_eq!(destination_label(".", "API Disabled", false), None);
        assert_eq!(destination_label("", "API Disabled", false), None);
    }

    #[test]
    fn conflicting_destination_gets_suffix() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("report.pdf"), "a").unwrap();
        fs::write(temp.path().join("report_1.pdf"), "b").unwrap();
        assert_eq!(
            resolve_conflict(&temp.path().join("report.pdf")),
            temp.path().join("report_2.pdf")
        );
        fs::write(temp.path().join("README"), "c").unwrap();
        assert_eq!(
            resolve_conflict(&temp.path().join("README")),
            temp.path().join("README_1")
        );
    }

    #[test]
    fn plan_does_not_touch_disk() {
        let temp = tempfile::tempdir().unwrap();
        let mut g = CategoryGrouping::new();
        g.insert("Documents", "API Disabled", "report.pdf");
        let planned = plan(&g, temp.path(), false);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].folder.as_deref(), Some(temp.path().join("Documents").as_path()));
        assert!(!temp.path().join("Documents").exists());
    }

    #[test]
    fn missing_base_fails_before_mutation() {
        let temp = tempfile::tempdir().unwrap();
        let g = CategoryGrouping::new();
        let err = organize(&g, &temp.path().join("gone"), false).unwrap_err();
        assert!(matches!(err, OrganizeError::Missing(_)));

        let file = temp.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            organize(&g, &file, false).unwrap_err(),
            OrganizeError::NotADirectory(_)
        ));
    }
}
