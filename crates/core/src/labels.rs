//! Category vocabulary and the sentinel labels that stand in for missing
//! classifications.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub use classifiers::FALLBACK_LABEL as OTHER;

pub const API_DISABLED: &str = "API Disabled";
pub const API_ERROR: &str = "API Error";
/// Secondary label of a file whose category was set by hand.
pub const MANUAL: &str = "Manual";

pub const DEFAULT_CATEGORIES: &[&str] = &["Documents", "Images", "Music", "Other"];

/// Secondary labels that never name a destination folder.
pub fn is_sentinel(label: &str) -> bool {
    label.is_empty() || label.contains(API_ERROR) || label == API_DISABLED || label == MANUAL
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("category name is empty")]
    Empty,
    #[error("category {0:?} already exists")]
    Duplicate(String),
    #[error("category {0:?} does not exist")]
    Missing(String),
}

/// Ordered, duplicate-free list of candidate categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateLabelSet {
    labels: Vec<String>,
}

impl Default for CandidateLabelSet {
    fn default() -> Self {
        Self::from_labels(DEFAULT_CATEGORIES.iter().copied())
    }
}

impl CandidateLabelSet {
    /// Builds a set, dropping blanks and repeated names.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self { labels: Vec::new() };
        for label in labels {
            let _ = set.add(label.as_ref());
        }
        set
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.labels.clone()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn add(&mut self, label: &str) -> Result<(), LabelError> {
        let label = normalize(label)?;
        if self.contains(&label) {
            return Err(LabelError::Duplicate(label));
        }
        self.labels.push(label);
        Ok(())
    }

    pub fn remove(&mut self, label: &str) -> Result<(), LabelError> {
        let idx = self.position(label)?;
        self.labels.remove(idx);
        Ok(())
    }

    /// Renames in place, keeping the label's position.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), LabelError> {
        let idx = self.position(old)?;
        let new = normalize(new)?;
        if self.contains(&new) {
            return Err(LabelError::Duplicate(new));
        }
        self.labels[idx] = new;
        Ok(())
    }

    /// Reads a JSON array of names; a missing file yields `None`.
    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(raw) => {
                let labels: Vec<String> = serde_json::from_str(&raw)?;
                Ok(Some(Self::from_labels(labels)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn position(&self, label: &str) -> Result<usize, LabelError> {
        self.labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| LabelError::Missing(label.to_string()))
    }
}

fn normalize(label: &str) -> Result<String, LabelError> {
    let label = label.trim();
    if label.is_empty() {
        Err(LabelError::Empty)
    } else {
        Ok(label.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_keep_the_set_duplicate_free() {
        let mut set = CandidateLabelSet::default();
        assert_eq!(set.as_slice(), ["Documents", "Images", "Music", "Other"]);

        set.add("Videos").unwrap();
        assert_eq!(set.add(" Videos "), Err(LabelError::Duplicate("Videos".into())));
        assert_eq!(set.add("   "), Err(LabelError::Empty));

        set.rename("Music", "Audio").unwrap();
        assert_eq!(set.as_slice()[2], "Audio");
        assert_eq!(
            set.rename("Audio", "Images"),
            Err(LabelError::Duplicate("Images".into()))
        );

        set.remove("Other").unwrap();
        assert_eq!(set.remove("Other"), Err(LabelError::Missing("Other".into())));
        assert_eq!(set.as_slice(), ["Documents", "Images", "Audio", "Videos"]);
    }

    #[test]
    fn from_labels_drops_repeats() {
        let set = CandidateLabelSet::from_labels(["A", "B", "A", ""]);
        assert_eq!(set.as_slice(), ["A", "B"]);
    }

    #[test]
    fn saved_set_loads_back() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("categories.json");
        assert!(CandidateLabelSet::load(&path).unwrap().is_none());

        let set = CandidateLabelSet::from_labels(["Invoices", "Receipts"]);
        set.save(&path).unwrap();
        assert_eq!(CandidateLabelSet::load(&path).unwrap(), Some(set));
    }

    #[test]
    fn sentinels_are_recognised() {
        assert!(is_sentinel(API_ERROR));
        assert!(is_sentinel(API_DISABLED));
        assert!(is_sentinel(MANUAL));
        assert!(is_sentinel(""));
        assert!(!is_sentinel("Documents"));
    }
}
