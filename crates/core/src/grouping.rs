//! Two-level grouping of file names: primary label, then secondary label.
//!
//! The container owns the partition invariant: a file name sits in at most one
//! `(primary, secondary)` bucket, and a bucket (or a primary with no buckets
//! left) disappears as soon as its last file is removed.

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

type Buckets = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryGrouping {
    buckets: Buckets,
    index: HashMap<String, (String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket<'a> {
    pub primary: &'a str,
    pub secondary: &'a str,
    pub files: &'a [String],
}

impl CategoryGrouping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `file` under `(primary, secondary)`, first taking it out of any
    /// bucket it already occupies.
    pub fn insert(&mut self, primary: &str, secondary: &str, file: &str) {
        let placed = self
            .index
            .get(file)
            .map(|(p, s)| p == primary && s == secondary);
        match placed {
            Some(true) => return,
            Some(false) => {
                self.remove(file);
            }
            None => {}
        }
        self.buckets
            .entry(primary.to_string())
            .or_default()
            .entry(secondary.to_string())
            .or_default()
            .push(file.to_string());
        self.index.insert(
            file.to_string(),
            (primary.to_string(), secondary.to_string()),
        );
    }

    /// Removes `file` and returns the bucket it was in.
    pub fn remove(&mut self, file: &str) -> Option<(String, String)> {
        let (primary, secondary) = self.index.remove(file)?;
        if let Some(secondaries) = self.buckets.get_mut(&primary) {
            if let Some(files) = secondaries.get_mut(&secondary) {
                files.retain(|f| f != file);
                if files.is_empty() {
                    secondaries.remove(&secondary);
                }
            }
            if secondaries.is_empty() {
                self.buckets.remove(&primary);
            }
        }
        Some((primary, secondary))
    }

    pub fn locate(&self, file: &str) -> Option<(&str, &str)> {
        self.index
            .get(file)
            .map(|(p, s)| (p.as_str(), s.as_str()))
    }

    pub fn contains(&self, file: &str) -> bool {
        self.index.contains_key(file)
    }

    pub fn get(&self, primary: &str, secondary: &str) -> Option<&[String]> {
        self.buckets
            .get(primary)?
            .get(secondary)
            .map(|files| files.as_slice())
    }

    pub fn contains_primary(&self, primary: &str) -> bool {
        self.buckets.contains_key(primary)
    }

    pub fn buckets(&self) -> impl Iterator<Item = Bucket<'_>> {
        self.buckets.iter().flat_map(|(primary, secondaries)| {
            secondaries.iter().map(move |(secondary, files)| Bucket {
                primary,
                secondary,
                files,
            })
        })
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.buckets().flat_map(|b| b.files.iter().map(String::as_str))
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.values().map(BTreeMap::len).sum()
    }
}

impl Serialize for CategoryGrouping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.buckets.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinserting_moves_instead_of_duplicating() {
        let mut g = CategoryGrouping::new();
        g.insert("Images", "API Disabled", "photo.jpg");
        g.insert("Documents", "Manual", "photo.jpg");

        assert_eq!(g.len(), 1);
        assert_eq!(g.locate("photo.jpg"), Some(("Documents", "Manual")));
        assert!(!g.contains_primary("Images"));
    }

    #[test]
    fn removing_last_file_prunes_both_levels() {
        let mut g = CategoryGrouping::new();
        g.insert("Documents", "Docs", "a.pdf");
        g.insert("Documents", "Other", "b.txt");
        g.insert("Images", "Pics", "c.png");

        assert_eq!(g.remove("c.png"), Some(("Images".into(), "Pics".into())));
        assert!(!g.contains_primary("Images"));

        g.remove("a.pdf");
        assert_eq!(g.get("Documents", "Docs"), None);
        assert_eq!(g.get("Documents", "Other"), Some(&["b.txt".to_string()][..]));
        assert_eq!(g.bucket_count(), 1);
        assert_eq!(g.remove("missing"), None);
    }

    #[test]
    fn bucket_order_is_insertion_order() {
        let mut g = CategoryGrouping::new();
        for f in ["z.pdf", "a.pdf", "m.pdf"] {
            g.insert("Documents", "API Disabled", f);
        }
        let files: Vec<&str> = g.files().collect();
        assert_eq!(files, ["z.pdf", "a.pdf", "m.pdf"]);
    }

    #[test]
    fn serializes_as_nested_map() {
        let mut g = CategoryGrouping::new();
        g.insert("Documents", "API Disabled", "report.pdf");
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Documents": {"API Disabled": ["report.pdf"]}})
        );
    }
}
