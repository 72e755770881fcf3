//! Lists the regular files directly inside a directory, with their mtimes.

use crate::models::FileRecord;
use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub include_hidden: bool,
    pub exclude: Vec<String>,
}

/// Non-recursive listing sorted by file name. Entries that vanish, cannot
/// be stat'ed, or whose names are not valid UTF-8 are skipped.
pub fn scan_directory(dir: &Path, options: &ScanOptions) -> anyhow::Result<Vec<FileRecord>> {
    let excludes = build_globset(&options.exclude)?;
    // Surface an unreadable directory instead of an empty listing.
    std::fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))?;

    let mut records = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        // Lossy names would not map back to the file on disk.
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!("Skipping file with a non-UTF-8 name: {:?}", entry.path());
            continue;
        };
        if (!options.include_hidden && is_hidden(&name)) || excludes.is_match(&name) {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        let mtime = match storage::modified_nanos(&meta) {
            Ok(t) => t,
            Err(_) => continue,
        };
        records.push(FileRecord {
            path: entry.path().to_path_buf(),
            name,
            mtime,
        });
    }
    Ok(records)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid exclude pattern {pat:?}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}
