//! Classification result cache keyed by absolute path, one store per method.
//!
//! Each store is a flat JSON document `{path: {category, mtime}}`. An entry is
//! only served while its recorded mtime matches the file's current one; stale
//! entries stay on disk until they are overwritten or invalidated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Local,
    Remote,
}

impl Method {
    pub const ALL: [Method; 2] = [Method::Local, Method::Remote];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Local => "local",
            Method::Remote => "remote",
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            Method::Local => "cache_local.json",
            Method::Remote => "cache_api.json",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub category: String,
    pub mtime: i64,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store {path} is unreadable: {source}")]
    Unreadable { path: PathBuf, source: io::Error },
    #[error("cache store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write cache store {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to encode cache store: {0}")]
    Encode(#[from] serde_json::Error),
}

type Store = BTreeMap<String, CacheEntry>;

/// Modification time of `meta` in nanoseconds relative to the Unix epoch.
pub fn modified_nanos(meta: &fs::Metadata) -> io::Result<i64> {
    let modified = meta.modified()?;
    Ok(match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i64,
        Err(before) => -(before.duration().as_nanos() as i64),
    })
}

#[derive(Debug, Default)]
pub struct ResultCache {
    dir: Option<PathBuf>,
    local: Store,
    remote: Store,
    dirty: bool,
}

impl ResultCache {
    /// Cache that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads both stores from `dir`. Missing, unreadable or corrupt stores
    /// start out empty.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let mut cache = Self {
            dir: Some(dir.clone()),
            ..Self::default()
        };
        for method in Method::ALL {
            let path = dir.join(method.file_name());
            match load_store(&path) {
                Ok(store) => *cache.store_mut(method) = store,
                Err(e) => warn!("{e}; starting with an empty {method} cache"),
            }
        }
        cache
    }

    /// Cached category for `path`, provided the entry was written while the
    /// file had modification time `mtime`.
    pub fn get(&self, path: &Path, method: Method, mtime: i64) -> Option<&str> {
        let entry = self.store(method).get(&key(path))?;
        if entry.mtime == mtime {
            Some(entry.category.as_str())
        } else {
            debug!(path = %path.display(), %method, "stale cache entry");
            None
        }
    }

    /// Like [`ResultCache::get`], reading the current mtime from the filesystem.
    pub fn get_current(&self, path: &Path, method: Method) -> Option<&str> {
        let mtime = fs::metadata(path)
            .and_then(|meta| modified_nanos(&meta))
            .ok()?;
        self.get(path, method, mtime)
    }

    /// Upserts the entry for `path`, stamped with the file's mtime right now.
    pub fn put(&mut self, path: &Path, category: &str, method: Method) -> io::Result<()> {
        let mtime = modified_nanos(&fs::metadata(path)?)?;
        self.store_mut(method).insert(
            key(path),
            CacheEntry {
                category: category.to_string(),
                mtime,
            },
        );
        self.dirty = true;
        Ok(())
    }

    pub fn entry(&self, path: &Path, method: Method) -> Option<&CacheEntry> {
        self.store(method).get(&key(path))
    }

    /// Drops every entry located under `dir` from both stores and returns how
    /// many were removed.
    pub fn invalidate_prefix(&mut self, dir: &Path) -> usize {
        let mut removed = 0;
        for method in Method::ALL {
            let store = self.store_mut(method);
            let before = store.len();
            store.retain(|k, _| !Path::new(k).starts_with(dir));
            removed += before - store.len();
        }
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Drops every entry from both stores and returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.local.len() + self.remote.len();
        self.local.clear();
        self.remote.clear();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    pub fn len(&self, method: Method) -> usize {
        self.store(method).len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.remote.is_empty()
    }

    /// Writes both stores back if anything changed since the last flush.
    pub fn flush(&mut self) -> Result<(), CacheError> {
        let Some(dir) = self.dir.clone() else {
            self.dirty = false;
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        fs::create_dir_all(&dir).map_err(|source| CacheError::Write {
            path: dir.clone(),
            source,
        })?;
        for method in Method::ALL {
            let path = dir.join(method.file_name());
            let body = serde_json::to_vec(self.store(method))?;
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, body)
                .and_then(|_| fs::rename(&tmp, &path))
                .map_err(|source| CacheError::Write {
                    path: path.clone(),
                    source,
                })?;
        }
        self.dirty = false;
        Ok(())
    }

    fn store(&self, method: Method) -> &Store {
        match method {
            Method::Local => &self.local,
            Method::Remote => &self.remote,
        }
    }

    fn store_mut(&mut self, method: Method) -> &mut Store {
        match method {
            Method::Local => &mut self.local,
            Method::Remote => &mut self.remote,
        }
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn load_store(path: &Path) -> Result<Store, CacheError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Store::new()),
        Err(source) => {
            return Err(CacheError::Unreadable {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&raw).map_err(|source| CacheError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}
