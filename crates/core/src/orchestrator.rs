//! Background classification of a directory into a [`CategoryGrouping`].
//!
//! A pass scans the directory, classifies every file on a bounded worker pool
//! (local classifier first, then the remote one when active), and aggregates
//! results one at a time under the single state lock that also guards the
//! [`ResultCache`]. Each pass carries a generation number; starting a newer
//! pass makes older ones discard their results instead of publishing them.

use crate::error::OrchestratorError;
use crate::grouping::CategoryGrouping;
use crate::labels::{self, CandidateLabelSet};
use crate::models::FileRecord;
use crate::scanner::{self, ScanOptions};
use crate::search;
use classifiers::{Classifier, ProviderError};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use storage::{Method, ResultCache};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Scanning,
    Classifying,
    Ready,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub generation: u64,
    pub processed: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub generation: u64,
    pub files: usize,
    pub cache_hits: usize,
    pub classified: usize,
    pub fallbacks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(PassSummary),
    /// A newer pass started before this one finished; its results were dropped.
    Superseded { generation: u64 },
}

pub type PassHandle = JoinHandle<Result<PassOutcome, OrchestratorError>>;

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub workers: usize,
    pub scan: ScanOptions,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            scan: ScanOptions::default(),
        }
    }
}

enum Resolution {
    Cached(String),
    Classified(String),
    Fallback(&'static str),
    Disabled,
}

impl Resolution {
    fn into_label(self) -> String {
        match self {
            Resolution::Cached(label) | Resolution::Classified(label) => label,
            Resolution::Fallback(label) => label.to_string(),
            Resolution::Disabled => labels::API_DISABLED.to_string(),
        }
    }
}

struct State {
    cache: ResultCache,
    labels: CandidateLabelSet,
    remote: Option<Arc<dyn Classifier>>,
    directory: Option<PathBuf>,
    full: CategoryGrouping,
    view: CategoryGrouping,
    search_term: String,
    phase: Phase,
    /// Manual categories set since the current pass started, by file name.
    /// They win over whatever that pass computes for the same files.
    overrides: HashMap<String, String>,
}

struct Shared {
    state: Mutex<State>,
    generation: AtomicU64,
    remote_blocked: AtomicBool,
    local: Arc<dyn Classifier>,
    progress: watch::Sender<Progress>,
    options: OrchestratorOptions,
}

#[derive(Clone)]
pub struct CategorizationOrchestrator {
    shared: Arc<Shared>,
}

impl CategorizationOrchestrator {
    pub fn new(
        local: Arc<dyn Classifier>,
        remote: Option<Arc<dyn Classifier>>,
        cache: ResultCache,
        labels: CandidateLabelSet,
        options: OrchestratorOptions,
    ) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    cache,
                    labels,
                    remote,
                    directory: None,
                    full: CategoryGrouping::new(),
                    view: CategoryGrouping::new(),
                    search_term: String::new(),
                    phase: Phase::Idle,
                    overrides: HashMap::new(),
                }),
                generation: AtomicU64::new(0),
                remote_blocked: AtomicBool::new(false),
                local,
                progress,
                options,
            }),
        }
    }

    /// Selects `dir` and starts classifying it in the background.
    pub async fn browse(&self, dir: impl AsRef<Path>) -> Result<PassHandle, OrchestratorError> {
        let canonical = canonical_dir(dir.as_ref())?;
        Ok(self.start_pass(canonical, false).await)
    }

    /// Like [`Self::browse`], but first forgets every cached result under `dir`
    /// so each file is classified exactly once by the new pass.
    pub async fn browse_reset(&self, dir: impl AsRef<Path>) -> Result<PassHandle, OrchestratorError> {
        let canonical = canonical_dir(dir.as_ref())?;
        Ok(self.start_pass(canonical, true).await)
    }

    /// Classifies the current directory again, reusing cached results.
    pub async fn rescan(&self) -> Result<PassHandle, OrchestratorError> {
        let dir = self
            .current_directory()
            .await
            .ok_or(OrchestratorError::NoDirectory)?;
        Ok(self.start_pass(dir, false).await)
    }

    /// Forgets every cached result under the current directory and clears the
    /// grouping. Any pass in flight is superseded.
    pub async fn reset_directory(&self) -> Result<usize, OrchestratorError> {
        let mut guard = self.shared.state.lock().await;
        let st = &mut *guard;
        let dir = st.directory.clone().ok_or(OrchestratorError::NoDirectory)?;
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        st.full = CategoryGrouping::new();
        st.view = CategoryGrouping::new();
        st.phase = Phase::Idle;
        Ok(st.forget(&dir))
    }

    /// Installs a new candidate set and remote classifier. When either changed
    /// and a directory is selected, its cache is reset and a fresh pass starts.
    pub async fn apply_settings(
        &self,
        labels: CandidateLabelSet,
        remote: Option<Arc<dyn Classifier>>,
    ) -> Result<Option<PassHandle>, OrchestratorError> {
        let (changed, directory) = {
            let mut st = self.shared.state.lock().await;
            let remote_changed = match (&st.remote, &remote) {
                (Some(old), Some(new)) => !Arc::ptr_eq(old, new),
                (None, None) => false,
                _ => true,
            };
            let changed = remote_changed || st.labels != labels;
            st.labels = labels;
            st.remote = remote;
            (changed, st.directory.clone())
        };
        self.shared.remote_blocked.store(false, Ordering::SeqCst);
        match directory {
            Some(dir) if changed => Ok(Some(self.start_pass(dir, true).await)),
            _ => Ok(None),
        }
    }

    /// Replaces the remote classifier, e.g. after the credential was refreshed,
    /// and lifts any block caused by an authentication failure.
    pub async fn set_remote(&self, remote: Option<Arc<dyn Classifier>>) {
        self.shared.state.lock().await.remote = remote;
        self.shared.remote_blocked.store(false, Ordering::SeqCst);
    }

    /// Moves `file` to `(category, Manual)` and pins its local classification.
    pub async fn reassign(&self, file: &str, category: &str) -> Result<(), OrchestratorError> {
        let mut guard = self.shared.state.lock().await;
        let st = &mut *guard;
        if !st.labels.contains(category) {
            return Err(OrchestratorError::UnknownCategory(category.to_string()));
        }
        let dir = st.directory.clone().ok_or(OrchestratorError::NoDirectory)?;
        let Some((previous, _)) = st.full.remove(file) else {
            return Err(OrchestratorError::FileNotFound(file.to_string()));
        };
        st.full.insert(category, labels::MANUAL, file);
        st.overrides.insert(file.to_string(), category.to_string());
        if let Err(e) = st.cache.put(&dir.join(file), category, Method::Local) {
            warn!("Failed to cache manual category for {file}: {e}");
        }
        if let Err(e) = st.cache.flush() {
            warn!("Failed to persist classification cache: {e}");
        }
        st.view = search::filter(&st.full, &st.search_term);
        info!("Reassigned {file} from {previous} to {category}");
        Ok(())
    }

    /// Sets the search term and re-derives the displayed view.
    pub async fn set_search(&self, term: &str) {
        let mut guard = self.shared.state.lock().await;
        let st = &mut *guard;
        st.search_term = term.to_string();
        st.view = search::filter(&st.full, &st.search_term);
    }

    /// The grouping as currently displayed (search applied).
    pub async fn view(&self) -> CategoryGrouping {
        self.shared.state.lock().await.view.clone()
    }

    /// The canonical grouping of the last completed pass, unfiltered.
    pub async fn full_grouping(&self) -> CategoryGrouping {
        self.shared.state.lock().await.full.clone()
    }

    pub async fn phase(&self) -> Phase {
        self.shared.state.lock().await.phase
    }

    pub async fn labels(&self) -> CandidateLabelSet {
        self.shared.state.lock().await.labels.clone()
    }

    pub async fn current_directory(&self) -> Option<PathBuf> {
        self.shared.state.lock().await.directory.clone()
    }

    /// Whether a remote classifier is configured; organize then prefers its labels.
    pub async fn remote_active(&self) -> bool {
        self.shared.state.lock().await.remote.is_some()
    }

    /// True after an authentication failure, until [`Self::set_remote`].
    pub fn remote_blocked(&self) -> bool {
        self.shared.remote_blocked.load(Ordering::SeqCst)
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.shared.progress.subscribe()
    }

    async fn start_pass(&self, directory: PathBuf, reset: bool) -> PassHandle {
        let generation = {
            let mut guard = self.shared.state.lock().await;
            let st = &mut *guard;
            let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
            if reset || st.directory.as_deref() != Some(directory.as_path()) {
                st.full = CategoryGrouping::new();
                st.view = CategoryGrouping::new();
            }
            if reset {
                st.forget(&directory);
            }
            st.overrides.clear();
            st.directory = Some(directory.clone());
            st.phase = Phase::Scanning;
            generation
        };
        self.shared.progress.send_replace(Progress {
            generation,
            processed: 0,
            total: 0,
        });
        info!(generation, directory = %directory.display(), "Starting classification pass");
        tokio::spawn(Arc::clone(&self.shared).run_pass(generation, directory))
    }
}

fn canonical_dir(dir: &Path) -> Result<PathBuf, OrchestratorError> {
    let canonical = dir
        .canonicalize()
        .map_err(|_| OrchestratorError::InvalidDirectory(dir.to_path_buf()))?;
    if !canonical.is_dir() {
        return Err(OrchestratorError::InvalidDirectory(dir.to_path_buf()));
    }
    Ok(canonical)
}

impl State {
    /// Drops cached results and manual overrides under `dir`.
    fn forget(&mut self, dir: &Path) -> usize {
        self.overrides.clear();
        let removed = self.cache.invalidate_prefix(dir);
        if let Err(e) = self.cache.flush() {
            warn!("Failed to persist classification cache: {e}");
        }
        info!(removed, directory = %dir.display(), "Cleared cached classifications");
        removed
    }
}

impl Shared {
    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn publish(&self, generation: u64, processed: usize, total: usize) {
        if !self.is_stale(generation) {
            self.progress.send_replace(Progress {
                generation,
                processed,
                total,
            });
        }
    }

    async fn set_phase(&self, generation: u64, phase: Phase) {
        let mut st = self.state.lock().await;
        if !self.is_stale(generation) {
            st.phase = phase;
        }
    }

    async fn run_pass(
        self: Arc<Self>,
        generation: u64,
        directory: PathBuf,
    ) -> Result<PassOutcome, OrchestratorError> {
        let superseded = Ok(PassOutcome::Superseded { generation });

        let scan_dir = directory.clone();
        let scan_options = self.options.scan.clone();
        let scanned =
            tokio::task::spawn_blocking(move || scanner::scan_directory(&scan_dir, &scan_options))
                .await
                .map_err(|e| OrchestratorError::Scan(e.into()))?;
        let files = match scanned {
            Ok(files) => Arc::new(files),
            Err(e) => {
                self.set_phase(generation, Phase::Idle).await;
                return Err(e.into());
            }
        };
        if self.is_stale(generation) {
            return superseded;
        }

        let (labels, remote) = {
            let st = self.state.lock().await;
            (Arc::new(st.labels.to_vec()), st.remote.clone())
        };
        self.set_phase(generation, Phase::Classifying).await;
        let total = files.len();
        self.publish(generation, 0, total);

        let semaphore = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let mut tasks = JoinSet::new();
        for index in 0..total {
            let shared = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            let files = Arc::clone(&files);
            let labels = Arc::clone(&labels);
            let remote = remote.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                if shared.is_stale(generation) {
                    return None;
                }
                let record = &files[index];
                let local = Arc::clone(&shared.local);
                let local = shared
                    .resolve(record, Method::Local, local.as_ref(), &labels)
                    .await;
                let remote = match &remote {
                    Some(remote) => {
                        shared
                            .resolve(record, Method::Remote, remote.as_ref(), &labels)
                            .await
                    }
                    None => Resolution::Disabled,
                };
                Some((index, local, remote))
            });
        }

        let mut summary = PassSummary {
            generation,
            files: total,
            ..PassSummary::default()
        };
        let mut results: Vec<Option<(String, String)>> = vec![None; total];
        let mut processed = 0;
        while let Some(joined) = tasks.join_next().await {
            let (index, local, remote) = match joined {
                Ok(Some(done)) => done,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Classification task failed: {e}");
                    continue;
                }
            };
            {
                let mut st = self.state.lock().await;
                if self.is_stale(generation) {
                    drop(st);
                    tasks.abort_all();
                    debug!(generation, "Discarding superseded classification pass");
                    return superseded;
                }
                let record = &files[index];
                let pinned = st.overrides.contains_key(&record.name);
                for (method, resolution) in [(Method::Local, &local), (Method::Remote, &remote)] {
                    if method == Method::Local && pinned {
                        continue;
                    }
                    if let Resolution::Classified(label) = resolution {
                        if let Err(e) = st.cache.put(&record.path, label, method) {
                            warn!("Failed to cache {method} result for {}: {e}", record.name);
                        }
                    }
                }
            }
            for resolution in [&local, &remote] {
                match resolution {
                    Resolution::Cached(_) => summary.cache_hits += 1,
                    Resolution::Classified(_) => summary.classified += 1,
                    Resolution::Fallback(_) => summary.fallbacks += 1,
                    Resolution::Disabled => {}
                }
            }
            results[index] = Some((local.into_label(), remote.into_label()));
            processed += 1;
            self.publish(generation, processed, total);
        }

        let mut grouping = CategoryGrouping::new();
        for (record, result) in files.iter().zip(results) {
            let (primary, secondary) = result.unwrap_or_else(|| {
                let secondary = if remote.is_some() {
                    labels::API_ERROR
                } else {
                    labels::API_DISABLED
                };
                (labels::OTHER.to_string(), secondary.to_string())
            });
            grouping.insert(&primary, &secondary, &record.name);
        }

        let mut guard = self.state.lock().await;
        let st = &mut *guard;
        if self.is_stale(generation) {
            debug!(generation, "Discarding superseded classification pass");
            return superseded;
        }
        for (file, category) in &st.overrides {
            if grouping.contains(file) {
                grouping.insert(category, labels::MANUAL, file);
            }
        }
        st.view = search::filter(&grouping, &st.search_term);
        st.full = grouping;
        st.phase = Phase::Ready;
        if let Err(e) = st.cache.flush() {
            warn!("Failed to persist classification cache: {e}");
        }
        drop(guard);
        self.publish(generation, total, total);
        info!(
            generation,
            files = summary.files,
            cache_hits = summary.cache_hits,
            classified = summary.classified,
            fallbacks = summary.fallbacks,
            "Classification pass complete"
        );
        Ok(PassOutcome::Completed(summary))
    }

    /// Cached label for `record`, or a fresh classification. Failures degrade
    /// to a sentinel and are never cached.
    async fn resolve(
        &self,
        record: &FileRecord,
        method: Method,
        classifier: &dyn Classifier,
        labels: &[String],
    ) -> Resolution {
        let hit = {
            let st = self.state.lock().await;
            st.cache
                .get(&record.path, method, record.mtime)
                .map(str::to_string)
        };
        if let Some(label) = hit {
            debug!(file = %record.name, %method, "cache hit");
            return Resolution::Cached(label);
        }

        let fallback = match method {
            Method::Local => labels::OTHER,
            Method::Remote => labels::API_ERROR,
        };
        if method == Method::Remote && self.remote_blocked.load(Ordering::SeqCst) {
            return Resolution::Fallback(fallback);
        }

        match classifier
            .classify(std::slice::from_ref(&record.name), labels)
            .await
        {
            Ok(mut out) if out.len() == 1 && !out[0].trim().is_empty() => {
                Resolution::Classified(out.remove(0))
            }
            Ok(out) => {
                warn!(
                    "{} returned {} labels for {}; using {fallback}",
                    classifier.name(),
                    out.len(),
                    record.name
                );
                Resolution::Fallback(fallback)
            }
            Err(ProviderError::Unavailable) => {
                debug!(file = %record.name, "no local model loaded; using {fallback}");
                Resolution::Fallback(fallback)
            }
            Err(e) => {
                if e.is_auth() && !self.remote_blocked.swap(true, Ordering::SeqCst) {
                    warn!("{} authentication failed; remote classification paused until the credential is refreshed: {e}", classifier.name());
                } else {
                    warn!("{} failed for {}: {e}", classifier.name(), record.name);
                }
                Resolution::Fallback(fallback)
            }
        }
    }
}
