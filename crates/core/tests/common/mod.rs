#![allow(dead_code)]

use async_trait::async_trait;
use classifiers::{Classifier, ProviderError};
use organizer_core::orchestrator::{OrchestratorOptions, PassHandle, PassOutcome, PassSummary};
use organizer_core::{CandidateLabelSet, CategorizationOrchestrator, ResultCache};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Answers from a fixed file-name table, counting every call.
pub struct Scripted {
    name: &'static str,
    answers: HashMap<String, String>,
    default: String,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl Scripted {
    pub fn new(name: &'static str, answers: &[(&str, &str)]) -> Self {
        Self {
            name,
            answers: answers
                .iter()
                .map(|(f, l)| (f.to_string(), l.to_string()))
                .collect(),
            default: "Other".into(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    async fn classify(
        &self,
        file_names: &[String],
        _labels: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(file_names
            .iter()
            .map(|f| self.answers.get(f).cloned().unwrap_or_else(|| self.default.clone()))
            .collect())
    }
}

/// Always fails with the error produced by `make`.
pub struct Failing {
    make: fn() -> ProviderError,
    calls: AtomicUsize,
}

impl Failing {
    pub fn auth() -> Self {
        Self {
            make: || ProviderError::Authentication("invalid api key".into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn network() -> Self {
        Self {
            make: || ProviderError::RequestFailed("connection reset".into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    async fn classify(&self, _: &[String], _: &[String]) -> Result<Vec<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err((self.make)())
    }
}

/// Labels every file with the last candidate, after `delay`.
pub struct LastLabel {
    delay: Duration,
    calls: AtomicUsize,
}

impl LastLabel {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for LastLabel {
    fn name(&self) -> &str {
        "last-label"
    }

    async fn classify(
        &self,
        file_names: &[String],
        labels: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let label = labels.last().cloned().unwrap_or_else(|| "Other".into());
        Ok(vec![label; file_names.len()])
    }
}

/// Returns no labels at all.
pub struct Mute;

#[async_trait]
impl Classifier for Mute {
    fn name(&self) -> &str {
        "mute"
    }

    async fn classify(&self, _: &[String], _: &[String]) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }
}

pub fn labels(names: &[&str]) -> CandidateLabelSet {
    CandidateLabelSet::from_labels(names.iter().copied())
}

pub fn orchestrator(
    local: Arc<dyn Classifier>,
    remote: Option<Arc<dyn Classifier>>,
    cache: ResultCache,
    names: &[&str],
) -> CategorizationOrchestrator {
    CategorizationOrchestrator::new(
        local,
        remote,
        cache,
        labels(names),
        OrchestratorOptions {
            workers: 4,
            ..OrchestratorOptions::default()
        },
    )
}

pub fn write_files(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), name.as_bytes()).unwrap();
    }
}

/// Pushes the file's mtime forward so cached results for it go stale.
pub fn touch(path: &Path) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
}

pub async fn completed(handle: PassHandle) -> PassSummary {
    match handle.await.unwrap().unwrap() {
        PassOutcome::Completed(summary) => summary,
        other => panic!("pass did not complete: {other:?}"),
    }
}
