use crate::report;
use anyhow::{bail, Result};
use clap::Subcommand;
use organizer_core::classifier;
use organizer_core::config::AppConfig;
use organizer_core::organizer::{self, OrganizeReport, PlannedMove};
use organizer_core::orchestrator::{OrchestratorOptions, PassHandle, PassOutcome, PassSummary};
use organizer_core::scanner::ScanOptions;
use organizer_core::undo::{UndoManager, UndoReport};
use organizer_core::{error::UndoError, CandidateLabelSet, CategorizationOrchestrator, CategoryGrouping};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use storage::{Journal, ResultCache};
use tracing::{info, warn};

/// Everything a command needs from the loaded configuration.
pub struct Context {
    pub cfg: AppConfig,
    /// Suppresses the stderr progress line.
    pub quiet: bool,
}

impl Context {
    pub fn new(cfg: AppConfig) -> Self {
        Self { cfg, quiet: false }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cfg.cache.resolved_dir()
    }

    pub fn categories_path(&self) -> PathBuf {
        self.cache_dir().join("categories.json")
    }

    /// Saved category list, falling back to the configured one.
    pub fn labels(&self) -> Result<CandidateLabelSet> {
        Ok(CandidateLabelSet::load(&self.categories_path())?
            .unwrap_or_else(|| CandidateLabelSet::from_labels(&self.cfg.categories)))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.cache_dir().join("settings.json")
    }

    pub fn orchestrator(&self) -> Result<CategorizationOrchestrator> {
        let (local, remote) = classifier::build_pair(&self.cfg);
        let labels = self.labels()?;
        let cache = self.open_cache(SettingsFingerprint::new(&self.cfg, &labels, remote.is_some()))?;
        Ok(CategorizationOrchestrator::new(
            local,
            remote,
            cache,
            labels,
            OrchestratorOptions {
                workers: self.cfg.worker_count(),
                scan: ScanOptions {
                    include_hidden: self.cfg.scan.include_hidden,
                    exclude: self.cfg.scan.exclude.clone(),
                },
            },
        ))
    }

    /// Opens the result cache, emptying it first when the settings it was
    /// filled under differ from `current`.
    fn open_cache(&self, current: SettingsFingerprint) -> Result<ResultCache> {
        let path = self.settings_path();
        let saved = fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str::<SettingsFingerprint>(&raw).ok());
        let mut cache = ResultCache::open(self.cache_dir());
        if saved.as_ref() == Some(&current) {
            return Ok(cache);
        }
        let removed = cache.clear();
        if removed > 0 {
            info!(removed, "Classification settings changed; dropped cached results");
        }
        cache.flush()?;
        fs::create_dir_all(self.cache_dir())?;
        fs::write(&path, serde_json::to_vec_pretty(&current)?)?;
        Ok(cache)
    }

    pub async fn undo_manager(&self) -> Result<UndoManager> {
        let journal = Journal::open(&self.cfg.history.resolved_database()).await?;
        Ok(UndoManager::with_journal(journal).await?)
    }
}

/// The settings a cached classification depends on.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct SettingsFingerprint {
    categories: Vec<String>,
    local_model: String,
    /// `(base_url, model)` when a remote classifier is in use.
    remote: Option<(String, String)>,
}

impl SettingsFingerprint {
    fn new(cfg: &AppConfig, labels: &CandidateLabelSet, remote_active: bool) -> Self {
        Self {
            categories: labels.to_vec(),
            local_model: cfg.local.model.clone(),
            remote: remote_active.then(|| (cfg.remote.base_url.clone(), cfg.remote.model.clone())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategorizeOutcome {
    pub directory: PathBuf,
    pub summary: PassSummary,
    /// True when the remote credential was rejected during the pass.
    pub remote_blocked: bool,
    pub grouping: CategoryGrouping,
}

#[derive(Debug, Serialize)]
pub struct OrganizeOutcome {
    pub directory: PathBuf,
    pub applied: bool,
    pub planned: Vec<PlannedMove>,
    pub report: Option<OrganizeReport>,
    /// The directory after the post-organize rescan.
    pub remaining: CategoryGrouping,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CategoriesCommand {
    /// Print the current categories
    List,
    /// Add a category
    Add { name: String },
    /// Remove a category
    Remove { name: String },
    /// Rename a category
    Rename { old: String, new: String },
}

async fn finish(ctx: &Context, orch: &CategorizationOrchestrator, handle: PassHandle) -> Result<PassSummary> {
    let outcome = report::wait_with_progress(orch, handle, ctx.quiet).await?;
    match outcome {
        PassOutcome::Completed(summary) => Ok(summary),
        PassOutcome::Superseded { generation } => bail!("classification pass {generation} was superseded"),
    }
}

async fn browse(ctx: &Context, orch: &CategorizationOrchestrator, dir: &Path) -> Result<PassSummary> {
    let handle = orch.browse(dir).await?;
    finish(ctx, orch, handle).await
}

pub async fn categorize(
    ctx: &Context,
    dir: &Path,
    search: Option<&str>,
    reset: bool,
) -> Result<CategorizeOutcome> {
    let orch = ctx.orchestrator()?;
    if let Some(term) = search {
        orch.set_search(term).await;
    }
    let handle = if reset {
        orch.browse_reset(dir).await?
    } else {
        orch.browse(dir).await?
    };
    let summary = finish(ctx, &orch, handle).await?;
    Ok(CategorizeOutcome {
        directory: orch.current_directory().await.unwrap_or_else(|| dir.to_path_buf()),
        summary,
        remote_blocked: orch.remote_blocked(),
        grouping: orch.view().await,
    })
}

pub async fn reassign(ctx: &Context, dir: &Path, file: &str, category: &str) -> Result<CategorizeOutcome> {
    let orch = ctx.orchestrator()?;
    let summary = browse(ctx, &orch, dir).await?;
    orch.reassign(file, category).await?;
    Ok(CategorizeOutcome {
        directory: orch.current_directory().await.unwrap_or_else(|| dir.to_path_buf()),
        summary,
        remote_blocked: orch.remote_blocked(),
        grouping: orch.view().await,
    })
}

/// Without `apply` only the plan is returned and nothing moves.
pub async fn organize(ctx: &Context, dir: &Path, apply: bool) -> Result<OrganizeOutcome> {
    let orch = ctx.orchestrator()?;
    browse(ctx, &orch, dir).await?;
    let base = orch
        .current_directory()
        .await
        .unwrap_or_else(|| dir.to_path_buf());
    let grouping = orch.full_grouping().await;
    let remote_active = orch.remote_active().await;
    let planned = organizer::plan(&grouping, &base, remote_active);
    if !apply {
        return Ok(OrganizeOutcome {
            directory: base,
            applied: false,
            planned,
            report: None,
            remaining: grouping,
        });
    }

    let report = organizer::organize(&grouping, &base, remote_active)?;
    if let Some(tx) = report.transaction.clone() {
        let mut undo = ctx.undo_manager().await?;
        if let Err(e) = undo.push(tx).await {
            warn!("Organized files but could not record undo history: {e}");
        }
    }
    for failure in &report.failures {
        warn!("Not moved: {:?} ({})", failure.source, failure.error);
    }
    finish(ctx, &orch, orch.rescan().await?).await?;
    Ok(OrganizeOutcome {
        directory: base,
        applied: true,
        planned,
        report: Some(report),
        remaining: orch.view().await,
    })
}

/// `None` when there is nothing to undo.
pub async fn undo(ctx: &Context) -> Result<Option<UndoReport>> {
    let mut manager = ctx.undo_manager().await?;
    match manager.undo().await {
        Ok(report) => Ok(Some(report)),
        Err(UndoError::NoHistory) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn categories(ctx: &Context, command: &CategoriesCommand) -> Result<CandidateLabelSet> {
    let mut labels = ctx.labels()?;
    match command {
        CategoriesCommand::List => return Ok(labels),
        CategoriesCommand::Add { name } => labels.add(name)?,
        CategoriesCommand::Remove { name } => labels.remove(name)?,
        CategoriesCommand::Rename { old, new } => labels.rename(old, new)?,
    }
    labels.save(&ctx.categories_path())?;
    info!("Saved {} categories", labels.len());
    Ok(labels)
}
