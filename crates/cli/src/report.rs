//! Terminal rendering: the progress line on stderr and plain-text summaries
//! on stdout.

use crate::commands::{CategorizeOutcome, OrganizeOutcome};
use anyhow::Result;
use organizer_core::orchestrator::{PassHandle, PassOutcome};
use organizer_core::undo::UndoReport;
use organizer_core::{CandidateLabelSet, CategorizationOrchestrator, CategoryGrouping};
use std::io::Write;

/// Waits for a pass, redrawing `Processing i/n files...` as results arrive.
pub async fn wait_with_progress(
    orch: &CategorizationOrchestrator,
    handle: PassHandle,
    quiet: bool,
) -> Result<PassOutcome> {
    let mut rx = orch.progress();
    let printer = tokio::spawn(async move {
        if quiet {
            return;
        }
        while rx.changed().await.is_ok() {
            let p = *rx.borrow_and_update();
            if p.total > 0 {
                eprint!("\rProcessing {}/{} files...", p.processed, p.total);
                let _ = std::io::stderr().flush();
            }
        }
    });
    let outcome = handle.await?;
    printer.abort();
    if !quiet {
        eprintln!();
    }
    Ok(outcome?)
}

pub fn print_grouping(grouping: &CategoryGrouping) {
    if grouping.is_empty() {
        println!("(no files)");
        return;
    }
    let mut current = None;
    for bucket in grouping.buckets() {
        if current != Some(bucket.primary) {
            println!("{}", bucket.primary);
            current = Some(bucket.primary);
        }
        println!("  {} ({})", bucket.secondary, bucket.files.len());
        for file in bucket.files {
            println!("    {file}");
        }
    }
}

pub fn print_categorize(outcome: &CategorizeOutcome) {
    println!(
        "{}: {} files, {} cached, {} classified, {} fallbacks",
        outcome.directory.display(),
        outcome.summary.files,
        outcome.summary.cache_hits,
        outcome.summary.classified,
        outcome.summary.fallbacks
    );
    if outcome.remote_blocked {
        println!("remote classification rejected the API key; update remote.api_key and run again");
    }
    print_grouping(&outcome.grouping);
}

pub fn print_organize(outcome: &OrganizeOutcome) {
    match &outcome.report {
        None => {
            println!("dry run: {} planned moves (pass --yes to apply)", outcome.planned.len());
            for mv in &outcome.planned {
                match &mv.folder {
                    Some(folder) => println!("  {} -> {}", mv.file, folder.display()),
                    None => println!("  {} -> (no usable folder)", mv.file),
                }
            }
        }
        Some(report) => {
            println!(
                "moved {} of {} files in {}",
                report.moved(),
                outcome.planned.len(),
                outcome.directory.display()
            );
            if let Some(tx) = &report.transaction {
                for folder in &tx.created_folders {
                    println!("  created {}", folder.display());
                }
            }
            for failure in &report.failures {
                println!("  failed {}: {}", failure.source.display(), failure.error);
            }
        }
    }
}

pub fn print_undo(report: Option<&UndoReport>) {
    let Some(report) = report else {
        println!("No actions to undo.");
        return;
    };
    println!("restored {} files", report.restored.len());
    for failure in &report.failures {
        println!(
            "  failed {} -> {}: {}",
            failure.destination.display(),
            failure.source.display(),
            failure.error
        );
    }
    for folder in &report.removed_folders {
        println!("  removed {}", folder.display());
    }
    for folder in &report.kept_folders {
        println!("  kept {} (not empty)", folder.display());
    }
}

pub fn print_categories(labels: &CandidateLabelSet) {
    for label in labels.as_slice() {
        println!("{label}");
    }
}
