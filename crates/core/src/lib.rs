//! Core library: scanning, cached classification, grouping, organizing and undo.

pub mod classifier;
pub mod config;
pub mod error;
pub mod grouping;
pub mod labels;
pub mod models;
pub mod orchestrator;
pub mod organizer;
pub mod scanner;
pub mod search;
pub mod undo;

pub use grouping::CategoryGrouping;
pub use labels::CandidateLabelSet;
pub use orchestrator::{
    CategorizationOrchestrator, OrchestratorOptions, PassHandle, PassOutcome, PassSummary, Phase,
    Progress,
};
pub use organizer::{organize, plan, OrganizeReport};
pub use undo::{UndoManager, UndoReport};
pub use storage::{Method, ResultCache};
