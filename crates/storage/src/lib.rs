//! Storage layer: the per-method classification cache and the SQLite
//! journal that keeps organize transactions across runs.
//!
//! Holds DB pool setup and migration runner.

pub mod cache;
pub mod journal;

pub use cache::{modified_nanos, CacheEntry, CacheError, Method, ResultCache};
pub use journal::{Journal, JournalEntry};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let mut url = database_url.to_string();
    if !database_url.starts_with("sqlite:") {
        let path = std::path::PathBuf::from(database_url);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let norm = path.to_string_lossy().replace('\\', "/");
        if path.is_absolute() {
            url = format!("sqlite:///{}", norm.trim_start_matches('/'));
        } else {
            url = format!("sqlite://{}", norm);
        }
    }
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    let mut pool = SqlitePoolOptions::new();
    if url.contains("memory") {
        // Every in-memory connection is its own database.
        pool = pool.max_connections(1).idle_timeout(None).max_lifetime(None);
    } else {
        pool = pool.max_connections(5);
    }
    Ok(pool.connect_with(options).await?)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Applies SQLx migrations located in crates/storage/migrations.
    // Safe to run multiple times (idempotent).
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
