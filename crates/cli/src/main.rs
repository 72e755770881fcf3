use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::commands::{self, CategoriesCommand, Context};
use cli::report;
use organizer_core::config;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    let mut ctx = Context::new(cfg);

    match cli.command {
        Commands::Categorize {
            dir,
            search,
            reset,
            json,
        } => {
            ctx.quiet = json;
            let outcome = commands::categorize(&ctx, &dir, search.as_deref(), reset).await?;
            if json {
                print_json(&outcome)?;
            } else {
                report::print_categorize(&outcome);
            }
        }
        Commands::Reassign {
            dir,
            file,
            category,
            json,
        } => {
            ctx.quiet = json;
            let outcome = commands::reassign(&ctx, &dir, &file, &category).await?;
            if json {
                print_json(&outcome)?;
            } else {
                report::print_categorize(&outcome);
            }
        }
        Commands::Organize { dir, yes, json } => {
            ctx.quiet = json;
            let outcome = commands::organize(&ctx, &dir, yes).await?;
            if json {
                print_json(&outcome)?;
            } else {
                report::print_organize(&outcome);
            }
        }
        Commands::Undo { json } => {
            let outcome = commands::undo(&ctx).await?;
            if json {
                print_json(&serde_json::json!({
                    "status": if outcome.is_some() { "ok" } else { "no_history" },
                    "report": outcome,
                }))?;
            } else {
                report::print_undo(outcome.as_ref());
            }
        }
        Commands::Categories { command } => {
            let labels = commands::categories(&ctx, &command)?;
            report::print_categories(&labels);
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Parser)]
#[command(name = "folder-organizer")]
#[command(about = "Categorize the files in a folder and sort them into subfolders", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the files directly inside DIR and print the grouping
    Categorize {
        dir: PathBuf,
        /// Only show files whose name contains this text (case-insensitive)
        #[arg(long)]
        search: Option<String>,
        /// Forget cached results for DIR before classifying
        #[arg(long, default_value_t = false)]
        reset: bool,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Put FILE into CATEGORY by hand
    Reassign {
        dir: PathBuf,
        file: String,
        category: String,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Move files into one subfolder per category
    Organize {
        dir: PathBuf,
        /// Perform the moves; without it only the plan is printed
        #[arg(long, default_value_t = false)]
        yes: bool,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Reverse the most recent organize
    Undo {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the category list
    Categories {
        #[command(subcommand)]
        command: CategoriesCommand,
    },
}
