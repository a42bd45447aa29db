//! `ucc` — command-line interface to the Universal Clause Comparer.
//! Grounded on `dsl_cli`'s `clap` derive + `colored` conventions.
//!
//! ```text
//! ucc compare policy_a.pdf policy_b.pdf
//! ucc serve
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;

use ucc_core::config::UccConfig;
use ucc_core::ports::{JobStore, SegmentStore};
use ucc_core::types::{ComparisonResult, MatchStatus};
use ucc_embed::select_embedder;
use ucc_orchestrator::{Orchestrator, ProgressBus};
use ucc_store::InMemoryStore;

#[derive(Parser)]
#[command(name = "ucc")]
#[command(author = "Universal Clause Comparer")]
#[command(version)]
#[command(about = "Compare two insurance policy PDFs at the clause level")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a one-shot comparison against the in-memory pipeline and print
    /// the result.
    Compare {
        /// First policy document (document A)
        a: PathBuf,
        /// Second policy document (document B)
        b: PathBuf,
        /// Print the full ComparisonResult as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Boot the HTTP + WebSocket server (`spec.md` §6).
    Serve {
        /// Listen address, overrides UCC_BIND_ADDR
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,ucc_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compare { a, b, json } => run_compare(a, b, json).await,
        Commands::Serve { bind } => run_serve(bind).await,
    }
}

async fn run_compare(a: PathBuf, b: PathBuf, as_json: bool) -> ExitCode {
    let bytes_a = match std::fs::read(&a) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{} reading {}: {e}", "error:".red().bold(), a.display());
            return ExitCode::FAILURE;
        }
    };
    let bytes_b = match std::fs::read(&b) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{} reading {}: {e}", "error:".red().bold(), b.display());
            return ExitCode::FAILURE;
        }
    };

    let config = UccConfig::from_env();
    let embedder = select_embedder(&config);
    let store = Arc::new(InMemoryStore::new());
    let job_store: Arc<dyn JobStore> = store.clone();
    let segment_store: Arc<dyn SegmentStore> = store;
    let orchestrator = Orchestrator::new(
        job_store,
        segment_store,
        embedder,
        Arc::new(ProgressBus::new()),
        config,
    );

    let file_name_a = a.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let file_name_b = b.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

    match orchestrator
        .submit_and_run(file_name_a, bytes_a, file_name_b, bytes_b)
        .await
    {
        Ok(result) => {
            if as_json {
                println!("{}", serde_json::to_string_pretty(&result).unwrap());
            } else {
                print_summary(&result);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {e}", "comparison failed:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn print_summary(result: &ComparisonResult) {
    let c = &result.summary.counts;
    println!(
        "{} {} added, {} removed, {} modified, {} unchanged",
        "summary:".bold(),
        c.added.to_string().green(),
        c.removed.to_string().red(),
        c.modified.to_string().yellow(),
        c.unchanged
    );
    for bullet in &result.summary.bullets {
        println!("  - {bullet}");
    }
    if !result.warnings.is_empty() {
        println!("{}", "warnings:".yellow().bold());
        for w in &result.warnings {
            println!("  - {w}");
        }
    }
    let review: Vec<_> = result
        .matches
        .iter()
        .filter(|m| m.review_required)
        .collect();
    if !review.is_empty() {
        println!(
            "{} {} clause pair(s) flagged for human review",
            "note:".cyan().bold(),
            review.len()
        );
    }
    let materiality_sum: f64 = result
        .matches
        .iter()
        .filter(|m| m.status != MatchStatus::Unchanged)
        .map(|m| m.materiality_score)
        .sum();
    println!(
        "total materiality across changed clauses: {materiality_sum:.2} ({}ms)",
        result.timings_ms.total
    );
}

async fn run_serve(bind: Option<String>) -> ExitCode {
    let config = UccConfig::from_env();
    let bind_addr = bind
        .or_else(|| std::env::var("UCC_BIND_ADDR").ok())
        .unwrap_or_else(|| "0.0.0.0:4600".into());

    if let Err(e) = ucc_server::serve(config, &bind_addr).await {
        eprintln!("{} {e}", "server error:".red().bold());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
