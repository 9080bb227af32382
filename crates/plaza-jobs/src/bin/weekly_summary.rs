//! # Weekly Commission Summary Job
//!
//! Sends each verified store a summary of the commissions it accrued during
//! the prior full calendar week (Monday to Monday, UTC). Intended for a
//! Monday-morning cron slot.
//!
//! ## Usage
//! ```bash
//! # Every verified store
//! cargo run -p plaza-jobs --bin weekly_summary -- --db ./plaza.db
//!
//! # A single store
//! cargo run -p plaza-jobs --bin weekly_summary -- --db ./plaza.db \
//!     --store 550e8400-e29b-41d4-a716-446655440000
//! ```
//!
//! ## Exit Code
//! Nonzero only when the run itself cannot start (bad arguments, database
//! unreachable). Per-store failures are printed and do NOT fail the run -
//! a single broken store must not block everyone else's summary.

use chrono::Utc;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use plaza_core::validation::validate_uuid;
use plaza_db::{Database, DbConfig, NotificationSink, TracingSink};
use plaza_jobs::report::print_table;
use plaza_jobs::run_weekly_summary;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./plaza.db");
    let mut store: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--store" | "-s" => {
                if i + 1 < args.len() {
                    store = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Plaza Weekly Commission Summary");
                println!();
                println!("Usage: weekly_summary [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: ./plaza.db)");
                println!("  -s, --store <ID>    Limit the run to one store");
                println!("  -h, --help          Show this help message");
                return ExitCode::SUCCESS;
            }
            other => {
                eprintln!("Unknown argument: {other}");
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    if let Some(ref id) = store {
        if let Err(e) = validate_uuid("store", id) {
            eprintln!("Invalid --store: {e}");
            return ExitCode::FAILURE;
        }
    }

    let db = match Database::new(DbConfig::new(&db_path)).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Could not open database {db_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let sink: Arc<dyn NotificationSink> = Arc::new(TracingSink);

    let report = match run_weekly_summary(&db, &sink, store.as_deref(), Utc::now()).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Weekly summary failed to run: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Plaza Weekly Commission Summary");
    println!(
        "Week: {} .. {}",
        report.window.0.format("%Y-%m-%d"),
        report.window.1.format("%Y-%m-%d")
    );
    println!();
    print_table(
        &["STORES", "SUMMARIES SENT", "ERRORS"],
        &[vec![
            report.stores_processed.to_string(),
            report.summaries_sent.to_string(),
            report.errors.len().to_string(),
        ]],
    );

    if !report.errors.is_empty() {
        println!();
        println!("⚠ Stores with errors (run continued past them):");
        for (store_id, error) in &report.errors {
            println!("  {store_id}: {error}");
        }
    }

    db.close().await;
    ExitCode::SUCCESS
}
