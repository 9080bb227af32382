//! # Settlement Processing Command
//!
//! Two modes share this binary:
//!
//! - **Default (auto-processor)**: advances every pending settlement whose
//!   period ended more than the grace period ago, marking its commissions
//!   paid. Intended for a daily cron slot.
//! - **`--create` (batch creation)**: groups each verified store's pending
//!   commissions from the lookback window into a new settlement.
//!   `--dry-run` previews the batches without writing anything.
//!
//! ## Usage
//! ```bash
//! # Daily: process settlements past their grace period
//! cargo run -p plaza-jobs --bin process_settlements -- --db ./plaza.db
//!
//! # Monthly: create settlement batches for the last 30 days
//! cargo run -p plaza-jobs --bin process_settlements -- --db ./plaza.db --create
//!
//! # Preview a single store's batch
//! cargo run -p plaza-jobs --bin process_settlements -- --db ./plaza.db \
//!     --create --dry-run --store 550e8400-e29b-41d4-a716-446655440000
//! ```
//!
//! ## Exit Code
//! Nonzero when the run cannot start OR when any per-item operation failed:
//! settlement state changes are financial writes, so a partially failed run
//! must be visible to the scheduler.

use chrono::Utc;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use plaza_core::validation::validate_uuid;
use plaza_db::{Database, DbConfig, NotificationSink, TracingSink};
use plaza_jobs::report::print_table;
use plaza_jobs::{process_due_settlements, run_settlement_batch, BatchOptions};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./plaza.db");
    let mut store: Option<String> = None;
    let mut lookback_days: i64 = 30;
    let mut create = false;
    let mut dry_run = false;

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
            "--days" | "-n" => {
                if i + 1 < args.len() {
                    lookback_days = args[i + 1].parse().unwrap_or(30);
                    i += 1;
                }
            }
            "--create" | "-c" => create = true,
            "--dry-run" => dry_run = true,
            "--help" | "-h" => {
                println!("Plaza Settlement Processor");
                println!();
                println!("Usage: process_settlements [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: ./plaza.db)");
                println!("  -c, --create        Create settlement batches instead of");
                println!("                      processing due ones");
                println!("  -s, --store <ID>    Limit --create to one store");
                println!("  -n, --days <N>      Lookback window for --create (default: 30)");
                println!("      --dry-run       Preview --create without writing");
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
    if lookback_days <= 0 {
        eprintln!("--days must be positive");
        return ExitCode::FAILURE;
    }

    let db = match Database::new(DbConfig::new(&db_path)).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Could not open database {db_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let sink: Arc<dyn NotificationSink> = Arc::new(TracingSink);

    let exit = if create {
        run_create(&db, &sink, store, lookback_days, dry_run).await
    } else {
        run_process(&db, &sink).await
    };

    db.close().await;
    exit
}

/// Auto-processor mode: advance due settlements.
async fn run_process(db: &Database, sink: &Arc<dyn NotificationSink>) -> ExitCode {
    let report = match process_due_settlements(db, sink, Utc::now()).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Settlement processing failed to run: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Plaza Settlement Processor");
    println!();
    print_table(
        &["DUE", "PROCESSED", "SKIPPED (EMPTY)", "ERRORS"],
        &[vec![
            report.examined.to_string(),
            report.processed.to_string(),
            report.skipped_empty.to_string(),
            report.errors.len().to_string(),
        ]],
    );

    if report.errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        println!();
        println!("⚠ Settlements that failed to process:");
        for (number, error) in &report.errors {
            println!("  {number}: {error}");
        }
        ExitCode::FAILURE
    }
}

/// Batch-creation mode: one settlement per store with pending commissions.
async fn run_create(
    db: &Database,
    sink: &Arc<dyn NotificationSink>,
    store: Option<String>,
    lookback_days: i64,
    dry_run: bool,
) -> ExitCode {
    let options = BatchOptions {
        store,
        lookback_days,
        dry_run,
        now: Utc::now(),
    };

    let report = match run_settlement_batch(db, sink, &options).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Settlement batch failed to run: {e}");
            return ExitCode::FAILURE;
        }
    };

    if dry_run {
        println!("Plaza Settlement Batch (DRY RUN - nothing written)");
    } else {
        println!("Plaza Settlement Batch");
    }
    println!("Window: last {lookback_days} days");
    println!();

    let rows: Vec<Vec<String>> = report
        .lines
        .iter()
        .map(|line| {
            vec![
                line.store_name.clone(),
                line.commission_count.to_string(),
                line.total.to_string(),
                line.settlement_number.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["STORE", "COMMISSIONS", "TOTAL", "SETTLEMENT"], &rows);

    println!();
    println!("✓ {} settlements created", report.settlements_created);

    if report.errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        println!();
        println!("⚠ Stores that failed:");
        for (store_id, error) in &report.errors {
            println!("  {store_id}: {error}");
        }
        ExitCode::FAILURE
    }
}
