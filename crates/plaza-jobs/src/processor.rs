//! Settlement processing jobs.
//!
//! Two entry points share this module:
//! - [`process_due_settlements`]: the daily auto-processor that advances
//!   pending settlements whose grace period has elapsed.
//! - [`run_settlement_batch`]: the operator's batch-creation command, with a
//!   dry-run preview.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use plaza_core::{Money, Store, SETTLEMENT_GRACE_DAYS};
use plaza_db::repository::commission::CommissionRepository;
use plaza_db::{Database, DbResult, NotificationSink};

// =============================================================================
// Auto-Processor
// =============================================================================

/// Outcome of one auto-processor run.
#[derive(Debug, Default)]
pub struct ProcessReport {
    /// Pending settlements whose period_end + grace had elapsed.
    pub examined: usize,
    /// Successfully advanced to processed.
    pub processed: usize,
    /// Settlements with no linked commissions, left untouched.
    pub skipped_empty: usize,
    /// Per-settlement failures: (settlement number, error).
    pub errors: Vec<(String, String)>,
}

/// Advances every due pending settlement to processed.
///
/// Due = `period_end + SETTLEMENT_GRACE_DAYS < now`. The grace period gives
/// operators a window to cancel a bad batch before its commissions are
/// marked paid.
pub async fn process_due_settlements(
    db: &Database,
    sink: &Arc<dyn NotificationSink>,
    now: DateTime<Utc>,
) -> DbResult<ProcessReport> {
    let cutoff = now - Duration::days(SETTLEMENT_GRACE_DAYS);
    let due = db.settlements().pending_with_period_end_before(cutoff).await?;

    info!(due = due.len(), cutoff = %cutoff, "Settlement auto-processor starting");

    let batcher = db.batcher(sink.clone());
    let mut report = ProcessReport {
        examined: due.len(),
        ..ProcessReport::default()
    };

    for settlement in &due {
        let linked = db.settlements().commissions_for(&settlement.id).await?;
        if linked.is_empty() {
            // Shouldn't exist (creation refuses empty batches); leave it
            // for an operator to cancel rather than processing nothing.
            warn!(number = %settlement.number, "Settlement has no commissions, skipping");
            report.skipped_empty += 1;
            continue;
        }

        match batcher.process(&settlement.id).await {
            Ok(_) => report.processed += 1,
            Err(e) => {
                warn!(
                    number = %settlement.number,
                    error = %e,
                    "Settlement processing failed, continuing"
                );
                report.errors.push((settlement.number.clone(), e.to_string()));
            }
        }
    }

    info!(
        processed = report.processed,
        skipped = report.skipped_empty,
        errors = report.errors.len(),
        "Settlement auto-processor finished"
    );

    Ok(report)
}

// =============================================================================
// Batch Creation Command
// =============================================================================

/// Options for a settlement-batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Restrict the run to one store (default: every verified store).
    pub store: Option<String>,
    /// Window length: commissions created in the last N days are batched.
    pub lookback_days: i64,
    /// Preview only: report what WOULD be batched, write nothing.
    pub dry_run: bool,
    pub now: DateTime<Utc>,
}

/// One store's line in a batch report.
#[derive(Debug)]
pub struct BatchLine {
    pub store_id: String,
    pub store_name: String,
    /// Batchable commissions found in the window.
    pub commission_count: usize,
    pub total: Money,
    /// The created settlement's number (None on dry-run or empty store).
    pub settlement_number: Option<String>,
}

/// Outcome of one batch-creation run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub lines: Vec<BatchLine>,
    pub settlements_created: usize,
    /// Per-store failures: (store_id, error).
    pub errors: Vec<(String, String)>,
}

/// Creates settlement batches for verified stores' pending commissions.
///
/// Per-store failures are recorded and the run continues; the caller
/// decides whether a nonempty `errors` fails the process.
pub async fn run_settlement_batch(
    db: &Database,
    sink: &Arc<dyn NotificationSink>,
    options: &BatchOptions,
) -> DbResult<BatchReport> {
    let from = options.now - Duration::days(options.lookback_days);
    let to = options.now;

    let stores: Vec<Store> = match &options.store {
        Some(id) => vec![db.plans().get_store(id).await?],
        None => db.plans().verified_stores().await?,
    };

    info!(
        stores = stores.len(),
        lookback_days = options.lookback_days,
        dry_run = options.dry_run,
        "Settlement batch run starting"
    );

    let batcher = db.batcher(sink.clone());
    let mut report = BatchReport::default();

    for store in &stores {
        // Preview the batchable set first; on dry-run this is all we do.
        let mut conn = match db.pool().acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                report.errors.push((store.id.clone(), e.to_string()));
                continue;
            }
        };
        let batchable =
            match CommissionRepository::batchable_in_range_tx(&mut conn, &store.id, from, to)
                .await
            {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(store_id = %store.id, error = %e, "Store preview failed, continuing");
                    report.errors.push((store.id.clone(), e.to_string()));
                    continue;
                }
            };
        drop(conn);

        let total = Money::from_cents(batchable.iter().map(|c| c.commission_cents).sum());
        let mut line = BatchLine {
            store_id: store.id.clone(),
            store_name: store.name.clone(),
            commission_count: batchable.len(),
            total,
            settlement_number: None,
        };

        if !options.dry_run && !batchable.is_empty() {
            match batcher
                .create_automatic_settlement(&store.id, from, to, None)
                .await
            {
                Ok(Some(settlement)) => {
                    report.settlements_created += 1;
                    line.settlement_number = Some(settlement.number);
                }
                // Raced to empty between preview and creation
                Ok(None) => line.commission_count = 0,
                Err(e) => {
                    warn!(store_id = %store.id, error = %e, "Settlement creation failed, continuing");
                    report.errors.push((store.id.clone(), e.to_string()));
                }
            }
        }

        report.lines.push(line);
    }

    info!(
        created = report.settlements_created,
        errors = report.errors.len(),
        "Settlement batch run finished"
    );

    Ok(report)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_core::{CommissionPlan, Order, OrderItem, SettlementStatus};
    use plaza_db::{DbConfig, RecordingSink};

    async fn fixture() -> (Database, Arc<dyn NotificationSink>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sink: Arc<dyn NotificationSink> = Arc::new(RecordingSink::new());
        (db, sink)
    }

    async fn seed_store_with_commission(db: &Database, sink: &Arc<dyn NotificationSink>) {
        db.plans()
            .insert_plan(&CommissionPlan {
                id: "p1".to_string(),
                name: "basico".to_string(),
                commission_bps: 1_000,
                settlement_delay_days: 30,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        db.plans()
            .insert_store(&Store {
                id: "store-a".to_string(),
                owner_user_id: "owner-a".to_string(),
                name: "Store A".to_string(),
                verified: true,
                plan_id: Some("p1".to_string()),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        db.orders()
            .insert(&Order {
                id: "o1".to_string(),
                buyer_user_id: "buyer".to_string(),
                total_cents: 10_000,
                commissions_calculated: false,
                commission_total_cents: 0,
                commissions_calculated_at: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        db.orders()
            .insert_item(&OrderItem {
                id: "i1".to_string(),
                order_id: "o1".to_string(),
                store_id: "store-a".to_string(),
                product_id: "prod".to_string(),
                name_snapshot: "Product".to_string(),
                quantity: 1,
                unit_price_cents: 10_000,
                subtotal_cents: 10_000,
                commission_cents: None,
                commission_bps: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        db.orchestrator(sink.clone())
            .calculate_commissions("o1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let (db, sink) = fixture().await;
        seed_store_with_commission(&db, &sink).await;

        let report = run_settlement_batch(
            &db,
            &sink,
            &BatchOptions {
                store: None,
                lookback_days: 30,
                dry_run: true,
                now: Utc::now(),
            },
        )
        .await
        .unwrap();

        assert_eq!(report.settlements_created, 0);
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.lines[0].commission_count, 1);
        assert_eq!(report.lines[0].total.cents(), 1_000);
        assert!(report.lines[0].settlement_number.is_none());

        assert_eq!(db.settlements().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn batch_then_auto_process_after_grace() {
        let (db, sink) = fixture().await;
        seed_store_with_commission(&db, &sink).await;

        let now = Utc::now();
        let report = run_settlement_batch(
            &db,
            &sink,
            &BatchOptions {
                store: Some("store-a".to_string()),
                lookback_days: 30,
                dry_run: false,
                now,
            },
        )
        .await
        .unwrap();
        assert_eq!(report.settlements_created, 1);
        let number = report.lines[0].settlement_number.clone().unwrap();

        // Within the grace period: nothing is due
        let early = process_due_settlements(&db, &sink, now).await.unwrap();
        assert_eq!(early.examined, 0);

        // Past the grace period: the settlement is processed
        let later = now + Duration::days(SETTLEMENT_GRACE_DAYS + 1);
        let run = process_due_settlements(&db, &sink, later).await.unwrap();
        assert_eq!(run.examined, 1);
        assert_eq!(run.processed, 1);
        assert!(run.errors.is_empty());

        let settlement = db.settlements().get_by_number(&number).await.unwrap();
        assert_eq!(settlement.status, SettlementStatus::Processed);
    }

    #[tokio::test]
    async fn empty_store_produces_no_settlement() {
        let (db, sink) = fixture().await;
        db.plans()
            .insert_store(&Store {
                id: "store-quiet".to_string(),
                owner_user_id: "owner-q".to_string(),
                name: "Quiet".to_string(),
                verified: true,
                plan_id: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let report = run_settlement_batch(
            &db,
            &sink,
            &BatchOptions {
                store: None,
                lookback_days: 30,
                dry_run: false,
                now: Utc::now(),
            },
        )
        .await
        .unwrap();

        assert_eq!(report.settlements_created, 0);
        assert_eq!(report.lines[0].commission_count, 0);
    }
}
