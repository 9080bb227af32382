//! Weekly commission summary job.
//!
//! Runs on Mondays: for every verified store, totals the commissions created
//! during the prior full calendar week and notifies the store owner. Stores
//! with zero activity are silently skipped - no noise mail.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use plaza_core::commission::previous_calendar_week;
use plaza_core::{Money, Notification, NotificationKind, Store};
use plaza_db::notify::send_best_effort;
use plaza_db::{Database, DbResult, NotificationSink};

/// Outcome of one weekly summary run.
#[derive(Debug)]
pub struct WeeklyReport {
    /// The summarized window, `[start, end)` UTC.
    pub window: (DateTime<Utc>, DateTime<Utc>),
    /// Stores examined.
    pub stores_processed: usize,
    /// Summaries actually sent (stores with activity).
    pub summaries_sent: usize,
    /// Per-store failures: (store_id, error). The run continues past them.
    pub errors: Vec<(String, String)>,
}

/// Sends the weekly commission summary to every verified store (or just
/// `store_filter` when given).
///
/// Fails only when the store set itself cannot be determined; per-store
/// problems land in the report's `errors`.
pub async fn run_weekly_summary(
    db: &Database,
    sink: &Arc<dyn NotificationSink>,
    store_filter: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<WeeklyReport> {
    let (week_start, week_end) = previous_calendar_week(now);
    info!(
        week_start = %week_start,
        week_end = %week_end,
        "Weekly commission summary starting"
    );

    let stores: Vec<Store> = match store_filter {
        Some(id) => vec![db.plans().get_store(id).await?],
        None => db.plans().verified_stores().await?,
    };

    let mut report = WeeklyReport {
        window: (week_start, week_end),
        stores_processed: 0,
        summaries_sent: 0,
        errors: Vec::new(),
    };

    for store in &stores {
        report.stores_processed += 1;

        let (count, total_cents) = match db
            .commissions()
            .count_and_sum_in_range(&store.id, week_start, week_end)
            .await
        {
            Ok(row) => row,
            Err(e) => {
                warn!(store_id = %store.id, error = %e, "Store summary failed, continuing");
                report.errors.push((store.id.clone(), e.to_string()));
                continue;
            }
        };

        if count == 0 {
            continue;
        }

        send_best_effort(
            sink.as_ref(),
            Notification {
                user_id: store.owner_user_id.clone(),
                kind: NotificationKind::WeeklyCommissionSummary,
                title: "Resumen semanal de comisiones".to_string(),
                message: format!(
                    "Semana del {}: {} comisiones por un total de {}",
                    week_start.format("%Y-%m-%d"),
                    count,
                    Money::from_cents(total_cents)
                ),
                reference_id: store.id.clone(),
            },
        )
        .await;
        report.summaries_sent += 1;
    }

    info!(
        stores = report.stores_processed,
        sent = report.summaries_sent,
        errors = report.errors.len(),
        "Weekly commission summary finished"
    );

    Ok(report)
}

// =============================================================================
// Unit Tests
// =============================================================================
