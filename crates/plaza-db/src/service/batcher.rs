//! # Settlement Batcher
//!
//! Groups a store's pending commissions into settlement batches and drives
//! the settlement lifecycle.
//!
//! ## Lifecycle Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Settlement Operations                               │
//! │                                                                         │
//! │  create_automatic(store, from, to)                                     │
//! │    batchable pending commissions → settlement row + links              │
//! │    (none found → Ok(None), nothing created)                            │
//! │                                                                         │
//! │  process(id)        pending → processed, linked commissions → paid    │
//! │  mark_paid(id)      processed → paid (bookkeeping, no money moves)     │
//! │  cancel(id, why)    any → cancelled, linked commissions → pending      │
//! │                                                                         │
//! │  Document numbers: LIQ-{store}-{YYYYMMDD}-{NNN}, sequence per store    │
//! │  per day. Generation is count-then-insert; the UNIQUE constraint       │
//! │  breaks ties and the loser retries with the next sequence.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use plaza_core::commission::format_settlement_number;
use plaza_core::validation::{validate_date_range, validate_notes};
use plaza_core::{
    Commission, Money, Notification, NotificationKind, Settlement, SettlementStatus,
};

use crate::error::DbError;
use crate::notify::{send_best_effort, NotificationSink};
use crate::pool::Database;
use crate::repository::commission::CommissionRepository;
use crate::repository::plan::PlanRepository;
use crate::repository::settlement::SettlementRepository;
use crate::service::{ServiceError, ServiceResult};

/// Attempts before giving up on a settlement-number collision. Collisions
/// require two settlements for the same store in the same instant, so one
/// retry is nearly always enough.
const NUMBER_RETRY_ATTEMPTS: u32 = 5;

/// Service that creates and advances settlement batches.
#[derive(Clone)]
pub struct SettlementBatcher {
    db: Database,
    sink: Arc<dyn NotificationSink>,
}

impl SettlementBatcher {
    pub fn new(db: Database, sink: Arc<dyn NotificationSink>) -> Self {
        Self { db, sink }
    }

    /// Creates a settlement batching the store's pending commissions created
    /// within `[from, to]` that are not already held by an active settlement.
    ///
    /// ## Returns
    /// `Ok(None)` when no batchable commissions exist - a store with nothing
    /// to settle is a normal outcome, not an error.
    #[instrument(skip(self, notes))]
    pub async fn create_automatic_settlement(
        &self,
        store_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        notes: Option<String>,
    ) -> ServiceResult<Option<Settlement>> {
        validate_date_range(from, to)?;
        if let Some(ref n) = notes {
            validate_notes(n)?;
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let store = PlanRepository::store_tx(&mut tx, store_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "Store",
                id: store_id.to_string(),
            })?;

        let commissions =
            CommissionRepository::batchable_in_range_tx(&mut tx, store_id, from, to).await?;

        if commissions.is_empty() {
            info!(store_id, "No batchable commissions in range");
            return Ok(None);
        }

        let total = sum_amounts(&commissions)?;
        let order_count = distinct_order_count(&commissions);

        let settlement =
            Self::insert_with_number(&mut tx, store_id, total, order_count, from, to, notes, now)
                .await?;

        for commission in &commissions {
            SettlementRepository::link_commission_tx(&mut tx, &settlement.id, &commission.id)
                .await?;
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            store_id,
            number = %settlement.number,
            commissions = commissions.len(),
            total_cents = settlement.total_cents,
            "Settlement created"
        );

        send_best_effort(
            self.sink.as_ref(),
            Notification {
                user_id: store.owner_user_id,
                kind: NotificationKind::SettlementCreated,
                title: "Liquidación generada".to_string(),
                message: format!(
                    "Liquidación {} por {} ({} pedidos)",
                    settlement.number,
                    settlement.total(),
                    settlement.order_count
                ),
                reference_id: settlement.id.clone(),
            },
        )
        .await;

        Ok(Some(settlement))
    }

    /// Inserts the settlement row, retrying number generation on collision.
    #[allow(clippy::too_many_arguments)]
    async fn insert_with_number(
        tx: &mut sqlx::SqliteConnection,
        store_id: &str,
        total: Money,
        order_count: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Settlement> {
        let today = now.date_naive();
        let day_start = today
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();
        let day_end = day_start + chrono::Duration::days(1);

        let existing_today =
            SettlementRepository::count_for_store_on_day_tx(tx, store_id, day_start, day_end)
                .await?;

        for attempt in 0..NUMBER_RETRY_ATTEMPTS {
            let sequence = (existing_today as u32) + attempt + 1;
            let number = format_settlement_number(store_id, today, sequence);

            let settlement = Settlement {
                id: Uuid::new_v4().to_string(),
                store_id: store_id.to_string(),
                number,
                total_cents: total.cents(),
                order_count,
                period_start: from,
                period_end: to,
                status: SettlementStatus::Pending,
                processed_at: None,
                paid_at: None,
                notes: notes.clone(),
                created_at: now,
                updated_at: now,
            };

            match SettlementRepository::insert_tx(tx, &settlement).await {
                Ok(()) => return Ok(settlement),
                Err(e) if e.is_unique_violation() => {
                    warn!(
                        store_id,
                        number = %settlement.number,
                        attempt,
                        "Settlement number collision, retrying"
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::InvalidState(format!(
            "could not allocate a settlement number for store {store_id} after \
             {NUMBER_RETRY_ATTEMPTS} attempts"
        )))
    }

    /// Processes a pending settlement: marks it processed and every linked
    /// commission paid, atomically.
    #[instrument(skip(self))]
    pub async fn process(&self, settlement_id: &str) -> ServiceResult<Settlement> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let settlement = SettlementRepository::get_tx(&mut tx, settlement_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "Settlement",
                id: settlement_id.to_string(),
            })?;

        settlement.status.transition_to(SettlementStatus::Processed)?;

        let linked =
            SettlementRepository::linked_commission_count_tx(&mut tx, settlement_id).await?;
        if linked == 0 {
            return Err(ServiceError::InvalidState(format!(
                "settlement {settlement_id} has no linked commissions"
            )));
        }

        if !SettlementRepository::mark_processed_tx(&mut tx, settlement_id, now).await? {
            return Err(ServiceError::InvalidState(format!(
                "settlement {settlement_id} is no longer pending"
            )));
        }

        let paid =
            CommissionRepository::mark_paid_for_settlement_tx(&mut tx, settlement_id, now).await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            settlement_id,
            number = %settlement.number,
            commissions_paid = paid,
            "Settlement processed"
        );

        let processed = self.get(settlement_id).await?;
        self.notify_owner(
            &processed,
            NotificationKind::SettlementProcessed,
            "Liquidación procesada",
            format!(
                "Liquidación {} procesada: {} comisiones pagadas por {}",
                processed.number,
                paid,
                processed.total()
            ),
        )
        .await;

        Ok(processed)
    }

    /// Records the payout of a processed settlement.
    ///
    /// Bookkeeping only: no money moves through this system. Optional notes
    /// (wire reference, etc.) are appended to the settlement.
    #[instrument(skip(self, notes))]
    pub async fn mark_paid(
        &self,
        settlement_id: &str,
        notes: Option<String>,
    ) -> ServiceResult<Settlement> {
        if let Some(ref n) = notes {
            validate_notes(n)?;
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let settlement = SettlementRepository::get_tx(&mut tx, settlement_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "Settlement",
                id: settlement_id.to_string(),
            })?;

        settlement.status.transition_to(SettlementStatus::Paid)?;

        if !SettlementRepository::mark_paid_tx(&mut tx, settlement_id, now, notes.as_deref())
            .await?
        {
            return Err(ServiceError::InvalidState(format!(
                "settlement {settlement_id} is no longer processed"
            )));
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(settlement_id, number = %settlement.number, "Settlement paid");

        let paid = self.get(settlement_id).await?;
        self.notify_owner(
            &paid,
            NotificationKind::SettlementPaid,
            "Liquidación pagada",
            format!("Liquidación {} pagada: {}", paid.number, paid.total()),
        )
        .await;

        Ok(paid)
    }

    /// Cancels a settlement and reverts its linked commissions to pending,
    /// making them batchable again.
    ///
    /// The reason is appended to the settlement's notes. No notification:
    /// cancellation is an operator action, usually followed by a corrected
    /// batch.
    #[instrument(skip(self, reason))]
    pub async fn cancel(&self, settlement_id: &str, reason: &str) -> ServiceResult<Settlement> {
        validate_notes(reason)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let settlement = SettlementRepository::get_tx(&mut tx, settlement_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "Settlement",
                id: settlement_id.to_string(),
            })?;

        settlement.status.transition_to(SettlementStatus::Cancelled)?;

        let expected = match settlement.status {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Processed => "processed",
            SettlementStatus::Paid => "paid",
            SettlementStatus::Cancelled => unreachable!("transition check rejects cancelled"),
        };

        let annotation = format!("Cancelado: {reason}");
        if !SettlementRepository::mark_cancelled_tx(
            &mut tx,
            settlement_id,
            expected,
            now,
            &annotation,
        )
        .await?
        {
            return Err(ServiceError::InvalidState(format!(
                "settlement {settlement_id} changed state concurrently"
            )));
        }

        // Commissions the processing step marked paid go back to pending;
        // commissions still pending (cancel before processing) are untouched.
        let reverted =
            CommissionRepository::revert_to_pending_for_settlement_tx(&mut tx, settlement_id, now)
                .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            settlement_id,
            number = %settlement.number,
            commissions_reverted = reverted,
            "Settlement cancelled"
        );

        self.get(settlement_id).await
    }

    /// A settlement by id.
    pub async fn get(&self, settlement_id: &str) -> ServiceResult<Settlement> {
        self.db
            .settlements()
            .get(settlement_id)
            .await
            .map_err(|e| ServiceError::from_db_not_found(e, "Settlement", settlement_id))
    }

    async fn notify_owner(
        &self,
        settlement: &Settlement,
        kind: NotificationKind,
        title: &str,
        message: String,
    ) {
        let owner = match self.db.plans().get_store(&settlement.store_id).await {
            Ok(store) => store.owner_user_id,
            Err(e) => {
                warn!(
                    settlement_id = %settlement.id,
                    error = %e,
                    "Could not resolve store owner for notification"
                );
                return;
            }
        };

        send_best_effort(
            self.sink.as_ref(),
            Notification {
                user_id: owner,
                kind,
                title: title.to_string(),
                message,
                reference_id: settlement.id.clone(),
            },
        )
        .await;
    }
}

/// Sum of commission amounts, overflow-checked.
fn sum_amounts(commissions: &[Commission]) -> ServiceResult<Money> {
    let mut total = Money::zero();
    for commission in commissions {
        total = total
            .checked_add(commission.amount())
            .ok_or(plaza_core::CoreError::AmountOverflow {
                context: "settlement total",
            })?;
    }
    Ok(total)
}

/// Count of distinct order ids among the commissions.
fn distinct_order_count(commissions: &[Commission]) -> i64 {
    commissions
        .iter()
        .map(|c| c.order_id.as_str())
        .collect::<HashSet<_>>()
        .len() as i64
}
