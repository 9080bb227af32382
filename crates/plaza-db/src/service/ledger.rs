//! # Commission Ledger
//!
//! Store-facing commission queries, the manual mark-paid override, and
//! marketplace-wide statistics for the operations dashboard.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use plaza_core::commission::calendar_month_start;
use plaza_core::{Commission, CommissionStatus, Money};

use crate::pool::Database;
use crate::repository::commission::CommissionRepository;
use crate::service::{ServiceError, ServiceResult};

/// Aggregated view of one store's commission history.
///
/// Serializable: admin surfaces return it as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct StoreCommissionSummary {
    pub store_id: String,
    pub count: i64,
    pub total_amount: Money,
    pub pending_count: i64,
    pub pending_amount: Money,
    pub paid_count: i64,
    pub paid_amount: Money,
    /// Pending commissions past their due date, evaluated at query time.
    pub overdue_count: i64,
    /// total_amount / count, truncated to the cent. Zero when empty.
    pub average_amount: Money,
}

/// Marketplace-wide commission and settlement counters.
#[derive(Debug, Clone, Serialize)]
pub struct GeneralStatistics {
    /// Commissions created since the start of the current calendar month.
    pub commissions_this_month: i64,
    pub commissions_pending: i64,
    pub commissions_overdue: i64,
    pub pending_settlements: i64,
    /// Stores with at least one commission, ever.
    pub stores_with_commissions: i64,
}

/// Query/state surface over the commission ledger.
#[derive(Debug, Clone)]
pub struct CommissionLedger {
    db: Database,
}

impl CommissionLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// A store's pending commissions, most recent first.
    pub async fn pending_for_store(&self, store_id: &str) -> ServiceResult<Vec<Commission>> {
        Ok(self.db.commissions().pending_for_store(store_id).await?)
    }

    /// A commission by id.
    pub async fn get(&self, commission_id: &str) -> ServiceResult<Commission> {
        self.db
            .commissions()
            .get(commission_id)
            .await
            .map_err(|e| ServiceError::from_db_not_found(e, "Commission", commission_id))
    }

    /// Aggregated summary of one store's commissions, optionally windowed
    /// by creation date (`[from, to)`).
    #[instrument(skip(self))]
    pub async fn summary_for_store(
        &self,
        store_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> ServiceResult<StoreCommissionSummary> {
        if let (Some(from), Some(to)) = (from, to) {
            plaza_core::validation::validate_date_range(from, to)?;
        }

        let agg = self
            .db
            .commissions()
            .aggregates_for_store(store_id, from, to, Utc::now())
            .await?;

        // Average computed here, not in SQL, so integer division behavior
        // stays in one reviewable place.
        let average_cents = if agg.total_count > 0 {
            agg.total_cents / agg.total_count
        } else {
            0
        };

        Ok(StoreCommissionSummary {
            store_id: store_id.to_string(),
            count: agg.total_count,
            total_amount: Money::from_cents(agg.total_cents),
            pending_count: agg.pending_count,
            pending_amount: Money::from_cents(agg.pending_cents),
            paid_count: agg.paid_count,
            paid_amount: Money::from_cents(agg.paid_cents),
            overdue_count: agg.overdue_count,
            average_amount: Money::from_cents(average_cents),
        })
    }

    /// Manually marks a single pending commission as paid.
    ///
    /// Administrative override for out-of-band payments; the normal path is
    /// settlement processing. Stamps the paid date.
    #[instrument(skip(self))]
    pub async fn mark_paid(&self, commission_id: &str) -> ServiceResult<Commission> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let commission = CommissionRepository::get_tx(&mut tx, commission_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "Commission",
                id: commission_id.to_string(),
            })?;

        // Core decides legality; the guarded UPDATE below handles races.
        commission.status.transition_to(CommissionStatus::Paid)?;

        if !CommissionRepository::mark_paid_tx(&mut tx, commission_id, now).await? {
            return Err(ServiceError::InvalidState(format!(
                "commission {commission_id} is no longer pending"
            )));
        }

        tx.commit().await.map_err(crate::error::DbError::from)?;

        info!(commission_id, "Commission manually marked as paid");

        self.get(commission_id).await
    }

    /// Marketplace-wide statistics for the operations dashboard.
    pub async fn general_statistics(&self) -> ServiceResult<GeneralStatistics> {
        let now = Utc::now();
        let month_start = calendar_month_start(now);
        let commissions = self.db.commissions();

        Ok(GeneralStatistics {
            commissions_this_month: commissions.count_created_since(month_start).await?,
            commissions_pending: commissions.count_pending().await?,
            commissions_overdue: commissions.count_overdue(now).await?,
            pending_settlements: self.db.settlements().count_pending().await?,
            stores_with_commissions: commissions.distinct_store_count().await?,
        })
    }
}
