//! # Settlement Repository
//!
//! Row-level access to settlements and the settlement-commission junction
//! table. Link rows exist only as a side effect of settlement creation and
//! are never touched individually.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use plaza_core::{Commission, Settlement};

use crate::error::{DbError, DbResult};

const SETTLEMENT_COLUMNS: &str = "id, store_id, number, total_cents, order_count, period_start, \
     period_end, status, processed_at, paid_at, notes, created_at, updated_at";

/// Repository for settlement rows and their commission links.
#[derive(Debug, Clone)]
pub struct SettlementRepository {
    pool: SqlitePool,
}

impl SettlementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetches a settlement by id.
    pub async fn get(&self, id: &str) -> DbResult<Settlement> {
        sqlx::query_as::<_, Settlement>(&format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM settlements WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Settlement", id))
    }

    /// Fetches a settlement by its document number.
    pub async fn get_by_number(&self, number: &str) -> DbResult<Settlement> {
        sqlx::query_as::<_, Settlement>(&format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM settlements WHERE number = ?"
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Settlement", number))
    }

    /// Lists a store's settlements, most recent first.
    pub async fn for_store(&self, store_id: &str) -> DbResult<Vec<Settlement>> {
        let rows = sqlx::query_as::<_, Settlement>(&format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM settlements
             WHERE store_id = ? ORDER BY created_at DESC"
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Pending settlements whose period ended before `cutoff`.
    ///
    /// The auto-processor's work queue: period_end + grace days < now.
    pub async fn pending_with_period_end_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> DbResult<Vec<Settlement>> {
        let rows = sqlx::query_as::<_, Settlement>(&format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM settlements
             WHERE status = 'pending' AND period_end < ?
             ORDER BY period_end, id"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Count of pending settlements across all stores.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM settlements WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// The commissions linked to a settlement.
    pub async fn commissions_for(&self, settlement_id: &str) -> DbResult<Vec<Commission>> {
        let rows = sqlx::query_as::<_, Commission>(
            "SELECT c.id, c.order_id, c.store_id, c.plan_id, c.sale_amount_cents, c.rate_bps,
                    c.commission_cents, c.status, c.due_date, c.paid_date, c.notes,
                    c.created_at, c.updated_at
             FROM commissions c
             JOIN settlement_commissions sc ON sc.commission_id = c.id
             WHERE sc.settlement_id = ?
             ORDER BY c.created_at, c.id",
        )
        .bind(settlement_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // =========================================================================
    // Transactional mutations (the service owns BEGIN/COMMIT)
    // =========================================================================

    /// Inserts a settlement row.
    ///
    /// A document-number collision surfaces as [`DbError::UniqueViolation`];
    /// the batcher retries with the next sequence number.
    pub async fn insert_tx(conn: &mut SqliteConnection, settlement: &Settlement) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO settlements (id, store_id, number, total_cents, order_count,
                                      period_start, period_end, status, processed_at, paid_at,
                                      notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&settlement.id)
        .bind(&settlement.store_id)
        .bind(&settlement.number)
        .bind(settlement.total_cents)
        .bind(settlement.order_count)
        .bind(settlement.period_start)
        .bind(settlement.period_end)
        .bind(settlement.status)
        .bind(settlement.processed_at)
        .bind(settlement.paid_at)
        .bind(&settlement.notes)
        .bind(settlement.created_at)
        .bind(settlement.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Links a commission to a settlement.
    pub async fn link_commission_tx(
        conn: &mut SqliteConnection,
        settlement_id: &str,
        commission_id: &str,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO settlement_commissions (settlement_id, commission_id) VALUES (?, ?)",
        )
        .bind(settlement_id)
        .bind(commission_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Settlements already created for this store on the given calendar day.
    ///
    /// Feeds the next document sequence number. Counts ALL statuses: a
    /// cancelled settlement keeps its number, so the sequence never reuses it.
    pub async fn count_for_store_on_day_tx(
        conn: &mut SqliteConnection,
        store_id: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM settlements
             WHERE store_id = ? AND created_at >= ? AND created_at < ?",
        )
        .bind(store_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// Fetches a settlement by id on an open transaction.
    pub async fn get_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Settlement>> {
        let settlement = sqlx::query_as::<_, Settlement>(&format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM settlements WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(settlement)
    }

    /// Number of commissions linked to a settlement.
    pub async fn linked_commission_count_tx(
        conn: &mut SqliteConnection,
        settlement_id: &str,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM settlement_commissions WHERE settlement_id = ?",
        )
        .bind(settlement_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// Advances a pending settlement to processed.
    ///
    /// ## Returns
    /// `false` when the guard missed (the settlement was not pending).
    pub async fn mark_processed_tx(
        conn: &mut SqliteConnection,
        id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE settlements
             SET status = 'processed', processed_at = ?, updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Advances a processed settlement to paid, optionally appending notes.
    pub async fn mark_paid_tx(
        conn: &mut SqliteConnection,
        id: &str,
        now: DateTime<Utc>,
        notes: Option<&str>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE settlements
             SET status = 'paid', paid_at = ?, updated_at = ?,
                 notes = CASE WHEN ? IS NULL THEN notes
                              WHEN notes IS NULL THEN ?
                              ELSE notes || char(10) || ? END
             WHERE id = ? AND status = 'processed'",
        )
        .bind(now)
        .bind(now)
        .bind(notes)
        .bind(notes)
        .bind(notes)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Cancels a settlement, appending the reason to its notes.
    ///
    /// Guarded on the CURRENT status so a concurrent transition loses the
    /// race; legality of `from → cancelled` was already checked in core.
    pub async fn mark_cancelled_tx(
        conn: &mut SqliteConnection,
        id: &str,
        expected_status: &str,
        now: DateTime<Utc>,
        reason: &str,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE settlements
             SET status = 'cancelled', updated_at = ?,
                 notes = CASE WHEN notes IS NULL THEN ?
                              ELSE notes || char(10) || ? END
             WHERE id = ? AND status = ?",
        )
        .bind(now)
        .bind(reason)
        .bind(reason)
        .bind(id)
        .bind(expected_status)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
