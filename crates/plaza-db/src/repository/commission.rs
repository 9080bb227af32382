//! # Commission Repository
//!
//! Row-level access to the commission ledger table.
//!
//! ## Status Writes
//! Every status mutation here is a guarded UPDATE (`WHERE status = ?`).
//! The LEGALITY of a transition is decided by `plaza_core::state` in the
//! service layer before the write; the guard only protects against a
//! concurrent transition winning the race between read and write.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use plaza_core::Commission;

use crate::error::{DbError, DbResult};

/// Column list shared by every `SELECT ... FROM commissions`.
const COMMISSION_COLUMNS: &str = "id, order_id, store_id, plan_id, sale_amount_cents, rate_bps, \
     commission_cents, status, due_date, paid_date, notes, created_at, updated_at";

/// Raw status aggregates for one store, straight from SQL.
///
/// The ledger service turns this into its summary DTO (adding the average,
/// which is computed in Rust to keep rounding in one place).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommissionAggregates {
    pub total_count: i64,
    pub total_cents: i64,
    pub pending_count: i64,
    pub pending_cents: i64,
    pub paid_count: i64,
    pub paid_cents: i64,
    pub overdue_count: i64,
}

/// Repository for commission rows.
#[derive(Debug, Clone)]
pub struct CommissionRepository {
    pool: SqlitePool,
}

impl CommissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetches a commission by id.
    pub async fn get(&self, id: &str) -> DbResult<Commission> {
        sqlx::query_as::<_, Commission>(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM commissions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Commission", id))
    }

    /// Fetches all commissions of one order, ordered by store.
    pub async fn for_order(&self, order_id: &str) -> DbResult<Vec<Commission>> {
        let rows = sqlx::query_as::<_, Commission>(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM commissions
             WHERE order_id = ? ORDER BY store_id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Fetches a store's pending commissions, most recent first.
    pub async fn pending_for_store(&self, store_id: &str) -> DbResult<Vec<Commission>> {
        let rows = sqlx::query_as::<_, Commission>(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM commissions
             WHERE store_id = ? AND status = 'pending'
             ORDER BY created_at DESC"
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Status aggregates for one store, with an optional creation-date window.
    ///
    /// `overdue` is evaluated against `now` at query time, never stored.
    pub async fn aggregates_for_store(
        &self,
        store_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DbResult<CommissionAggregates> {
        let aggregates = sqlx::query_as::<_, CommissionAggregates>(
            "SELECT
                COUNT(*)                                                        AS total_count,
                COALESCE(SUM(commission_cents), 0)                              AS total_cents,
                COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0)
                                                                                AS pending_count,
                COALESCE(SUM(CASE WHEN status = 'pending' THEN commission_cents ELSE 0 END), 0)
                                                                                AS pending_cents,
                COALESCE(SUM(CASE WHEN status = 'paid' THEN 1 ELSE 0 END), 0)   AS paid_count,
                COALESCE(SUM(CASE WHEN status = 'paid' THEN commission_cents ELSE 0 END), 0)
                                                                                AS paid_cents,
                COALESCE(SUM(CASE WHEN status = 'pending' AND due_date < ? THEN 1 ELSE 0 END), 0)
                                                                                AS overdue_count
             FROM commissions
             WHERE store_id = ?
               AND (? IS NULL OR created_at >= ?)
               AND (? IS NULL OR created_at < ?)",
        )
        .bind(now)
        .bind(store_id)
        .bind(from)
        .bind(from)
        .bind(to)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(aggregates)
    }

    /// Count and sum of a store's commissions created within `[from, to)`.
    ///
    /// Used by the weekly summary job. Counts every status: the summary
    /// reports activity, not balance.
    pub async fn count_and_sum_in_range(
        &self,
        store_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(commission_cents), 0)
             FROM commissions
             WHERE store_id = ? AND created_at >= ? AND created_at < ?",
        )
        .bind(store_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    // =========================================================================
    // Marketplace-wide statistics
    // =========================================================================

    /// Commissions created at or after `since`.
    pub async fn count_created_since(&self, since: DateTime<Utc>) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM commissions WHERE created_at >= ?")
                .bind(since)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Pending commissions across all stores.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM commissions WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Pending commissions past their due date at `now`.
    pub async fn count_overdue(&self, now: DateTime<Utc>) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM commissions WHERE status = 'pending' AND due_date < ?",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Distinct stores that have at least one commission.
    pub async fn distinct_store_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT store_id) FROM commissions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Transactional mutations (the service owns BEGIN/COMMIT)
    // =========================================================================

    /// Fetches a commission by id on an open transaction.
    pub async fn get_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Commission>> {
        let commission = sqlx::query_as::<_, Commission>(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM commissions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(commission)
    }

    /// Inserts a commission row.
    ///
    /// The UNIQUE (order_id, store_id) index surfaces duplicates as
    /// [`DbError::UniqueViolation`].
    pub async fn insert_tx(conn: &mut SqliteConnection, commission: &Commission) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO commissions (id, order_id, store_id, plan_id, sale_amount_cents,
                                      rate_bps, commission_cents, status, due_date, paid_date,
                                      notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&commission.id)
        .bind(&commission.order_id)
        .bind(&commission.store_id)
        .bind(&commission.plan_id)
        .bind(commission.sale_amount_cents)
        .bind(commission.rate_bps)
        .bind(commission.commission_cents)
        .bind(commission.status)
        .bind(commission.due_date)
        .bind(commission.paid_date)
        .bind(&commission.notes)
        .bind(commission.created_at)
        .bind(commission.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Deletes every commission of one order (recalculation path).
    pub async fn delete_for_order_tx(conn: &mut SqliteConnection, order_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM commissions WHERE order_id = ?")
            .bind(order_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Whether any commission of this order is linked to a settlement that
    /// is not cancelled. Recalculation is forbidden while this holds.
    pub async fn order_linked_to_active_settlement_tx(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)
             FROM commissions c
             JOIN settlement_commissions sc ON sc.commission_id = c.id
             JOIN settlements s ON s.id = sc.settlement_id
             WHERE c.order_id = ? AND s.status != 'cancelled'",
        )
        .bind(order_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count > 0)
    }

    /// A store's pending commissions created within `[from, to]` that are
    /// not already linked to an active (non-cancelled) settlement.
    ///
    /// This is the batchable set for settlement creation. Commissions from
    /// cancelled settlements reappear here, which is what allows them to be
    /// re-batched.
    pub async fn batchable_in_range_tx(
        conn: &mut SqliteConnection,
        store_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Commission>> {
        let rows = sqlx::query_as::<_, Commission>(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM commissions c
             WHERE c.store_id = ?
               AND c.status = 'pending'
               AND c.created_at >= ?
               AND c.created_at <= ?
               AND NOT EXISTS (
                   SELECT 1 FROM settlement_commissions sc
                   JOIN settlements s ON s.id = sc.settlement_id
                   WHERE sc.commission_id = c.id AND s.status != 'cancelled'
               )
             ORDER BY c.created_at, c.id"
        ))
        .bind(store_id)
        .bind(from)
        .bind(to)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Marks one pending commission as paid.
    ///
    /// ## Returns
    /// `false` when the guard missed (the commission was not pending).
    pub async fn mark_paid_tx(
        conn: &mut SqliteConnection,
        id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE commissions
             SET status = 'paid', paid_date = ?, updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Marks every pending commission linked to a settlement as paid.
    ///
    /// ## Returns
    /// Number of rows updated.
    pub async fn mark_paid_for_settlement_tx(
        conn: &mut SqliteConnection,
        settlement_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE commissions
             SET status = 'paid', paid_date = ?, updated_at = ?
             WHERE status = 'pending'
               AND id IN (SELECT commission_id FROM settlement_commissions
                          WHERE settlement_id = ?)",
        )
        .bind(now)
        .bind(now)
        .bind(settlement_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Reverts every paid commission linked to a settlement back to pending,
    /// clearing the paid date (settlement cancellation).
    pub async fn revert_to_pending_for_settlement_tx(
        conn: &mut SqliteConnection,
        settlement_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE commissions
             SET status = 'pending', paid_date = NULL, updated_at = ?
             WHERE status = 'paid'
               AND id IN (SELECT commission_id FROM settlement_commissions
                          WHERE settlement_id = ?)",
        )
        .bind(now)
        .bind(settlement_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use plaza_core::{CommissionStatus, Order, Store};

    fn commission(id: &str, order_id: &str, store_id: &str, cents: i64) -> Commission {
        let now = Utc::now();
        Commission {
            id: id.to_string(),
            order_id: order_id.to_string(),
            store_id: store_id.to_string(),
            plan_id: "p1".to_string(),
            sale_amount_cents: cents * 10,
            rate_bps: 1000,
            commission_cents: cents,
            status: CommissionStatus::Pending,
            due_date: now + Duration::days(30),
            paid_date: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seed(db: &Database) {
        db.plans()
            .insert_plan(&plaza_core::CommissionPlan {
                id: "p1".to_string(),
                name: "basico".to_string(),
                commission_bps: 1000,
                settlement_delay_days: 30,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        db.plans()
            .insert_store(&Store {
                id: "s1".to_string(),
                owner_user_id: "u1".to_string(),
                name: "Store".to_string(),
                verified: true,
                plan_id: Some("p1".to_string()),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        for order_id in ["o1", "o2"] {
            db.orders()
                .insert(&Order {
                    id: order_id.to_string(),
                    buyer_user_id: "buyer".to_string(),
                    total_cents: 10_000,
                    commissions_calculated: false,
                    commission_total_cents: 0,
                    commissions_calculated_at: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_unique_order_store_pair() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db).await;

        let mut conn = db.pool().acquire().await.unwrap();
        CommissionRepository::insert_tx(&mut conn, &commission("c1", "o1", "s1", 800))
            .await
            .unwrap();

        let err = CommissionRepository::insert_tx(&mut conn, &commission("c2", "o1", "s1", 900))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_mark_paid_guard() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db).await;

        let mut conn = db.pool().acquire().await.unwrap();
        CommissionRepository::insert_tx(&mut conn, &commission("c1", "o1", "s1", 800))
            .await
            .unwrap();

        let now = Utc::now();
        assert!(CommissionRepository::mark_paid_tx(&mut conn, "c1", now)
            .await
            .unwrap());
        // Already paid: guard misses
        assert!(!CommissionRepository::mark_paid_tx(&mut conn, "c1", now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_aggregates_and_overdue() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let mut overdue = commission("c1", "o1", "s1", 500);
        overdue.due_date = Utc::now() - Duration::days(1);
        CommissionRepository::insert_tx(&mut conn, &overdue).await.unwrap();
        CommissionRepository::insert_tx(&mut conn, &commission("c2", "o2", "s1", 300))
            .await
            .unwrap();
        drop(conn);

        let agg = db
            .commissions()
            .aggregates_for_store("s1", None, None, Utc::now())
            .await
            .unwrap();
        assert_eq!(agg.total_count, 2);
        assert_eq!(agg.total_cents, 800);
        assert_eq!(agg.pending_count, 2);
        assert_eq!(agg.paid_count, 0);
        assert_eq!(agg.overdue_count, 1);
    }

    #[tokio::test]
    async fn test_pending_for_store_newest_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let mut older = commission("c1", "o1", "s1", 500);
        older.created_at = Utc::now() - Duration::days(2);
        CommissionRepository::insert_tx(&mut conn, &older).await.unwrap();
        CommissionRepository::insert_tx(&mut conn, &commission("c2", "o2", "s1", 300))
            .await
            .unwrap();
        drop(conn);

        let pending = db.commissions().pending_for_store("s1").await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, "c2");
        assert_eq!(pending[1].id, "c1");
    }
}
