//! # Order Repository
//!
//! Reads orders and their line items, and writes back the commission
//! aggregate fields the orchestrator owns. Orders themselves are placed by
//! checkout; this crate never creates them outside of seeding and tests.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use plaza_core::{Order, OrderItem};

use crate::error::{DbError, DbResult};

/// Repository for orders and their line items.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetches an order by id.
    pub async fn get(&self, id: &str) -> DbResult<Order> {
        sqlx::query_as::<_, Order>(
            "SELECT id, buyer_user_id, total_cents, commissions_calculated,
                    commission_total_cents, commissions_calculated_at, created_at
             FROM orders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Order", id))
    }

    // =========================================================================
    // Transactional access (used inside service transactions)
    // =========================================================================

    /// Fetches an order by id on an open transaction.
    pub async fn get_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, buyer_user_id, total_cents, commissions_calculated,
                    commission_total_cents, commissions_calculated_at, created_at
             FROM orders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(order)
    }

    /// Fetches all line items of an order, in insertion order.
    pub async fn items_tx(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, store_id, product_id, name_snapshot, quantity,
                    unit_price_cents, subtotal_cents, commission_cents, commission_bps,
                    created_at
             FROM order_items WHERE order_id = ? ORDER BY created_at, id",
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(items)
    }

    /// Writes the line-level commission audit fields for one item.
    pub async fn write_line_commission(
        conn: &mut SqliteConnection,
        item_id: &str,
        commission_cents: i64,
        commission_bps: u32,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE order_items SET commission_cents = ?, commission_bps = ? WHERE id = ?",
        )
        .bind(commission_cents)
        .bind(commission_bps)
        .bind(item_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Marks an order as commission-calculated and caches the total.
    ///
    /// Guarded on the flag so a concurrent duplicate calculation loses the
    /// race instead of double-writing.
    pub async fn set_commission_aggregate(
        conn: &mut SqliteConnection,
        order_id: &str,
        total_cents: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE orders
             SET commissions_calculated = 1,
                 commission_total_cents = ?,
                 commissions_calculated_at = ?
             WHERE id = ? AND commissions_calculated = 0",
        )
        .bind(total_cents)
        .bind(now)
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::QueryFailed(format!(
                "order {order_id} already marked as calculated"
            )));
        }
        Ok(())
    }

    /// Clears the commission aggregate and line fields before recalculation.
    pub async fn reset_commission_fields(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE orders
             SET commissions_calculated = 0,
                 commission_total_cents = 0,
                 commissions_calculated_at = NULL
             WHERE id = ?",
        )
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "UPDATE order_items SET commission_cents = NULL, commission_bps = NULL
             WHERE order_id = ?",
        )
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Inserts (seeding and tests)
    // =========================================================================

    /// Inserts an order.
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO orders (id, buyer_user_id, total_cents, commissions_calculated,
                                 commission_total_cents, commissions_calculated_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id)
        .bind(&order.buyer_user_id)
        .bind(order.total_cents)
        .bind(order.commissions_calculated)
        .bind(order.commission_total_cents)
        .bind(order.commissions_calculated_at)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts a line item.
    pub async fn insert_item(&self, item: &OrderItem) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, store_id, product_id, name_snapshot,
                                      quantity, unit_price_cents, subtotal_cents,
                                      commission_cents, commission_bps, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.store_id)
        .bind(&item.product_id)
        .bind(&item.name_snapshot)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.subtotal_cents)
        .bind(item.commission_cents)
        .bind(item.commission_bps)
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use plaza_core::Store;

    async fn seed_order(db: &Database, order_id: &str) {
        db.plans()
            .insert_store(&Store {
                id: "s1".to_string(),
                owner_user_id: "u1".to_string(),
                name: "Store".to_string(),
                verified: true,
                plan_id: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

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

        db.orders()
            .insert_item(&OrderItem {
                id: "i1".to_string(),
                order_id: order_id.to_string(),
                store_id: "s1".to_string(),
                product_id: "prod-1".to_string(),
                name_snapshot: "Widget".to_string(),
                quantity: 2,
                unit_price_cents: 5_000,
                subtotal_cents: 10_000,
                commission_cents: None,
                commission_bps: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_aggregate_guard_rejects_double_mark() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_order(&db, "o1").await;

        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();

        OrderRepository::set_commission_aggregate(&mut conn, "o1", 800, now)
            .await
            .unwrap();

        // Second mark must fail the guard
        let err = OrderRepository::set_commission_aggregate(&mut conn, "o1", 800, now)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn test_reset_clears_order_and_lines() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_order(&db, "o1").await;

        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();

        OrderRepository::write_line_commission(&mut conn, "i1", 800, 800)
            .await
            .unwrap();
        OrderRepository::set_commission_aggregate(&mut conn, "o1", 800, now)
            .await
            .unwrap();
        OrderRepository::reset_commission_fields(&mut conn, "o1")
            .await
            .unwrap();
        drop(conn);

        let order = db.orders().get("o1").await.unwrap();
        assert!(!order.commissions_calculated);
        assert_eq!(order.commission_total_cents, 0);
        assert!(order.commissions_calculated_at.is_none());

        let mut conn = db.pool().acquire().await.unwrap();
        let items = OrderRepository::items_tx(&mut conn, "o1").await.unwrap();
        assert!(items[0].commission_cents.is_none());
        assert!(items[0].commission_bps.is_none());
    }
}
