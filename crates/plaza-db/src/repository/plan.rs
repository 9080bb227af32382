//! # Plan & Store Repository
//!
//! Reads for the reference data the settlement core depends on: commission
//! plans and store plan assignments. Inserts exist for seeding and tests;
//! plan/store administration itself is out of scope for this crate.

use sqlx::{SqliteConnection, SqlitePool};

use plaza_core::{CommissionPlan, Store};

use crate::error::{DbError, DbResult};

/// Repository for commission plans and stores.
#[derive(Debug, Clone)]
pub struct PlanRepository {
    pool: SqlitePool,
}

impl PlanRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetches a plan by id.
    pub async fn get_plan(&self, id: &str) -> DbResult<CommissionPlan> {
        sqlx::query_as::<_, CommissionPlan>(
            "SELECT id, name, commission_bps, settlement_delay_days, created_at
             FROM plans WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Plan", id))
    }

    /// Fetches a store by id.
    pub async fn get_store(&self, id: &str) -> DbResult<Store> {
        sqlx::query_as::<_, Store>(
            "SELECT id, owner_user_id, name, verified, plan_id, created_at
             FROM stores WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Store", id))
    }

    /// Lists all verified stores, ordered by name.
    ///
    /// Scheduled jobs iterate this set; unverified stores are never acted on.
    pub async fn verified_stores(&self) -> DbResult<Vec<Store>> {
        let stores = sqlx::query_as::<_, Store>(
            "SELECT id, owner_user_id, name, verified, plan_id, created_at
             FROM stores WHERE verified = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(stores)
    }

    // =========================================================================
    // Transactional reads (used inside service transactions)
    // =========================================================================

    /// Fetches a store by id on an open transaction.
    pub async fn store_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Store>> {
        let store = sqlx::query_as::<_, Store>(
            "SELECT id, owner_user_id, name, verified, plan_id, created_at
             FROM stores WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(store)
    }

    /// Resolves a store's current plan on an open transaction.
    ///
    /// ## Returns
    /// `None` when the store has no plan assigned (or the store does not
    /// exist). Commission calculation skips such stores with a warning.
    pub async fn current_plan_for_store_tx(
        conn: &mut SqliteConnection,
        store_id: &str,
    ) -> DbResult<Option<CommissionPlan>> {
        let plan = sqlx::query_as::<_, CommissionPlan>(
            "SELECT p.id, p.name, p.commission_bps, p.settlement_delay_days, p.created_at
             FROM plans p
             JOIN stores s ON s.plan_id = p.id
             WHERE s.id = ?",
        )
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(plan)
    }

    // =========================================================================
    // Inserts (seeding and tests)
    // =========================================================================

    /// Inserts a commission plan.
    pub async fn insert_plan(&self, plan: &CommissionPlan) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO plans (id, name, commission_bps, settlement_delay_days, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&plan.id)
        .bind(&plan.name)
        .bind(plan.commission_bps)
        .bind(plan.settlement_delay_days)
        .bind(plan.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts a store.
    pub async fn insert_store(&self, store: &Store) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO stores (id, owner_user_id, name, verified, plan_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&store.id)
        .bind(&store.owner_user_id)
        .bind(&store.name)
        .bind(store.verified)
        .bind(&store.plan_id)
        .bind(store.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Changes a store's plan assignment (None clears it).
    pub async fn set_store_plan(&self, store_id: &str, plan_id: Option<&str>) -> DbResult<()> {
        let result = sqlx::query("UPDATE stores SET plan_id = ? WHERE id = ?")
            .bind(plan_id)
            .bind(store_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Store", store_id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
