//! # Commission Orchestrator
//!
//! Turns a completed order into commission rows, one per store involved.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              calculate_commissions(order_id)                            │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├── fetch order          ── missing → NotFound                       │
//! │   │                        ── already calculated → no-op success       │
//! │   ├── fetch line items     ── empty → EmptyOrder                       │
//! │   ├── group by store (deterministic order)                             │
//! │   ├── per group:                                                        │
//! │   │     store/plan lookup  ── missing plan → warn + SKIP group         │
//! │   │     compute amounts (plaza-core, half-up once)                     │
//! │   │     INSERT commission (rate + plan snapshotted)                    │
//! │   │     write per-line audit fields                                    │
//! │   ├── mark order calculated + cache total (guarded on the flag)        │
//! │  COMMIT                                                                 │
//! │   └── best-effort CommissionCreated notification per store owner       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All writes for one order happen in ONE transaction: an order is never
//! observable with half its commissions calculated.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use plaza_core::commission::{compute_group_commission, due_date, group_items_by_store};
use plaza_core::{
    Commission, CommissionStatus, CoreError, Money, Notification, NotificationKind,
};

use crate::notify::{send_best_effort, NotificationSink};
use crate::pool::Database;
use crate::repository::commission::CommissionRepository;
use crate::repository::order::OrderRepository;
use crate::repository::plan::PlanRepository;
use crate::service::{ServiceError, ServiceResult};

/// Result of a commission calculation run.
#[derive(Debug)]
pub struct CalculationOutcome {
    /// Commissions created by this run (empty on a no-op).
    pub created: Vec<Commission>,
    /// Stores whose groups were skipped for lack of a plan.
    pub skipped_stores: Vec<String>,
    /// Sum of created commission amounts.
    pub total: Money,
    /// True when the order was already calculated and nothing was done.
    pub already_calculated: bool,
}

/// Service that creates (and recreates) an order's commissions.
#[derive(Clone)]
pub struct CommissionOrchestrator {
    db: Database,
    sink: Arc<dyn NotificationSink>,
}

impl CommissionOrchestrator {
    pub fn new(db: Database, sink: Arc<dyn NotificationSink>) -> Self {
        Self { db, sink }
    }

    /// Calculates commissions for a completed order.
    ///
    /// ## Idempotence
    /// A second invocation for the same order succeeds without writing
    /// anything (`already_calculated` is set on the outcome). Checkout
    /// retries therefore never duplicate commissions.
    #[instrument(skip(self))]
    pub async fn calculate_commissions(&self, order_id: &str) -> ServiceResult<CalculationOutcome> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let order = OrderRepository::get_tx(&mut tx, order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "Order",
                id: order_id.to_string(),
            })?;

        if order.commissions_calculated {
            info!(order_id, "Commissions already calculated, nothing to do");
            return Ok(CalculationOutcome {
                created: Vec::new(),
                skipped_stores: Vec::new(),
                total: order.commission_total(),
                already_calculated: true,
            });
        }

        let items = OrderRepository::items_tx(&mut tx, order_id).await?;
        if items.is_empty() {
            return Err(CoreError::EmptyOrder(order_id.to_string()).into());
        }

        let groups = group_items_by_store(items);

        let mut created = Vec::new();
        let mut skipped_stores = Vec::new();
        let mut notifications = Vec::new();
        let mut total = Money::zero();

        for group in &groups {
            let store = PlanRepository::store_tx(&mut tx, &group.store_id).await?;
            let plan =
                PlanRepository::current_plan_for_store_tx(&mut tx, &group.store_id).await?;

            let (store, plan) = match (store, plan) {
                (Some(store), Some(plan)) => (store, plan),
                _ => {
                    // No plan (or dangling store reference): skip the group,
                    // the rest of the order still settles.
                    warn!(
                        order_id,
                        store_id = %group.store_id,
                        "Store has no commission plan, skipping group"
                    );
                    skipped_stores.push(group.store_id.clone());
                    continue;
                }
            };

            let computed = compute_group_commission(group, plan.rate());

            let commission = Commission {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.to_string(),
                store_id: group.store_id.clone(),
                plan_id: plan.id.clone(),
                sale_amount_cents: computed.sale_amount.cents(),
                rate_bps: plan.commission_bps,
                commission_cents: computed.commission.cents(),
                status: CommissionStatus::Pending,
                due_date: due_date(now, plan.settlement_delay_days),
                paid_date: None,
                notes: None,
                created_at: now,
                updated_at: now,
            };

            CommissionRepository::insert_tx(&mut tx, &commission).await?;

            for line in &computed.lines {
                OrderRepository::write_line_commission(
                    &mut tx,
                    &line.item_id,
                    line.commission.cents(),
                    plan.commission_bps,
                )
                .await?;
            }

            total = total
                .checked_add(commission.amount())
                .ok_or(CoreError::AmountOverflow {
                    context: "order commission total",
                })?;

            notifications.push(Notification {
                user_id: store.owner_user_id,
                kind: NotificationKind::CommissionCreated,
                title: "Nueva comisión registrada".to_string(),
                message: format!(
                    "Comisión de {} ({}) sobre ventas de {}",
                    commission.amount(),
                    commission.rate(),
                    commission.sale_amount()
                ),
                reference_id: commission.id.clone(),
            });

            created.push(commission);
        }

        OrderRepository::set_commission_aggregate(&mut tx, order_id, total.cents(), now).await?;

        tx.commit().await.map_err(crate::error::DbError::from)?;

        info!(
            order_id,
            commissions = created.len(),
            skipped = skipped_stores.len(),
            total_cents = total.cents(),
            "Commissions calculated"
        );

        for notification in notifications {
            send_best_effort(self.sink.as_ref(), notification).await;
        }

        Ok(CalculationOutcome {
            created,
            skipped_stores,
            total,
            already_calculated: false,
        })
    }

    /// Deletes an order's commissions and calculates them afresh.
    ///
    /// ## Guard
    /// Refused while any of the order's commissions belongs to a
    /// non-cancelled settlement: recalculating under a live settlement would
    /// desynchronize its cached totals. Cancel the settlement first.
    #[instrument(skip(self))]
    pub async fn recalculate_commissions(
        &self,
        order_id: &str,
    ) -> ServiceResult<CalculationOutcome> {
        {
            let mut tx = self.db.begin().await?;

            let order = OrderRepository::get_tx(&mut tx, order_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound {
                    entity: "Order",
                    id: order_id.to_string(),
                })?;

            if CommissionRepository::order_linked_to_active_settlement_tx(&mut tx, order_id)
                .await?
            {
                return Err(ServiceError::InvalidState(format!(
                    "order {order_id} has commissions in an active settlement; \
                     cancel the settlement before recalculating"
                )));
            }

            let deleted = CommissionRepository::delete_for_order_tx(&mut tx, order_id).await?;

            if order.commissions_calculated {
                OrderRepository::reset_commission_fields(&mut tx, order_id).await?;
            }

            tx.commit().await.map_err(crate::error::DbError::from)?;

            info!(order_id, deleted, "Existing commissions cleared");
        }

        self.calculate_commissions(order_id).await
    }
}
