//! End-to-end service tests against an in-memory database.
//!
//! These exercise the full calculate → batch → process → pay/cancel flow
//! the way the scheduled jobs and admin actions drive it in production.

use chrono::{Duration, Utc};
use std::sync::Arc;

use plaza_core::{
    CommissionPlan, CommissionStatus, NotificationKind, Order, OrderItem, SettlementStatus, Store,
};

use crate::notify::RecordingSink;
use crate::pool::{Database, DbConfig};
use crate::service::ServiceError;

struct Fixture {
    db: Database,
    sink: Arc<RecordingSink>,
}

impl Fixture {
    async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Fixture {
            db,
            sink: Arc::new(RecordingSink::new()),
        }
    }

    async fn plan(&self, id: &str, bps: u32, delay_days: i64) {
        self.db
            .plans()
            .insert_plan(&CommissionPlan {
                id: id.to_string(),
                name: format!("plan-{id}"),
                commission_bps: bps,
                settlement_delay_days: delay_days,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    async fn store(&self, id: &str, plan_id: Option<&str>) {
        self.db
            .plans()
            .insert_store(&Store {
                id: id.to_string(),
                owner_user_id: format!("owner-{id}"),
                name: format!("Store {id}"),
                verified: true,
                plan_id: plan_id.map(String::from),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    /// Seeds an order with one line per (store, subtotal) pair.
    async fn order(&self, id: &str, lines: &[(&str, i64)]) {
        let total: i64 = lines.iter().map(|(_, cents)| cents).sum();
        self.db
            .orders()
            .insert(&Order {
                id: id.to_string(),
                buyer_user_id: "buyer-1".to_string(),
                total_cents: total,
                commissions_calculated: false,
                commission_total_cents: 0,
                commissions_calculated_at: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        for (n, (store_id, subtotal)) in lines.iter().enumerate() {
            self.db
                .orders()
                .insert_item(&OrderItem {
                    id: format!("{id}-item-{n}"),
                    order_id: id.to_string(),
                    store_id: store_id.to_string(),
                    product_id: format!("prod-{n}"),
                    name_snapshot: format!("Product {n}"),
                    quantity: 1,
                    unit_price_cents: *subtotal,
                    subtotal_cents: *subtotal,
                    commission_cents: None,
                    commission_bps: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
    }
}

// =============================================================================
// Commission Calculation
// =============================================================================

#[tokio::test]
async fn multi_store_order_creates_one_commission_per_store() {
    let f = Fixture::new().await;
    f.plan("p8", 800, 30).await;
    f.plan("p5", 500, 15).await;
    f.store("store-a", Some("p8")).await;
    f.store("store-b", Some("p5")).await;
    // Store A: 100.00 at 8%; Store B: 200.00 at 5%
    f.order("o1", &[("store-a", 10_000), ("store-b", 20_000)]).await;

    let orchestrator = f.db.orchestrator(f.sink.clone());
    let outcome = orchestrator.calculate_commissions("o1").await.unwrap();

    assert!(!outcome.already_calculated);
    assert_eq!(outcome.created.len(), 2);
    assert_eq!(outcome.total.cents(), 1_800); // 8.00 + 10.00

    // Deterministic ordering: store-a first
    assert_eq!(outcome.created[0].store_id, "store-a");
    assert_eq!(outcome.created[0].commission_cents, 800);
    assert_eq!(outcome.created[0].rate_bps, 800);
    assert_eq!(outcome.created[1].commission_cents, 1_000);

    // Order aggregate cached and flag set
    let order = f.db.orders().get("o1").await.unwrap();
    assert!(order.commissions_calculated);
    assert_eq!(order.commission_total_cents, 1_800);
    assert!(order.commissions_calculated_at.is_some());

    // One CommissionCreated notification per store owner
    let sent = f.sink.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent
        .iter()
        .all(|n| n.kind == NotificationKind::CommissionCreated));
}

#[tokio::test]
async fn calculation_is_idempotent() {
    let f = Fixture::new().await;
    f.plan("p8", 800, 30).await;
    f.store("store-a", Some("p8")).await;
    f.order("o1", &[("store-a", 10_000)]).await;

    let orchestrator = f.db.orchestrator(f.sink.clone());
    orchestrator.calculate_commissions("o1").await.unwrap();

    let second = orchestrator.calculate_commissions("o1").await.unwrap();
    assert!(second.already_calculated);
    assert!(second.created.is_empty());
    assert_eq!(second.total.cents(), 800);

    // Still exactly one commission row
    assert_eq!(f.db.commissions().for_order("o1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_order_is_rejected() {
    let f = Fixture::new().await;
    f.order("o1", &[]).await;

    let orchestrator = f.db.orchestrator(f.sink.clone());
    let err = orchestrator.calculate_commissions("o1").await.unwrap_err();
    assert!(matches!(err, ServiceError::Core(_)));

    // Nothing half-written
    let order = f.db.orders().get("o1").await.unwrap();
    assert!(!order.commissions_calculated);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let f = Fixture::new().await;
    let orchestrator = f.db.orchestrator(f.sink.clone());
    let err = orchestrator.calculate_commissions("nope").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "Order", .. }));
}

#[tokio::test]
async fn store_without_plan_is_skipped_but_order_completes() {
    let f = Fixture::new().await;
    f.plan("p8", 800, 30).await;
    f.store("store-a", Some("p8")).await;
    f.store("store-b", None).await; // no plan
    f.order("o1", &[("store-a", 10_000), ("store-b", 20_000)]).await;

    let orchestrator = f.db.orchestrator(f.sink.clone());
    let outcome = orchestrator.calculate_commissions("o1").await.unwrap();

    assert_eq!(outcome.created.len(), 1);
    assert_eq!(outcome.skipped_stores, vec!["store-b".to_string()]);
    assert_eq!(outcome.total.cents(), 800);

    // The order is still marked calculated: the skip is deliberate
    let order = f.db.orders().get("o1").await.unwrap();
    assert!(order.commissions_calculated);
    assert_eq!(order.commission_total_cents, 800);
}

#[tokio::test]
async fn line_audit_fields_are_written() {
    let f = Fixture::new().await;
    f.plan("p8", 800, 30).await;
    f.store("store-a", Some("p8")).await;
    f.order("o1", &[("store-a", 3_333), ("store-a", 6_667)]).await;

    let orchestrator = f.db.orchestrator(f.sink.clone());
    let outcome = orchestrator.calculate_commissions("o1").await.unwrap();

    // Group commission on the group subtotal
    assert_eq!(outcome.created[0].commission_cents, 800);

    let mut conn = f.db.pool().acquire().await.unwrap();
    let items = crate::repository::OrderRepository::items_tx(&mut conn, "o1")
        .await
        .unwrap();
    // Per-line amounts rounded independently (may not sum to the group total)
    assert_eq!(items[0].commission_cents, Some(267));
    assert_eq!(items[1].commission_cents, Some(533));
    assert_eq!(items[0].commission_bps, Some(800));
}

#[tokio::test]
async fn notification_failure_does_not_fail_calculation() {
    let f = Fixture::new().await;
    f.plan("p8", 800, 30).await;
    f.store("store-a", Some("p8")).await;
    f.order("o1", &[("store-a", 10_000)]).await;
    f.sink.set_failing(true);

    let orchestrator = f.db.orchestrator(f.sink.clone());
    let outcome = orchestrator.calculate_commissions("o1").await.unwrap();

    assert_eq!(outcome.created.len(), 1);
    let order = f.db.orders().get("o1").await.unwrap();
    assert!(order.commissions_calculated);
}

// =============================================================================
// Recalculation
// =============================================================================

#[tokio::test]
async fn recalculation_picks_up_plan_change() {
    let f = Fixture::new().await;
    f.plan("p8", 800, 30).await;
    f.plan("p10", 1_000, 30).await;
    f.store("store-a", Some("p8")).await;
    f.order("o1", &[("store-a", 10_000)]).await;

    let orchestrator = f.db.orchestrator(f.sink.clone());
    orchestrator.calculate_commissions("o1").await.unwrap();

    f.db.plans().set_store_plan("store-a", Some("p10")).await.unwrap();

    let outcome = orchestrator.recalculate_commissions("o1").await.unwrap();
    assert_eq!(outcome.created.len(), 1);
    assert_eq!(outcome.created[0].commission_cents, 1_000);
    assert_eq!(outcome.created[0].rate_bps, 1_000);

    // Still one row per (order, store)
    assert_eq!(f.db.commissions().for_order("o1").await.unwrap().len(), 1);
    let order = f.db.orders().get("o1").await.unwrap();
    assert_eq!(order.commission_total_cents, 1_000);
}

#[tokio::test]
async fn recalculation_blocked_by_active_settlement_until_cancel() {
    let f = Fixture::new().await;
    f.plan("p8", 800, 30).await;
    f.store("store-a", Some("p8")).await;
    f.order("o1", &[("store-a", 10_000)]).await;

    let orchestrator = f.db.orchestrator(f.sink.clone());
    let batcher = f.db.batcher(f.sink.clone());
    orchestrator.calculate_commissions("o1").await.unwrap();

    let now = Utc::now();
    let settlement = batcher
        .create_automatic_settlement(
            "store-a",
            now - Duration::days(1),
            now + Duration::days(1),
            None,
        )
        .await
        .unwrap()
        .expect("settlement created");

    // Linked to an active settlement: recalculation must refuse
    let err = orchestrator.recalculate_commissions("o1").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // After cancelling the settlement, recalculation succeeds
    batcher.cancel(&settlement.id, "wrong period").await.unwrap();
    let outcome = orchestrator.recalculate_commissions("o1").await.unwrap();
    assert_eq!(outcome.created.len(), 1);
}

// =============================================================================
// Settlement Creation
// =============================================================================

#[tokio::test]
async fn settlement_conserves_totals_and_counts_distinct_orders() {
    let f = Fixture::new().await;
    f.plan("p10", 1_000, 30).await;
    f.store("store-a", Some("p10")).await;
    // Three orders: 80.00, 100.00, 120.00 at 10%
    // → pending commissions of 8.00, 10.00, 12.00
    f.order("o1", &[("store-a", 8_000)]).await;
    f.order("o2", &[("store-a", 10_000)]).await;
    f.order("o3", &[("store-a", 12_000)]).await;

    let orchestrator = f.db.orchestrator(f.sink.clone());
    let batcher = f.db.batcher(f.sink.clone());
    for order_id in ["o1", "o2", "o3"] {
        orchestrator.calculate_commissions(order_id).await.unwrap();
    }

    let now = Utc::now();
    let settlement = batcher
        .create_automatic_settlement(
            "store-a",
            now - Duration::days(30),
            now + Duration::days(1),
            Some("monthly batch".to_string()),
        )
        .await
        .unwrap()
        .expect("settlement created");

    assert_eq!(settlement.total_cents, 3_000); // 30.00
    assert_eq!(settlement.order_count, 3);
    assert_eq!(settlement.status, SettlementStatus::Pending);
    assert!(settlement.number.starts_with("LIQ-store-a-"));
    assert!(settlement.number.ends_with("-001"));

    let linked = f.db.settlements().commissions_for(&settlement.id).await.unwrap();
    assert_eq!(linked.len(), 3);
    assert_eq!(
        linked.iter().map(|c| c.commission_cents).sum::<i64>(),
        settlement.total_cents
    );

    // SettlementCreated notification went to the owner
    assert!(f
        .sink
        .sent()
        .iter()
        .any(|n| n.kind == NotificationKind::SettlementCreated
            && n.user_id == "owner-store-a"));
}

#[tokio::test]
async fn no_batchable_commissions_yields_none() {
    let f = Fixture::new().await;
    f.store("store-a", None).await;

    let batcher = f.db.batcher(f.sink.clone());
    let now = Utc::now();
    let result = batcher
        .create_automatic_settlement("store-a", now - Duration::days(30), now, None)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn batched_commissions_are_not_batched_twice() {
    let f = Fixture::new().await;
    f.plan("p10", 1_000, 30).await;
    f.store("store-a", Some("p10")).await;
    f.order("o1", &[("store-a", 10_000)]).await;

    let orchestrator = f.db.orchestrator(f.sink.clone());
    let batcher = f.db.batcher(f.sink.clone());
    orchestrator.calculate_commissions("o1").await.unwrap();

    let now = Utc::now();
    let from = now - Duration::days(1);
    let to = now + Duration::days(1);

    batcher
        .create_automatic_settlement("store-a", from, to, None)
        .await
        .unwrap()
        .expect("first settlement");

    // Same window again: the commission is already held
    let second = batcher
        .create_automatic_settlement("store-a", from, to, None)
        .await
        .unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn sequence_increments_within_a_day() {
    let f = Fixture::new().await;
    f.plan("p10", 1_000, 30).await;
    f.store("store-a", Some("p10")).await;
    f.order("o1", &[("store-a", 10_000)]).await;
    f.order("o2", &[("store-a", 20_000)]).await;

    let orchestrator = f.db.orchestrator(f.sink.clone());
    let batcher = f.db.batcher(f.sink.clone());
    orchestrator.calculate_commissions("o1").await.unwrap();

    let now = Utc::now();
    let first = batcher
        .create_automatic_settlement("store-a", now - Duration::days(1), now + Duration::days(1), None)
        .await
        .unwrap()
        .unwrap();

    orchestrator.calculate_commissions("o2").await.unwrap();
    let second = batcher
        .create_automatic_settlement("store-a", now - Duration::days(1), now + Duration::days(1), None)
        .await
        .unwrap()
        .unwrap();

    assert!(first.number.ends_with("-001"));
    assert!(second.number.ends_with("-002"));
}

#[tokio::test]
async fn inverted_date_range_is_rejected() {
    let f = Fixture::new().await;
    f.store("store-a", None).await;

    let batcher = f.db.batcher(f.sink.clone());
    let now = Utc::now();
    let err = batcher
        .create_automatic_settlement("store-a", now, now - Duration::days(1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Core(_)));
}

// =============================================================================
// Settlement Lifecycle
// =============================================================================

async fn settled_fixture() -> (Fixture, plaza_core::Settlement) {
    let f = Fixture::new().await;
    f.plan("p10", 1_000, 30).await;
    f.store("store-a", Some("p10")).await;
    f.order("o1", &[("store-a", 10_000)]).await;

    f.db.orchestrator(f.sink.clone())
        .calculate_commissions("o1")
        .await
        .unwrap();

    let now = Utc::now();
    let settlement = f
        .db
        .batcher(f.sink.clone())
        .create_automatic_settlement("store-a", now - Duration::days(1), now + Duration::days(1), None)
        .await
        .unwrap()
        .unwrap();

    (f, settlement)
}

#[tokio::test]
async fn processing_pays_linked_commissions() {
    let (f, settlement) = settled_fixture().await;
    let batcher = f.db.batcher(f.sink.clone());

    let processed = batcher.process(&settlement.id).await.unwrap();
    assert_eq!(processed.status, SettlementStatus::Processed);
    assert!(processed.processed_at.is_some());

    let linked = f.db.settlements().commissions_for(&settlement.id).await.unwrap();
    assert!(linked
        .iter()
        .all(|c| c.status == CommissionStatus::Paid && c.paid_date.is_some()));

    // Processing twice is an illegal transition
    let err = batcher.process(&settlement.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Core(_)));
}

#[tokio::test]
async fn mark_paid_requires_processed() {
    let (f, settlement) = settled_fixture().await;
    let batcher = f.db.batcher(f.sink.clone());

    // Straight to paid: rejected
    let err = batcher.mark_paid(&settlement.id, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::Core(_)));

    batcher.process(&settlement.id).await.unwrap();
    let paid = batcher
        .mark_paid(&settlement.id, Some("transferencia 1234".to_string()))
        .await
        .unwrap();
    assert_eq!(paid.status, SettlementStatus::Paid);
    assert!(paid.paid_at.is_some());
    assert_eq!(paid.notes.as_deref(), Some("transferencia 1234"));

    assert!(f
        .sink
        .sent()
        .iter()
        .any(|n| n.kind == NotificationKind::SettlementPaid));
}

#[tokio::test]
async fn cancel_after_processing_restores_pending_commissions() {
    let (f, settlement) = settled_fixture().await;
    let batcher = f.db.batcher(f.sink.clone());

    batcher.process(&settlement.id).await.unwrap();
    let cancelled = batcher
        .cancel(&settlement.id, "amount disputed")
        .await
        .unwrap();
    assert_eq!(cancelled.status, SettlementStatus::Cancelled);
    assert!(cancelled
        .notes
        .as_deref()
        .unwrap()
        .contains("Cancelado: amount disputed"));

    // Linked commissions are pending again with no paid date
    let linked = f.db.settlements().commissions_for(&settlement.id).await.unwrap();
    assert!(linked
        .iter()
        .all(|c| c.status == CommissionStatus::Pending && c.paid_date.is_none()));

    // Cancelled is terminal
    let err = batcher.process(&settlement.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Core(_)));

    // The released commission is batchable again
    let now = Utc::now();
    let rebatched = batcher
        .create_automatic_settlement("store-a", now - Duration::days(1), now + Duration::days(1), None)
        .await
        .unwrap()
        .expect("rebatch after cancel");
    assert_eq!(rebatched.total_cents, settlement.total_cents);
    assert!(rebatched.number.ends_with("-002"));
}

// =============================================================================
// Ledger
// =============================================================================

#[tokio::test]
async fn summary_and_manual_mark_paid() {
    let f = Fixture::new().await;
    f.plan("p10", 1_000, 30).await;
    f.store("store-a", Some("p10")).await;
    f.order("o1", &[("store-a", 10_000)]).await;
    f.order("o2", &[("store-a", 20_000)]).await;

    let orchestrator = f.db.orchestrator(f.sink.clone());
    orchestrator.calculate_commissions("o1").await.unwrap();
    orchestrator.calculate_commissions("o2").await.unwrap();

    let ledger = f.db.ledger();
    let summary = ledger.summary_for_store("store-a", None, None).await.unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.total_amount.cents(), 3_000);
    assert_eq!(summary.pending_count, 2);
    assert_eq!(summary.paid_count, 0);
    assert_eq!(summary.average_amount.cents(), 1_500);

    // Manually pay one
    let pending = ledger.pending_for_store("store-a").await.unwrap();
    let paid = ledger.mark_paid(&pending[0].id).await.unwrap();
    assert_eq!(paid.status, CommissionStatus::Paid);
    assert!(paid.paid_date.is_some());

    // Paying it again is an illegal transition
    let err = ledger.mark_paid(&paid.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Core(_)));

    let summary = ledger.summary_for_store("store-a", None, None).await.unwrap();
    assert_eq!(summary.pending_count, 1);
    assert_eq!(summary.paid_count, 1);
}

#[tokio::test]
async fn general_statistics_reflect_activity() {
    let f = Fixture::new().await;
    f.plan("p10", 1_000, 30).await;
    f.store("store-a", Some("p10")).await;
    f.store("store-b", Some("p10")).await;
    f.order("o1", &[("store-a", 10_000), ("store-b", 5_000)]).await;

    let orchestrator = f.db.orchestrator(f.sink.clone());
    let batcher = f.db.batcher(f.sink.clone());
    orchestrator.calculate_commissions("o1").await.unwrap();

    let now = Utc::now();
    batcher
        .create_automatic_settlement("store-a", now - Duration::days(1), now + Duration::days(1), None)
        .await
        .unwrap()
        .unwrap();

    let stats = f.db.ledger().general_statistics().await.unwrap();
    assert_eq!(stats.commissions_this_month, 2);
    assert_eq!(stats.commissions_pending, 2);
    assert_eq!(stats.commissions_overdue, 0);
    assert_eq!(stats.pending_settlements, 1);
    assert_eq!(stats.stores_with_commissions, 2);
}
