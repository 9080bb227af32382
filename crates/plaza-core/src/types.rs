//! # Domain Types
//!
//! Core domain types for the Plaza settlement core.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CommissionPlan  │   │   Commission    │   │   Settlement    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  name           │   │  order+store FK │   │  number (LIQ-…) │       │
//! │  │  commission_bps │   │  rate snapshot  │   │  total_cents    │       │
//! │  │  delay_days     │   │  status         │   │  status         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐                            │
//! │  │CommissionStatus │   │ SettlementStatus │                            │
//! │  │  ─────────────  │   │  ──────────────  │                            │
//! │  │  Pending        │   │  Pending         │                            │
//! │  │  Paid           │   │  Processed       │                            │
//! │  │  Retained       │   │  Paid            │                            │
//! │  └─────────────────┘   │  Cancelled       │                            │
//! │                        └──────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Financial documents have:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business number: (settlement `number`) - human-readable, shown to operators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{Money, Rate};

// =============================================================================
// Commission Plan
// =============================================================================

/// A commission tier assigned to a store (e.g. "basico", "premium").
///
/// Reference data owned externally; the settlement core only reads it.
/// The plan's rate and delay are SNAPSHOTTED onto each commission at
/// calculation time, so later plan changes never rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CommissionPlan {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tier name, unique ("basico", "premium", "enterprise").
    pub name: String,

    /// Commission rate in basis points (800 = 8.00%). Always 0..=10000.
    pub commission_bps: u32,

    /// Days between commission creation and its due date.
    pub settlement_delay_days: i64,

    /// When the plan was created.
    pub created_at: DateTime<Utc>,
}

impl CommissionPlan {
    /// Returns the commission rate.
    #[inline]
    pub fn rate(&self) -> Rate {
        Rate::from_bps(self.commission_bps)
    }
}

// =============================================================================
// Store
// =============================================================================

/// A marketplace store. Owned externally; the settlement core reads the
/// store's plan assignment and verified flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Store {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The user who owns this store (notification recipient).
    pub owner_user_id: String,

    /// Display name.
    pub name: String,

    /// Whether the store passed marketplace verification.
    /// Scheduled jobs only act on verified stores.
    pub verified: bool,

    /// Current plan assignment. None means commissions are skipped for
    /// this store's order groups (logged as a warning, never an error).
    pub plan_id: Option<String>,

    /// When the store was created.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order
// =============================================================================

/// A purchase transaction, immutable once placed.
///
/// The settlement core only writes the three commission aggregate fields;
/// everything else is owned by checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub buyer_user_id: String,
    /// Order grand total in cents (owned by checkout, read-only here).
    pub total_cents: i64,
    /// Write-once flag: set when commission calculation commits.
    /// Guards against duplicate invocation from retried checkout flows.
    pub commissions_calculated: bool,
    /// Cached sum of all commission amounts for this order.
    pub commission_total_cents: i64,
    /// When commissions were calculated.
    pub commissions_calculated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Returns the cached commission total as Money.
    #[inline]
    pub fn commission_total(&self) -> Money {
        Money::from_cents(self.commission_total_cents)
    }
}

// =============================================================================
// Order Line Item
// =============================================================================

/// A line item in an order.
///
/// `store_id` is snapshotted from the product at order time, so the
/// settlement core never touches the product catalog. The two commission
/// fields are written back by the orchestrator for audit granularity finer
/// than the per-store total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    /// The store the product belongs to (frozen at order time).
    pub store_id: String,
    /// Product reference (catalog is out of scope here).
    pub product_id: String,
    /// Product name at order time (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    /// Unit price in cents at order time (frozen).
    pub unit_price_cents: i64,
    /// Line subtotal before commission (unit_price × quantity).
    pub subtotal_cents: i64,
    /// Commission attributed to this line (line_subtotal × rate, half-up).
    pub commission_cents: Option<i64>,
    /// Rate applied to this line, in basis points.
    pub commission_bps: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Returns the line subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Commission Status
// =============================================================================

/// Lifecycle state of a commission.
///
/// Legal transitions are enforced centrally in [`crate::state`]:
/// never mutate the status field without going through `transition_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    /// Awaiting settlement. Only pending commissions are batchable.
    Pending,
    /// Settled: the parent settlement was processed (or a manual override).
    Paid,
    /// Exceptional hold (e.g. dispute). Excluded from batching.
    Retained,
}

impl Default for CommissionStatus {
    fn default() -> Self {
        CommissionStatus::Pending
    }
}

// =============================================================================
// Settlement Status
// =============================================================================

/// Lifecycle state of a settlement batch.
///
/// Legal transitions are enforced centrally in [`crate::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    /// Created, commissions linked, not yet processed.
    Pending,
    /// Processed: every linked commission was marked paid.
    Processed,
    /// Payout recorded (bookkeeping only - no money movement here).
    Paid,
    /// Cancelled: every linked commission reverted to pending. Terminal.
    Cancelled,
}

impl Default for SettlementStatus {
    fn default() -> Self {
        SettlementStatus::Pending
    }
}

// =============================================================================
// Commission
// =============================================================================

/// The atomic financial record: the fee one store owes the marketplace for
/// one order's worth of sales through that store.
///
/// Invariant: exactly one Commission exists per (order, store) pair.
/// Recalculation deletes and recreates, never duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Commission {
    pub id: String,
    pub order_id: String,
    pub store_id: String,
    /// Plan used, snapshotted at calculation time.
    pub plan_id: String,
    /// Gross sale amount for this store within this order, in cents.
    pub sale_amount_cents: i64,
    /// Rate applied, snapshotted in basis points.
    pub rate_bps: u32,
    /// Computed amount: sale_amount × rate, half-up to the cent.
    pub commission_cents: i64,
    pub status: CommissionStatus,
    /// Due date = creation time + plan settlement delay.
    pub due_date: DateTime<Utc>,
    /// Stamped when the commission transitions to paid.
    pub paid_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Commission {
    /// Returns the commission amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.commission_cents)
    }

    /// Returns the gross sale amount as Money.
    #[inline]
    pub fn sale_amount(&self) -> Money {
        Money::from_cents(self.sale_amount_cents)
    }

    /// Returns the applied rate.
    #[inline]
    pub fn rate(&self) -> Rate {
        Rate::from_bps(self.rate_bps)
    }

    /// Whether this commission is overdue at `now`.
    ///
    /// Overdue = still pending AND past its due date. Evaluated at query
    /// time, never stored.
    #[inline]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == CommissionStatus::Pending && self.due_date < now
    }
}

// =============================================================================
// Settlement
// =============================================================================

/// A settlement batch: one store's pending commissions over a date range,
/// grouped for payout processing.
///
/// Invariant: `total_cents` and `order_count` are cached from the linked
/// commission set at creation time; any mutation of the linked set must
/// keep them consistent (in practice the set is immutable until cancel).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Settlement {
    pub id: String,
    pub store_id: String,
    /// Human-readable document number: LIQ-{store}-{YYYYMMDD}-{NNN}.
    /// Globally unique (enforced by the database).
    pub number: String,
    /// Sum of linked commission amounts, in cents.
    pub total_cents: i64,
    /// Count of distinct order ids among the linked commissions.
    pub order_count: i64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub status: SettlementStatus,
    /// Stamped by the pending → processed transition.
    pub processed_at: Option<DateTime<Utc>>,
    /// Stamped by the processed → paid transition.
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Settlement {
    /// Returns the settlement total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// The kind of event a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CommissionCreated,
    SettlementCreated,
    SettlementProcessed,
    SettlementPaid,
    WeeklyCommissionSummary,
}

/// A fire-and-forget message for the notification sink.
///
/// Delivery failures must never roll back financial state; the services
/// emit these AFTER their transaction commits and swallow sink errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient (the store owner).
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Id of the commission/settlement the notification refers to.
    pub reference_id: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn commission_with_due(due: DateTime<Utc>, status: CommissionStatus) -> Commission {
        let now = Utc::now();
        Commission {
            id: "c1".to_string(),
            order_id: "o1".to_string(),
            store_id: "s1".to_string(),
            plan_id: "p1".to_string(),
            sale_amount_cents: 10_000,
            rate_bps: 800,
            commission_cents: 800,
            status,
            due_date: due,
            paid_date: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_commission_overdue_only_when_pending_and_past_due() {
        let now = Utc::now();
        let past = now - Duration::days(1);
        let future = now + Duration::days(1);

        assert!(commission_with_due(past, CommissionStatus::Pending).is_overdue(now));
        assert!(!commission_with_due(future, CommissionStatus::Pending).is_overdue(now));
        assert!(!commission_with_due(past, CommissionStatus::Paid).is_overdue(now));
        assert!(!commission_with_due(past, CommissionStatus::Retained).is_overdue(now));
    }

    #[test]
    fn test_status_defaults() {
        assert_eq!(CommissionStatus::default(), CommissionStatus::Pending);
        assert_eq!(SettlementStatus::default(), SettlementStatus::Pending);
    }

    #[test]
    fn test_plan_rate() {
        let plan = CommissionPlan {
            id: "p1".to_string(),
            name: "premium".to_string(),
            commission_bps: 825,
            settlement_delay_days: 15,
            created_at: Utc::now(),
        };
        assert_eq!(plan.rate().bps(), 825);
    }
}
