//! # Commission Calculation
//!
//! Pure commission math: grouping an order's line items by store, computing
//! per-store and per-line commission amounts, settlement-number formatting,
//! and the calendar-window arithmetic used by the scheduled jobs.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                Commission Calculation (pure part)                       │
//! │                                                                         │
//! │  Order line items                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  group_items_by_store()  ← BTreeMap keyed by store id, so iteration    │
//! │       │                    order is deterministic across runs          │
//! │       ▼                                                                 │
//! │  For each store group with a plan:                                     │
//! │    compute_group_commission(group, rate)                               │
//! │       ├── sale_amount  = Σ line subtotals                              │
//! │       ├── commission   = sale_amount × rate   (half-up, once)          │
//! │       └── per-line     = line_subtotal × rate (audit granularity;      │
//! │                          lines may not sum to the group total)         │
//! │                                                                         │
//! │  The I/O half (plan lookup, row writes, transaction) lives in          │
//! │  plaza-db's CommissionOrchestrator.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use std::collections::BTreeMap;

use crate::money::{Money, Rate};
use crate::types::OrderItem;

// =============================================================================
// Store Grouping
// =============================================================================

/// An order's line items for one store.
#[derive(Debug, Clone)]
pub struct StoreGroup {
    pub store_id: String,
    pub items: Vec<OrderItem>,
}

impl StoreGroup {
    /// Sum of line subtotals for this store within the order.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(OrderItem::subtotal).sum()
    }
}

/// Groups an order's line items by owning store, sorted by store id.
///
/// Sorting fixes the per-store processing order, which keeps commission
/// insertion order stable across runs (and makes tests deterministic).
pub fn group_items_by_store(items: Vec<OrderItem>) -> Vec<StoreGroup> {
    let mut by_store: BTreeMap<String, Vec<OrderItem>> = BTreeMap::new();
    for item in items {
        by_store.entry(item.store_id.clone()).or_default().push(item);
    }

    by_store
        .into_iter()
        .map(|(store_id, items)| StoreGroup { store_id, items })
        .collect()
}

// =============================================================================
// Commission Amounts
// =============================================================================

/// Per-line audit breakdown: the commission attributed to a single line.
#[derive(Debug, Clone)]
pub struct LineCommission {
    pub item_id: String,
    pub commission: Money,
}

/// The computed commission for one store group.
#[derive(Debug, Clone)]
pub struct GroupCommission {
    pub store_id: String,
    /// Gross sale amount: Σ line subtotals for this store.
    pub sale_amount: Money,
    /// Rate applied (snapshotted from the store's plan).
    pub rate: Rate,
    /// sale_amount × rate, half-up to the cent.
    pub commission: Money,
    /// Per-line breakdown (line_subtotal × rate each, half-up).
    pub lines: Vec<LineCommission>,
}

/// Computes the commission for one store group at the given rate.
///
/// The group commission is computed on the GROUP subtotal, not summed from
/// the per-line amounts; the per-line figures exist for audit traceability
/// and may differ from the group total by rounding.
pub fn compute_group_commission(group: &StoreGroup, rate: Rate) -> GroupCommission {
    let sale_amount = group.subtotal();
    let commission = sale_amount.apply_rate(rate);

    let lines = group
        .items
        .iter()
        .map(|item| LineCommission {
            item_id: item.id.clone(),
            commission: item.subtotal().apply_rate(rate),
        })
        .collect();

    GroupCommission {
        store_id: group.store_id.clone(),
        sale_amount,
        rate,
        commission,
        lines,
    }
}

/// Computes a commission's due date from its creation time and the plan's
/// settlement delay.
#[inline]
pub fn due_date(created_at: DateTime<Utc>, settlement_delay_days: i64) -> DateTime<Utc> {
    created_at + Duration::days(settlement_delay_days)
}

// =============================================================================
// Settlement Numbers
// =============================================================================

/// Formats a settlement document number: `LIQ-{store}-{YYYYMMDD}-{NNN}`.
///
/// The sequence is per store per day, 3-digit padded (widens past 999).
/// Uniqueness is enforced by the database, not by this formatter.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use plaza_core::commission::format_settlement_number;
///
/// let date = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();
/// assert_eq!(
///     format_settlement_number("tienda-7", date, 1),
///     "LIQ-tienda-7-20260823-001"
/// );
/// ```
pub fn format_settlement_number(store_id: &str, date: NaiveDate, sequence: u32) -> String {
    format!(
        "{}-{}-{}-{:03}",
        crate::SETTLEMENT_NUMBER_PREFIX,
        store_id,
        date.format("%Y%m%d"),
        sequence
    )
}

// =============================================================================
// Calendar Windows
// =============================================================================

/// Start of the current calendar month, UTC midnight.
///
/// The whole system runs on a single time zone (UTC); calendar boundaries
/// for statistics and weekly summaries follow it.
pub fn calendar_month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    // Day 1 exists in every month; fall back to today to stay total.
    let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    first.and_time(NaiveTime::MIN).and_utc()
}

/// The prior full calendar week as a half-open interval `[start, end)`.
///
/// Weeks start Monday, UTC midnight. Calling this on any moment of a week
/// returns the Monday-to-Monday span of the week before it.
pub fn previous_calendar_week(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let days_from_monday = today.weekday().num_days_from_monday() as i64;
    let this_monday = today - Duration::days(days_from_monday);
    let prev_monday = this_monday - Duration::days(7);

    (
        prev_monday.and_time(NaiveTime::MIN).and_utc(),
        this_monday.and_time(NaiveTime::MIN).and_utc(),
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(id: &str, store: &str, subtotal_cents: i64) -> OrderItem {
        OrderItem {
            id: id.to_string(),
            order_id: "o1".to_string(),
            store_id: store.to_string(),
            product_id: format!("prod-{id}"),
            name_snapshot: format!("Product {id}"),
            quantity: 1,
            unit_price_cents: subtotal_cents,
            subtotal_cents,
            commission_cents: None,
            commission_bps: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_grouping_is_sorted_by_store_id() {
        let groups = group_items_by_store(vec![
            item("i1", "store-b", 100),
            item("i2", "store-a", 200),
            item("i3", "store-b", 300),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].store_id, "store-a");
        assert_eq!(groups[1].store_id, "store-b");
        assert_eq!(groups[1].items.len(), 2);
        assert_eq!(groups[1].subtotal().cents(), 400);
    }

    #[test]
    fn test_two_store_order_scenario() {
        // Store A: 100.00 at 8% → 8.00; Store B: 200.00 at 5% → 10.00
        let groups = group_items_by_store(vec![
            item("a1", "store-a", 10_000),
            item("b1", "store-b", 20_000),
        ]);

        let a = compute_group_commission(&groups[0], Rate::from_bps(800));
        assert_eq!(a.sale_amount.cents(), 10_000);
        assert_eq!(a.commission.cents(), 800);
        assert_eq!(a.lines.len(), 1);
        assert_eq!(a.lines[0].commission.cents(), 800);

        let b = compute_group_commission(&groups[1], Rate::from_bps(500));
        assert_eq!(b.commission.cents(), 1000);

        let order_total = a.commission + b.commission;
        assert_eq!(order_total.cents(), 1800); // 18.00
    }

    #[test]
    fn test_per_line_breakdown_covers_every_line() {
        let groups = group_items_by_store(vec![
            item("i1", "store-a", 3_333),
            item("i2", "store-a", 6_667),
        ]);
        let result = compute_group_commission(&groups[0], Rate::from_bps(800));

        // Group commission computed on the group subtotal
        assert_eq!(result.sale_amount.cents(), 10_000);
        assert_eq!(result.commission.cents(), 800);

        // Per-line amounts are each rounded independently
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[0].commission.cents(), 267); // 266.64 → 267
        assert_eq!(result.lines[1].commission.cents(), 533); // 533.36 → 533
    }

    #[test]
    fn test_due_date() {
        let created = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let due = due_date(created, 30);
        assert_eq!(due, Utc.with_ymd_and_hms(2026, 8, 31, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_settlement_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(
            format_settlement_number("s-42", date, 7),
            "LIQ-s-42-20260105-007"
        );
        // Sequence widens past 999 instead of truncating
        assert_eq!(
            format_settlement_number("s-42", date, 1000),
            "LIQ-s-42-20260105-1000"
        );
    }

    #[test]
    fn test_calendar_month_start() {
        let now = Utc.with_ymd_and_hms(2026, 8, 23, 15, 30, 0).unwrap();
        assert_eq!(
            calendar_month_start(now),
            Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_previous_calendar_week() {
        // 2026-08-23 is a Sunday; the prior full week is Mon 10th .. Mon 17th
        let now = Utc.with_ymd_and_hms(2026, 8, 23, 9, 0, 0).unwrap();
        let (start, end) = previous_calendar_week(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 10, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 8, 17, 0, 0, 0).unwrap());

        // From a Monday, the window is the immediately preceding week
        let monday = Utc.with_ymd_and_hms(2026, 8, 17, 0, 0, 0).unwrap();
        let (start, end) = previous_calendar_week(monday);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 10, 0, 0, 0).unwrap());
        assert_eq!(end, monday);
    }
}
