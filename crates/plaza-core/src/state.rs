//! # State Machines
//!
//! Central legal-transition checks for commission and settlement lifecycles.
//!
//! ## Lifecycles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Commission Lifecycle                                 │
//! │                                                                         │
//! │            ┌──────────────┐  settlement processed /                    │
//! │   create──►│   Pending    │  manual mark_paid                          │
//! │            │              │─────────────────────────►┌────────┐        │
//! │            └──┬───────────┘                          │  Paid  │        │
//! │               │       ▲  ▲ settlement cancelled      └───┬────┘        │
//! │      dispute  │       │  └───────────────────────────────┘            │
//! │               ▼       │ hold released                                  │
//! │            ┌──────────┴───┐                                            │
//! │            │   Retained   │                                            │
//! │            └──────────────┘                                            │
//! │                                                                         │
//! │                    Settlement Lifecycle                                 │
//! │                                                                         │
//! │   create──►Pending ──► Processed ──► Paid                              │
//! │               │            │           │                                │
//! │               └────────────┴───────────┴──► Cancelled  (terminal;      │
//! │                    reverts linked commissions to Pending)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why Central Enforcement
//! The source of truth for "what may follow what" lives HERE, not scattered
//! across callers. Repositories additionally guard their UPDATEs with a
//! `WHERE status = ...` clause, so a stale in-memory state can never
//! overwrite a concurrent transition.

use crate::error::{CoreError, CoreResult};
use crate::types::{CommissionStatus, SettlementStatus};

// =============================================================================
// Commission Transitions
// =============================================================================

impl CommissionStatus {
    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// `Paid → Pending` and `Retained → Pending` exist only as reverts
    /// driven by settlement cancellation / hold release; no other path
    /// leaves a terminal-looking state.
    pub fn can_transition_to(self, next: CommissionStatus) -> bool {
        use CommissionStatus::*;
        matches!(
            (self, next),
            (Pending, Paid) | (Pending, Retained) | (Paid, Pending) | (Retained, Pending)
        )
    }

    /// Checked transition: returns the new status or an error naming both
    /// states.
    pub fn transition_to(self, next: CommissionStatus) -> CoreResult<CommissionStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                entity: "Commission",
                from: format!("{self:?}").to_lowercase(),
                to: format!("{next:?}").to_lowercase(),
            })
        }
    }
}

// =============================================================================
// Settlement Transitions
// =============================================================================

impl SettlementStatus {
    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Any non-cancelled state may be cancelled; `Cancelled` is terminal.
    /// `mark_paid` requires `Processed` - that rule is enforced here, not
    /// left to callers.
    pub fn can_transition_to(self, next: SettlementStatus) -> bool {
        use SettlementStatus::*;
        match (self, next) {
            (Pending, Processed) => true,
            (Processed, Paid) => true,
            (Cancelled, _) => false,
            (_, Cancelled) => true,
            _ => false,
        }
    }

    /// Checked transition: returns the new status or an error naming both
    /// states.
    pub fn transition_to(self, next: SettlementStatus) -> CoreResult<SettlementStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                entity: "Settlement",
                from: format!("{self:?}").to_lowercase(),
                to: format!("{next:?}").to_lowercase(),
            })
        }
    }

    /// Whether this settlement still holds its linked commissions.
    ///
    /// A commission may belong to at most one NON-cancelled settlement at a
    /// time; cancelled settlements release their links back to the pool.
    #[inline]
    pub fn holds_links(self) -> bool {
        self != SettlementStatus::Cancelled
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
