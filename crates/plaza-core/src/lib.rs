//! # plaza-core: Pure Business Logic for the Plaza Settlement Core
//!
//! This crate is the **heart** of the commission and settlement system.
//! It contains all financial rules as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Plaza Settlement Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Callers (checkout completion, admin actions,       │   │
//! │  │              scheduled jobs in plaza-jobs)                      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              plaza-db (services + repositories)                 │   │
//! │  │    CommissionOrchestrator · CommissionLedger · SettlementBatcher│   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ plaza-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │commission │  │   state   │  │   │
//! │  │   │Commission │  │   Money   │  │ grouping  │  │ lifecycle │  │   │
//! │  │   │Settlement │  │   Rate    │  │ rounding  │  │transitions│  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Commission, Settlement, plans, orders)
//! - [`money`] - Money and Rate types with integer arithmetic (no floats!)
//! - [`state`] - Commission/settlement state machines
//! - [`commission`] - Pure calculation and calendar-window math
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64), rates in
//!    basis points; rounding is half-up, applied once
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use plaza_core::money::{Money, Rate};
//!
//! // A $100.00 sale through a store on an 8% plan
//! let sale = Money::from_cents(10_000);
//! let commission = sale.apply_rate(Rate::from_bps(800));
//! assert_eq!(commission.cents(), 800); // $8.00
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod commission;
pub mod error;
pub mod money;
pub mod state;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use plaza_core::Money` instead of
// `use plaza_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Rate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Settlement delay applied when a plan does not specify one, in days.
///
/// ## Business Reason
/// A commission becomes due this many days after it is created; 30 days is
/// the marketplace default grace period for new/unconfigured plans.
pub const DEFAULT_SETTLEMENT_DELAY_DAYS: i64 = 30;

/// Grace period after a settlement's period end before the auto-processor
/// advances it from pending to processed, in days.
pub const SETTLEMENT_GRACE_DAYS: i64 = 7;

/// Prefix of every settlement document number ("liquidación").
pub const SETTLEMENT_NUMBER_PREFIX: &str = "LIQ";
