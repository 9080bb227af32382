//! # Repository Layer
//!
//! Row-level database access, one repository per aggregate.
//!
//! ## Conventions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Repository Conventions                              │
//! │                                                                         │
//! │  Read-only queries        → methods on the repository (use the pool)   │
//! │  Transactional mutations  → associated fns taking &mut SqliteConnection│
//! │                             (the SERVICE owns BEGIN/COMMIT)            │
//! │                                                                         │
//! │  Guarded UPDATEs: every state transition is written as                 │
//! │      UPDATE ... WHERE id = ? AND status = '<expected>'                 │
//! │  and the caller checks rows_affected() - a concurrent transition       │
//! │  loses the race instead of silently double-applying.                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No business rules live here: amounts, rounding, and legal transitions
//! are decided in `plaza-core` and the service layer.

pub mod commission;
pub mod order;
pub mod plan;
pub mod settlement;

pub use commission::CommissionRepository;
pub use order::OrderRepository;
pub use plan::PlanRepository;
pub use settlement::SettlementRepository;
