//! # plaza-jobs: Scheduled Jobs for the Plaza Settlement Core
//!
//! Cron-driven batch work and the operator's settlement command.
//!
//! ## Jobs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Scheduled Jobs                                   │
//! │                                                                         │
//! │  weekly_summary (Mondays)                                              │
//! │    previous full week [Mon, Mon) → per-store commission count + sum    │
//! │    → WeeklyCommissionSummary notification (only when nonzero)          │
//! │                                                                         │
//! │  process_settlements (daily)                                           │
//! │    pending settlements with period_end + grace < now                   │
//! │    → SettlementBatcher::process (commissions become paid)              │
//! │                                                                         │
//! │  process_settlements --create (operator command)                       │
//! │    per verified store: batch pending commissions of the lookback       │
//! │    window into a settlement; --dry-run previews without writing        │
//! │                                                                         │
//! │  Failure isolation: one store/settlement failing is recorded in the    │
//! │  run report and the job moves on.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod processor;
pub mod report;
pub mod weekly;

pub use processor::{process_due_settlements, run_settlement_batch, BatchOptions};
pub use weekly::run_weekly_summary;
