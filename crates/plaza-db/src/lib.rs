//! # plaza-db: Database and Service Layer for the Plaza Settlement Core
//!
//! SQLite persistence, transactional financial services, and the outbound
//! notification port.
//!
//! ## Layering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           plaza-db                                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  service/   CommissionOrchestrator · CommissionLedger ·         │   │
//! │  │             SettlementBatcher                                   │   │
//! │  │             (transactions, legality via plaza-core::state,      │   │
//! │  │              post-commit notifications)                         │   │
//! │  └───────────────────────────┬─────────────────────────────────────┘   │
//! │                              │                                          │
//! │  ┌───────────────────────────▼─────────────────────────────────────┐   │
//! │  │  repository/  plan · order · commission · settlement            │   │
//! │  │               (rows in/out, guarded UPDATEs, no business rules) │   │
//! │  └───────────────────────────┬─────────────────────────────────────┘   │
//! │                              │                                          │
//! │  ┌───────────────────────────▼─────────────────────────────────────┐   │
//! │  │  pool · migrations        SqlitePool, WAL, embedded schema      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  notify/  NotificationSink port (TracingSink, RecordingSink)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//! ```rust,ignore
//! use std::sync::Arc;
//! use plaza_db::{Database, DbConfig, TracingSink};
//!
//! let db = Database::new(DbConfig::new("./plaza.db")).await?;
//! let sink = Arc::new(TracingSink);
//!
//! let outcome = db.orchestrator(sink.clone())
//!     .calculate_commissions(&order_id)
//!     .await?;
//! ```

pub mod error;
pub mod migrations;
pub mod notify;
pub mod pool;
pub mod repository;
pub mod service;

// Re-exports: the surface most callers need.
pub use error::{DbError, DbResult};
pub use notify::{NotificationSink, NotifyError, RecordingSink, TracingSink};
pub use pool::{Database, DbConfig};
pub use repository::{
    CommissionRepository, OrderRepository, PlanRepository, SettlementRepository,
};
pub use service::batcher::SettlementBatcher;
pub use service::ledger::{CommissionLedger, GeneralStatistics, StoreCommissionSummary};
pub use service::orchestrator::{CalculationOutcome, CommissionOrchestrator};
pub use service::{ServiceError, ServiceResult};
