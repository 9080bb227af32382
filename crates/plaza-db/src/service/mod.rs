//! # Service Layer
//!
//! Transactional financial operations built on the repositories.
//!
//! ## Services
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Service Layer                                     │
//! │                                                                         │
//! │  CommissionOrchestrator   calculate / recalculate an order's           │
//! │                           commissions (one transaction per order)      │
//! │                                                                         │
//! │  CommissionLedger         store-facing queries, manual mark-paid,      │
//! │                           marketplace statistics                       │
//! │                                                                         │
//! │  SettlementBatcher        create / process / pay / cancel settlement   │
//! │                           batches                                      │
//! │                                                                         │
//! │  Pattern for every mutation:                                           │
//! │    validate → BEGIN → read → core decides → guarded writes → COMMIT    │
//! │    → best-effort notifications (after commit, never before)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod batcher;
pub mod ledger;
pub mod orchestrator;

#[cfg(test)]
mod tests;

use thiserror::Error;

use plaza_core::{CoreError, ValidationError};

use crate::error::DbError;

/// Errors surfaced by the service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The entity the operation targets does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation is illegal in the entity's current state
    /// (e.g. processing a cancelled settlement, recalculating a settled
    /// order).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A business rule from the core rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(CoreError::Validation(err))
    }
}

impl ServiceError {
    /// Maps a repository NotFound onto a service NotFound with a better
    /// entity name; passes every other error through.
    pub(crate) fn from_db_not_found(err: DbError, entity: &'static str, id: &str) -> Self {
        match err {
            DbError::NotFound { .. } => ServiceError::NotFound {
                entity,
                id: id.to_string(),
            },
            other => ServiceError::Db(other),
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
