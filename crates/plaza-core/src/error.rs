//! # Error Types
//!
//! Domain-specific error types for plaza-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  plaza-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  plaza-db errors (separate crate)                                      │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── ServiceError     - Orchestrator/ledger/batcher failures           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (order id, store id, states)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Illegal state-machine transition.
    ///
    /// ## When This Occurs
    /// - Processing an already-processed settlement
    /// - Marking a cancelled settlement paid
    /// - Reverting a retained commission via settlement cancellation
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Order has no line items to calculate commissions from.
    #[error("Order {0} has no line items")]
    EmptyOrder(String),

    /// Monetary arithmetic overflowed i64 cents.
    ///
    /// ## When This Occurs
    /// Only with absurd inputs; commission math runs in i128 and checks
    /// the narrowing back to i64.
    #[error("Monetary amount overflow while computing {context}")]
    AmountOverflow { context: &'static str },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A date range where the start is after the end.
    #[error("invalid date range: {from} is after {to}")]
    InvalidDateRange { from: String, to: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidTransition {
            entity: "Settlement",
            from: "processed".to_string(),
            to: "processed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Settlement cannot move from processed to processed"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "store_id".to_string(),
        };
        assert_eq!(err.to_string(), "store_id is required");

        let err = ValidationError::InvalidDateRange {
            from: "2026-02-01".to_string(),
            to: "2026-01-01".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid date range: 2026-02-01 is after 2026-01-01"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "store_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
