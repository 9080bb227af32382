//! # Validation Module
//!
//! Input validation utilities for the settlement core.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (HTTP controller / CLI flag parsing)                  │
//! │  ├── Basic format checks                                               │
//! │  └── Immediate feedback                                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │  ├── Runs before any write                                             │
//! │  └── Rejected input never reaches a transaction                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (rate bounds, status values)                    │
//! │  ├── UNIQUE constraints (commission pair, settlement number)           │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use plaza_core::validation::validate_uuid;
///
/// assert!(validate_uuid("order_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("order_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a commission rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "commission_bps".to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

/// Validates a settlement delay in days.
///
/// ## Rules
/// - Must be non-negative (zero means due immediately)
pub fn validate_settlement_delay_days(days: i64) -> ValidationResult<()> {
    if days < 0 {
        return Err(ValidationError::OutOfRange {
            field: "settlement_delay_days".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates an amount in cents.
///
/// ## Rules
/// - Must be non-negative; zero is allowed (a free line still groups)
pub fn validate_amount_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Validates a settlement date range.
///
/// ## Rules
/// - `from` must not be after `to` (equal is allowed: a single-instant range
///   is pointless but harmless)
pub fn validate_date_range(from: DateTime<Utc>, to: DateTime<Utc>) -> ValidationResult<()> {
    if from > to {
        return Err(ValidationError::InvalidDateRange {
            from: from.to_rfc3339(),
            to: to.to_rfc3339(),
        });
    }

    Ok(())
}

// =============================================================================
// Text Validators
// =============================================================================

/// Validates operator-entered notes.
///
/// ## Rules
/// - Maximum 1000 characters (they end up on financial documents)
pub fn validate_notes(notes: &str) -> ValidationResult<()> {
    if notes.len() > 1000 {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: 1000,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
    }

    #[test]
    fn test_validate_rate_bps() {
        assert!(validate_rate_bps(0).is_ok());
        assert!(validate_rate_bps(800).is_ok());
        assert!(validate_rate_bps(10_000).is_ok());
        assert!(validate_rate_bps(10_001).is_err());
    }

    #[test]
    fn test_validate_settlement_delay_days() {
        assert!(validate_settlement_delay_days(0).is_ok());
        assert!(validate_settlement_delay_days(30).is_ok());
        assert!(validate_settlement_delay_days(-1).is_err());
    }

    #[test]
    fn test_validate_date_range() {
        let now = Utc::now();
        assert!(validate_date_range(now - Duration::days(7), now).is_ok());
        assert!(validate_date_range(now, now).is_ok());
        assert!(validate_date_range(now, now - Duration::days(1)).is_err());
    }

    #[test]
    fn test_validate_amount_cents() {
        assert!(validate_amount_cents("subtotal", 0).is_ok());
        assert!(validate_amount_cents("subtotal", 10_000).is_ok());
        assert!(validate_amount_cents("subtotal", -1).is_err());
    }

    #[test]
    fn test_validate_notes() {
        assert!(validate_notes("monthly payout").is_ok());
        assert!(validate_notes(&"x".repeat(1001)).is_err());
    }
}
