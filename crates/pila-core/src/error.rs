//! # Error Types
//!
//! Domain-specific error types for pila-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  pila-core errors (this file)                                          │
//! │  ├── QueueError       - Business rule rejections (stable codes)        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  pila-db errors (separate crate)                                       │
//! │  └── DbError          - Storage failures + Domain(QueueError)          │
//! │                                                                         │
//! │  queue-server errors (in app)                                          │
//! │  └── ApiError         - What collaborators see (serialized)            │
//! │                                                                         │
//! │  Flow: ValidationError → QueueError → DbError → ApiError → Caller      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (customer id, balance, etc.)
//! 3. Errors are enum variants, never String
//! 4. Every rejection carries a stable machine-readable code via [`QueueError::code`]
//!    so callers can branch without parsing messages

use thiserror::Error;

// =============================================================================
// Queue Error
// =============================================================================

/// Business rule rejections for queue and settlement operations.
///
/// All of these are recoverable and user-actionable: they are surfaced
/// verbatim to the calling collaborator with a stable code, and the core
/// never retries them on its own.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// The requested status change is not permitted by the state machine.
    ///
    /// ## When This Occurs
    /// - `call` on an entry that is already Serving
    /// - Any transition out of Completed or Cancelled (terminal states)
    #[error("Queue entry {customer_id} is {from}, cannot move to {to}")]
    InvalidTransition {
        customer_id: String,
        from: String,
        to: String,
    },

    /// The counter already holds an active (Serving/Processing) entry.
    ///
    /// ## When This Occurs
    /// - `call` targeting a counter that has not completed/cancelled its
    ///   current customer
    #[error("Counter {counter_id} already has an active customer")]
    CounterBusy { counter_id: i64 },

    /// A manual reorder list does not exactly match the active Waiting set.
    ///
    /// The whole reorder is rejected and no position changes.
    #[error("Reorder list does not match the waiting queue: {detail}")]
    InvalidReorderSet { detail: String },

    /// Settlement amount must be strictly positive.
    #[error("Invalid settlement amount: {amount_cents} cents")]
    InvalidAmount { amount_cents: i64 },

    /// Settlement amount exceeds the transaction's outstanding balance.
    ///
    /// The balance is always computed fresh inside the same transaction as
    /// the insert, so this check cannot race with a concurrent settlement.
    #[error("Settlement of {attempted_cents} cents exceeds balance of {balance_cents} cents")]
    Overpayment {
        balance_cents: i64,
        attempted_cents: i64,
    },

    /// Transaction does not exist.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Some other entity (queue entry, counter) does not exist.
    #[error("{entity} not found: {id}")]
    EntityNotFound { entity: String, id: String },

    /// The per-entity lock could not be acquired within the bounded timeout.
    ///
    /// Safe for the caller to retry with backoff after re-checking current
    /// state; the core never blocks a staff action indefinitely.
    #[error("Entity {key} is busy, try again")]
    Busy { key: String },

    /// A reset for this business day already ran (or is running).
    #[error("Reset already ran for {business_day}")]
    ResetAlreadyRan { business_day: String },

    /// A reset step failed; the run is recorded as failed and may be
    /// re-triggered by an operator.
    #[error("Reset for {business_day} failed: {reason}")]
    ResetFailed {
        business_day: String,
        reason: String,
    },

    /// Input validation failure (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl QueueError {
    /// Stable machine-readable code for this rejection.
    ///
    /// ## Contract
    /// These strings are part of the external interface: collaborators
    /// branch on them, so they never change once shipped.
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::InvalidTransition { .. } => "INVALID_TRANSITION",
            QueueError::CounterBusy { .. } => "COUNTER_BUSY",
            QueueError::InvalidReorderSet { .. } => "INVALID_REORDER_SET",
            QueueError::InvalidAmount { .. } => "INVALID_AMOUNT",
            QueueError::Overpayment { .. } => "OVERPAYMENT",
            QueueError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            QueueError::EntityNotFound { .. } => "ENTITY_NOT_FOUND",
            QueueError::Busy { .. } => "BUSY",
            QueueError::ResetAlreadyRan { .. } => "RESET_ALREADY_RAN",
            QueueError::ResetFailed { .. } => "RESET_FAILED",
            QueueError::Validation(_) => "VALIDATION_ERROR",
        }
    }

    /// True if the caller may retry the operation as-is (after re-checking
    /// current state). Only lock-timeout rejections qualify; everything else
    /// needs a different request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Busy { .. })
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when staff input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, Error)]
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

    /// Invalid format (e.g., invalid phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with QueueError.
pub type QueueResult<T> = Result<T, QueueError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = QueueError::Overpayment {
            balance_cents: 600,
            attempted_cents: 601,
        };
        assert_eq!(
            err.to_string(),
            "Settlement of 601 cents exceeds balance of 600 cents"
        );
    }

    #[test]
    fn test_stable_codes() {
        let cases: Vec<(QueueError, &str)> = vec![
            (
                QueueError::InvalidTransition {
                    customer_id: "c1".into(),
                    from: "serving".into(),
                    to: "serving".into(),
                },
                "INVALID_TRANSITION",
            ),
            (QueueError::CounterBusy { counter_id: 1 }, "COUNTER_BUSY"),
            (
                QueueError::InvalidAmount { amount_cents: 0 },
                "INVALID_AMOUNT",
            ),
            (
                QueueError::TransactionNotFound("t1".into()),
                "TRANSACTION_NOT_FOUND",
            ),
            (QueueError::Busy { key: "entry:c1".into() }, "BUSY"),
            (
                QueueError::ResetAlreadyRan {
                    business_day: "2026-08-07".into(),
                },
                "RESET_ALREADY_RAN",
            ),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_only_busy_is_retryable() {
        assert!(QueueError::Busy { key: "entry:c1".into() }.is_retryable());
        assert!(!QueueError::CounterBusy { counter_id: 2 }.is_retryable());
        assert!(!QueueError::InvalidAmount { amount_cents: -1 }.is_retryable());
    }

    #[test]
    fn test_validation_converts_to_queue_error() {
        let validation_err = ValidationError::Required {
            field: "customer_name".to_string(),
        };
        let queue_err: QueueError = validation_err.into();
        assert!(matches!(queue_err, QueueError::Validation(_)));
        assert_eq!(queue_err.code(), "VALIDATION_ERROR");
    }
}
