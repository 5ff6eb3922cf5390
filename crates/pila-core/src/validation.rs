//! # Validation Module
//!
//! Input validation utilities for Pila.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Terminal frontend (TypeScript)                               │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate staff feedback                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: API handler (Rust)                                           │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE constraints (token numbers, active counter)                │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: Multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_CANCEL_REASON_LEN, MAX_CUSTOMER_NAME_LEN, MAX_PHONE_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a customer display name.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 120 characters
///
/// ## Example
/// ```rust
/// use pila_core::validation::validate_customer_name;
///
/// assert!(validate_customer_name("Maria Santos").is_ok());
/// assert!(validate_customer_name("   ").is_err());
/// ```
pub fn validate_customer_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "customer_name".to_string(),
        });
    }

    if name.len() > MAX_CUSTOMER_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "customer_name".to_string(),
            max: MAX_CUSTOMER_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

/// Validates an optional phone number for notification delivery.
///
/// ## Rules
/// - Absent/blank is fine (no notifications for this customer)
/// - Digits, spaces, `+` and `-` only
/// - Maximum 20 characters
pub fn validate_phone(phone: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(phone) = phone else {
        return Ok(None);
    };
    let phone = phone.trim();
    if phone.is_empty() {
        return Ok(None);
    }

    if phone.len() > MAX_PHONE_LEN {
        return Err(ValidationError::TooLong {
            field: "phone".to_string(),
            max: MAX_PHONE_LEN,
        });
    }

    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || c == '+' || c == '-' || c == ' ')
    {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits, spaces, '+' and '-'".to_string(),
        });
    }

    Ok(Some(phone.to_string()))
}

/// Validates a cancellation reason.
///
/// The reason is mandatory and persisted for audit: a cancelled entry with
/// no reason is unreviewable.
pub fn validate_cancel_reason(reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.len() > MAX_CANCEL_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_CANCEL_REASON_LEN,
        });
    }

    Ok(reason.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a counter identifier.
pub fn validate_counter_id(counter_id: i64) -> ValidationResult<i64> {
    if counter_id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "counter_id".to_string(),
        });
    }
    Ok(counter_id)
}

/// Validates a transaction amount at creation.
pub fn validate_transaction_amount(amount_cents: i64) -> ValidationResult<i64> {
    if amount_cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount_cents".to_string(),
        });
    }
    Ok(amount_cents)
}

// =============================================================================
// Unit Tests
// =============================================================================
