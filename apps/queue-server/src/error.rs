//! # API Error Type
//!
//! Unified error type for the HTTP API.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Error Flow in Pila                                  │
//! │                                                                         │
//! │  Terminal                     Rust Backend                              │
//! │  ────────                     ────────────                              │
//! │                                                                         │
//! │  POST /api/queue/{id}/call                                              │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Handler                                                         │  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │  Domain rejection? ── QueueError::CounterBusy ──┐                │  │
//! │  │         │                                       ▼                │  │
//! │  │  Storage failure?  ── DbError::QueryFailed ── ApiError ─────────►│  │
//! │  │         │             (logged, surfaced as INTERNAL -            │  │
//! │  │         ▼              NEVER silently swallowed)                 │  │
//! │  │  Success ───────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  ◄──── 409 { "code": "COUNTER_BUSY", "message": "Counter 1 ..." } ────  │
//! │                                                                         │
//! │  The terminal branches on `code`, shows `message` to staff, and        │
//! │  retries on its own judgement - the server never retries for it.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use pila_core::{QueueError, ValidationError};
use pila_db::DbError;
use pila_realtime::RealtimeError;

/// API error returned from handlers.
///
/// ## Serialization
/// This is what the calling collaborator receives when a command fails:
/// ```json
/// {
///   "code": "OVERPAYMENT",
///   "message": "Settlement of 601 cents exceeds balance of 600 cents"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable, stable error code for programmatic handling.
    pub code: String,

    /// Human-readable error message for display.
    pub message: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new("VALIDATION_ERROR", message)
    }

    /// Creates an unauthenticated error (missing forwarded identity).
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::new("UNAUTHENTICATED", message)
    }

    /// Creates an internal error with a generic message.
    pub fn internal() -> Self {
        ApiError::new("INTERNAL", "Internal server error")
    }

    /// HTTP status for this code.
    fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "VALIDATION_ERROR" | "INVALID_AMOUNT" | "INVALID_REORDER_SET" => {
                StatusCode::BAD_REQUEST
            }
            "UNAUTHENTICATED" => StatusCode::UNAUTHORIZED,
            "ENTITY_NOT_FOUND" | "TRANSACTION_NOT_FOUND" => StatusCode::NOT_FOUND,
            "INVALID_TRANSITION" | "COUNTER_BUSY" | "OVERPAYMENT" | "RESET_ALREADY_RAN" => {
                StatusCode::CONFLICT
            }
            "BUSY" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Converts domain rejections to API errors. The stable code from
/// [`QueueError::code`] passes through verbatim.
impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        ApiError::new(err.code(), err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Converts database errors to API errors.
///
/// Domain rejections keep their code; unexpected storage failures are
/// logged with full detail and surfaced as a generic internal error. A
/// swallowed failure here would mean money or queue position is silently
/// wrong, so every branch either carries the rejection or logs loudly.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(domain) => domain.into(),
            DbError::NotFound { entity, id } => ApiError::new(
                "ENTITY_NOT_FOUND",
                format!("{entity} not found: {id}"),
            ),
            DbError::UniqueViolation { field, value } => {
                ApiError::validation(format!("{field} '{value}' already exists"))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!(%message, "Foreign key violation");
                ApiError::validation("Invalid reference")
            }
            other => {
                tracing::error!(error = %other, "Storage failure");
                ApiError::internal()
            }
        }
    }
}

impl From<RealtimeError> for ApiError {
    fn from(err: RealtimeError) -> Self {
        tracing::error!(error = %err, "Realtime failure");
        ApiError::internal()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_codes_pass_through_verbatim() {
        let api: ApiError = QueueError::Overpayment {
            balance_cents: 600,
            attempted_cents: 601,
        }
        .into();
        assert_eq!(api.code, "OVERPAYMENT");
        assert_eq!(api.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_busy_maps_to_service_unavailable() {
        let api: ApiError = QueueError::Busy {
            key: "entry:c1".into(),
        }
        .into();
        assert_eq!(api.code, "BUSY");
        assert_eq!(api.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_storage_failures_become_generic_internal() {
        let api: ApiError = ApiError::from(DbError::QueryFailed("disk I/O error".into()));
        assert_eq!(api.code, "INTERNAL");
        // The SQL-level detail is logged, not leaked to the caller
        assert!(!api.message.contains("disk"));
    }

    #[test]
    fn test_not_found_status() {
        let api: ApiError = QueueError::TransactionNotFound("t1".into()).into();
        assert_eq!(api.status(), StatusCode::NOT_FOUND);
    }
}
