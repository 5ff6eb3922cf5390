//! # Realtime Error Types
//!
//! Error types for the synchronizer.
//!
//! ## Scope
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The hub is intentionally hard to fail:                                 │
//! │                                                                         │
//! │  • publish() never errors - fire-and-forget by contract                 │
//! │  • per-observer socket problems end that observer's tasks, nothing     │
//! │    else                                                                 │
//! │                                                                         │
//! │  What's left is snapshot construction (database reads on subscribe)    │
//! │  and message serialization - those are the variants below.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Realtime synchronizer errors.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Snapshot read failed.
    #[error("Snapshot query failed: {0}")]
    Database(#[from] pila_db::DbError),

    /// Failed to serialize a protocol message.
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Internal channel closed unexpectedly.
    #[error("Channel error: {0}")]
    ChannelError(String),
}
