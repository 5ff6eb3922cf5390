//! # pila-core: Pure Business Logic for Pila
//!
//! This crate is the **heart** of the Pila queue system. It contains all
//! business rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Pila Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Staff Terminals / Display Monitors / Dashboards        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP + WebSocket                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    queue-server (axum)                          │   │
//! │  │    register, call, complete, cancel, reorder, settle, ...      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ pila-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ priority  │  │ ordering  │  │ validation│  │   │
//! │  │   │ QueueEntry│  │  scoring  │  │comparator │  │   rules   │  │   │
//! │  │   │Transaction│  │           │  │           │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    pila-db (Database Layer)                     │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (QueueEntry, Transaction, Settlement, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`priority`] - Priority score computation from eligibility flags
//! - [`ordering`] - The queue-position comparator (read path, never stored)
//! - [`error`] - Domain error taxonomy with stable machine codes
//! - [`validation`] - Input validation rules
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use pila_core::priority::priority_score;
//! use pila_core::types::{PriorityFlags, QueueStatus};
//!
//! // A senior citizen with a PWD card: weights are additive
//! let flags = PriorityFlags {
//!     senior_citizen: true,
//!     pwd: true,
//!     ..Default::default()
//! };
//! assert_eq!(priority_score(&flags), 200);
//!
//! // The state machine is a pure rule set
//! assert!(QueueStatus::Waiting.can_transition_to(QueueStatus::Serving));
//! assert!(!QueueStatus::Completed.can_transition_to(QueueStatus::Serving));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod ordering;
pub mod priority;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use pila_core::Money` instead of
// `use pila_core::money::Money`

pub use error::{QueueError, QueueResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum customer display-name length.
///
/// ## Business Reason
/// Names are rendered on the display monitor; anything longer than this is
/// a data-entry mistake, not a name.
pub const MAX_CUSTOMER_NAME_LEN: usize = 120;

/// Maximum phone-number length (international format with separators).
pub const MAX_PHONE_LEN: usize = 20;

/// Maximum cancellation-reason length.
///
/// ## Business Reason
/// Reasons are audit records, not essays. Bounding them keeps the audit
/// view readable and the column small.
pub const MAX_CANCEL_REASON_LEN: usize = 500;

/// Token numbering restarts from this value after each daily reset.
pub const TOKEN_START: i64 = 1;
