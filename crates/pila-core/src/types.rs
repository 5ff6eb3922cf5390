//! # Domain Types
//!
//! Core domain types used throughout Pila.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   QueueEntry    │   │   Transaction   │   │   Settlement    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  customer_id    │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  token_number   │   │  amount_cents   │   │  txn_id (FK)    │       │
//! │  │  status         │   │  paid_cents     │   │  payment_mode   │       │
//! │  │  priority_score │   │  payment_status │   │  cashier_id     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  QueueStatus    │   │ PaymentStatus   │   │  PaymentMode    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Waiting        │   │  Unpaid         │   │  Cash           │       │
//! │  │  Serving        │   │  Partial        │   │  Gcash          │       │
//! │  │  Processing     │   │  Paid           │   │  Card           │       │
//! │  │  Completed      │   └─────────────────┘   │  Unspecified    │       │
//! │  │  Cancelled      │                         └─────────────────┘       │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## State Machine
//! ```text
//! Waiting ──► Serving ──► Processing ──► Completed
//!    │           │            │
//!    └───────────┴────────────┴────────► Cancelled
//!
//! Completed and Cancelled are absorbing: no transition ever leaves them.
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Queue Status
// =============================================================================

/// The status of a queue entry.
///
/// Transitions are validated by [`QueueStatus::can_transition_to`]; the
/// repository rejects anything else with `InvalidTransition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// In the queue, not yet called to a counter.
    Waiting,
    /// Called to a counter, customer being attended.
    Serving,
    /// Counter work done, request in back-office processing.
    Processing,
    /// Served to completion (terminal).
    Completed,
    /// Cancelled by staff with a recorded reason (terminal).
    Cancelled,
}

impl QueueStatus {
    /// True for the absorbing terminal states.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Cancelled)
    }

    /// True for states that count as "open" at the end of the day
    /// (the reset job must dispose of them).
    #[inline]
    pub const fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// ## Rules
    /// - Waiting → Serving | Cancelled
    /// - Serving → Processing | Completed | Cancelled
    /// - Processing → Completed | Cancelled
    /// - Completed / Cancelled → (nothing)
    pub const fn can_transition_to(&self, next: QueueStatus) -> bool {
        match (self, next) {
            (QueueStatus::Waiting, QueueStatus::Serving) => true,
            (QueueStatus::Serving, QueueStatus::Processing) => true,
            (QueueStatus::Serving, QueueStatus::Completed) => true,
            (QueueStatus::Processing, QueueStatus::Completed) => true,
            (QueueStatus::Waiting, QueueStatus::Cancelled) => true,
            (QueueStatus::Serving, QueueStatus::Cancelled) => true,
            (QueueStatus::Processing, QueueStatus::Cancelled) => true,
            _ => false,
        }
    }

    /// Lowercase string form, matching the database representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::Serving => "serving",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for QueueStatus {
    fn default() -> Self {
        QueueStatus::Waiting
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Aggregate payment state of a transaction.
///
/// Never stored independently: always re-derived from the settlement sum
/// at write time via [`PaymentStatus::derive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No settlements recorded yet.
    Unpaid,
    /// Some settlements recorded, balance outstanding.
    Partial,
    /// Settlements cover the full amount.
    Paid,
}

impl PaymentStatus {
    /// The pure function of `paid` vs `amount` that defines this enum.
    ///
    /// ## Example
    /// ```rust
    /// use pila_core::money::Money;
    /// use pila_core::types::PaymentStatus;
    ///
    /// let amount = Money::from_cents(100_000);
    /// assert_eq!(PaymentStatus::derive(Money::zero(), amount), PaymentStatus::Unpaid);
    /// assert_eq!(PaymentStatus::derive(Money::from_cents(40_000), amount), PaymentStatus::Partial);
    /// assert_eq!(PaymentStatus::derive(amount, amount), PaymentStatus::Paid);
    /// ```
    pub fn derive(paid: Money, amount: Money) -> PaymentStatus {
        if paid.is_zero() {
            PaymentStatus::Unpaid
        } else if paid < amount {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Paid
        }
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Unpaid
    }
}

// =============================================================================
// Payment Mode
// =============================================================================

/// How a settlement was paid.
///
/// A missing mode is recorded as `Unspecified` at write time rather than
/// silently defaulting to cash, so downstream aggregation is not biased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    /// Physical cash payment.
    Cash,
    /// GCash mobile wallet transfer.
    Gcash,
    /// Card payment on external terminal.
    Card,
    /// Mode was not supplied by the terminal; kept distinct for reporting.
    Unspecified,
}

impl PaymentMode {
    /// Maps an optional mode to its stored value; absence is `Unspecified`,
    /// never a silent cash default.
    pub fn from_optional(mode: Option<PaymentMode>) -> PaymentMode {
        mode.unwrap_or(PaymentMode::Unspecified)
    }
}

// =============================================================================
// Priority Flags
// =============================================================================

/// Priority eligibility flags captured at registration.
///
/// Flags are additive: a customer holding two flags outranks one holding a
/// single flag (see [`crate::priority::priority_score`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PriorityFlags {
    /// Senior citizen (60+) priority lane eligibility.
    #[serde(default)]
    pub senior_citizen: bool,
    /// Pregnant customer priority lane eligibility.
    #[serde(default)]
    pub pregnant: bool,
    /// Person with disability priority lane eligibility.
    #[serde(default)]
    pub pwd: bool,
}

impl PriorityFlags {
    /// True if any priority flag is set.
    pub const fn any(&self) -> bool {
        self.senior_citizen || self.pregnant || self.pwd
    }
}

// =============================================================================
// Queue Entry
// =============================================================================

/// One customer's position and state in today's service queue.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Customer identifier - unique across the active set.
    pub customer_id: String,

    /// Display name announced on the monitor.
    pub customer_name: String,

    /// Phone number for notification delivery (optional).
    pub phone: Option<String>,

    /// Token number, monotonically assigned per business day.
    pub token_number: i64,

    /// Local calendar date this entry belongs to.
    #[ts(as = "String")]
    pub business_day: NaiveDate,

    /// Priority eligibility flags.
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    #[serde(flatten)]
    pub flags: PriorityFlags,

    /// Computed priority score (≥ 0); 0 for regular customers.
    pub priority_score: i64,

    /// Manual override position set by staff reorder; None = automatic.
    pub manual_position: Option<i64>,

    /// Current state-machine status.
    pub status: QueueStatus,

    /// Counter currently attending this entry (Serving/Processing only).
    pub counter_id: Option<i64>,

    /// Mandatory audit reason, set when cancelled.
    pub cancel_reason: Option<String>,

    /// Monotonic per-entity revision, bumped on every mutation.
    /// Realtime observers deduplicate and order events by it.
    pub revision: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// When the entry was last called to a counter.
    #[ts(as = "Option<String>")]
    pub called_at: Option<DateTime<Utc>>,
    /// When the entry reached a terminal state.
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// Seconds the customer waited between registration and first call.
    /// None while still waiting.
    pub fn waited_secs(&self) -> Option<i64> {
        self.called_at
            .map(|called| (called - self.created_at).num_seconds().max(0))
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// One customer's billable order.
///
/// `paid_cents`, `balance_cents` and `payment_status` are stored for read
/// convenience but are always rewritten from the settlement sum inside the
/// same database transaction as a settlement insert - the settlements table
/// is the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Customer this order belongs to.
    pub customer_id: String,

    /// Fixed total, set at creation.
    pub amount_cents: i64,

    /// Sum of all settlements (invariant: never exceeds amount_cents).
    pub paid_cents: i64,

    /// amount_cents - paid_cents (invariant: never negative).
    pub balance_cents: i64,

    /// Pure function of paid vs amount (see [`PaymentStatus::derive`]).
    pub payment_status: PaymentStatus,

    /// Monotonic per-entity revision, bumped on every mutation.
    pub revision: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Returns the fixed total as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Returns the settled sum as Money.
    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    /// Returns the outstanding balance as Money.
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

// =============================================================================
// Settlement
// =============================================================================

/// One immutable payment event applied toward a transaction's balance.
///
/// Settlements form an append-only ledger: rows are never updated or
/// deleted, and the sum of a transaction's settlements equals its
/// `paid_cents` at all times.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    /// Unique identifier (UUID v4) - also the realtime dedup id.
    pub id: String,

    /// Transaction this settlement applies to.
    pub transaction_id: String,

    /// Amount settled, strictly positive.
    pub amount_cents: i64,

    /// How it was paid.
    pub payment_mode: PaymentMode,

    /// Staff member who recorded the payment (audit trail).
    pub cashier_id: String,

    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
}

impl Settlement {
    /// Returns the settled amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Daily Archive
// =============================================================================

/// One immutable snapshot row per business day, produced only by the
/// reset job.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DailyArchive {
    #[ts(as = "String")]
    pub business_day: NaiveDate,
    pub registered_count: i64,
    pub served_count: i64,
    pub cancelled_count: i64,
    /// Entries registered with at least one priority flag.
    pub priority_count: i64,
    /// Average registration→call wait; None if nothing was called.
    pub avg_wait_secs: Option<i64>,
    pub max_wait_secs: Option<i64>,
    /// Total settled that day across all payment modes.
    pub settled_cents: i64,
    #[ts(as = "String")]
    pub reset_at: DateTime<Utc>,
}

// =============================================================================
// Reset Run
// =============================================================================

/// Outcome of a reset execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ResetStatus {
    /// Lock held, steps executing.
    Running,
    /// All steps committed.
    Succeeded,
    /// A step failed; the run may be re-triggered by an operator.
    Failed,
}

/// The per-date reset lock and execution log row.
///
/// The unique constraint on `business_day` IS the lock (spec step 1):
/// duplicate timer fires hit the constraint and skip; a `Failed` row may
/// be taken over for retry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ResetRun {
    #[ts(as = "String")]
    pub business_day: NaiveDate,
    pub status: ResetStatus,
    pub entries_archived: i64,
    pub entries_cleared: i64,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub finished_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Reset Policy
// =============================================================================

/// What the reset job does with entries still open at day end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum ResetPolicy {
    /// Open entries are cancelled outright.
    Cancel,
    /// Open entries are closed with a carry-forward disposition; the
    /// customer re-registers next day and receives a fresh token.
    CarryForward,
}

impl ResetPolicy {
    /// The machine-readable disposition recorded as the cancel reason.
    pub const fn disposition_reason(&self) -> &'static str {
        match self {
            ResetPolicy::Cancel => "end_of_day_cancelled",
            ResetPolicy::CarryForward => "end_of_day_carry_forward",
        }
    }
}

impl std::str::FromStr for ResetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cancel" => Ok(ResetPolicy::Cancel),
            "carry-forward" | "carry_forward" => Ok(ResetPolicy::CarryForward),
            other => Err(format!("unknown reset policy: {other}")),
        }
    }
}

// =============================================================================
// Staff Identity
// =============================================================================

/// The already-authenticated staff actor attached to every mutation.
///
/// Authentication happens upstream; the core trusts this identity for
/// audit fields (`cashier_id`, reorder actor) and does not re-authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StaffIdentity {
    pub staff_id: String,
    pub role: String,
}

// =============================================================================
// Notification Intent
// =============================================================================

/// Message templates the counter emits; delivery content and transport
/// belong to the external notification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    /// "You are number {token} in the queue."
    TokenIssued,
    /// "Please proceed to counter {counter}."
    NowServing,
    /// "Your queue entry was cancelled: {reason}."
    EntryCancelled,
}

/// A notification-intent event: who, which template, and its parameters.
/// The core emits these; it does not perform delivery or know about
/// delivery success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NotificationIntent {
    pub customer_id: String,
    pub template: NotificationTemplate,
    pub params: BTreeMap<String, String>,
}

impl NotificationIntent {
    /// Builds an intent with a single parameter pair.
    pub fn with_param(
        customer_id: &str,
        template: NotificationTemplate,
        key: &str,
        value: impl Into<String>,
    ) -> Self {
        let mut params = BTreeMap::new();
        params.insert(key.to_string(), value.into());
        NotificationIntent {
            customer_id: customer_id.to_string(),
            template,
            params,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
