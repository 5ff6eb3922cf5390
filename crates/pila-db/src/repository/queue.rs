//! # Queue Repository
//!
//! Database operations for queue entries: registration, the staff-action
//! state machine, manual reordering, and the active-queue read path.
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Queue Entry Lifecycle                             │
//! │                                                                         │
//! │  1. REGISTER                                                           │
//! │     └── register() → token claimed from token_counters in the SAME     │
//! │                      transaction as the insert → { status: Waiting }   │
//! │                                                                         │
//! │  2. CALL TO COUNTER                                                    │
//! │     └── call(customer, counter) → { status: Serving, counter_id }      │
//! │         Fails CounterBusy if the counter still holds an active entry   │
//! │                                                                         │
//! │  3. BACK-OFFICE WORK (optional)                                        │
//! │     └── mark_processing() → { status: Processing }                     │
//! │                                                                         │
//! │  4. FINISH                                                             │
//! │     └── complete() → { status: Completed }, counter released           │
//! │     └── cancel(reason) → { status: Cancelled }, reason persisted       │
//! │                                                                         │
//! │  Every mutation is one write transaction: load → validate against      │
//! │  the pila-core state machine → mutate → revision + 1.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use pila_core::ordering::sort_waiting;
use pila_core::priority::priority_score;
use pila_core::validation::{
    validate_counter_id, validate_cancel_reason, validate_customer_name, validate_phone,
};
use pila_core::{PriorityFlags, QueueEntry, QueueError, QueueStatus, StaffIdentity};

/// Column list shared by every entry SELECT so FromRow decoding stays in
/// one shape.
const ENTRY_COLUMNS: &str = "id, customer_id, customer_name, phone, token_number, business_day, \
     senior_citizen, pregnant, pwd, priority_score, manual_position, status, \
     counter_id, cancel_reason, revision, created_at, updated_at, called_at, completed_at";

// =============================================================================
// Inputs
// =============================================================================

/// Registration request captured at the front desk.
#[derive(Debug, Clone)]
pub struct RegisterCustomer {
    pub customer_name: String,
    pub phone: Option<String>,
    pub flags: PriorityFlags,
}

// =============================================================================
// Queue Repository
// =============================================================================

/// Repository for queue entry database operations.
#[derive(Clone)]
pub struct QueueRepository {
    db: Database,
}

impl QueueRepository {
    /// Creates a new QueueRepository.
    pub fn new(db: Database) -> Self {
        QueueRepository { db }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a customer into today's queue.
    ///
    /// ## What This Does
    /// 1. Validates the input (name, phone)
    /// 2. Computes the priority score from the eligibility flags
    /// 3. Claims the next token number by read-and-incrementing the
    ///    persisted counter row **inside the same transaction** as the
    ///    entry insert - a crashed registration never burns a token
    pub async fn register(
        &self,
        input: RegisterCustomer,
        business_day: NaiveDate,
    ) -> DbResult<QueueEntry> {
        let customer_name = validate_customer_name(&input.customer_name).map_err(QueueError::from)?;
        let phone = validate_phone(input.phone.as_deref()).map_err(QueueError::from)?;

        let score = priority_score(&input.flags);
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let customer_id = Uuid::new_v4().to_string();

        let mut wtx = self.db.begin_write().await?;

        // Claim the token: the counter row is the only source of token
        // numbers, so two concurrent registrations can never collide
        let token_number: i64 = sqlx::query_scalar(
            "UPDATE token_counters SET next_token = next_token + 1 \
             WHERE id = 1 RETURNING next_token - 1",
        )
        .fetch_one(wtx.conn())
        .await?;

        let entry = QueueEntry {
            id,
            customer_id: customer_id.clone(),
            customer_name,
            phone,
            token_number,
            business_day,
            flags: input.flags,
            priority_score: score,
            manual_position: None,
            status: QueueStatus::Waiting,
            counter_id: None,
            cancel_reason: None,
            revision: 0,
            created_at: now,
            updated_at: now,
            called_at: None,
            completed_at: None,
        };

        sqlx::query(
            "INSERT INTO queue_entries ( \
                id, customer_id, customer_name, phone, token_number, business_day, \
                senior_citizen, pregnant, pwd, priority_score, manual_position, status, \
                counter_id, cancel_reason, revision, created_at, updated_at, called_at, completed_at \
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.customer_id)
        .bind(&entry.customer_name)
        .bind(&entry.phone)
        .bind(entry.token_number)
        .bind(entry.business_day)
        .bind(entry.flags.senior_citizen)
        .bind(entry.flags.pregnant)
        .bind(entry.flags.pwd)
        .bind(entry.priority_score)
        .bind(entry.manual_position)
        .bind(entry.status)
        .bind(entry.counter_id)
        .bind(&entry.cancel_reason)
        .bind(entry.revision)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .bind(entry.called_at)
        .bind(entry.completed_at)
        .execute(wtx.conn())
        .await?;

        wtx.commit().await?;

        info!(
            customer_id = %entry.customer_id,
            token_number = entry.token_number,
            priority_score = entry.priority_score,
            "Customer registered"
        );

        Ok(entry)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an entry by customer id.
    pub async fn get_by_customer(&self, customer_id: &str) -> DbResult<Option<QueueEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM queue_entries WHERE customer_id = ?");
        let entry = sqlx::query_as::<_, QueueEntry>(&sql)
            .bind(customer_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(entry)
    }

    /// Gets an entry by customer id, failing with `EntityNotFound` if absent.
    pub async fn require(&self, customer_id: &str) -> DbResult<QueueEntry> {
        self.get_by_customer(customer_id).await?.ok_or_else(|| {
            DbError::Domain(QueueError::EntityNotFound {
                entity: "QueueEntry".to_string(),
                id: customer_id.to_string(),
            })
        })
    }

    /// Lists the active Waiting set in queue order.
    ///
    /// Position is computed here on the read path (manual positions first,
    /// then priority score desc, then FIFO), never stored.
    pub async fn list_active(&self) -> DbResult<Vec<QueueEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM queue_entries WHERE status = 'waiting'");
        let mut entries = sqlx::query_as::<_, QueueEntry>(&sql)
            .fetch_all(self.db.pool())
            .await?;
        sort_waiting(&mut entries);
        Ok(entries)
    }

    // =========================================================================
    // State Machine Mutations
    // =========================================================================

    /// Calls a Waiting customer to a counter.
    ///
    /// ## Failure Modes
    /// - `InvalidTransition` - entry is not Waiting
    /// - `CounterBusy` - the counter already holds a Serving/Processing
    ///   entry. Checked inside the transaction, and backstopped by the
    ///   partial unique index `idx_queue_active_counter`
    pub async fn call(
        &self,
        customer_id: &str,
        counter_id: i64,
        staff: &StaffIdentity,
    ) -> DbResult<QueueEntry> {
        let counter_id = validate_counter_id(counter_id).map_err(QueueError::from)?;
        let now = Utc::now();

        let mut wtx = self.db.begin_write().await?;

        let entry = fetch_entry(wtx.conn(), customer_id)
            .await?
            .ok_or_else(|| entity_not_found(customer_id))?;

        ensure_transition(&entry, QueueStatus::Serving)?;

        let occupied: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM queue_entries \
             WHERE counter_id = ? AND status IN ('serving', 'processing')",
        )
        .bind(counter_id)
        .fetch_one(wtx.conn())
        .await?;

        if occupied > 0 {
            return Err(DbError::Domain(QueueError::CounterBusy { counter_id }));
        }

        sqlx::query(
            "UPDATE queue_entries \
             SET status = 'serving', counter_id = ?, called_at = ?, updated_at = ?, \
                 revision = revision + 1 \
             WHERE customer_id = ?",
        )
        .bind(counter_id)
        .bind(now)
        .bind(now)
        .bind(customer_id)
        .execute(wtx.conn())
        .await
        .map_err(|e| {
            if DbError::violates_index(&e, "idx_queue_active_counter") {
                DbError::Domain(QueueError::CounterBusy { counter_id })
            } else {
                DbError::from(e)
            }
        })?;

        let updated = fetch_entry(wtx.conn(), customer_id)
            .await?
            .ok_or_else(|| entity_not_found(customer_id))?;

        wtx.commit().await?;

        info!(
            customer_id = %customer_id,
            counter_id = counter_id,
            token_number = updated.token_number,
            staff_id = %staff.staff_id,
            "Customer called to counter"
        );

        Ok(updated)
    }

    /// Moves a Serving entry into back-office Processing.
    pub async fn mark_processing(
        &self,
        customer_id: &str,
        staff: &StaffIdentity,
    ) -> DbResult<QueueEntry> {
        let now = Utc::now();
        let mut wtx = self.db.begin_write().await?;

        let entry = fetch_entry(wtx.conn(), customer_id)
            .await?
            .ok_or_else(|| entity_not_found(customer_id))?;

        ensure_transition(&entry, QueueStatus::Processing)?;

        sqlx::query(
            "UPDATE queue_entries \
             SET status = 'processing', updated_at = ?, revision = revision + 1 \
             WHERE customer_id = ?",
        )
        .bind(now)
        .bind(customer_id)
        .execute(wtx.conn())
        .await?;

        let updated = fetch_entry(wtx.conn(), customer_id)
            .await?
            .ok_or_else(|| entity_not_found(customer_id))?;

        wtx.commit().await?;

        debug!(customer_id = %customer_id, staff_id = %staff.staff_id, "Entry marked processing");
        Ok(updated)
    }

    /// Completes a Serving/Processing entry and releases its counter.
    pub async fn complete(
        &self,
        customer_id: &str,
        staff: &StaffIdentity,
    ) -> DbResult<QueueEntry> {
        let now = Utc::now();
        let mut wtx = self.db.begin_write().await?;

        let entry = fetch_entry(wtx.conn(), customer_id)
            .await?
            .ok_or_else(|| entity_not_found(customer_id))?;

        ensure_transition(&entry, QueueStatus::Completed)?;

        sqlx::query(
            "UPDATE queue_entries \
             SET status = 'completed', counter_id = NULL, completed_at = ?, updated_at = ?, \
                 revision = revision + 1 \
             WHERE customer_id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(customer_id)
        .execute(wtx.conn())
        .await?;

        let updated = fetch_entry(wtx.conn(), customer_id)
            .await?
            .ok_or_else(|| entity_not_found(customer_id))?;

        wtx.commit().await?;

        info!(
            customer_id = %customer_id,
            counter_id = ?entry.counter_id,
            staff_id = %staff.staff_id,
            "Customer completed"
        );
        Ok(updated)
    }

    /// Cancels an entry from any non-terminal state.
    ///
    /// The reason is mandatory and persisted for audit.
    pub async fn cancel(
        &self,
        customer_id: &str,
        reason: &str,
        staff: &StaffIdentity,
    ) -> DbResult<QueueEntry> {
        let reason = validate_cancel_reason(reason).map_err(QueueError::from)?;
        let now = Utc::now();
        let mut wtx = self.db.begin_write().await?;

        let entry = fetch_entry(wtx.conn(), customer_id)
            .await?
            .ok_or_else(|| entity_not_found(customer_id))?;

        ensure_transition(&entry, QueueStatus::Cancelled)?;

        sqlx::query(
            "UPDATE queue_entries \
             SET status = 'cancelled', counter_id = NULL, cancel_reason = ?, \
                 completed_at = ?, updated_at = ?, revision = revision + 1 \
             WHERE customer_id = ?",
        )
        .bind(&reason)
        .bind(now)
        .bind(now)
        .bind(customer_id)
        .execute(wtx.conn())
        .await?;

        let updated = fetch_entry(wtx.conn(), customer_id)
            .await?
            .ok_or_else(|| entity_not_found(customer_id))?;

        wtx.commit().await?;

        info!(
            customer_id = %customer_id,
            reason = %reason,
            staff_id = %staff.staff_id,
            "Customer cancelled"
        );
        Ok(updated)
    }

    // =========================================================================
    // Manual Reorder
    // =========================================================================

    /// Applies a staff-initiated manual ordering to the Waiting set.
    ///
    /// The supplied list must contain exactly the current Waiting customer
    /// ids (no more, no fewer, no duplicates); otherwise the whole reorder
    /// fails with `InvalidReorderSet` and no position changes.
    pub async fn reorder(
        &self,
        customer_ids: &[String],
        staff: &StaffIdentity,
    ) -> DbResult<Vec<QueueEntry>> {
        use std::collections::HashSet;

        let now = Utc::now();
        let mut wtx = self.db.begin_write().await?;

        let sql = format!("SELECT {ENTRY_COLUMNS} FROM queue_entries WHERE status = 'waiting'");
        let waiting = sqlx::query_as::<_, QueueEntry>(&sql)
            .fetch_all(wtx.conn())
            .await?;

        let proposed: HashSet<&str> = customer_ids.iter().map(String::as_str).collect();
        if proposed.len() != customer_ids.len() {
            return Err(DbError::Domain(QueueError::InvalidReorderSet {
                detail: "list contains duplicate customer ids".to_string(),
            }));
        }

        let current: HashSet<&str> = waiting.iter().map(|e| e.customer_id.as_str()).collect();
        if proposed != current {
            let mut missing: Vec<&str> = current.difference(&proposed).copied().collect();
            let mut unexpected: Vec<&str> = proposed.difference(&current).copied().collect();
            missing.sort_unstable();
            unexpected.sort_unstable();
            return Err(DbError::Domain(QueueError::InvalidReorderSet {
                detail: format!("missing: {missing:?}, unexpected: {unexpected:?}"),
            }));
        }

        for (index, customer_id) in customer_ids.iter().enumerate() {
            sqlx::query(
                "UPDATE queue_entries \
                 SET manual_position = ?, updated_at = ?, revision = revision + 1 \
                 WHERE customer_id = ?",
            )
            .bind(index as i64)
            .bind(now)
            .bind(customer_id)
            .execute(wtx.conn())
            .await?;
        }

        let sql = format!("SELECT {ENTRY_COLUMNS} FROM queue_entries WHERE status = 'waiting'");
        let mut reordered = sqlx::query_as::<_, QueueEntry>(&sql)
            .fetch_all(wtx.conn())
            .await?;

        wtx.commit().await?;

        sort_waiting(&mut reordered);

        info!(
            count = reordered.len(),
            staff_id = %staff.staff_id,
            "Queue manually reordered"
        );
        Ok(reordered)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch_entry(
    conn: &mut SqliteConnection,
    customer_id: &str,
) -> DbResult<Option<QueueEntry>> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM queue_entries WHERE customer_id = ?");
    Ok(sqlx::query_as::<_, QueueEntry>(&sql)
        .bind(customer_id)
        .fetch_optional(conn)
        .await?)
}

fn entity_not_found(customer_id: &str) -> DbError {
    DbError::Domain(QueueError::EntityNotFound {
        entity: "QueueEntry".to_string(),
        id: customer_id.to_string(),
    })
}

fn ensure_transition(entry: &QueueEntry, to: QueueStatus) -> DbResult<()> {
    if entry.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(DbError::Domain(QueueError::InvalidTransition {
            customer_id: entry.customer_id.clone(),
            from: entry.status.to_string(),
            to: to.to_string(),
        }))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use chrono::NaiveDate;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn staff() -> StaffIdentity {
        StaffIdentity {
            staff_id: "staff-1".to_string(),
            role: "teller".to_string(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    fn customer(name: &str, flags: PriorityFlags) -> RegisterCustomer {
        RegisterCustomer {
            customer_name: name.to_string(),
            phone: None,
            flags,
        }
    }

    fn regular(name: &str) -> RegisterCustomer {
        customer(name, PriorityFlags::default())
    }

    fn domain_code(err: &DbError) -> Option<&'static str> {
        err.as_domain().map(|d| d.code())
    }

    #[tokio::test]
    async fn test_register_assigns_sequential_tokens() {
        let db = test_db().await;
        let repo = db.queue();

        let a = repo.register(regular("Ana"), day()).await.unwrap();
        let b = repo.register(regular("Ben"), day()).await.unwrap();
        let c = repo.register(regular("Carla"), day()).await.unwrap();

        assert_eq!(a.token_number, 1);
        assert_eq!(b.token_number, 2);
        assert_eq!(c.token_number, 3);
        assert_eq!(a.status, QueueStatus::Waiting);
    }

    #[tokio::test]
    async fn test_register_computes_priority_score() {
        let db = test_db().await;
        let repo = db.queue();

        let senior = repo
            .register(
                customer(
                    "Lola Remedios",
                    PriorityFlags {
                        senior_citizen: true,
                        ..Default::default()
                    },
                ),
                day(),
            )
            .await
            .unwrap();

        assert!(senior.priority_score > 0);

        let regular = repo.register(regular("Ben"), day()).await.unwrap();
        assert_eq!(regular.priority_score, 0);
    }

    #[tokio::test]
    async fn test_register_rejects_blank_name() {
        let db = test_db().await;
        let err = db.queue().register(regular("   "), day()).await.unwrap_err();
        assert_eq!(domain_code(&err), Some("VALIDATION_ERROR"));
    }

    #[tokio::test]
    async fn test_call_assigns_counter_and_busy_blocks_second_call() {
        let db = test_db().await;
        let repo = db.queue();

        let a = repo.register(regular("Ana"), day()).await.unwrap();
        let b = repo.register(regular("Ben"), day()).await.unwrap();

        let called = repo.call(&a.customer_id, 1, &staff()).await.unwrap();
        assert_eq!(called.status, QueueStatus::Serving);
        assert_eq!(called.counter_id, Some(1));
        assert_eq!(called.revision, 1);

        // Counter 1 is unavailable until complete/cancel
        let err = repo.call(&b.customer_id, 1, &staff()).await.unwrap_err();
        assert_eq!(domain_code(&err), Some("COUNTER_BUSY"));

        // The rejected customer is untouched
        let b_after = repo.require(&b.customer_id).await.unwrap();
        assert_eq!(b_after.status, QueueStatus::Waiting);
        assert_eq!(b_after.revision, 0);

        // Completing frees the counter
        repo.complete(&a.customer_id, &staff()).await.unwrap();
        let called_b = repo.call(&b.customer_id, 1, &staff()).await.unwrap();
        assert_eq!(called_b.counter_id, Some(1));
    }

    #[tokio::test]
    async fn test_call_on_serving_entry_is_invalid_and_state_unchanged() {
        let db = test_db().await;
        let repo = db.queue();

        let a = repo.register(regular("Ana"), day()).await.unwrap();
        repo.call(&a.customer_id, 1, &staff()).await.unwrap();

        let err = repo.call(&a.customer_id, 2, &staff()).await.unwrap_err();
        assert_eq!(domain_code(&err), Some("INVALID_TRANSITION"));

        let after = repo.require(&a.customer_id).await.unwrap();
        assert_eq!(after.status, QueueStatus::Serving);
        assert_eq!(after.counter_id, Some(1));
        assert_eq!(after.revision, 1);
    }

    #[tokio::test]
    async fn test_processing_only_from_serving() {
        let db = test_db().await;
        let repo = db.queue();

        let a = repo.register(regular("Ana"), day()).await.unwrap();

        let err = repo.mark_processing(&a.customer_id, &staff()).await.unwrap_err();
        assert_eq!(domain_code(&err), Some("INVALID_TRANSITION"));

        repo.call(&a.customer_id, 1, &staff()).await.unwrap();
        let processing = repo.mark_processing(&a.customer_id, &staff()).await.unwrap();
        assert_eq!(processing.status, QueueStatus::Processing);

        // Processing keeps the counter held
        assert_eq!(processing.counter_id, Some(1));
    }

    #[tokio::test]
    async fn test_complete_releases_counter_and_is_terminal() {
        let db = test_db().await;
        let repo = db.queue();

        let a = repo.register(regular("Ana"), day()).await.unwrap();
        repo.call(&a.customer_id, 1, &staff()).await.unwrap();
        let done = repo.complete(&a.customer_id, &staff()).await.unwrap();

        assert_eq!(done.status, QueueStatus::Completed);
        assert_eq!(done.counter_id, None);
        assert!(done.completed_at.is_some());

        // Terminal: nothing moves it again
        let err = repo.cancel(&a.customer_id, "oops", &staff()).await.unwrap_err();
        assert_eq!(domain_code(&err), Some("INVALID_TRANSITION"));
    }

    #[tokio::test]
    async fn test_cancel_requires_reason_and_persists_it() {
        let db = test_db().await;
        let repo = db.queue();

        let a = repo.register(regular("Ana"), day()).await.unwrap();

        let err = repo.cancel(&a.customer_id, "  ", &staff()).await.unwrap_err();
        assert_eq!(domain_code(&err), Some("VALIDATION_ERROR"));

        let cancelled = repo
            .cancel(&a.customer_id, "customer left the premises", &staff())
            .await
            .unwrap();
        assert_eq!(cancelled.status, QueueStatus::Cancelled);
        assert_eq!(
            cancelled.cancel_reason.as_deref(),
            Some("customer left the premises")
        );
    }

    #[tokio::test]
    async fn test_list_active_orders_by_priority_then_fifo() {
        let db = test_db().await;
        let repo = db.queue();

        let regular_first = repo.register(regular("Ana"), day()).await.unwrap();
        let pwd_later = repo
            .register(
                customer(
                    "Ben",
                    PriorityFlags {
                        pwd: true,
                        ..Default::default()
                    },
                ),
                day(),
            )
            .await
            .unwrap();

        let active = repo.list_active().await.unwrap();
        let ids: Vec<&str> = active.iter().map(|e| e.customer_id.as_str()).collect();
        assert_eq!(ids, vec![pwd_later.customer_id.as_str(), regular_first.customer_id.as_str()]);
    }

    #[tokio::test]
    async fn test_reorder_applies_manual_positions() {
        let db = test_db().await;
        let repo = db.queue();

        let a = repo.register(regular("Ana"), day()).await.unwrap();
        let b = repo.register(regular("Ben"), day()).await.unwrap();
        let c = repo.register(regular("Carla"), day()).await.unwrap();

        let order = vec![
            c.customer_id.clone(),
            a.customer_id.clone(),
            b.customer_id.clone(),
        ];
        let reordered = repo.reorder(&order, &staff()).await.unwrap();

        let ids: Vec<&str> = reordered.iter().map(|e| e.customer_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                c.customer_id.as_str(),
                a.customer_id.as_str(),
                b.customer_id.as_str()
            ]
        );
        assert!(reordered.iter().all(|e| e.manual_position.is_some()));
    }

    #[tokio::test]
    async fn test_reorder_rejects_incomplete_list_and_changes_nothing() {
        let db = test_db().await;
        let repo = db.queue();

        let a = repo.register(regular("Ana"), day()).await.unwrap();
        let _b = repo.register(regular("Ben"), day()).await.unwrap();

        // List is missing Ben
        let err = repo
            .reorder(&[a.customer_id.clone()], &staff())
            .await
            .unwrap_err();
        assert_eq!(domain_code(&err), Some("INVALID_REORDER_SET"));

        // No positions were touched
        let active = repo.list_active().await.unwrap();
        assert!(active.iter().all(|e| e.manual_position.is_none()));
        assert!(active.iter().all(|e| e.revision == 0));
    }

    #[tokio::test]
    async fn test_reorder_rejects_unknown_customer() {
        let db = test_db().await;
        let repo = db.queue();

        let a = repo.register(regular("Ana"), day()).await.unwrap();

        let err = repo
            .reorder(
                &[a.customer_id.clone(), "ghost-customer".to_string()],
                &staff(),
            )
            .await
            .unwrap_err();
        assert_eq!(domain_code(&err), Some("INVALID_REORDER_SET"));
    }

    #[tokio::test]
    async fn test_require_unknown_customer() {
        let db = test_db().await;
        let err = db.queue().require("nobody").await.unwrap_err();
        assert_eq!(domain_code(&err), Some("ENTITY_NOT_FOUND"));
    }
}
