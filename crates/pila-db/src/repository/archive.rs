//! # Archive Repository
//!
//! The reset lock, daily archive snapshots, and the reset execution log.
//!
//! ## The Reset Lock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  At-Most-One Reset Per Calendar Day                     │
//! │                                                                         │
//! │  Timer fires (or operator re-triggers)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  begin_run(day)                                                        │
//! │       │                                                                 │
//! │       ├── INSERT reset_runs(day, 'running')  ← the PRIMARY KEY on      │
//! │       │        │                               business_day IS the     │
//! │       │        │ conflict?                     lock                     │
//! │       │        ▼                                                        │
//! │       │   existing row 'failed'?  → take over (operator retry)         │
//! │       │   existing row otherwise  → ResetAlreadyRan (skip entirely)    │
//! │       ▼                                                                 │
//! │  snapshot_day → insert_archive → close_open_entries →                  │
//! │  reset_token_counter → finish_run('succeeded')                         │
//! │                                                                         │
//! │  Any step fails → fail_run('failed', error) - never partially          │
//! │  recorded as success, and the next trigger may retry.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use pila_core::{DailyArchive, QueueError, ResetPolicy, ResetRun, ResetStatus};

const RUN_COLUMNS: &str = "business_day, status, entries_archived, entries_cleared, \
     duration_ms, error, started_at, finished_at";

const ARCHIVE_COLUMNS: &str = "business_day, registered_count, served_count, cancelled_count, \
     priority_count, avg_wait_secs, max_wait_secs, settled_cents, reset_at";

// =============================================================================
// Day Statistics
// =============================================================================

/// Aggregates snapshotted from a closing day, before the active set is
/// cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayStats {
    pub registered_count: i64,
    pub served_count: i64,
    pub cancelled_count: i64,
    pub priority_count: i64,
    pub avg_wait_secs: Option<i64>,
    pub max_wait_secs: Option<i64>,
    pub settled_cents: i64,
}

// =============================================================================
// Archive Repository
// =============================================================================

/// Repository for the reset lock, daily archives, and the reset log.
#[derive(Clone)]
pub struct ArchiveRepository {
    db: Database,
}

impl ArchiveRepository {
    /// Creates a new ArchiveRepository.
    pub fn new(db: Database) -> Self {
        ArchiveRepository { db }
    }

    // =========================================================================
    // Reset Lock (spec step 1)
    // =========================================================================

    /// Acquires the exclusive reset lock for `day`.
    ///
    /// ## Semantics
    /// - No row for the day → insert a `Running` row, lock acquired
    /// - Existing `Failed` row → taken over for retry (operator re-run)
    /// - Existing `Running`/`Succeeded` row → `ResetAlreadyRan`
    ///
    /// Duplicate timer fires therefore skip entirely; a failed attempt
    /// stays retryable.
    pub async fn begin_run(&self, day: NaiveDate) -> DbResult<ResetRun> {
        let now = Utc::now();
        let mut wtx = self.db.begin_write().await?;

        let inserted = sqlx::query(
            "INSERT INTO reset_runs (business_day, status, started_at) \
             VALUES (?, ?, ?) \
             ON CONFLICT(business_day) DO NOTHING",
        )
        .bind(day)
        .bind(ResetStatus::Running)
        .bind(now)
        .execute(wtx.conn())
        .await?;

        if inserted.rows_affected() == 0 {
            // Lock exists. Only a failed prior attempt may be taken over.
            let taken_over = sqlx::query(
                "UPDATE reset_runs \
                 SET status = ?, started_at = ?, finished_at = NULL, error = NULL, \
                     duration_ms = NULL, entries_archived = 0, entries_cleared = 0 \
                 WHERE business_day = ? AND status = ?",
            )
            .bind(ResetStatus::Running)
            .bind(now)
            .bind(day)
            .bind(ResetStatus::Failed)
            .execute(wtx.conn())
            .await?;

            if taken_over.rows_affected() == 0 {
                return Err(DbError::Domain(QueueError::ResetAlreadyRan {
                    business_day: day.to_string(),
                }));
            }
            info!(business_day = %day, "Taking over failed reset run for retry");
        }

        let sql = format!("SELECT {RUN_COLUMNS} FROM reset_runs WHERE business_day = ?");
        let run = sqlx::query_as::<_, ResetRun>(&sql)
            .bind(day)
            .fetch_one(wtx.conn())
            .await?;

        wtx.commit().await?;
        Ok(run)
    }

    // =========================================================================
    // Snapshot + Archive (spec step 2)
    // =========================================================================

    /// Computes the closing day's aggregates from the live tables.
    pub async fn snapshot_day(&self, day: NaiveDate) -> DbResult<DayStats> {
        let (registered, served, cancelled, priority): (i64, i64, i64, i64) =
            sqlx::query_as(
                "SELECT \
                    COUNT(*), \
                    COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN status = 'cancelled' THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN priority_score > 0 THEN 1 ELSE 0 END), 0) \
                 FROM queue_entries WHERE business_day = ?",
            )
            .bind(day)
            .fetch_one(self.db.pool())
            .await?;

        let (avg_wait_secs, max_wait_secs): (Option<i64>, Option<i64>) = sqlx::query_as(
            "SELECT \
                CAST(AVG((julianday(called_at) - julianday(created_at)) * 86400.0) AS INTEGER), \
                CAST(MAX((julianday(called_at) - julianday(created_at)) * 86400.0) AS INTEGER) \
             FROM queue_entries \
             WHERE business_day = ? AND called_at IS NOT NULL",
        )
        .bind(day)
        .fetch_one(self.db.pool())
        .await?;

        let settled_cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(s.amount_cents), 0) \
             FROM settlements s \
             JOIN transactions t ON t.id = s.transaction_id \
             JOIN queue_entries q ON q.customer_id = t.customer_id \
             WHERE q.business_day = ?",
        )
        .bind(day)
        .fetch_one(self.db.pool())
        .await?;

        Ok(DayStats {
            registered_count: registered,
            served_count: served,
            cancelled_count: cancelled,
            priority_count: priority,
            avg_wait_secs,
            max_wait_secs,
            settled_cents,
        })
    }

    /// Writes the archive row for the day.
    ///
    /// Idempotent on retry: a row already present (from a failed run that
    /// got past step 2) is left untouched, so a day archives exactly once.
    pub async fn insert_archive(&self, day: NaiveDate, stats: DayStats) -> DbResult<()> {
        let now = Utc::now();
        let mut wtx = self.db.begin_write().await?;

        sqlx::query(
            "INSERT INTO daily_archives ( \
                business_day, registered_count, served_count, cancelled_count, \
                priority_count, avg_wait_secs, max_wait_secs, settled_cents, reset_at \
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(business_day) DO NOTHING",
        )
        .bind(day)
        .bind(stats.registered_count)
        .bind(stats.served_count)
        .bind(stats.cancelled_count)
        .bind(stats.priority_count)
        .bind(stats.avg_wait_secs)
        .bind(stats.max_wait_secs)
        .bind(stats.settled_cents)
        .bind(now)
        .execute(wtx.conn())
        .await?;

        wtx.commit().await?;
        Ok(())
    }

    /// Gets the archive for a date. Returns `None` for a date with no
    /// archive - "no report yet" is an expected state, not a failure.
    pub async fn get_archive(&self, day: NaiveDate) -> DbResult<Option<DailyArchive>> {
        let sql = format!("SELECT {ARCHIVE_COLUMNS} FROM daily_archives WHERE business_day = ?");
        let archive = sqlx::query_as::<_, DailyArchive>(&sql)
            .bind(day)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(archive)
    }

    // =========================================================================
    // Clear + Counter Reset (spec steps 3-4)
    // =========================================================================

    /// Transitions every still-open entry to its end-of-day disposition
    /// and clears the active set. Returns the number of entries closed.
    pub async fn close_open_entries(&self, policy: ResetPolicy) -> DbResult<u64> {
        let now = Utc::now();
        let mut wtx = self.db.begin_write().await?;

        let result = sqlx::query(
            "UPDATE queue_entries \
             SET status = 'cancelled', cancel_reason = ?, counter_id = NULL, \
                 completed_at = ?, updated_at = ?, revision = revision + 1 \
             WHERE status IN ('waiting', 'serving', 'processing')",
        )
        .bind(policy.disposition_reason())
        .bind(now)
        .bind(now)
        .execute(wtx.conn())
        .await?;

        wtx.commit().await?;

        info!(
            cleared = result.rows_affected(),
            disposition = policy.disposition_reason(),
            "Open entries closed for day end"
        );
        Ok(result.rows_affected())
    }

    /// Resets the token counter to its starting value.
    pub async fn reset_token_counter(&self, start: i64) -> DbResult<()> {
        let mut wtx = self.db.begin_write().await?;
        sqlx::query("UPDATE token_counters SET next_token = ? WHERE id = 1")
            .bind(start)
            .execute(wtx.conn())
            .await?;
        wtx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Run Log (spec step 5)
    // =========================================================================

    /// Records a successful run with its counts and duration.
    pub async fn finish_run(
        &self,
        day: NaiveDate,
        entries_archived: i64,
        entries_cleared: i64,
        duration_ms: i64,
    ) -> DbResult<()> {
        let now = Utc::now();
        let mut wtx = self.db.begin_write().await?;
        sqlx::query(
            "UPDATE reset_runs \
             SET status = ?, entries_archived = ?, entries_cleared = ?, \
                 duration_ms = ?, finished_at = ? \
             WHERE business_day = ?",
        )
        .bind(ResetStatus::Succeeded)
        .bind(entries_archived)
        .bind(entries_cleared)
        .bind(duration_ms)
        .bind(now)
        .bind(day)
        .execute(wtx.conn())
        .await?;
        wtx.commit().await?;
        Ok(())
    }

    /// Records a failed run. The whole execution is marked failed - never
    /// partially committed as success - and stays retryable.
    pub async fn fail_run(&self, day: NaiveDate, error: &str, duration_ms: i64) -> DbResult<()> {
        let now = Utc::now();
        let mut wtx = self.db.begin_write().await?;
        sqlx::query(
            "UPDATE reset_runs \
             SET status = ?, error = ?, duration_ms = ?, finished_at = ? \
             WHERE business_day = ?",
        )
        .bind(ResetStatus::Failed)
        .bind(error)
        .bind(duration_ms)
        .bind(now)
        .bind(day)
        .execute(wtx.conn())
        .await?;
        wtx.commit().await?;
        Ok(())
    }

    /// Gets the run row for a date.
    pub async fn get_run(&self, day: NaiveDate) -> DbResult<Option<ResetRun>> {
        let sql = format!("SELECT {RUN_COLUMNS} FROM reset_runs WHERE business_day = ?");
        let run = sqlx::query_as::<_, ResetRun>(&sql)
            .bind(day)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(run)
    }

    /// The most recent business day with a successful reset, if any.
    /// The scheduler reads this at startup instead of trusting wall-clock
    /// state alone.
    pub async fn last_successful_day(&self) -> DbResult<Option<NaiveDate>> {
        let day: Option<NaiveDate> = sqlx::query_scalar(
            "SELECT MAX(business_day) FROM reset_runs WHERE status = 'succeeded'",
        )
        .fetch_one(self.db.pool())
        .await?;
        Ok(day)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use crate::repository::queue::RegisterCustomer;
    use pila_core::{PaymentMode, PriorityFlags, StaffIdentity};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    fn staff() -> StaffIdentity {
        StaffIdentity {
            staff_id: "staff-1".to_string(),
            role: "supervisor".to_string(),
        }
    }

    async fn seed_day(db: &Database) {
        let queue = db.queue();
        let a = queue
            .register(
                RegisterCustomer {
                    customer_name: "Ana".into(),
                    phone: None,
                    flags: PriorityFlags {
                        senior_citizen: true,
                        ..Default::default()
                    },
                },
                day(),
            )
            .await
            .unwrap();
        let _b = queue
            .register(
                RegisterCustomer {
                    customer_name: "Ben".into(),
                    phone: None,
                    flags: PriorityFlags::default(),
                },
                day(),
            )
            .await
            .unwrap();

        queue.call(&a.customer_id, 1, &staff()).await.unwrap();
        queue.complete(&a.customer_id, &staff()).await.unwrap();

        let txn = db
            .billing()
            .create_transaction(&a.customer_id, 100_000)
            .await
            .unwrap();
        db.billing()
            .create_settlement(&txn.id, 40_000, Some(PaymentMode::Cash), "cashier-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_begin_run_is_exclusive_per_day() {
        let db = test_db().await;
        let archive = db.archive();

        let run = archive.begin_run(day()).await.unwrap();
        assert_eq!(run.status, ResetStatus::Running);

        // Second acquire for the same day is rejected
        let err = archive.begin_run(day()).await.unwrap_err();
        assert_eq!(
            err.as_domain().map(|d| d.code()),
            Some("RESET_ALREADY_RAN")
        );
    }

    #[tokio::test]
    async fn test_succeeded_run_blocks_retrigger_failed_allows_it() {
        let db = test_db().await;
        let archive = db.archive();

        archive.begin_run(day()).await.unwrap();
        archive.fail_run(day(), "disk full", 12).await.unwrap();

        // A failed run may be taken over
        let retried = archive.begin_run(day()).await.unwrap();
        assert_eq!(retried.status, ResetStatus::Running);
        assert_eq!(retried.error, None);

        archive.finish_run(day(), 2, 1, 34).await.unwrap();

        // A succeeded run may not
        let err = archive.begin_run(day()).await.unwrap_err();
        assert_eq!(
            err.as_domain().map(|d| d.code()),
            Some("RESET_ALREADY_RAN")
        );
    }

    #[tokio::test]
    async fn test_snapshot_counts_and_settlement_total() {
        let db = test_db().await;
        seed_day(&db).await;

        let stats = db.archive().snapshot_day(day()).await.unwrap();
        assert_eq!(stats.registered_count, 2);
        assert_eq!(stats.served_count, 1);
        assert_eq!(stats.cancelled_count, 0);
        assert_eq!(stats.priority_count, 1);
        assert_eq!(stats.settled_cents, 40_000);
        // Ana was called, so wait stats exist (instant in this test)
        assert!(stats.avg_wait_secs.is_some());
    }

    #[tokio::test]
    async fn test_insert_archive_is_idempotent() {
        let db = test_db().await;
        seed_day(&db).await;
        let archive = db.archive();

        let stats = archive.snapshot_day(day()).await.unwrap();
        archive.insert_archive(day(), stats).await.unwrap();

        // A retry with different numbers must not overwrite the archive
        let mut changed = stats;
        changed.registered_count = 99;
        archive.insert_archive(day(), changed).await.unwrap();

        let stored = archive.get_archive(day()).await.unwrap().unwrap();
        assert_eq!(stored.registered_count, 2);

        // Unknown date reads back as None, not an error
        let missing = archive
            .get_archive(NaiveDate::from_ymd_opt(2001, 1, 1).unwrap())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_close_open_entries_clears_active_set() {
        let db = test_db().await;
        seed_day(&db).await; // Ben is still Waiting

        let cleared = db
            .archive()
            .close_open_entries(ResetPolicy::CarryForward)
            .await
            .unwrap();
        assert_eq!(cleared, 1);

        let active = db.queue().list_active().await.unwrap();
        assert!(active.is_empty());

        // Second pass finds nothing left to clear
        let cleared_again = db
            .archive()
            .close_open_entries(ResetPolicy::CarryForward)
            .await
            .unwrap();
        assert_eq!(cleared_again, 0);
    }

    #[tokio::test]
    async fn test_token_counter_reset() {
        let db = test_db().await;
        seed_day(&db).await; // consumed tokens 1 and 2

        db.archive().reset_token_counter(1).await.unwrap();

        // Old entries still hold their tokens; the next day starts fresh.
        // Registering for a new business day avoids the per-day unique
        // constraint with the archived rows.
        let next_day = NaiveDate::from_ymd_opt(2026, 8, 8).unwrap();
        let entry = db
            .queue()
            .register(
                RegisterCustomer {
                    customer_name: "Carla".into(),
                    phone: None,
                    flags: PriorityFlags::default(),
                },
                next_day,
            )
            .await
            .unwrap();
        assert_eq!(entry.token_number, 1);
    }

    #[tokio::test]
    async fn test_last_successful_day() {
        let db = test_db().await;
        let archive = db.archive();

        assert_eq!(archive.last_successful_day().await.unwrap(), None);

        archive.begin_run(day()).await.unwrap();
        archive.finish_run(day(), 0, 0, 5).await.unwrap();

        assert_eq!(archive.last_successful_day().await.unwrap(), Some(day()));
    }
}
