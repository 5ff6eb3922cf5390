//! # Reset Scheduler
//!
//! The timer-driven daily job that archives a closing day and resets the
//! queue, plus the operator-triggered manual re-run path.
//!
//! ## Execution Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Reset Scheduler Flow                                 │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    ResetScheduler task                          │   │
//! │  │                                                                 │   │
//! │  │  loop {                                                         │   │
//! │  │      sleep until the configured local hour (business tz)       │   │
//! │  │      execute_reset(closing business day)                       │   │
//! │  │  }                                                              │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               │  same function, same lock              │
//! │  POST /api/reset/run ─────────┘  (operator recovery / tests)           │
//! │                                                                         │
//! │  execute_reset(day):                                                   │
//! │    1. begin_run(day)        unique-insert lock; duplicate fire skips,  │
//! │                             failed prior attempt is taken over         │
//! │    2. snapshot_day          aggregate counts + wait statistics         │
//! │       insert_archive        idempotent (ON CONFLICT DO NOTHING)        │
//! │    3. close_open_entries    per configured policy                      │
//! │    4. reset_token_counter   back to the starting value                 │
//! │    5. finish_run/fail_run   status + counts + duration recorded        │
//! │                                                                         │
//! │  Any step failing marks the WHOLE run failed (never partial success)   │
//! │  and leaves the lock takeable for a retry.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The schedule state lives in the `reset_runs` table, not in memory:
//! restarting the server never loses "did today already run".

use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use pila_core::{QueueError, ResetPolicy};
use pila_db::{Database, DbError, DbResult};
use pila_realtime::{QueueEvent, QueueHub};

use crate::config::ServerConfig;

// =============================================================================
// Reset Summary
// =============================================================================

/// Outcome of a successful reset, returned to the operator and logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSummary {
    pub business_day: NaiveDate,
    pub entries_archived: i64,
    pub entries_cleared: i64,
    pub duration_ms: i64,
}

// =============================================================================
// Reset Execution
// =============================================================================

/// Runs the full reset sequence for `day`.
///
/// Idempotency lives in step 1: a duplicate trigger for a day that already
/// ran (or is running) fails with `ResetAlreadyRan` before touching
/// anything; a `Failed` prior attempt is taken over and retried.
pub async fn execute_reset(
    db: &Database,
    hub: &QueueHub,
    policy: ResetPolicy,
    token_start: i64,
    day: NaiveDate,
) -> Result<ResetSummary, DbError> {
    let archive = db.archive();

    // Step 1: the lock. ResetAlreadyRan propagates to the caller untouched.
    archive.begin_run(day).await?;
    info!(business_day = %day, "Reset run started");

    let started = Instant::now();

    // Steps 2-4, each individually retryable on a later run
    let steps: DbResult<(i64, u64)> = async {
        let stats = archive.snapshot_day(day).await?;
        archive.insert_archive(day, stats).await?;
        let cleared = archive.close_open_entries(policy).await?;
        archive.reset_token_counter(token_start).await?;
        // The day's customers are gone; their lock entries can go too
        db.locks().prune().await;
        Ok((stats.registered_count, cleared))
    }
    .await;

    let duration_ms = started.elapsed().as_millis() as i64;

    // Step 5: record the outcome - success and failure both land in the log
    match steps {
        Ok((entries_archived, cleared)) => {
            let entries_cleared = cleared as i64;
            archive
                .finish_run(day, entries_archived, entries_cleared, duration_ms)
                .await?;

            hub.publish(QueueEvent::QueueReset {
                business_day: day.to_string(),
                entries_cleared,
            });

            info!(
                business_day = %day,
                entries_archived,
                entries_cleared,
                duration_ms,
                "Reset run succeeded"
            );

            Ok(ResetSummary {
                business_day: day,
                entries_archived,
                entries_cleared,
                duration_ms,
            })
        }
        Err(e) => {
            error!(business_day = %day, error = %e, duration_ms, "Reset run failed");
            archive.fail_run(day, &e.to_string(), duration_ms).await?;
            Err(DbError::Domain(QueueError::ResetFailed {
                business_day: day.to_string(),
                reason: e.to_string(),
            }))
        }
    }
}

// =============================================================================
// Schedule Arithmetic
// =============================================================================

/// Time until the next firing of the configured local hour.
pub fn next_fire_delay(
    now_utc: DateTime<Utc>,
    tz: FixedOffset,
    reset_hour: u32,
) -> std::time::Duration {
    let now_local = now_utc.with_timezone(&tz);
    let today = now_local.date_naive();

    let fire_today = today
        .and_hms_opt(reset_hour, 0, 0)
        .and_then(|naive| naive.and_local_timezone(tz).single());

    let next = match fire_today {
        Some(fire) if fire > now_local => fire,
        Some(fire) => fire + ChronoDuration::days(1),
        // reset_hour is range-checked in config; fall back to a day out
        None => now_local + ChronoDuration::days(1),
    };

    (next - now_local)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(24 * 3600))
}

/// The business day a firing closes: the local date of the instant just
/// before the fire. A midnight fire closes yesterday; a 23:00 fire closes
/// the same local date.
pub fn closing_business_day(fire_local: DateTime<FixedOffset>) -> NaiveDate {
    (fire_local - ChronoDuration::seconds(1)).date_naive()
}

// =============================================================================
// Scheduler Task
// =============================================================================

/// Handle for stopping the scheduler.
#[derive(Clone)]
pub struct ResetHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ResetHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// The background timer task driving the daily reset.
pub struct ResetScheduler {
    db: Database,
    hub: std::sync::Arc<QueueHub>,
    config: ServerConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

impl ResetScheduler {
    /// Creates the scheduler and its control handle.
    pub fn new(
        db: Database,
        hub: std::sync::Arc<QueueHub>,
        config: ServerConfig,
    ) -> (Self, ResetHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            ResetScheduler {
                db,
                hub,
                config,
                shutdown_rx,
            },
            ResetHandle { shutdown_tx },
        )
    }

    /// Runs the scheduler loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        let tz = self.config.timezone();
        info!(
            reset_hour = self.config.reset_hour,
            tz_offset_hours = self.config.tz_offset_hours,
            "Reset scheduler starting"
        );

        self.startup_check(tz).await;

        loop {
            let delay = next_fire_delay(Utc::now(), tz, self.config.reset_hour);
            info!(delay_secs = delay.as_secs(), "Next reset scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let fire_local = Utc::now().with_timezone(&tz);
                    let day = closing_business_day(fire_local);

                    match execute_reset(
                        &self.db,
                        &self.hub,
                        self.config.reset_policy,
                        self.config.token_start,
                        day,
                    )
                    .await
                    {
                        Ok(summary) => {
                            info!(business_day = %day, ?summary, "Scheduled reset complete");
                        }
                        Err(DbError::Domain(QueueError::ResetAlreadyRan { .. })) => {
                            // Duplicate timer fire or an operator beat us to it
                            info!(business_day = %day, "Reset already ran, skipping");
                        }
                        Err(e) => {
                            // Recorded as failed in reset_runs; an operator
                            // can re-trigger via POST /api/reset/run
                            error!(business_day = %day, error = %e, "Scheduled reset failed");
                        }
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Reset scheduler shutting down");
                    break;
                }
            }
        }

        info!("Reset scheduler stopped");
    }

    /// Compares the persisted last-successful-run date against the
    /// expected closing day, instead of trusting wall-clock state alone.
    async fn startup_check(&self, tz: FixedOffset) {
        let expected = closing_business_day(Utc::now().with_timezone(&tz));
        match self.db.archive().last_successful_day().await {
            Ok(Some(last)) if last < expected => {
                warn!(
                    last_successful = %last,
                    expected = %expected,
                    "Previous business day has no successful reset; POST /api/reset/run to recover"
                );
            }
            Ok(Some(last)) => {
                info!(last_successful = %last, "Reset history is current");
            }
            Ok(None) => {
                info!("No resets recorded yet");
            }
            Err(e) => {
                error!(error = %e, "Could not read reset history");
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pila_core::{PriorityFlags, QueueStatus, StaffIdentity};
    use pila_db::{DbConfig, RegisterCustomer};
    use pila_realtime::HubConfig;
    use std::sync::Arc;

    async fn test_db_and_hub() -> (Database, Arc<QueueHub>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let hub = Arc::new(QueueHub::new(db.clone(), HubConfig::default()));
        (db, hub)
    }

    fn staff() -> StaffIdentity {
        StaffIdentity {
            staff_id: "supervisor-1".to_string(),
            role: "supervisor".to_string(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    /// Seeds one served customer and one still-waiting customer; returns
    /// the waiting customer's id.
    async fn seed(db: &Database) -> String {
        let queue = db.queue();
        let served = queue
            .register(
                RegisterCustomer {
                    customer_name: "Ana".into(),
                    phone: None,
                    flags: PriorityFlags::default(),
                },
                day(),
            )
            .await
            .unwrap();
        queue.call(&served.customer_id, 1, &staff()).await.unwrap();
        queue.complete(&served.customer_id, &staff()).await.unwrap();

        queue
            .register(
                RegisterCustomer {
                    customer_name: "Ben".into(),
                    phone: None,
                    flags: PriorityFlags::default(),
                },
                day(),
            )
            .await
            .unwrap()
            .customer_id
    }

    #[tokio::test]
    async fn test_double_fire_archives_once_and_clears_once() {
        let (db, hub) = test_db_and_hub().await;
        seed(&db).await;

        let first = execute_reset(&db, &hub, ResetPolicy::Cancel, 1, day())
            .await
            .unwrap();
        assert_eq!(first.entries_archived, 2);
        assert_eq!(first.entries_cleared, 1); // Ben was still Waiting

        // Simulated duplicate timer fire: skipped entirely
        let err = execute_reset(&db, &hub, ResetPolicy::Cancel, 1, day())
            .await
            .unwrap_err();
        assert_eq!(
            err.as_domain().map(|d| d.code()),
            Some("RESET_ALREADY_RAN")
        );

        // Exactly one archive row exists
        let archive = db.archive().get_archive(day()).await.unwrap().unwrap();
        assert_eq!(archive.registered_count, 2);

        // Steps 3-4 ran exactly once: a customer registered after the
        // first reset keeps token 1 and stays Waiting through the
        // duplicate fire
        let fresh = db
            .queue()
            .register(
                RegisterCustomer {
                    customer_name: "Carla".into(),
                    phone: None,
                    flags: PriorityFlags::default(),
                },
                day().succ_opt().unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(fresh.token_number, 1);

        let _ = execute_reset(&db, &hub, ResetPolicy::Cancel, 1, day()).await;
        let still_there = db.queue().require(&fresh.customer_id).await.unwrap();
        assert_eq!(still_there.status, QueueStatus::Waiting);
    }

    #[tokio::test]
    async fn test_reset_disposes_open_entries_with_policy_reason() {
        let (db, hub) = test_db_and_hub().await;
        let waiting = seed(&db).await;

        execute_reset(&db, &hub, ResetPolicy::CarryForward, 1, day())
            .await
            .unwrap();

        assert!(db.queue().list_active().await.unwrap().is_empty());

        // The disposition is recorded as the cancel reason
        let entry = db.queue().require(&waiting).await.unwrap();
        assert_eq!(entry.status, QueueStatus::Cancelled);
        assert_eq!(
            entry.cancel_reason.as_deref(),
            Some("end_of_day_carry_forward")
        );
    }

    #[tokio::test]
    async fn test_failed_run_can_be_retried() {
        let (db, hub) = test_db_and_hub().await;
        seed(&db).await;

        // A prior attempt failed mid-flight
        db.archive().begin_run(day()).await.unwrap();
        db.archive().fail_run(day(), "simulated crash", 3).await.unwrap();

        // The retry takes over the failed lock and completes
        let summary = execute_reset(&db, &hub, ResetPolicy::Cancel, 1, day())
            .await
            .unwrap();
        assert_eq!(summary.entries_archived, 2);

        let run = db.archive().get_run(day()).await.unwrap().unwrap();
        assert_eq!(run.status, pila_core::ResetStatus::Succeeded);
        assert_eq!(run.error, None);
    }

    #[tokio::test]
    async fn test_reset_publishes_day_scoped_event() {
        let (db, hub) = test_db_and_hub().await;
        seed(&db).await;

        let mut rx = hub.subscribe_events();
        execute_reset(&db, &hub, ResetPolicy::Cancel, 1, day())
            .await
            .unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event_id, "reset:2026-08-07");
    }

    #[test]
    fn test_next_fire_delay_before_and_after_the_hour() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();

        // 21:00 local on Aug 7 (13:00 UTC), midnight reset → 3 hours out
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 13, 0, 0).unwrap();
        let delay = next_fire_delay(now, tz, 0);
        assert_eq!(delay.as_secs(), 3 * 3600);

        // 00:00:00 local exactly: today's fire instant is not in the
        // future, so the next one is tomorrow
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 16, 0, 0).unwrap();
        let delay = next_fire_delay(now, tz, 0);
        assert_eq!(delay.as_secs(), 24 * 3600);

        // 01:00 local with a 3 AM reset hour → 2 hours out
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 17, 0, 0).unwrap();
        let delay = next_fire_delay(now, tz, 3);
        assert_eq!(delay.as_secs(), 2 * 3600);
    }

    #[test]
    fn test_closing_business_day() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();

        // Midnight fire closes yesterday
        let fire = Utc
            .with_ymd_and_hms(2026, 8, 7, 16, 0, 0)
            .unwrap()
            .with_timezone(&tz); // Aug 8, 00:00 local
        assert_eq!(
            closing_business_day(fire),
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
        );

        // A 23:00 fire closes the same local date
        let fire = Utc
            .with_ymd_and_hms(2026, 8, 7, 15, 0, 0)
            .unwrap()
            .with_timezone(&tz); // Aug 7, 23:00 local
        assert_eq!(
            closing_business_day(fire),
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
        );
    }
}
