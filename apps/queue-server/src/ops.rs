//! # Command Operations
//!
//! The single write path for every staff action.
//!
//! ## The Lock → Mutate → Publish Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        One Staff Action                                 │
//! │                                                                         │
//! │  1. acquire entity lock(s)        bounded wait, Busy on timeout        │
//! │          │                        (entry before counter, always)       │
//! │          ▼                                                              │
//! │  2. repository operation          one write transaction:               │
//! │          │                        load → validate → mutate → commit    │
//! │          ▼                                                              │
//! │  3. hub.publish(delta)            fire-and-forget, but INSIDE the      │
//! │          │                        lock scope - that is what gives      │
//! │          ▼                        observers per-entity commit order    │
//! │  4. notification intent           try_send, never blocks               │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  5. locks drop                    next action on this entity proceeds  │
//! │                                                                         │
//! │  Unrelated entities never meet the same locks, so terminal A settling  │
//! │  a payment never waits for terminal B calling a different customer.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::debug;
use uuid::Uuid;

use pila_core::{
    NotificationIntent, NotificationTemplate, PaymentMode, QueueEntry, StaffIdentity, Transaction,
};
use pila_db::{EntityLocks, RegisterCustomer, SettlementOutcome};
use pila_realtime::QueueEvent;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Queue Commands
// =============================================================================

/// Registers a customer and announces the new entry.
pub async fn register(
    state: &AppState,
    input: RegisterCustomer,
    staff: &StaffIdentity,
) -> Result<QueueEntry, ApiError> {
    let business_day = state.config.business_day_now();
    let entry = state.db.queue().register(input, business_day).await?;

    debug!(customer_id = %entry.customer_id, staff_id = %staff.staff_id, "register command");

    state.hub.publish(QueueEvent::EntryRegistered {
        entry: entry.clone(),
    });
    state.notifier.send(NotificationIntent::with_param(
        &entry.customer_id,
        NotificationTemplate::TokenIssued,
        "token",
        entry.token_number.to_string(),
    ));

    Ok(entry)
}

/// Calls a Waiting customer to a counter.
pub async fn call(
    state: &AppState,
    customer_id: &str,
    counter_id: i64,
    staff: &StaffIdentity,
) -> Result<QueueEntry, ApiError> {
    let locks = state.db.locks();
    let _entry = locks.acquire(&EntityLocks::entry_key(customer_id)).await?;
    let _counter = locks.acquire(&EntityLocks::counter_key(counter_id)).await?;

    let entry = state.db.queue().call(customer_id, counter_id, staff).await?;

    state.hub.publish(QueueEvent::EntryCalled {
        customer_id: entry.customer_id.clone(),
        token_number: entry.token_number,
        counter_id,
        revision: entry.revision,
    });
    state.notifier.send(NotificationIntent::with_param(
        &entry.customer_id,
        NotificationTemplate::NowServing,
        "counter",
        counter_id.to_string(),
    ));

    Ok(entry)
}

/// Moves a Serving entry into back-office Processing.
pub async fn mark_processing(
    state: &AppState,
    customer_id: &str,
    staff: &StaffIdentity,
) -> Result<QueueEntry, ApiError> {
    let locks = state.db.locks();
    let _entry = locks.acquire(&EntityLocks::entry_key(customer_id)).await?;

    let entry = state.db.queue().mark_processing(customer_id, staff).await?;

    state.hub.publish(QueueEvent::EntryProcessing {
        customer_id: entry.customer_id.clone(),
        revision: entry.revision,
    });

    Ok(entry)
}

/// Completes a Serving/Processing entry, releasing its counter.
pub async fn complete(
    state: &AppState,
    customer_id: &str,
    staff: &StaffIdentity,
) -> Result<QueueEntry, ApiError> {
    let locks = state.db.locks();
    let _entry = locks.acquire(&EntityLocks::entry_key(customer_id)).await?;

    let before = state.db.queue().require(customer_id).await?;
    let entry = state.db.queue().complete(customer_id, staff).await?;

    state.hub.publish(QueueEvent::EntryCompleted {
        customer_id: entry.customer_id.clone(),
        released_counter_id: before.counter_id,
        revision: entry.revision,
    });

    Ok(entry)
}

/// Cancels an entry with a mandatory audit reason.
pub async fn cancel(
    state: &AppState,
    customer_id: &str,
    reason: &str,
    staff: &StaffIdentity,
) -> Result<QueueEntry, ApiError> {
    let locks = state.db.locks();
    let _entry = locks.acquire(&EntityLocks::entry_key(customer_id)).await?;

    let entry = state.db.queue().cancel(customer_id, reason, staff).await?;

    let reason_text = entry.cancel_reason.clone().unwrap_or_default();
    state.hub.publish(QueueEvent::EntryCancelled {
        customer_id: entry.customer_id.clone(),
        reason: reason_text.clone(),
        revision: entry.revision,
    });
    state.notifier.send(NotificationIntent::with_param(
        &entry.customer_id,
        NotificationTemplate::EntryCancelled,
        "reason",
        reason_text,
    ));

    Ok(entry)
}

/// Applies a staff-initiated manual ordering to the Waiting set.
pub async fn reorder(
    state: &AppState,
    customer_ids: &[String],
    staff: &StaffIdentity,
) -> Result<Vec<QueueEntry>, ApiError> {
    let reordered = state.db.queue().reorder(customer_ids, staff).await?;

    state.hub.publish(QueueEvent::QueueReordered {
        reorder_id: Uuid::new_v4().to_string(),
        ordered_customer_ids: reordered
            .iter()
            .map(|e| e.customer_id.clone())
            .collect(),
    });

    Ok(reordered)
}

// =============================================================================
// Billing Commands
// =============================================================================

/// Creates a billable transaction for a registered customer.
pub async fn create_transaction(
    state: &AppState,
    customer_id: &str,
    amount_cents: i64,
    staff: &StaffIdentity,
) -> Result<Transaction, ApiError> {
    debug!(customer_id = %customer_id, staff_id = %staff.staff_id, "create_transaction command");
    let txn = state
        .db
        .billing()
        .create_transaction(customer_id, amount_cents)
        .await?;
    Ok(txn)
}

/// Records a settlement; the cashier identity comes from the
/// already-authenticated staff identity, never from the request body.
pub async fn settle(
    state: &AppState,
    transaction_id: &str,
    amount_cents: i64,
    payment_mode: Option<PaymentMode>,
    staff: &StaffIdentity,
) -> Result<SettlementOutcome, ApiError> {
    let locks = state.db.locks();
    let _txn = locks.acquire(&EntityLocks::txn_key(transaction_id)).await?;

    let outcome = state
        .db
        .billing()
        .create_settlement(transaction_id, amount_cents, payment_mode, &staff.staff_id)
        .await?;

    // Newest-first history: the settlement just inserted is the head
    if let Some(settlement) = outcome.settlements.first() {
        state.hub.publish(QueueEvent::SettlementRecorded {
            settlement: settlement.clone(),
            transaction: outcome.transaction.clone(),
        });
    }

    Ok(outcome)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::notify::Notifier;
    use crate::state::AppState;
    use pila_core::{PaymentStatus, PriorityFlags, QueueStatus, ResetPolicy};
    use pila_db::{Database, DbConfig};
    use pila_realtime::{EventEnvelope, HubConfig, QueueHub, Topic};
    use std::sync::Arc;

    async fn test_state() -> AppState {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let hub = Arc::new(QueueHub::new(db.clone(), HubConfig::default()));
        let config = ServerConfig {
            http_port: 0,
            database_path: ":memory:".into(),
            tz_offset_hours: 8,
            reset_hour: 0,
            token_start: 1,
            lock_timeout_ms: 500,
            reset_policy: ResetPolicy::Cancel,
        };
        AppState::new(db, hub, Notifier::disconnected(), config)
    }

    fn staff() -> StaffIdentity {
        StaffIdentity {
            staff_id: "teller-1".to_string(),
            role: "teller".to_string(),
        }
    }

    fn senior(name: &str) -> RegisterCustomer {
        RegisterCustomer {
            customer_name: name.to_string(),
            phone: None,
            flags: PriorityFlags {
                senior_citizen: true,
                ..Default::default()
            },
        }
    }

    fn walk_in(name: &str) -> RegisterCustomer {
        RegisterCustomer {
            customer_name: name.to_string(),
            phone: None,
            flags: PriorityFlags::default(),
        }
    }

    #[tokio::test]
    async fn test_priority_registration_and_counter_exclusivity() {
        // Spec scenario: a senior registers (score > 0), gets called to
        // counter 1 while another customer waits; counter 1 stays
        // unavailable until complete
        let state = test_state().await;

        let lola = register(&state, senior("Lola Remedios"), &staff())
            .await
            .unwrap();
        assert!(lola.priority_score > 0);

        let ben = register(&state, walk_in("Ben"), &staff()).await.unwrap();

        let called = call(&state, &lola.customer_id, 1, &staff()).await.unwrap();
        assert_eq!(called.status, QueueStatus::Serving);

        // Ben is still Waiting, and counter 1 refuses a second call
        let err = call(&state, &ben.customer_id, 1, &staff()).await.unwrap_err();
        assert_eq!(err.code, "COUNTER_BUSY");
        let ben_now = state.db.queue().require(&ben.customer_id).await.unwrap();
        assert_eq!(ben_now.status, QueueStatus::Waiting);

        complete(&state, &lola.customer_id, &staff()).await.unwrap();
        let called_ben = call(&state, &ben.customer_id, 1, &staff()).await.unwrap();
        assert_eq!(called_ben.counter_id, Some(1));
    }

    #[tokio::test]
    async fn test_events_carry_revision_scoped_ids_in_commit_order() {
        let state = test_state().await;
        let mut rx = state.hub.subscribe_events();

        let ana = register(&state, walk_in("Ana"), &staff()).await.unwrap();
        call(&state, &ana.customer_id, 1, &staff()).await.unwrap();
        mark_processing(&state, &ana.customer_id, &staff()).await.unwrap();
        complete(&state, &ana.customer_id, &staff()).await.unwrap();

        let mut ids = Vec::new();
        for _ in 0..4 {
            let envelope: EventEnvelope = rx.recv().await.unwrap();
            assert_eq!(envelope.topic, Topic::Queue);
            ids.push(envelope.event_id);
        }

        let c = &ana.customer_id;
        assert_eq!(
            ids,
            vec![
                format!("{c}:0"), // registered
                format!("{c}:1"), // called
                format!("{c}:2"), // processing
                format!("{c}:3"), // completed
            ]
        );
    }

    #[tokio::test]
    async fn test_settlement_publishes_on_transactions_topic() {
        let state = test_state().await;

        let ana = register(&state, walk_in("Ana"), &staff()).await.unwrap();
        let txn = create_transaction(&state, &ana.customer_id, 100_000, &staff())
            .await
            .unwrap();

        let mut rx = state.hub.subscribe_events();
        let outcome = settle(&state, &txn.id, 40_000, Some(PaymentMode::Gcash), &staff())
            .await
            .unwrap();
        assert_eq!(outcome.transaction.payment_status, PaymentStatus::Partial);

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.topic, Topic::Transactions);
        // The settlement's own id is the dedup identifier
        assert_eq!(envelope.event_id, outcome.settlements[0].id);
    }

    #[tokio::test]
    async fn test_settlement_cashier_comes_from_identity() {
        let state = test_state().await;
        let ana = register(&state, walk_in("Ana"), &staff()).await.unwrap();
        let txn = create_transaction(&state, &ana.customer_id, 100_000, &staff())
            .await
            .unwrap();

        let outcome = settle(&state, &txn.id, 10_000, Some(PaymentMode::Cash), &staff())
            .await
            .unwrap();
        assert_eq!(outcome.settlements[0].cashier_id, "teller-1");
    }

    #[tokio::test]
    async fn test_held_entity_lock_surfaces_busy() {
        let state = test_state().await;
        let ana = register(&state, walk_in("Ana"), &staff()).await.unwrap();

        // Another worker holds Ana's entity lock past our bounded wait
        let guard = state
            .db
            .locks()
            .acquire(&EntityLocks::entry_key(&ana.customer_id))
            .await
            .unwrap();

        let err = call(&state, &ana.customer_id, 1, &staff()).await.unwrap_err();
        assert_eq!(err.code, "BUSY");

        drop(guard);
        assert!(call(&state, &ana.customer_id, 1, &staff()).await.is_ok());
    }

    #[tokio::test]
    async fn test_reorder_publishes_full_new_order() {
        let state = test_state().await;
        let a = register(&state, walk_in("Ana"), &staff()).await.unwrap();
        let b = register(&state, walk_in("Ben"), &staff()).await.unwrap();

        let mut rx = state.hub.subscribe_events();
        reorder(
            &state,
            &[b.customer_id.clone(), a.customer_id.clone()],
            &staff(),
        )
        .await
        .unwrap();

        let envelope = rx.recv().await.unwrap();
        match envelope.event {
            QueueEvent::QueueReordered {
                ordered_customer_ids,
                ..
            } => {
                assert_eq!(ordered_customer_ids, vec![b.customer_id, a.customer_id]);
            }
            other => panic!("expected QueueReordered, got {other:?}"),
        }
    }
}
