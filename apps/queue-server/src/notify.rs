//! # Notification Intent Worker
//!
//! The queue emits notification-intent events (customer id, template key,
//! parameters); an external collaborator performs delivery. This module is
//! that boundary: intents go into a channel, a background worker drains it
//! and hands each intent off, and the command path never waits.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  call(cust-7, counter 1) commits                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  notifier.send(NowServing { counter: 1 })   ← try_send, never blocks   │
//! │       │                                                                 │
//! │       ▼  mpsc                                                           │
//! │  ┌─────────────────────────────┐                                       │
//! │  │     notification worker     │ ──► delivery collaborator (SMS etc.)  │
//! │  │  (one task, drains channel) │     success/failure is ITS concern    │
//! │  └─────────────────────────────┘                                       │
//! │                                                                         │
//! │  Channel full? The intent is dropped and counted - a missed SMS is     │
//! │  recoverable from the monitor, a blocked staff action is not.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tokio::sync::mpsc;
use tracing::{info, warn};

use pila_core::NotificationIntent;

/// Intent queue depth. A service counter produces a handful of intents a
/// minute; hitting this bound means delivery is down, not that we are busy.
const INTENT_BUFFER: usize = 256;

// =============================================================================
// Notifier
// =============================================================================

/// Handle for emitting notification intents.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<NotificationIntent>,
}

impl Notifier {
    /// Spawns the worker task and returns the emitting handle.
    pub fn spawn() -> Notifier {
        let (tx, rx) = mpsc::channel(INTENT_BUFFER);
        tokio::spawn(run_worker(rx));
        Notifier { tx }
    }

    /// Emits an intent. Never blocks and never fails the caller: delivery
    /// is outside the mutation's success criteria.
    pub fn send(&self, intent: NotificationIntent) {
        if let Err(e) = self.tx.try_send(intent) {
            warn!(error = %e, "Notification intent dropped (queue full or worker gone)");
        }
    }

    /// Creates a notifier whose intents go nowhere. For tests that don't
    /// assert on notifications.
    pub fn disconnected() -> Notifier {
        let (tx, _rx) = mpsc::channel(1);
        Notifier { tx }
    }
}

/// Drains the intent channel and hands each intent to the delivery
/// collaborator. Delivery transport and content live outside this system;
/// the dispatch log line is the hand-off point.
async fn run_worker(mut rx: mpsc::Receiver<NotificationIntent>) {
    info!("Notification worker starting");

    while let Some(intent) = rx.recv().await {
        info!(
            customer_id = %intent.customer_id,
            template = ?intent.template,
            params = ?intent.params,
            "Notification intent dispatched"
        );
    }

    info!("Notification worker stopped");
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pila_core::NotificationTemplate;

    #[tokio::test]
    async fn test_send_never_blocks_even_when_disconnected() {
        let notifier = Notifier::disconnected();

        // Receiver is gone; both sends return immediately
        for _ in 0..10 {
            notifier.send(NotificationIntent::with_param(
                "cust-1",
                NotificationTemplate::NowServing,
                "counter",
                "1",
            ));
        }
    }

    #[tokio::test]
    async fn test_worker_drains_intents() {
        let notifier = Notifier::spawn();
        notifier.send(NotificationIntent::with_param(
            "cust-1",
            NotificationTemplate::TokenIssued,
            "token",
            "7",
        ));
        // Yield so the worker runs; the assertion is that nothing panics
        // and the channel keeps accepting
        tokio::task::yield_now().await;
        notifier.send(NotificationIntent::with_param(
            "cust-2",
            NotificationTemplate::TokenIssued,
            "token",
            "8",
        ));
    }
}
