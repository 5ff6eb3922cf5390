//! # Realtime Protocol Messages
//!
//! Message types for the observer WebSocket protocol.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Realtime Protocol Messages                           │
//! │                                                                         │
//! │  SUBSCRIBE FLOW                                                        │
//! │  ──────────────                                                        │
//! │  OBSERVER ───► Subscribe { topics: ["queue"] }                         │
//! │  HUB      ◄─── Snapshot { topic: queue, data: [...] }   (full state)   │
//! │  HUB      ◄─── Event { eventId, topic, event }          (deltas)       │
//! │  HUB      ◄─── Event { eventId, topic, event }                         │
//! │                                                                         │
//! │  DEDUP CONTRACT                                                        │
//! │  ──────────────                                                        │
//! │  Delivery is at-least-once. Every event carries a stable eventId;      │
//! │  observers MUST drop an eventId they have already applied (see         │
//! │  dedup::SeenEvents). Duplicates are dropped by identifier, never       │
//! │  reapplied.                                                            │
//! │                                                                         │
//! │  RESYNC                                                                │
//! │  ──────                                                                │
//! │  Events published while an observer is disconnected are NOT queued     │
//! │  for it. A lagged observer receives Error { code: RESYNC_REQUIRED }    │
//! │  and re-subscribes, which replays the authoritative snapshot.          │
//! │                                                                         │
//! │  ORDERING                                                              │
//! │  ────────                                                              │
//! │  Events for the SAME entity arrive in commit order (publishers hold    │
//! │  the entity lock across commit + publish). No cross-entity order is    │
//! │  guaranteed. A snapshot always supersedes previously applied deltas.   │
//! │                                                                         │
//! │  KEEPALIVE                                                             │
//! │  ─────────                                                             │
//! │  Both      ◄──► Ping / Pong { timestamp }                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format (JSON)
//! Messages are serialized as tagged JSON using serde's adjacently tagged
//! enum: `{ "type": "Event", "payload": { ... } }`

use serde::{Deserialize, Serialize};

use pila_core::{QueueEntry, Settlement, Transaction};

/// Current protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// Topics
// =============================================================================

/// Subscription topics. Observers pick the streams they care about:
/// display monitors follow `queue`, cashier dashboards follow both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Queue entry lifecycle: register, call, processing, complete,
    /// cancel, reorder, daily reset.
    Queue,
    /// Billing: settlements and payment-status changes.
    Transactions,
}

// =============================================================================
// Events (the closed delta vocabulary)
// =============================================================================

/// All state-change events, one variant per mutation kind.
///
/// Each variant carries only its relevant delta fields - observers apply
/// the delta to their view instead of refetching. The set is closed on
/// purpose: a payload that doesn't deserialize into one of these variants
/// is rejected before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum QueueEvent {
    /// A customer entered the queue. The delta of a creation is the full
    /// new entry.
    EntryRegistered { entry: QueueEntry },

    /// A Waiting customer was called to a counter.
    EntryCalled {
        customer_id: String,
        token_number: i64,
        counter_id: i64,
        revision: i64,
    },

    /// A Serving entry moved to back-office Processing.
    EntryProcessing { customer_id: String, revision: i64 },

    /// An entry completed; its counter is free again.
    EntryCompleted {
        customer_id: String,
        released_counter_id: Option<i64>,
        revision: i64,
    },

    /// An entry was cancelled with an audit reason.
    EntryCancelled {
        customer_id: String,
        reason: String,
        revision: i64,
    },

    /// Staff manually reordered the Waiting set.
    QueueReordered {
        /// Unique id for this reorder action (dedup identifier).
        reorder_id: String,
        /// The full new order, front of queue first.
        ordered_customer_ids: Vec<String>,
    },

    /// A settlement was recorded; carries the new aggregate state.
    SettlementRecorded {
        settlement: Settlement,
        transaction: Transaction,
    },

    /// The daily reset archived and cleared the queue.
    QueueReset {
        business_day: String,
        entries_cleared: i64,
    },
}

impl QueueEvent {
    /// Returns the event type name as a string (for logging).
    pub fn type_name(&self) -> &'static str {
        match self {
            QueueEvent::EntryRegistered { .. } => "EntryRegistered",
            QueueEvent::EntryCalled { .. } => "EntryCalled",
            QueueEvent::EntryProcessing { .. } => "EntryProcessing",
            QueueEvent::EntryCompleted { .. } => "EntryCompleted",
            QueueEvent::EntryCancelled { .. } => "EntryCancelled",
            QueueEvent::QueueReordered { .. } => "QueueReordered",
            QueueEvent::SettlementRecorded { .. } => "SettlementRecorded",
            QueueEvent::QueueReset { .. } => "QueueReset",
        }
    }

    /// The topic this event belongs to.
    pub fn topic(&self) -> Topic {
        match self {
            QueueEvent::SettlementRecorded { .. } => Topic::Transactions,
            _ => Topic::Queue,
        }
    }

    /// Stable identifier for observer-side deduplication.
    ///
    /// ## Scheme
    /// - Entry events: `{customer_id}:{revision}` - the revision is bumped
    ///   on every mutation, so each committed change has exactly one id
    /// - Settlements: the settlement's own UUID
    /// - Reorders: the reorder action's UUID
    /// - Resets: `reset:{business_day}` - a reset happens at most once per
    ///   day, so the day is the identity
    pub fn event_id(&self) -> String {
        match self {
            QueueEvent::EntryRegistered { entry } => {
                format!("{}:{}", entry.customer_id, entry.revision)
            }
            QueueEvent::EntryCalled {
                customer_id,
                revision,
                ..
            }
            | QueueEvent::EntryProcessing {
                customer_id,
                revision,
            }
            | QueueEvent::EntryCompleted {
                customer_id,
                revision,
                ..
            }
            | QueueEvent::EntryCancelled {
                customer_id,
                revision,
                ..
            } => format!("{customer_id}:{revision}"),
            QueueEvent::QueueReordered { reorder_id, .. } => format!("reorder:{reorder_id}"),
            QueueEvent::SettlementRecorded { settlement, .. } => settlement.id.clone(),
            QueueEvent::QueueReset { business_day, .. } => format!("reset:{business_day}"),
        }
    }
}

// =============================================================================
// Event Envelope
// =============================================================================

/// An event plus its routing metadata, as delivered to observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Stable dedup identifier (see [`QueueEvent::event_id`]).
    pub event_id: String,

    /// Topic the event belongs to.
    pub topic: Topic,

    /// The delta itself.
    pub event: QueueEvent,
}

impl EventEnvelope {
    /// Wraps an event, capturing its id and topic.
    pub fn new(event: QueueEvent) -> Self {
        EventEnvelope {
            event_id: event.event_id(),
            topic: event.topic(),
            event,
        }
    }
}

// =============================================================================
// Client → Hub Messages
// =============================================================================

/// Messages an observer sends to the hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Subscribe to topics. The hub replies with one `Snapshot` per topic
    /// before streaming deltas.
    Subscribe { topics: Vec<Topic> },

    /// Unsubscribe from topics.
    Unsubscribe { topics: Vec<Topic> },

    /// Keepalive.
    Ping { timestamp: String },
}

// =============================================================================
// Hub → Client Messages
// =============================================================================

/// Full authoritative state for one topic, sent on subscribe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "topic", content = "data", rename_all = "snake_case")]
pub enum Snapshot {
    /// The active Waiting set in queue order.
    Queue(Vec<QueueEntry>),
    /// Transactions belonging to customers in the active set.
    Transactions(Vec<Transaction>),
}

/// Messages the hub sends to an observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Authoritative state for a just-subscribed topic. Always replaces
    /// whatever the observer has applied so far for that topic.
    Snapshot(Snapshot),

    /// A state-change delta.
    Event(EventEnvelope),

    /// Keepalive response.
    Pong {
        ping_timestamp: String,
        pong_timestamp: String,
    },

    /// Protocol-level error. `RESYNC_REQUIRED` means the observer lagged
    /// and must re-subscribe to replay the snapshot.
    Error { code: String, message: String },
}

impl ServerMessage {
    /// Serializes to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ClientMessage {
    /// Deserializes from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pila_core::{PaymentMode, PaymentStatus};

    fn settlement(id: &str) -> Settlement {
        Settlement {
            id: id.to_string(),
            transaction_id: "txn-1".to_string(),
            amount_cents: 40_000,
            payment_mode: PaymentMode::Cash,
            cashier_id: "cashier-1".to_string(),
            paid_at: Utc::now(),
        }
    }

    fn transaction() -> Transaction {
        Transaction {
            id: "txn-1".to_string(),
            customer_id: "cust-1".to_string(),
            amount_cents: 100_000,
            paid_cents: 40_000,
            balance_cents: 60_000,
            payment_status: PaymentStatus::Partial,
            revision: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_event_serialization_round_trip() {
        let event = QueueEvent::EntryCalled {
            customer_id: "cust-1".to_string(),
            token_number: 7,
            counter_id: 2,
            revision: 1,
        };
        let envelope = EventEnvelope::new(event);
        let json = serde_json::to_string(&ServerMessage::Event(envelope)).unwrap();
        assert!(json.contains("\"type\":\"Event\""));
        assert!(json.contains("EntryCalled"));

        let parsed: ServerMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMessage::Event(env) => {
                assert_eq!(env.event_id, "cust-1:1");
                assert_eq!(env.topic, Topic::Queue);
            }
            other => panic!("expected Event, got {other:?}"),
        }
    }

    #[test]
    fn test_event_ids_are_stable_and_revision_scoped() {
        let call = QueueEvent::EntryCalled {
            customer_id: "cust-1".to_string(),
            token_number: 7,
            counter_id: 2,
            revision: 1,
        };
        let complete = QueueEvent::EntryCompleted {
            customer_id: "cust-1".to_string(),
            released_counter_id: Some(2),
            revision: 2,
        };

        // Same event → same id (dedup works across redelivery)
        assert_eq!(call.event_id(), call.clone().event_id());
        // Different mutation of the same entity → different id
        assert_ne!(call.event_id(), complete.event_id());
    }

    #[test]
    fn test_settlement_event_uses_settlement_id_and_transactions_topic() {
        let event = QueueEvent::SettlementRecorded {
            settlement: settlement("stl-123"),
            transaction: transaction(),
        };
        assert_eq!(event.event_id(), "stl-123");
        assert_eq!(event.topic(), Topic::Transactions);
    }

    #[test]
    fn test_reset_event_id_is_per_day() {
        let event = QueueEvent::QueueReset {
            business_day: "2026-08-07".to_string(),
            entries_cleared: 4,
        };
        assert_eq!(event.event_id(), "reset:2026-08-07");
        assert_eq!(event.topic(), Topic::Queue);
    }

    #[test]
    fn test_client_message_parsing() {
        let msg = ClientMessage::from_json(
            r#"{"type":"Subscribe","payload":{"topics":["queue","transactions"]}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Subscribe { topics } => {
                assert_eq!(topics, vec![Topic::Queue, Topic::Transactions]);
            }
            other => panic!("expected Subscribe, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_payloads_are_rejected() {
        // The event vocabulary is closed: anything outside it fails to parse
        assert!(ClientMessage::from_json(r#"{"type":"DropTables","payload":{}}"#).is_err());
        assert!(
            serde_json::from_str::<QueueEvent>(r#"{"type":"Mystery","payload":{}}"#).is_err()
        );
    }
}
