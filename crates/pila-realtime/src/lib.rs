//! # pila-realtime: Realtime Synchronizer for Pila
//!
//! Fans out state-change events to connected observers (display monitors,
//! dashboards) and reconciles an observer's view on (re)connect.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Pila Realtime Layer                               │
//! │                                                                         │
//! │  Staff action commits (queue-server ops)                               │
//! │       │                                                                 │
//! │       │ publish(event)  - while still holding the entity lock          │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 pila-realtime (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │  protocol  - closed, tagged event vocabulary + envelopes        │   │
//! │  │  hub       - WebSocket fan-out, snapshot-on-subscribe           │   │
//! │  │  dedup     - the observer-side duplicate-suppression contract   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Observers apply deltas, drop duplicates by eventId, re-subscribe      │
//! │  for a snapshot when told to resync                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Delivery Contract
//!
//! - **At-least-once**: an event may arrive more than once; every event
//!   carries a stable id and observers drop ids they have applied
//! - **Per-entity order**: events for the same entity arrive in commit
//!   order; nothing is guaranteed across entities
//! - **No replay**: events published while an observer is disconnected are
//!   gone for it; reconnecting observers subscribe again and receive the
//!   authoritative snapshot first
//! - **Fire-and-forget**: a slow or dead observer never blocks a mutation

// =============================================================================
// Module Declarations
// =============================================================================

pub mod dedup;
pub mod error;
pub mod hub;
pub mod protocol;

// =============================================================================
// Re-exports
// =============================================================================

pub use dedup::SeenEvents;
pub use error::{RealtimeError, RealtimeResult};
pub use hub::{HubConfig, QueueHub};
pub use protocol::{
    ClientMessage, EventEnvelope, QueueEvent, ServerMessage, Snapshot, Topic, PROTOCOL_VERSION,
};
