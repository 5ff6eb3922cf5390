//! # Repository Module
//!
//! Database repository implementations for Pila.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  API Handler / Reset Job                                               │
//! │       │                                                                 │
//! │       │  db.queue().call("cust-7", 1, &staff)                          │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  QueueRepository                                                       │
//! │  ├── register(&self, input, business_day)                              │
//! │  ├── call(&self, customer_id, counter_id, staff)                       │
//! │  ├── cancel(&self, customer_id, reason, staff)                         │
//! │  └── list_active(&self)                                                │
//! │       │                                                                 │
//! │       │  One write transaction per mutation:                           │
//! │       │  load → validate (pila-core rules) → mutate → bump revision    │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • The state machine is enforced in exactly one place                  │
//! │  • SQL is isolated here, business rules stay in pila-core              │
//! │  • Every invariant lives inside a single entity's transaction          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`queue::QueueRepository`] - Queue entries, state machine, token counter
//! - [`billing::BillingRepository`] - Transactions and the settlement ledger
//! - [`archive::ArchiveRepository`] - Reset lock, daily archives, reset log

pub mod archive;
pub mod billing;
pub mod queue;
