//! # Application State
//!
//! Shared state handed to every axum handler.
//!
//! ## Composition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AppState                                                               │
//! │  ├── db        Database (pool + repositories + entity locks)           │
//! │  ├── hub       QueueHub (observer fan-out, snapshots)                  │
//! │  ├── notifier  Notifier (intent channel to the delivery collaborator)  │
//! │  └── config    ServerConfig (env-derived knobs)                        │
//! │                                                                         │
//! │  Everything inside is cheaply cloneable (pools/Arcs/senders), so       │
//! │  axum can clone the state per request without cost.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use pila_db::Database;
use pila_realtime::QueueHub;

use crate::config::ServerConfig;
use crate::notify::Notifier;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub hub: Arc<QueueHub>,
    pub notifier: Notifier,
    pub config: ServerConfig,
}

impl AppState {
    /// Assembles the state from its parts.
    pub fn new(db: Database, hub: Arc<QueueHub>, notifier: Notifier, config: ServerConfig) -> Self {
        AppState {
            db,
            hub,
            notifier,
            config,
        }
    }
}
