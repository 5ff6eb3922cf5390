//! # Pila Queue Server
//!
//! The HTTP/WebSocket server for a single-location service counter.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Queue Server Components                           │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  routes        │  │  ops           │  │  reset                     ││
//! │  │                │  │                │  │                            ││
//! │  │ • HTTP surface │  │ • lock →       │  │ • daily timer              ││
//! │  │ • /ws upgrade  │  │   mutate →     │  │ • archive + clear          ││
//! │  │ • DTOs         │  │   publish      │  │ • operator re-run          ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  auth          │  │  notify        │  │  config / error / state    ││
//! │  │                │  │                │  │                            ││
//! │  │ • forwarded    │  │ • intent       │  │ • env config               ││
//! │  │   staff        │  │   channel +    │  │ • ApiError codes           ││
//! │  │   identity     │  │   worker       │  │ • shared AppState          ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `PILA_HTTP_PORT` - listen port (default: 8080)
//! - `PILA_DB_PATH` - SQLite file path (default: ./pila.db)
//! - `PILA_TZ_OFFSET_HOURS` - business timezone, hours east of UTC (default: 8)
//! - `PILA_RESET_HOUR` - local hour the daily reset fires (default: 0)
//! - `PILA_TOKEN_START` - token number after a reset (default: 1)
//! - `PILA_LOCK_TIMEOUT_MS` - bounded entity-lock wait (default: 2000)
//! - `PILA_RESET_POLICY` - `cancel` or `carry-forward` (default: cancel)

pub mod auth;
pub mod config;
pub mod error;
pub mod notify;
pub mod ops;
pub mod reset;
pub mod routes;
pub mod state;

// Re-exports
pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;
