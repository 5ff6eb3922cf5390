//! # pila-db: Database Layer for Pila
//!
//! This crate provides database access for the Pila queue system.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Pila Data Flow                                  │
//! │                                                                         │
//! │  API Handler (call_customer)                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      pila-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  (queue.rs)   │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │    │ QueueRepo     │    │ 001_init.sql │  │   │
//! │  │   │ EntityLocks   │◄───│ BillingRepo   │    │ ...          │  │   │
//! │  │   │ Writer mutex  │    │ ArchiveRepo   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │              /var/lib/pila/pila.db (WAL mode)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, write transactions, repository access
//! - [`locks`] - Per-entity lock registry (the `Busy` contract)
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types (storage + domain channel)
//! - [`repository`] - Repository implementations (queue, billing, archive)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pila_db::{Database, DbConfig};
//!
//! // Create database with default config
//! let config = DbConfig::new("path/to/pila.db");
//! let db = Database::new(config).await?;
//!
//! // Use repositories
//! let waiting = db.queue().list_active().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod locks;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use locks::EntityLocks;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::archive::{ArchiveRepository, DayStats};
pub use repository::billing::{BillingRepository, SettlementOutcome};
pub use repository::queue::{QueueRepository, RegisterCustomer};
