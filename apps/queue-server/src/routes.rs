//! # API Routes
//!
//! The HTTP surface staff terminals and operator tools call, plus the
//! observer WebSocket endpoint.
//!
//! ## Surface
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  COMMANDS (mutating - require x-staff-id)                               │
//! │    POST /api/queue                          register                    │
//! │    POST /api/queue/reorder                  manual reorder              │
//! │    POST /api/queue/{customer_id}/call       call to counter             │
//! │    POST /api/queue/{customer_id}/processing mark processing             │
//! │    POST /api/queue/{customer_id}/complete   complete                    │
//! │    POST /api/queue/{customer_id}/cancel     cancel with reason          │
//! │    POST /api/transactions                   create transaction          │
//! │    POST /api/transactions/{id}/settlements  record settlement           │
//! │    POST /api/reset/run                      operator reset (re-)run     │
//! │                                                                         │
//! │  QUERIES (read-only)                                                    │
//! │    GET  /api/queue                          active queue, ordered       │
//! │    GET  /api/transactions/{id}              transaction state           │
//! │    GET  /api/transactions/{id}/settlements  audit history, newest first │
//! │    GET  /api/archive/{date}                 daily archive (found flag)  │
//! │    GET  /api/health                         liveness                    │
//! │                                                                         │
//! │  REALTIME                                                               │
//! │    GET  /ws                                 observer WebSocket          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers stay thin: deserialize, hand to ops/repositories, serialize.
//! Rejections come back as `{ code, message }` with the stable codes.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use pila_core::{DailyArchive, PaymentMode, PriorityFlags, QueueEntry, Transaction};
use pila_db::{RegisterCustomer, SettlementOutcome};
use pila_realtime::QueueHub;

use crate::auth::Staff;
use crate::error::ApiError;
use crate::ops;
use crate::reset::{self, ResetSummary};
use crate::state::AppState;

// =============================================================================
// Router
// =============================================================================

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/queue", post(register).get(list_queue))
        .route("/api/queue/reorder", post(reorder))
        .route("/api/queue/{customer_id}/call", post(call))
        .route("/api/queue/{customer_id}/processing", post(mark_processing))
        .route("/api/queue/{customer_id}/complete", post(complete))
        .route("/api/queue/{customer_id}/cancel", post(cancel))
        .route("/api/transactions", post(create_transaction))
        .route("/api/transactions/{id}", get(get_transaction))
        .route(
            "/api/transactions/{id}/settlements",
            post(create_settlement).get(list_settlements),
        )
        .route("/api/archive/{date}", get(get_archive))
        .route("/api/reset/run", post(run_reset))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub customer_name: String,
    pub phone: Option<String>,
    #[serde(flatten)]
    pub flags: PriorityFlags,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub counter_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub customer_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub customer_id: String,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSettlementRequest {
    pub amount_cents: i64,
    /// Absent mode is recorded as `unspecified`, never defaulted to cash.
    pub payment_mode: Option<PaymentMode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResetQuery {
    /// Day to close; defaults to the current business day. Operators pass
    /// yesterday's date to recover a failed midnight run.
    pub business_day: Option<NaiveDate>,
}

/// "No report yet" is an expected, common state - so the archive query
/// answers 200 with a found flag instead of an error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResponse {
    pub found: bool,
    pub archive: Option<DailyArchive>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub observers: usize,
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn register(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<QueueEntry>, ApiError> {
    let input = RegisterCustomer {
        customer_name: req.customer_name,
        phone: req.phone,
        flags: req.flags,
    };
    let entry = ops::register(&state, input, &staff).await?;
    Ok(Json(entry))
}

async fn call(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(customer_id): Path<String>,
    Json(req): Json<CallRequest>,
) -> Result<Json<QueueEntry>, ApiError> {
    let entry = ops::call(&state, &customer_id, req.counter_id, &staff).await?;
    Ok(Json(entry))
}

async fn mark_processing(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(customer_id): Path<String>,
) -> Result<Json<QueueEntry>, ApiError> {
    let entry = ops::mark_processing(&state, &customer_id, &staff).await?;
    Ok(Json(entry))
}

async fn complete(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(customer_id): Path<String>,
) -> Result<Json<QueueEntry>, ApiError> {
    let entry = ops::complete(&state, &customer_id, &staff).await?;
    Ok(Json(entry))
}

async fn cancel(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(customer_id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<QueueEntry>, ApiError> {
    let entry = ops::cancel(&state, &customer_id, &req.reason, &staff).await?;
    Ok(Json(entry))
}

async fn reorder(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<Vec<QueueEntry>>, ApiError> {
    let entries = ops::reorder(&state, &req.customer_ids, &staff).await?;
    Ok(Json(entries))
}

async fn create_transaction(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let txn = ops::create_transaction(&state, &req.customer_id, req.amount_cents, &staff).await?;
    Ok(Json(txn))
}

async fn create_settlement(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(transaction_id): Path<String>,
    Json(req): Json<CreateSettlementRequest>,
) -> Result<Json<SettlementOutcome>, ApiError> {
    let outcome = ops::settle(
        &state,
        &transaction_id,
        req.amount_cents,
        req.payment_mode,
        &staff,
    )
    .await?;
    Ok(Json(outcome))
}

async fn run_reset(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Query(query): Query<RunResetQuery>,
) -> Result<Json<ResetSummary>, ApiError> {
    let day = query
        .business_day
        .unwrap_or_else(|| state.config.business_day_now());

    tracing::info!(business_day = %day, staff_id = %staff.staff_id, "Manual reset trigger");

    let summary = reset::execute_reset(
        &state.db,
        &state.hub,
        state.config.reset_policy,
        state.config.token_start,
        day,
    )
    .await?;
    Ok(Json(summary))
}

// =============================================================================
// Query Handlers
// =============================================================================

async fn list_queue(State(state): State<AppState>) -> Result<Json<Vec<QueueEntry>>, ApiError> {
    let entries = state.db.queue().list_active().await?;
    Ok(Json(entries))
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let txn = state.db.billing().require(&transaction_id).await?;
    Ok(Json(txn))
}

async fn list_settlements(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<Vec<pila_core::Settlement>>, ApiError> {
    let settlements = state.db.billing().list_settlements(&transaction_id).await?;
    Ok(Json(settlements))
}

async fn get_archive(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<ArchiveResponse>, ApiError> {
    let archive = state.db.archive().get_archive(date).await?;
    Ok(Json(ArchiveResponse {
        found: archive.is_some(),
        archive,
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        database: state.db.health_check().await,
        observers: state.hub.observer_count().await,
    })
}

// =============================================================================
// Realtime
// =============================================================================

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    QueueHub::handle_upgrade(state.hub.clone(), ws)
}
