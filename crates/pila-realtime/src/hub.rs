//! # Queue Hub Module
//!
//! The WebSocket fan-out hub that every display monitor and dashboard
//! connects to.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Queue Hub Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      QueueHub (Axum)                            │   │
//! │  │                                                                 │   │
//! │  │  /ws endpoint ──▶ WebSocket upgrade                            │   │
//! │  │                        │                                        │   │
//! │  │                        ▼                                        │   │
//! │  │              ┌─────────────────┐                                │   │
//! │  │              │  Per-observer   │ ◀───── outgoing writer task,   │   │
//! │  │              │  task trio      │        broadcast forwarder,    │   │
//! │  │              └────────┬────────┘        ping task               │   │
//! │  │                       │                                         │   │
//! │  │         ┌─────────────┼─────────────┐                          │   │
//! │  │         ▼             ▼             ▼                          │   │
//! │  │  ┌──────────┐  ┌──────────┐  ┌──────────┐                      │   │
//! │  │  │ Monitor  │  │Dashboard │  │ Monitor  │   Connected          │   │
//! │  │  │ (lobby)  │  │(manager) │  │(counter) │   observers          │   │
//! │  │  └──────────┘  └──────────┘  └──────────┘                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Message Flow:                                                          │
//! │  ─────────────                                                          │
//! │  1. Observer connects and sends Subscribe { topics }                   │
//! │  2. Hub replies with one Snapshot per topic (authoritative state)      │
//! │  3. Hub streams Event deltas filtered to the subscribed topics         │
//! │  4. A lagged observer gets Error RESYNC_REQUIRED and re-subscribes     │
//! │  5. publish() is fire-and-forget: mutations never wait on observers    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RealtimeResult;
use crate::protocol::{ClientMessage, EventEnvelope, QueueEvent, ServerMessage, Snapshot, Topic};
use pila_db::Database;

// =============================================================================
// Constants
// =============================================================================

/// Ping interval to keep connections alive.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Per-connection outgoing queue depth.
const OUTGOING_BUFFER: usize = 64;

// =============================================================================
// Hub Configuration
// =============================================================================

/// Configuration for the queue hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Broadcast channel capacity. An observer further behind than this
    /// lags out and is told to resync.
    pub channel_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            channel_capacity: 256,
        }
    }
}

// =============================================================================
// Connected Observer
// =============================================================================

/// Book-keeping for one connected observer.
#[derive(Debug, Clone)]
pub struct ConnectedObserver {
    /// Hub-assigned observer id.
    pub observer_id: String,
    /// Connection time.
    pub connected_at: Instant,
}

// =============================================================================
// Queue Hub
// =============================================================================

/// Fan-out hub for queue and transaction state changes.
pub struct QueueHub {
    /// Database handle for building snapshots on subscribe.
    db: Database,

    /// Broadcast channel all observer forwarders subscribe to.
    broadcast_tx: broadcast::Sender<EventEnvelope>,

    /// Connected observers.
    observers: RwLock<HashMap<String, ConnectedObserver>>,
}

impl QueueHub {
    /// Creates a new hub.
    pub fn new(db: Database, config: HubConfig) -> Self {
        let (broadcast_tx, _) = broadcast::channel(config.channel_capacity);
        QueueHub {
            db,
            broadcast_tx,
            observers: RwLock::new(HashMap::new()),
        }
    }

    /// Publishes an event to every subscribed observer.
    ///
    /// Fire-and-forget: the send never blocks and never fails the caller -
    /// a mutation's success is not conditioned on any observer receiving
    /// the event. Callers publish while still holding the mutated entity's
    /// lock, which is what gives observers per-entity commit order.
    pub fn publish(&self, event: QueueEvent) -> EventEnvelope {
        let envelope = EventEnvelope::new(event);
        // Err only means there are no receivers right now
        let receivers = self.broadcast_tx.send(envelope.clone()).unwrap_or(0);
        debug!(
            event_id = %envelope.event_id,
            event = envelope.event.type_name(),
            receivers,
            "Event published"
        );
        envelope
    }

    /// Taps the raw event stream. Used by in-process consumers and tests;
    /// WebSocket observers go through [`QueueHub::router`].
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.broadcast_tx.subscribe()
    }

    /// Number of connected WebSocket observers.
    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }

    /// Builds the authoritative snapshot for a topic.
    pub async fn snapshot(&self, topic: Topic) -> RealtimeResult<Snapshot> {
        match topic {
            Topic::Queue => Ok(Snapshot::Queue(self.db.queue().list_active().await?)),
            Topic::Transactions => Ok(Snapshot::Transactions(
                self.db.billing().list_active_transactions().await?,
            )),
        }
    }

    /// Builds the axum router exposing the hub at `/ws`.
    pub fn router(hub: Arc<QueueHub>) -> Router {
        Router::new().route("/ws", get(ws_handler)).with_state(hub)
    }

    /// Upgrades a WebSocket request onto this hub. For embedding the hub
    /// in an application router that carries its own state.
    pub fn handle_upgrade(hub: Arc<QueueHub>, ws: WebSocketUpgrade) -> impl IntoResponse {
        ws.on_upgrade(move |socket| handle_socket(socket, hub))
    }
}

// =============================================================================
// WebSocket Handler
// =============================================================================

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(hub): State<Arc<QueueHub>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Handles one observer connection.
async fn handle_socket(socket: WebSocket, hub: Arc<QueueHub>) {
    let observer_id = Uuid::new_v4().to_string();
    info!(observer_id = %observer_id, "Observer connected");

    {
        let mut observers = hub.observers.write().await;
        observers.insert(
            observer_id.clone(),
            ConnectedObserver {
                observer_id: observer_id.clone(),
                connected_at: Instant::now(),
            },
        );
    }

    let (mut sender, mut receiver) = socket.split();

    // All outgoing traffic (snapshots, events, pongs) funnels through one
    // ordered queue per observer
    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Message>(OUTGOING_BUFFER);

    let outgoing_handle = tokio::spawn(async move {
        while let Some(msg) = outgoing_rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Topics this observer follows; shared with the forwarder task
    let subscriptions: Arc<RwLock<HashSet<Topic>>> = Arc::new(RwLock::new(HashSet::new()));

    // Broadcast forwarding task: filter by subscription, detect lag
    let mut broadcast_rx = hub.subscribe_events();
    let forward_subscriptions = subscriptions.clone();
    let forward_outgoing = outgoing_tx.clone();
    let forward_observer_id = observer_id.clone();
    let forward_handle = tokio::spawn(async move {
        loop {
            match broadcast_rx.recv().await {
                Ok(envelope) => {
                    if !forward_subscriptions.read().await.contains(&envelope.topic) {
                        continue;
                    }
                    match ServerMessage::Event(envelope).to_json() {
                        Ok(json) => {
                            if forward_outgoing.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(observer_id = %forward_observer_id, ?e, "Failed to serialize event");
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Missed events are not queued; tell the observer to
                    // re-subscribe for a fresh snapshot
                    warn!(
                        observer_id = %forward_observer_id,
                        skipped,
                        "Observer lagged behind the event stream"
                    );
                    let resync = ServerMessage::Error {
                        code: "RESYNC_REQUIRED".to_string(),
                        message: format!("{skipped} events dropped; re-subscribe for a snapshot"),
                    };
                    if let Ok(json) = resync.to_json() {
                        if forward_outgoing.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Ping task
    let ping_outgoing = outgoing_tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_interval = interval(PING_INTERVAL);
        loop {
            ping_interval.tick().await;
            if ping_outgoing
                .send(Message::Ping(axum::body::Bytes::new()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    // Main receive loop
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                match ClientMessage::from_json(&text) {
                    Ok(msg) => {
                        handle_client_message(&hub, &observer_id, &subscriptions, &outgoing_tx, msg)
                            .await;
                    }
                    Err(e) => {
                        debug!(observer_id = %observer_id, ?e, "Invalid message format");
                    }
                }
            }
            Some(Ok(Message::Ping(data))) => {
                let _ = outgoing_tx.send(Message::Pong(data)).await;
            }
            Some(Ok(Message::Pong(_))) => {
                // Connection is alive
            }
            Some(Ok(Message::Close(_))) => {
                info!(observer_id = %observer_id, "Observer requested close");
                break;
            }
            Some(Ok(Message::Binary(_))) => {
                debug!(observer_id = %observer_id, "Ignoring binary frame");
            }
            Some(Err(e)) => {
                warn!(observer_id = %observer_id, ?e, "WebSocket error");
                break;
            }
            None => {
                info!(observer_id = %observer_id, "Observer disconnected");
                break;
            }
        }
    }

    // Cleanup
    ping_handle.abort();
    forward_handle.abort();
    outgoing_handle.abort();

    let mut observers = hub.observers.write().await;
    if observers.remove(&observer_id).is_some() {
        info!(observer_id = %observer_id, "Observer removed");
    }
}

/// Handles a parsed message from an observer.
async fn handle_client_message(
    hub: &Arc<QueueHub>,
    observer_id: &str,
    subscriptions: &Arc<RwLock<HashSet<Topic>>>,
    outgoing: &mpsc::Sender<Message>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::Subscribe { topics } => {
            for topic in topics {
                // Activate the subscription first, then send the snapshot
                // through the same ordered queue: an event that slips in
                // between is superseded by the snapshot that follows it
                subscriptions.write().await.insert(topic);

                match hub.snapshot(topic).await {
                    Ok(snapshot) => {
                        if let Ok(json) = ServerMessage::Snapshot(snapshot).to_json() {
                            let _ = outgoing.send(Message::Text(json.into())).await;
                        }
                        info!(observer_id = %observer_id, ?topic, "Observer subscribed");
                    }
                    Err(e) => {
                        warn!(observer_id = %observer_id, ?topic, ?e, "Snapshot failed");
                        let error = ServerMessage::Error {
                            code: "SNAPSHOT_FAILED".to_string(),
                            message: "could not build snapshot, try again".to_string(),
                        };
                        if let Ok(json) = error.to_json() {
                            let _ = outgoing.send(Message::Text(json.into())).await;
                        }
                    }
                }
            }
        }
        ClientMessage::Unsubscribe { topics } => {
            let mut subs = subscriptions.write().await;
            for topic in topics {
                subs.remove(&topic);
                info!(observer_id = %observer_id, ?topic, "Observer unsubscribed");
            }
        }
        ClientMessage::Ping { timestamp } => {
            let pong = ServerMessage::Pong {
                ping_timestamp: timestamp,
                pong_timestamp: chrono::Utc::now().to_rfc3339(),
            };
            if let Ok(json) = pong.to_json() {
                let _ = outgoing.send(Message::Text(json.into())).await;
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
