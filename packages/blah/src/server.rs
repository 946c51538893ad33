//! Relay server: hands each connection an identity and rebroadcasts its
//! text frames, attributed, to everyone else.

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;
use tokio::sync::{RwLock, mpsc};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use transcript::Identity;

use crate::data_url;
use crate::protocol::RelayFrame;

type Users = RwLock<HashMap<u64, mpsc::UnboundedSender<Message>>>;

pub struct RelayState {
    next_user_id: AtomicU64,
    users: Users,
    echo_to_sender: bool,
}

impl RelayState {
    pub fn new(echo_to_sender: bool) -> Self {
        Self {
            next_user_id: AtomicU64::new(1),
            users: RwLock::new(HashMap::new()),
            echo_to_sender,
        }
    }

    pub async fn connected_users(&self) -> usize {
        self.users.read().await.len()
    }
}

pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the relay on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<RelayState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "relay listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RelayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connect_user(socket, state))
}

async fn connect_user(socket: WebSocket, state: Arc<RelayState>) {
    let user_id = state.next_user_id.fetch_add(1, Ordering::Relaxed);
    info!(user_id, "new chat user");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let forward = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send(msg).await {
                warn!(user_id, error = %e, "websocket send error");
                break;
            }
        }
    });

    match serde_json::to_string(&RelayFrame::welcome(Identity::Number(user_id))) {
        Ok(json) => {
            let _ = tx.send(Message::Text(json.into()));
        }
        Err(e) => warn!(user_id, error = %e, "failed to encode welcome frame"),
    }
    state.users.write().await.insert(user_id, tx);

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => user_message(&state, user_id, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => debug!(user_id, "ignoring non-text frame"),
            Err(e) => {
                warn!(user_id, error = %e, "websocket error");
                break;
            }
        }
    }

    user_disconnected(&state, user_id).await;
    // The forward task ends once the last sender (held in `users`) is gone.
    let _ = forward.await;
}

async fn user_message(state: &RelayState, user_id: u64, text: &str) {
    if data_url::is_data_url(text) {
        match data_url::decode(text) {
            Ok(file) => info!(user_id, mime = %file.mime, bytes = file.bytes.len(), "relaying file"),
            Err(e) => debug!(user_id, error = %e, "relaying undecodable data url"),
        }
    } else {
        debug!(user_id, len = text.len(), "relaying message");
    }

    let json = match serde_json::to_string(&RelayFrame::chat(Identity::Number(user_id), text)) {
        Ok(json) => json,
        Err(e) => {
            warn!(user_id, error = %e, "failed to encode chat frame");
            return;
        }
    };

    let users = state.users.read().await;
    for (&uid, tx) in users.iter() {
        if uid != user_id || state.echo_to_sender {
            let _ = tx.send(Message::Text(json.clone().into()));
        }
    }
}

async fn user_disconnected(state: &RelayState, user_id: u64) {
    info!(user_id, "good bye user");
    state.users.write().await.remove(&user_id);
}
