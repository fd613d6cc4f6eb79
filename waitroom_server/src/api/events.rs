//! `/events`: websocket upgrade into a realtime [`Session`].
//!
//! This module only adapts axum's socket to the session's reader and writer
//! abstractions; the protocol itself lives in `waitroom_core::realtime`.

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use waitroom_core::model::EventMessage;
use waitroom_core::realtime::{Incoming, Session, SessionError, SocketWriter};

use crate::app::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, addr: SocketAddr) {
    let connection_id = state.next_connection_id(addr);
    debug!(%connection_id, "Websocket upgraded");

    let (sink, stream) = socket.split();
    let session = Session::new(
        connection_id,
        Arc::clone(state.controller.events()),
        Arc::clone(&state.ws_validator),
        Arc::clone(&state.clock),
        Arc::new(AxumSocketWriter::new(sink)),
        state.session.clone(),
    );
    session.run(stream.map(to_incoming), state.shutdown.clone()).await;
}

fn to_incoming(frame: Result<Message, axum::Error>) -> Result<Incoming, SessionError> {
    match frame {
        Ok(Message::Text(text)) => Ok(Incoming::Text(text.as_str().to_owned())),
        Ok(Message::Close(_)) => Ok(Incoming::Close),
        Ok(_) => Ok(Incoming::Other),
        Err(e) => Err(SessionError::Transport(e.to_string())),
    }
}

/// Write half of an axum websocket. Writes are serialized by the mutex since
/// events, pings and replies come from different tasks.
struct AxumSocketWriter {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl AxumSocketWriter {
    fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink: Mutex::new(sink) }
    }

    async fn send(&self, message: Message) -> Result<(), SessionError> {
        self.sink
            .lock()
            .await
            .send(message)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }
}

#[async_trait]
impl SocketWriter for AxumSocketWriter {
    async fn send_message(&self, message: &EventMessage) -> Result<(), SessionError> {
        let text = serde_json::to_string(message).map_err(|e| SessionError::Encode(e.to_string()))?;
        self.send(Message::Text(text.into())).await
    }

    async fn send_ping(&self) -> Result<(), SessionError> {
        self.send(Message::Ping(Bytes::new())).await
    }

    async fn close(&self) {
        if let Err(e) = self.sink.lock().await.close().await {
            debug!("Websocket close failed: {}", e);
        }
    }
}
