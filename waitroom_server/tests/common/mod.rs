//! A real server on an ephemeral port, backed by the in-memory store, a fake
//! device manager and a manual clock.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use waitroom_core::RegistryResult;
use waitroom_core::auth::{AuthToken, JwtValidator, ManualClock};
use waitroom_core::controller::{Controller, ControllerConfig};
use waitroom_core::devicemanager::DeviceManager;
use waitroom_core::model::{Device, EventMessage};
use waitroom_core::persistence::MemoryStore;
use waitroom_core::realtime::{SessionConfig, SubscriptionRegistry};
use waitroom_server::app::{self, AppState};

const PRIVATE_KEY: &str = include_str!("../../../testdata/jwt_test_key.pem");
const PUBLIC_KEY: &str = include_str!("../../../testdata/jwt_test_key.pub.pem");

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Default)]
pub struct RecordingDeviceManager {
    pub adopted: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl DeviceManager for RecordingDeviceManager {
    async fn adopt(&self, token: &AuthToken, device: &Device) -> RegistryResult<()> {
        self.adopted.lock().unwrap().push((token.user_id.clone(), device.local_id.clone()));
        Ok(())
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub manager: Arc<RecordingDeviceManager>,
    pub shutdown: CancellationToken,
    pub handle: axum_server::Handle,
    pub http: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> TestServer {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::new());
        let manager = Arc::new(RecordingDeviceManager::default());
        let controller = Arc::new(Controller::new(
            store.clone(),
            manager.clone(),
            Arc::new(SubscriptionRegistry::new()),
            clock.clone(),
            ControllerConfig::default(),
        ));
        let shutdown = CancellationToken::new();
        let state = Arc::new(AppState::new(
            controller,
            Arc::new(JwtValidator::unverified()),
            Arc::new(JwtValidator::with_public_key(PUBLIC_KEY).unwrap()),
            clock.clone(),
            SessionConfig { ping_period: Duration::from_secs(3600), debug: true },
            shutdown.clone(),
        ));

        let handle = axum_server::Handle::new();
        tokio::spawn(app::serve("127.0.0.1:0".parse().unwrap(), state, handle.clone()));
        let addr = handle.listening().await.expect("server did not bind");

        TestServer { addr, clock, store, manager, shutdown, handle, http: reqwest::Client::new() }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect_ws(&self) -> WsClient {
        let (ws, _) = connect_async(format!("ws://{}/events", self.addr)).await.unwrap();
        ws
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
        self.handle.graceful_shutdown(Some(Duration::from_secs(1)));
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    exp: i64,
}

/// A signed `Bearer` token for `user_id` expiring `valid_for` from now.
pub fn token_for(user_id: &str, valid_for: ChronoDuration) -> String {
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
    let exp = (Utc::now() + valid_for).timestamp();
    let jwt = encode(&Header::new(Algorithm::RS256), &Claims { sub: user_id, exp }, &key).unwrap();
    format!("Bearer {jwt}")
}

pub fn token(user_id: &str) -> String {
    token_for(user_id, ChronoDuration::hours(1))
}

pub async fn send_event(ws: &mut WsClient, message: &EventMessage) {
    ws.send(Message::Text(serde_json::to_string(message).unwrap().into())).await.unwrap();
}

/// Next text frame, skipping pings and pongs.
pub async fn next_event(ws: &mut WsClient) -> EventMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// `None` when no text frame arrives within `wait`.
pub async fn maybe_event(ws: &mut WsClient, wait: Duration) -> Option<EventMessage> {
    tokio::time::timeout(wait, next_event(ws)).await.ok()
}
