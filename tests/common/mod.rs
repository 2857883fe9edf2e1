#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::{tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use admin_realtime::app::{router, AppState};
use admin_realtime::auth::{AuthUser, TokenVerifier};
use admin_realtime::config::AppConfig;
use admin_realtime::database::models::AdminUser;
use admin_realtime::database::MemoryChatStore;

pub const SECRET: &str = "integration-test-secret";
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(3);

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One in-process server per test. Each `#[tokio::test]` owns its runtime, so
/// the server is started on that runtime and aborted on drop.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub ws_url: String,
    pub store: Arc<MemoryChatStore>,
    verifier: TokenVerifier,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with_users(Vec::new()).await
    }

    pub async fn spawn_with_users(users: Vec<AdminUser>) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let ws_url = format!("ws://127.0.0.1:{}/ws", port);

        let mut config = AppConfig::development();
        config.security.jwt_secret = SECRET.to_string();
        config.realtime.auth_timeout_secs = 2;

        let store = Arc::new(MemoryChatStore::with_users(config.realtime.message_ttl(), users));
        let state = AppState::new(
            store.clone(),
            TokenVerifier::new(SECRET, config.security.jwt_expiry_hours),
            &config.realtime,
        );
        let app = router(state, &config.security);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            port,
            base_url,
            ws_url,
            store,
            verifier: TokenVerifier::new(SECRET, config.security.jwt_expiry_hours),
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self, user_id: Uuid, name: &str) -> String {
        self.verifier
            .issue(&AuthUser {
                user_id,
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                role: "admin".to_string(),
            })
            .expect("issue test token")
    }

    pub async fn connect(&self) -> Result<Socket> {
        let (socket, _) = tokio_tungstenite::connect_async(self.ws_url.as_str())
            .await
            .context("websocket connect failed")?;
        Ok(socket)
    }

    /// Connect and complete AUTH for `user_id`.
    pub async fn login(&self, user_id: Uuid, name: &str) -> Result<Socket> {
        let mut socket = self.connect().await?;
        send_json(&mut socket, json!({ "type": "AUTH", "token": self.token(user_id, name) })).await?;
        let event = next_event(&mut socket, "AUTH_SUCCESS").await?;
        assert_eq!(event["data"]["userId"], json!(user_id));
        Ok(socket)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn admin(name: &str) -> AdminUser {
    AdminUser {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        role: "admin".to_string(),
        color: "#4f46e5".to_string(),
        is_active: true,
    }
}

pub async fn send_json(socket: &mut Socket, frame: Value) -> Result<()> {
    socket.send(WsMessage::Text(frame.to_string())).await?;
    Ok(())
}

/// Wait for the next event of type `kind`, skipping everything else.
pub async fn next_event(socket: &mut Socket, kind: &str) -> Result<Value> {
    tokio::time::timeout(EVENT_TIMEOUT, read_until(socket, kind))
        .await
        .with_context(|| format!("timed out waiting for {}", kind))?
}

async fn read_until(socket: &mut Socket, kind: &str) -> Result<Value> {
    while let Some(frame) = socket.next().await {
        if let WsMessage::Text(text) = frame? {
            let event: Value = serde_json::from_str(&text)?;
            if event["type"] == kind {
                return Ok(event);
            }
        }
    }
    bail!("socket closed while waiting for {}", kind)
}

/// Fails if an event of type `kind` shows up within `window`.
pub async fn expect_no_event(socket: &mut Socket, kind: &str, window: Duration) -> Result<()> {
    match tokio::time::timeout(window, next_event(socket, kind)).await {
        Ok(Ok(event)) => bail!("unexpected {} event: {}", kind, event),
        _ => Ok(()),
    }
}

/// Drain frames until the server closes the socket.
pub async fn wait_closed(socket: &mut Socket) -> Result<()> {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while let Some(frame) = socket.next().await {
            match frame {
                Ok(WsMessage::Close(_)) | Err(_) => return,
                Ok(_) => {}
            }
        }
    })
    .await
    .context("server did not close the socket")
}
