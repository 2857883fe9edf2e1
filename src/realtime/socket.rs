use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::time::Duration;
use tracing::{debug, info};

use crate::app::AppState;
use crate::config::RealtimeConfig;
use crate::realtime::connection::{Connection, Outbound, Session};
use crate::realtime::handler::MessagingHandler;

/// How long a closing socket gets to flush its queue.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-socket limits
#[derive(Debug, Clone, Copy)]
pub struct SocketSettings {
    pub outbound_buffer: usize,
    pub auth_timeout: Duration,
}

impl From<&RealtimeConfig> for SocketSettings {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            outbound_buffer: config.outbound_buffer,
            auth_timeout: config.auth_timeout(),
        }
    }
}

/// GET /ws - upgrade to the realtime protocol
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let messaging = state.messaging.clone();
    let settings = state.socket;
    ws.on_upgrade(move |socket| serve_connection(socket, messaging, settings))
}

/// Drive one socket until the peer leaves, auth fails or times out, or the
/// heartbeat terminates it.
pub async fn serve_connection(socket: WebSocket, messaging: MessagingHandler, settings: SocketSettings) {
    let (connection, mut outbound) = Connection::new(settings.outbound_buffer);
    let conn_id = connection.id();
    info!(conn_id = %conn_id, "websocket connected");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(item) = outbound.recv().await {
            let sent = match item {
                Outbound::Text(frame) => sink.send(Message::Text(frame.to_string())).await,
                Outbound::Ping => sink.send(Message::Ping(Vec::new())).await,
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            };
            if sent.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut session = Session::new(connection.clone());
    let auth_deadline = tokio::time::sleep(settings.auth_timeout);
    tokio::pin!(auth_deadline);

    loop {
        let awaiting_auth = !session.is_authenticated();

        tokio::select! {
            _ = connection.terminated() => {
                debug!(conn_id = %conn_id, "terminated by heartbeat");
                break;
            }
            _ = &mut auth_deadline, if awaiting_auth => {
                debug!(conn_id = %conn_id, "no AUTH within {:?}, closing", settings.auth_timeout);
                connection.push(Outbound::Close);
                break;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => messaging.handle_text(&mut session, &text).await,
                Some(Ok(Message::Pong(_))) => connection.mark_alive(),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(conn_id = %conn_id, "websocket error: {}", e);
                    break;
                }
            },
        }

        if session.is_closed() {
            break;
        }
    }

    messaging.disconnect(&mut session);
    drop(session);
    drop(connection);

    // The registry no longer holds the connection, so the queue closes once
    // the writer has flushed it.
    let abort = writer.abort_handle();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        abort.abort();
    }
    info!(conn_id = %conn_id, "websocket closed");
}
