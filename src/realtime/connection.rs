use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::realtime::protocol::ServerEvent;

pub type ConnectionId = Uuid;

/// Items queued for a socket's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(Arc<str>),
    Ping,
    Close,
}

/// Handle to one live socket, shared between its session task and the
/// presence registry.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<Outbound>,
    alive: AtomicBool,
    terminate: Notify,
    user: OnceLock<Uuid>,
}

impl Connection {
    pub fn new(buffer: usize) -> (Arc<Self>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let connection = Arc::new(Self {
            id: Uuid::new_v4(),
            tx,
            alive: AtomicBool::new(true),
            terminate: Notify::new(),
            user: OnceLock::new(),
        });
        (connection, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The user bound by a successful AUTH, if any.
    pub fn user(&self) -> Option<Uuid> {
        self.user.get().copied()
    }

    pub(crate) fn bind_user(&self, user_id: Uuid) -> bool {
        self.user.set(user_id).is_ok() || self.user() == Some(user_id)
    }

    /// False once the writer side has gone away.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue without waiting. Returns false if the socket is closed or its
    /// queue is full; the frame is dropped in both cases.
    pub fn push(&self, item: Outbound) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(conn_id = %self.id, "outbound queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn send_event(&self, event: &ServerEvent) -> bool {
        match event.encode() {
            Ok(frame) => self.push(Outbound::Text(frame)),
            Err(e) => {
                error!("Failed to serialize event: {}", e);
                false
            }
        }
    }

    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
    }

    /// Read and clear the liveness flag.
    pub fn take_alive(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }

    /// Ask the owning session task to drop the socket.
    pub fn terminate(&self) {
        self.terminate.notify_one();
    }

    pub async fn terminated(&self) {
        self.terminate.notified().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(AuthUser),
    Closed,
}

/// Per-socket protocol state: `Unauthenticated -> Authenticated -> Closed`.
#[derive(Debug)]
pub struct Session {
    connection: Arc<Connection>,
    state: SessionState,
}

impl Session {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self {
            connection,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user(&self) -> Option<&AuthUser> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed)
    }

    pub(crate) fn authenticate(&mut self, user: AuthUser) {
        if matches!(self.state, SessionState::Unauthenticated) {
            self.state = SessionState::Authenticated(user);
        }
    }

    pub(crate) fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}
