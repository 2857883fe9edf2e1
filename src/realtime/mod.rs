//! Realtime messaging over WebSocket: presence, chat and event fan-out.

pub mod audit;
pub mod connection;
pub mod fanout;
pub mod handler;
pub mod presence;
pub mod protocol;
pub mod socket;

pub use audit::AuditHook;
pub use connection::{Connection, ConnectionId, Outbound, Session, SessionState};
pub use handler::MessagingHandler;
pub use presence::{PresenceRegistry, SweepReport};
pub use protocol::{ClientFrame, ConversationUpdate, ServerEvent};
pub use socket::SocketSettings;
