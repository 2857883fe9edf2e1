//! Best-effort delivery of events to registered connections.
//!
//! Nothing here returns an error: an event is encoded once and queued on
//! every open recipient. Closed or saturated sockets are skipped and left for
//! the heartbeat or disconnect path to clean up.

use std::sync::Arc;
use tracing::{error, trace};
use uuid::Uuid;

use crate::realtime::connection::{Connection, Outbound};
use crate::realtime::presence::PresenceRegistry;
use crate::realtime::protocol::ServerEvent;

impl PresenceRegistry {
    /// Deliver to every live connection of one user. Returns how many
    /// connections accepted the frame.
    pub fn send_to_user(&self, user_id: Uuid, event: &ServerEvent) -> usize {
        let recipients = self.connections_of(user_id);
        if recipients.is_empty() {
            trace!(user_id = %user_id, "no live connections, event not delivered");
            return 0;
        }
        Self::deliver(&recipients, event)
    }

    /// Deliver to every live connection of every registered user.
    pub fn broadcast_all(&self, event: &ServerEvent) -> usize {
        let recipients = self.all_connections();
        Self::deliver(&recipients, event)
    }

    pub(crate) fn deliver(recipients: &[Arc<Connection>], event: &ServerEvent) -> usize {
        if recipients.is_empty() {
            return 0;
        }

        let frame = match event.encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize event: {}", e);
                return 0;
            }
        };

        recipients
            .iter()
            .filter(|connection| connection.is_open())
            .filter(|connection| connection.push(Outbound::Text(frame.clone())))
            .count()
    }
}
