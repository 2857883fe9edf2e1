use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{AuthUser, TokenVerifier};
use crate::database::models::{NewMessage, ParticipantPair};
use crate::database::store::{ChatStore, StoreError};
use crate::realtime::connection::{Outbound, Session, SessionState};
use crate::realtime::presence::PresenceRegistry;
use crate::realtime::protocol::{ClientFrame, ConversationUpdate, ServerEvent};

/// Dispatches inbound frames for one session at a time.
///
/// Failures stay inside the frame that caused them: persistence errors are
/// logged and the frame is abandoned, nothing is reported to the client.
#[derive(Clone)]
pub struct MessagingHandler {
    store: Arc<dyn ChatStore>,
    presence: Arc<PresenceRegistry>,
    verifier: Arc<TokenVerifier>,
}

impl MessagingHandler {
    pub fn new(store: Arc<dyn ChatStore>, presence: Arc<PresenceRegistry>, verifier: Arc<TokenVerifier>) -> Self {
        Self {
            store,
            presence,
            verifier,
        }
    }

    pub fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.presence
    }

    /// Handle one raw text frame. Unparseable frames are dropped silently.
    pub async fn handle_text(&self, session: &mut Session, raw: &str) {
        match ClientFrame::parse(raw) {
            Some(frame) => self.handle_frame(session, frame).await,
            None => debug!(conn_id = %session.connection().id(), "dropping malformed frame"),
        }
    }

    pub async fn handle_frame(&self, session: &mut Session, frame: ClientFrame) {
        let user = match session.state() {
            SessionState::Authenticated(user) => user.clone(),
            SessionState::Unauthenticated => {
                match frame {
                    ClientFrame::Auth { token } => self.authenticate(session, &token),
                    other => debug!(
                        conn_id = %session.connection().id(),
                        frame = other.kind(),
                        "ignoring frame before AUTH"
                    ),
                }
                return;
            }
            SessionState::Closed => return,
        };

        match frame {
            ClientFrame::Auth { .. } => {
                debug!(conn_id = %session.connection().id(), "already authenticated, ignoring AUTH");
            }
            ClientFrame::SendMessage { receiver_id, text } => {
                self.send_message(&user, receiver_id, text.as_deref()).await;
            }
            ClientFrame::ReadMessage { conversation_id } => {
                self.mark_read(&user, conversation_id).await;
            }
            ClientFrame::TypingStart { receiver_id } => self.typing(&user, receiver_id, true),
            ClientFrame::TypingStop { receiver_id } => self.typing(&user, receiver_id, false),
        }
    }

    fn authenticate(&self, session: &mut Session, token: &str) {
        let connection = session.connection().clone();

        match self.verifier.verify(token) {
            Ok(user) => {
                let user_id = user.user_id;
                session.authenticate(user);
                self.presence.register(user_id, connection.clone());
                connection.send_event(&ServerEvent::AuthSuccess { user_id });
                info!(user_id = %user_id, conn_id = %connection.id(), "socket authenticated");
            }
            Err(e) => {
                warn!(conn_id = %connection.id(), "socket auth failed: {}", e);
                connection.send_event(&ServerEvent::AuthError {});
                connection.push(Outbound::Close);
                session.close();
            }
        }
    }

    async fn send_message(&self, sender: &AuthUser, receiver_id: Option<Uuid>, text: Option<&str>) {
        let Some(receiver_id) = receiver_id else {
            debug!(user_id = %sender.user_id, "SEND_MESSAGE without receiver dropped");
            return;
        };
        let text = text.map(str::trim).unwrap_or_default();
        if text.is_empty() {
            debug!(user_id = %sender.user_id, "SEND_MESSAGE with empty text dropped");
            return;
        }

        if let Err(e) = self.deliver_message(sender.user_id, receiver_id, text).await {
            warn!(
                sender = %sender.user_id,
                receiver = %receiver_id,
                "failed to persist message: {}", e
            );
        }
    }

    async fn deliver_message(&self, sender: Uuid, receiver: Uuid, text: &str) -> Result<(), StoreError> {
        let conversation = self
            .store
            .find_or_create_conversation(ParticipantPair::new(sender, receiver))
            .await?;

        let message = self
            .store
            .create_message(NewMessage {
                conversation_id: conversation.id,
                sender,
                receiver,
                text: text.to_string(),
            })
            .await?;

        let conversation = self.store.touch_conversation(conversation.id, text, sender).await?;

        let message_id = message.id;
        let event = ServerEvent::NewMessage(message);
        self.presence.send_to_user(sender, &event);
        if receiver != sender {
            self.presence.send_to_user(receiver, &event);
        }

        if self.presence.is_online(receiver) {
            self.presence
                .send_to_user(sender, &ServerEvent::MessageDelivered { message_id });
        }

        self.presence
            .broadcast_all(&ServerEvent::ConversationUpdate(ConversationUpdate {
                conversation_id: conversation.id,
                sender,
                receiver,
                last_message: conversation.last_message,
                updated_at: conversation.updated_at,
            }));
        Ok(())
    }

    async fn mark_read(&self, reader: &AuthUser, conversation_id: Uuid) {
        let flipped = match self.store.mark_read(conversation_id, reader.user_id).await {
            Ok(flipped) => flipped,
            Err(e) => {
                warn!(
                    user_id = %reader.user_id,
                    conversation_id = %conversation_id,
                    "failed to mark messages read: {}", e
                );
                return;
            }
        };

        for message in &flipped {
            self.presence
                .send_to_user(message.sender, &ServerEvent::MessageRead { message_id: message.id });
        }
    }

    fn typing(&self, user: &AuthUser, receiver_id: Uuid, started: bool) {
        let event = if started {
            ServerEvent::TypingStart { user_id: user.user_id }
        } else {
            ServerEvent::TypingStop { user_id: user.user_id }
        };
        self.presence.send_to_user(receiver_id, &event);
    }

    /// Tear down a session: unregister its connection and mark it closed.
    pub fn disconnect(&self, session: &mut Session) {
        let connection = session.connection().clone();
        self.presence.unregister(&connection);
        if let Some(user) = session.user() {
            debug!(user_id = %user.user_id, conn_id = %connection.id(), "socket disconnected");
        }
        session.close();
    }
}
