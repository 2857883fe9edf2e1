pub mod admin_user;
pub mod audit_log;
pub mod conversation;
pub mod message;

pub use admin_user::AdminUser;
pub use audit_log::{AuditLog, NewAuditLog};
pub use conversation::{Conversation, ConversationSummary, Participant, ParticipantPair};
pub use message::{Message, NewMessage, UnreadCount};
