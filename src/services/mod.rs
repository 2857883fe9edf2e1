pub mod audit_logger;
pub mod retention;

pub use audit_logger::{AuditLogger, ClientInfo};
pub use retention::spawn_retention_sweep;
