// handlers/mod.rs - two security tiers
//
// Public (no auth): service descriptor and health.
// Protected (JWT auth): chat state for the admin console and UI audit events.
// The realtime socket authenticates in-band and lives in crate::realtime.
pub mod protected;
pub mod public;
