// handlers/protected/mod.rs - JWT authentication required
//
// Route prefix: /api/*. `jwt_auth_middleware` puts the caller's `AuthUser`
// into request extensions before any of these run.
pub mod audit;
pub mod chat;
