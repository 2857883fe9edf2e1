use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::TokenVerifier;
use crate::config::{RealtimeConfig, SecurityConfig};
use crate::database::store::ChatStore;
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::realtime::{socket, AuditHook, MessagingHandler, PresenceRegistry, SocketSettings};
use crate::services::AuditLogger;

/// Shared dependencies injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub presence: Arc<PresenceRegistry>,
    pub verifier: Arc<TokenVerifier>,
    pub messaging: MessagingHandler,
    pub audit: AuditLogger,
    pub socket: SocketSettings,
}

impl AppState {
    pub fn new(store: Arc<dyn ChatStore>, verifier: TokenVerifier, realtime: &RealtimeConfig) -> Self {
        let presence = Arc::new(PresenceRegistry::new());
        let verifier = Arc::new(verifier);
        let messaging = MessagingHandler::new(store.clone(), presence.clone(), verifier.clone());
        let audit = AuditLogger::new(store.clone(), AuditHook::new(presence.clone()));

        Self {
            store,
            presence,
            verifier,
            messaging,
            audit,
            socket: SocketSettings::from(realtime),
        }
    }
}

pub fn router(state: AppState, security: &SecurityConfig) -> Router {
    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Realtime socket (authenticates in-band)
        .route("/ws", get(socket::ws_handler))
        // Protected API
        .merge(chat_routes(state.clone()))
        .merge(audit_routes(state.clone()))
        // Global middleware
        .layer(cors_layer(security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn chat_routes(state: AppState) -> Router<AppState> {
    use protected::chat;

    Router::new()
        .route("/api/chat/users", get(chat::users))
        .route("/api/chat/conversations", get(chat::conversations))
        .route("/api/chat/unread", get(chat::unread))
        .route("/api/chat/messages/:conversation_id", get(chat::messages))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn audit_routes(state: AppState) -> Router<AppState> {
    use protected::audit;

    Router::new()
        .route("/api/audit/ui", post(audit::ui_action))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}
