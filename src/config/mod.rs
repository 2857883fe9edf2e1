use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub realtime: RealtimeConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string. When absent the in-memory store is used.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub heartbeat_interval_secs: u64,
    pub auth_timeout_secs: u64,
    pub outbound_buffer: usize,
    pub message_ttl_secs: u64,
    pub retention_sweep_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

/// Upper bound for message retention; larger values would push the retention
/// cutoff outside the representable timestamp range.
pub const MAX_MESSAGE_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Upper bound for issued token lifetime.
pub const MAX_JWT_EXPIRY_HOURS: u64 = 10 * 365 * 24;

impl RealtimeConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn retention_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.retention_sweep_secs)
    }

    pub fn message_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.message_ttl_secs.min(MAX_MESSAGE_TTL_SECS) as i64)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("REALTIME_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Realtime overrides
        if let Ok(v) = env::var("REALTIME_HEARTBEAT_SECS") {
            self.realtime.heartbeat_interval_secs = v.parse().unwrap_or(self.realtime.heartbeat_interval_secs);
        }
        if let Ok(v) = env::var("REALTIME_AUTH_TIMEOUT_SECS") {
            self.realtime.auth_timeout_secs = v.parse().unwrap_or(self.realtime.auth_timeout_secs);
        }
        if let Ok(v) = env::var("REALTIME_OUTBOUND_BUFFER") {
            self.realtime.outbound_buffer = v.parse().unwrap_or(self.realtime.outbound_buffer);
        }
        if let Ok(v) = env::var("REALTIME_MESSAGE_TTL_SECS") {
            self.realtime.message_ttl_secs = v
                .parse()
                .unwrap_or(self.realtime.message_ttl_secs)
                .min(MAX_MESSAGE_TTL_SECS);
        }
        if let Ok(v) = env::var("REALTIME_RETENTION_SWEEP_SECS") {
            self.realtime.retention_sweep_secs = v.parse().unwrap_or(self.realtime.retention_sweep_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v
                .parse()
                .unwrap_or(self.security.jwt_expiry_hours)
                .min(MAX_JWT_EXPIRY_HOURS);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            realtime: RealtimeConfig {
                heartbeat_interval_secs: 30,
                auth_timeout_secs: 30,
                outbound_buffer: 256,
                message_ttl_secs: 24 * 60 * 60,
                retention_sweep_secs: 60,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            realtime: RealtimeConfig {
                heartbeat_interval_secs: 30,
                auth_timeout_secs: 15,
                outbound_buffer: 256,
                message_ttl_secs: 24 * 60 * 60,
                retention_sweep_secs: 60,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            realtime: RealtimeConfig {
                heartbeat_interval_secs: 30,
                auth_timeout_secs: 10,
                outbound_buffer: 512,
                message_ttl_secs: 24 * 60 * 60,
                retention_sweep_secs: 300,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
