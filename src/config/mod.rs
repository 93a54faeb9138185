use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub tenancy: TenancyConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Default tracing filter, overridable via RUST_LOG.
    pub log_filter: String,
    /// Public base URL used when building share links and parsing subdomains.
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub cookie_name: String,
    pub expiry_days: i64,
    /// Static operator bearer token; unset means staff auth is disabled.
    pub staff_token: Option<String>,
    /// Development only: echo issued magic tokens in API responses so the
    /// login flow is drivable without email delivery.
    pub echo_magic_tokens: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    pub trial_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for stored receipt images.
    pub receipt_root: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("GRAFT_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Environment presets first, then specific env var overrides
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("PORT").or_else(|_| env::var("GRAFT_API_PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("GRAFT_LOG_FILTER") {
            self.server.log_filter = v;
        }
        if let Ok(v) = env::var("APP_BASE_URL") {
            self.server.base_url = v.trim_end_matches('/').to_string();
        }

        // Database overrides (DATABASE_URL itself is read by the pool manager)
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECT_TIMEOUT") {
            self.database.connect_timeout_secs = v.parse().unwrap_or(self.database.connect_timeout_secs);
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_SECRET") {
            self.session.secret = v;
        }
        if let Ok(v) = env::var("SESSION_COOKIE_NAME") {
            self.session.cookie_name = v;
        }
        if let Ok(v) = env::var("SESSION_EXPIRY_DAYS") {
            self.session.expiry_days = v.parse().unwrap_or(self.session.expiry_days);
        }
        if let Ok(v) = env::var("STAFF_TOKEN") {
            if !v.is_empty() {
                self.session.staff_token = Some(v);
            }
        }
        if let Ok(v) = env::var("ECHO_MAGIC_TOKENS") {
            self.session.echo_magic_tokens = v.parse().unwrap_or(self.session.echo_magic_tokens);
        }

        // Tenancy overrides
        if let Ok(v) = env::var("TRIAL_DAYS") {
            self.tenancy.trial_days = v.parse().unwrap_or(self.tenancy.trial_days);
        }

        // Storage overrides
        if let Ok(v) = env::var("RECEIPT_STORAGE_ROOT") {
            self.storage.receipt_root = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                log_filter: "graft_api=debug,tower_http=debug".to_string(),
                base_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                max_connections: 10,
                connect_timeout_secs: 30,
            },
            session: SessionConfig {
                secret: "graft-dev-secret-change-in-production".to_string(),
                cookie_name: "graft_session".to_string(),
                expiry_days: 7,
                staff_token: None,
                echo_magic_tokens: true,
            },
            tenancy: TenancyConfig { trial_days: 7 },
            storage: StorageConfig {
                receipt_root: "./data/receipts".to_string(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                log_filter: "graft_api=debug,tower_http=info".to_string(),
                base_url: "https://staging.graft.example.com".to_string(),
            },
            database: DatabaseConfig {
                max_connections: 20,
                connect_timeout_secs: 10,
            },
            session: SessionConfig {
                secret: String::new(),
                cookie_name: "graft_session".to_string(),
                expiry_days: 7,
                staff_token: None,
                echo_magic_tokens: true,
            },
            tenancy: TenancyConfig { trial_days: 7 },
            storage: StorageConfig {
                receipt_root: "/var/lib/graft/receipts".to_string(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                log_filter: "graft_api=info,tower_http=warn".to_string(),
                base_url: "https://graft.example.com".to_string(),
            },
            database: DatabaseConfig {
                max_connections: 50,
                connect_timeout_secs: 5,
            },
            session: SessionConfig {
                secret: String::new(),
                cookie_name: "graft_session".to_string(),
                expiry_days: 7,
                staff_token: None,
                echo_magic_tokens: false,
            },
            tenancy: TenancyConfig { trial_days: 7 },
            storage: StorageConfig {
                receipt_root: "/var/lib/graft/receipts".to_string(),
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
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_echoes_magic_tokens() {
        let config = AppConfig::development();
        assert!(config.session.echo_magic_tokens);
        assert_eq!(config.session.expiry_days, 7);
        assert_eq!(config.tenancy.trial_days, 7);
    }

    #[test]
    fn production_does_not_echo_magic_tokens() {
        let config = AppConfig::production();
        assert!(!config.session.echo_magic_tokens);
        assert!(config.session.staff_token.is_none());
    }
}
