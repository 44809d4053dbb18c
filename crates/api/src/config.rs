//! Application configuration

use std::env;
use std::time::Duration;

use investhub_entitlements::{AccessPolicy, ResolverConfig};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Data sources
    pub entity_api_url: Option<String>,
    pub entity_api_token: Option<String>,
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Authentication
    pub jwt_secret: Option<String>,
    pub jwt_expiry_hours: i64,

    // Entitlements
    pub resolver: ResolverConfig,
    pub guest_basic_access: bool,

    // Sessions
    pub session_idle: Duration,
    pub session_sweep_interval: Duration,

    // Logging
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let entity_api_url = non_empty("ENTITY_API_URL");
        let database_url = non_empty("DATABASE_URL");

        if entity_api_url.is_none() && database_url.is_none() {
            return Err(ConfigError::Missing("ENTITY_API_URL"));
        }

        let jwt_secret = match non_empty("JWT_SECRET") {
            Some(secret) if secret.len() < 32 => {
                return Err(ConfigError::WeakSecret(
                    "JWT_SECRET must be at least 32 characters",
                ));
            }
            Some(secret) => Some(secret),
            // Without a local secret, identity comes from the entity API
            None if entity_api_url.is_none() => return Err(ConfigError::Missing("JWT_SECRET")),
            None => None,
        };

        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),

            // Data sources
            entity_api_url,
            entity_api_token: non_empty("ENTITY_API_TOKEN"),
            database_url,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            // Authentication
            jwt_secret,
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),

            // Entitlements
            resolver: ResolverConfig::from_env(),
            guest_basic_access: env::var("GUEST_BASIC_ACCESS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),

            // Sessions
            session_idle: Duration::from_secs(
                env::var("SESSION_IDLE_SECS")
                    .unwrap_or_else(|_| "1800".to_string())
                    .parse()
                    .unwrap_or(1800),
            ),
            session_sweep_interval: Duration::from_secs(
                env::var("SESSION_SWEEP_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse::<u64>()
                    .unwrap_or(60)
                    .max(1),
            ),

            // Logging
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy {
            guest_basic_access: self.guest_basic_access,
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}
