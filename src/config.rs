/// Configuration management for Prompt Party
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub access_gate: Option<AccessGateConfig>,
    pub email: Option<EmailConfig>,
    pub rate_limit: RateLimitConfig,
    pub api_keys: ApiKeyConfig,
    pub presence: PresenceConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub public_url: String,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access-token lifetime in seconds
    pub session_ttl: i64,
    /// Refresh-token lifetime in seconds
    pub refresh_ttl: i64,
    /// Secret required by /internal/cron endpoints
    pub cron_secret: Option<String>,
}

/// Optional site-wide access gate (password-protected instance)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGateConfig {
    /// Argon2 hash of the site password
    pub password_hash: String,
    /// Secret used to sign gate tokens
    pub token_secret: String,
    /// Gate-token lifetime in seconds
    pub token_ttl: i64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Global rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub authenticated_rps: u32,
    pub unauthenticated_rps: u32,
    pub burst_size: u32,
}

/// Public API key configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    /// Default per-key requests per minute
    pub default_rate_limit_per_minute: i64,
    /// Maximum keys a single user may hold
    pub max_keys_per_user: i64,
}

/// Presence tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Seconds without a heartbeat before a viewer is considered gone
    pub stale_after_secs: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("PP_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("PP_PORT")
            .unwrap_or_else(|_| "8420".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let public_url =
            env::var("PP_PUBLIC_URL").unwrap_or_else(|_| format!("http://{}:{}", hostname, port));
        let version = env::var("PP_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let data_directory: PathBuf = env::var("PP_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("PP_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("prompt_party.sqlite"));

        let jwt_secret = env::var("PP_JWT_SECRET")
            .map_err(|_| AppError::Validation("JWT secret required".to_string()))?;
        let session_ttl = env::var("PP_SESSION_TTL")
            .unwrap_or_else(|_| "7200".to_string())
            .parse()
            .unwrap_or(7200);
        let refresh_ttl = env::var("PP_REFRESH_TTL")
            .unwrap_or_else(|_| "2592000".to_string())
            .parse()
            .unwrap_or(2_592_000);
        let cron_secret = env::var("PP_CRON_SECRET").ok();

        // Gate is only active when both halves are configured
        let access_gate = match (
            env::var("PP_ACCESS_PASSWORD_HASH"),
            env::var("PP_ACCESS_TOKEN_SECRET"),
        ) {
            (Ok(password_hash), Ok(token_secret)) => Some(AccessGateConfig {
                password_hash,
                token_secret,
                token_ttl: env::var("PP_ACCESS_TOKEN_TTL")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()
                    .unwrap_or(86400),
            }),
            _ => None,
        };

        let email = if let Ok(smtp_url) = env::var("PP_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("PP_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let rate_limit_enabled = env::var("PP_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let authenticated_rps = env::var("PP_RATE_LIMIT_AUTHENTICATED_RPS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);
        let unauthenticated_rps = env::var("PP_RATE_LIMIT_UNAUTHENTICATED_RPS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);
        let burst_size = env::var("PP_RATE_LIMIT_BURST")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);

        let default_rate_limit_per_minute = env::var("PP_API_KEY_RATE_LIMIT_PER_MINUTE")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);
        let max_keys_per_user = env::var("PP_API_KEY_MAX_PER_USER")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let stale_after_secs = env::var("PP_PRESENCE_STALE_AFTER")
            .unwrap_or_else(|_| "90".to_string())
            .parse()
            .unwrap_or(90);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            authentication: AuthConfig {
                jwt_secret,
                session_ttl,
                refresh_ttl,
                cron_secret,
            },
            access_gate,
            email,
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                authenticated_rps,
                unauthenticated_rps,
                burst_size,
            },
            api_keys: ApiKeyConfig {
                default_rate_limit_per_minute,
                max_keys_per_user,
            },
            presence: PresenceConfig { stale_after_secs },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if let Some(gate) = &self.access_gate {
            if gate.token_secret.len() < 32 {
                return Err(AppError::Validation(
                    "Access token secret must be at least 32 characters".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8420,
                public_url: "http://localhost:8420".to_string(),
                version: "0.1.0".to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                database: "./data/prompt_party.sqlite".into(),
            },
            authentication: AuthConfig {
                jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
                session_ttl: 7200,
                refresh_ttl: 2_592_000,
                cron_secret: None,
            },
            access_gate: None,
            email: None,
            rate_limit: RateLimitConfig {
                enabled: true,
                authenticated_rps: 100,
                unauthenticated_rps: 10,
                burst_size: 50,
            },
            api_keys: ApiKeyConfig {
                default_rate_limit_per_minute: 60,
                max_keys_per_user: 10,
            },
            presence: PresenceConfig {
                stale_after_secs: 90,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn short_jwt_secret_rejected() {
        let mut config = base_config();
        config.authentication.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn short_gate_secret_rejected() {
        let mut config = base_config();
        config.access_gate = Some(AccessGateConfig {
            password_hash: "$argon2id$...".to_string(),
            token_secret: "short".to_string(),
            token_ttl: 86400,
        });
        assert!(config.validate().is_err());
    }
}
