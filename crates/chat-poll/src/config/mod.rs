use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::election::{AccessPolicy, UserId};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub store: StoreConfig,
    pub election: ElectionConfig,
    pub webhook: WebhookConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let admin = match non_empty_var("POLL_ADMIN_ID") {
            Some(raw) => parse_identifier("POLL_ADMIN_ID", &raw)?,
            None => return Err(ConfigError::MissingAdminId),
        };
        let poll_chat = non_empty_var("POLL_CHAT_ID")
            .map(|raw| parse_identifier("POLL_CHAT_ID", &raw))
            .transpose()?;
        let eligible_voters_path = env::var("POLL_ELIGIBLE_VOTERS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("eligible_voters.txt"));

        let secret_token = non_empty_var("TELEGRAM_WEBHOOK_SECRET");

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            store: StoreConfig::from_env(),
            election: ElectionConfig {
                admin: UserId(admin),
                poll_chat,
                eligible_voters_path,
            },
            webhook: WebhookConfig { secret_token },
        })
    }
}

fn non_empty_var(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_identifier(variable: &'static str, raw: &str) -> Result<i64, ConfigError> {
    raw.parse::<i64>()
        .map_err(|_| ConfigError::InvalidIdentifier { variable })
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Location of the SQLite database holding election state.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_path: PathBuf,
}

impl StoreConfig {
    /// Reads `POLL_DATABASE_PATH` only, so offline tooling can reach the
    /// database without the rest of the service configuration.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let database_path = env::var("POLL_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("database.sqlite3"));
        Self { database_path }
    }
}

/// Who runs the election and who may vote.
#[derive(Debug, Clone)]
pub struct ElectionConfig {
    pub admin: UserId,
    pub poll_chat: Option<i64>,
    pub eligible_voters_path: PathBuf,
}

impl ElectionConfig {
    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::new(self.admin, self.poll_chat)
    }
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub secret_token: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    MissingAdminId,
    InvalidIdentifier { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingAdminId => write!(f, "POLL_ADMIN_ID must be set"),
            ConfigError::InvalidIdentifier { variable } => {
                write!(f, "{variable} must be an integer user or chat id")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::MissingAdminId
            | ConfigError::InvalidIdentifier { .. } => None,
        }
    }
}
