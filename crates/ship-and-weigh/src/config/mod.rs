use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::api::auth::{Capability, Session};

pub const DEFAULT_EASYPOST_BASE_URL: &str = "https://api.easypost.com/v2";

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
    /// Diagnostic mode; mirrors the host platform's debug switch.
    pub debug: bool,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub easypost: EasyPostConfig,
    pub admin: Option<Session>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let debug = match env::var("APP_DEBUG") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag { name: "APP_DEBUG" })?,
            Err(_) => environment == AppEnvironment::Development,
        };

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let store_path = env::var("APP_STORE_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let api_key = env::var("EASYPOST_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let base_url = env::var("EASYPOST_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_EASYPOST_BASE_URL.to_string());
        let timeout_secs = env::var("EASYPOST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        let admin = match env::var("APP_ADMIN_TOKEN") {
            Ok(token) if !token.trim().is_empty() => {
                let nonce = env::var("APP_ADMIN_NONCE").map_err(|_| ConfigError::MissingNonce)?;
                let user = env::var("APP_ADMIN_USER").unwrap_or_else(|_| "admin".to_string());
                Some(Session {
                    token,
                    user,
                    nonce,
                    capabilities: vec![Capability::ManageOptions],
                })
            }
            _ => None,
        };

        Ok(Self {
            environment,
            debug,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig { path: store_path },
            easypost: EasyPostConfig {
                api_key,
                base_url,
                timeout: Duration::from_secs(timeout_secs),
            },
            admin,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
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

/// Where options are persisted. `None` keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

/// Credentials and endpoint for the address verification provider.
#[derive(Clone)]
pub struct EasyPostConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl fmt::Debug for EasyPostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EasyPostConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    InvalidFlag { name: &'static str },
    MissingNonce,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "EASYPOST_TIMEOUT_SECS must be a whole number of seconds")
            }
            ConfigError::InvalidFlag { name } => write!(f, "{name} must be a boolean flag"),
            ConfigError::MissingNonce => {
                write!(f, "APP_ADMIN_NONCE is required when APP_ADMIN_TOKEN is set")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
