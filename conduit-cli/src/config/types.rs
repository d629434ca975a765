use std::time::Duration;

use conduit_core::DEFAULT_CHANNEL_CAPACITY;
use conduit_server::{ServerConfig, TransportKind};
use serde::{Deserialize, Serialize};

/// Default host for the conduit server
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default port for the conduit server
pub const DEFAULT_PORT: u16 = 3000;
/// Default work-item API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://app.asana.com/api/1.0";
/// Environment variable holding the API access token by default
pub const DEFAULT_TOKEN_ENV: &str = "ASANA_ACCESS_TOKEN";

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConduitConfig {
    #[serde(default)]
    pub server: RawServerConfig,

    #[serde(default)]
    pub api: RawApiConfig,
}

/// Server config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub transport: Option<TransportKind>,
    pub channel_capacity: Option<usize>,
    pub shutdown_timeout_ms: Option<u64>,
}

/// API config as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawApiConfig {
    pub base_url: Option<String>,
    pub token_env: Option<String>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConduitConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub api: ApiSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Stream transport (`sse` or `streamable-http`)
    pub transport: TransportKind,

    /// Frames buffered per session
    pub channel_capacity: usize,

    /// Per-session bound on the shutdown sweep; unbounded when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_timeout_ms: Option<u64>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            transport: TransportKind::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            shutdown_timeout_ms: None,
        }
    }
}

impl ServerSection {
    /// Convert into the server crate's runtime config
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            transport: self.transport,
            channel_capacity: self.channel_capacity,
            shutdown_timeout: self.shutdown_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiSection {
    /// Base URL of the work-item API
    pub base_url: String,

    /// Name of the environment variable holding the access token
    pub token_env: String,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}
