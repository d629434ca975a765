use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use super::types::{
    ApiSection, ConduitConfig, RawApiConfig, RawConduitConfig, RawServerConfig, ServerSection,
};
use crate::error::StartupConfigError;

/// Environment variable overriding the project config directory
pub const PROJECT_CONFIG_DIR_ENV: &str = "CONDUIT_PROJECT_CONFIG_DIR";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (defaults, then user, then project)
    pub fn load() -> Result<ConduitConfig, StartupConfigError> {
        Self::load_from(
            Self::user_config_path().as_deref(),
            &Self::project_config_path(),
        )
    }

    /// Load from explicit layer paths; missing files are skipped
    pub fn load_from(
        user_path: Option<&Path>,
        project_path: &Path,
    ) -> Result<ConduitConfig, StartupConfigError> {
        let mut raw = RawConduitConfig::default();

        // Layer 1: User config
        if let Some(user_path) = user_path
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_layer(user_path)?);
        }

        // Layer 2: Project config
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_layer(project_path)?);
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "conduit").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with CONDUIT_PROJECT_CONFIG_DIR (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var(PROJECT_CONFIG_DIR_ENV) {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".conduit/config.toml")
        }
    }

    fn read_layer(path: &Path) -> Result<RawConduitConfig, StartupConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| StartupConfigError::ConfigFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        toml::from_str(&contents).map_err(|e| StartupConfigError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawConduitConfig, overlay: RawConduitConfig) -> RawConduitConfig {
        RawConduitConfig {
            server: RawServerConfig {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
                transport: overlay.server.transport.or(base.server.transport),
                channel_capacity: overlay
                    .server
                    .channel_capacity
                    .or(base.server.channel_capacity),
                shutdown_timeout_ms: overlay
                    .server
                    .shutdown_timeout_ms
                    .or(base.server.shutdown_timeout_ms),
            },
            api: RawApiConfig {
                base_url: overlay.api.base_url.or(base.api.base_url),
                token_env: overlay.api.token_env.or(base.api.token_env),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawConduitConfig) -> ConduitConfig {
        let server_defaults = ServerSection::default();
        let api_defaults = ApiSection::default();

        ConduitConfig {
            server: ServerSection {
                host: raw.server.host.unwrap_or(server_defaults.host),
                port: raw.server.port.unwrap_or(server_defaults.port),
                transport: raw.server.transport.unwrap_or(server_defaults.transport),
                channel_capacity: raw
                    .server
                    .channel_capacity
                    .unwrap_or(server_defaults.channel_capacity),
                shutdown_timeout_ms: raw.server.shutdown_timeout_ms,
            },
            api: ApiSection {
                base_url: raw.api.base_url.unwrap_or(api_defaults.base_url),
                token_env: raw.api.token_env.unwrap_or(api_defaults.token_env),
            },
        }
    }

    /// Check that the configured host and port form a socket address
    pub fn validate_listen_address(config: &ConduitConfig) -> Result<(), StartupConfigError> {
        let addr = format!("{}:{}", config.server.host, config.server.port);
        if config.server.host.parse::<std::net::IpAddr>().is_err()
            && config.server.host != "localhost"
        {
            return Err(StartupConfigError::InvalidListenAddress {
                addr,
                reason: "host must be an IP address or localhost".to_string(),
            });
        }
        if config.server.host != "localhost" && addr.parse::<SocketAddr>().is_err() {
            return Err(StartupConfigError::InvalidListenAddress {
                addr,
                reason: "not a socket address".to_string(),
            });
        }
        Ok(())
    }
}

/// Read the API access token from the variable named by `api.token_env`
pub fn read_credential(api: &ApiSection) -> Result<String, StartupConfigError> {
    credential_from(&api.token_env, |name| std::env::var(name).ok())
}

fn credential_from(
    var: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, StartupConfigError> {
    lookup(var)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| StartupConfigError::MissingCredential {
            var: var.to_string(),
        })
}
