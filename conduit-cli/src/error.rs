//! Startup error types

use std::path::PathBuf;

use thiserror::Error;

/// Conditions that stop the process before it starts serving
#[derive(Debug, Error)]
pub enum StartupConfigError {
    /// The access token environment variable is unset or empty
    #[error("environment variable {var} is not set; export the API access token to continue")]
    MissingCredential { var: String },

    /// Host and port do not form a usable listen address
    #[error("invalid listen address {addr}: {reason}")]
    InvalidListenAddress { addr: String, reason: String },

    /// A config file exists but could not be read or parsed
    #[error("failed to load config file {}: {message}", path.display())]
    ConfigFile { path: PathBuf, message: String },
}
