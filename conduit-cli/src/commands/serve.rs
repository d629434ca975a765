//! Conduit serve command
//!
//! Loads configuration, reads the API credential from the environment,
//! builds the work-item handler set and serves MCP until a termination
//! signal arrives. Every open session is closed before the process exits.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use conduit_server::{ConduitServer, TransportKind};
use tracing::{error, info, warn};

use crate::api::ApiClient;
use crate::config::{ConduitConfig, ConfigLoader, read_credential};
use crate::handlers::build_handler_set;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Stream transport: sse or streamable-http (overrides config)
    #[arg(short, long)]
    pub transport: Option<TransportKind>,
}

impl ServeArgs {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply(&self, mut config: ConduitConfig) -> ConduitConfig {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(transport) = self.transport {
            config.server.transport = transport;
        }
        config
    }
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = args.apply(ConfigLoader::load()?);
    ConfigLoader::validate_listen_address(&config)?;

    let token = read_credential(&config.api).inspect_err(|e| error!("{e}"))?;
    let api = ApiClient::new(&config.api.base_url, token);
    let handlers = Arc::new(build_handler_set(Arc::new(api)));

    let server_config = config.server.to_server_config();
    info!(
        transport = %server_config.transport,
        "Starting conduit server on {}",
        server_config.addr()
    );

    let report = ConduitServer::new(server_config, handlers)
        .run(shutdown_signal())
        .await?;

    if report.is_clean() {
        info!(closed = report.closed.len(), "All sessions closed");
    } else {
        for (id, err) in &report.failed {
            warn!(session_id = %id, error = %err, "Session did not close cleanly");
        }
    }
    Ok(())
}

/// Resolve on SIGINT, SIGTERM or SIGQUIT (unix) or Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = wait_for_shutdown_signal().await {
        error!("Failed to install signal handler: {e}; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigquit = signal(SignalKind::quit())?;
        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
            _ = sigquit.recv() => {},
            _ = tokio::signal::ctrl_c() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}
