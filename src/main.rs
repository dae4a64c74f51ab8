//! Runtime-mutable mock HTTP server (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────┐
//!                          │                    LIVE MOCK                     │
//!                          │                                                  │
//!     Client Request       │  ┌─────────┐   ┌──────────┐   ┌───────────────┐  │
//!     ─────────────────────┼─▶│   net   │──▶│   http   │──▶│    routing    │  │
//!                          │  │listener │   │  server  │   │ custom first, │  │
//!                          │  └─────────┘   └──────────┘   │ then built-in │  │
//!                          │                               └───────┬───────┘  │
//!                          │                                       ▼          │
//!     Client Response      │                  ┌──────────┐   ┌───────────┐    │
//!     ◀────────────────────┼──────────────────│ response │◀──│ registry  │    │
//!                          │                  └──────────┘   │ msgs/hdrs │    │
//!                          │                                 └───────────┘    │
//!                          │  ┌────────────────────────────────────────────┐  │
//!                          │  │ config (+ watcher) │ lifecycle │ observab. │  │
//!                          │  └────────────────────────────────────────────┘  │
//!                          └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use live_mock::config::{load_config, ConfigWatcher, MockConfig};
use live_mock::lifecycle::signals::shutdown_signal;
use live_mock::observability::{logging::init_logging, metrics::init_metrics};
use live_mock::MockServer;

#[derive(Parser)]
#[command(name = "live-mock")]
#[command(about = "Mock HTTP server whose responses can be changed at runtime", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address (`:8080`, `127.0.0.1:9000`, `8080`).
    #[arg(short, long)]
    bind: Option<String>,

    /// Re-apply the `[mock]` section whenever the config file changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => MockConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability);
    tracing::info!("live-mock v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = Arc::new(MockServer::from_config(&config).await?);
    tracing::info!(
        address = %server.local_addr(),
        messages = server.registry().len(),
        mutation_enabled = server.mutation_enabled(),
        "Configuration loaded"
    );

    // The watcher must stay alive for the lifetime of the process.
    let _watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, mut updates) = ConfigWatcher::new(path, config.clone());
            let watcher = watcher.run()?;
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                while let Some(settings) = updates.recv().await {
                    match server.apply_settings(&settings) {
                        Ok(()) => tracing::info!("Mock settings reloaded"),
                        Err(e) => tracing::error!(error = %e, "Failed to apply reloaded settings"),
                    }
                }
            });
            Some(watcher)
        }
        _ => None,
    };

    let stopper = Arc::clone(&server);
    tokio::spawn(async move {
        shutdown_signal().await;
        if let Err(e) = stopper.stop().await {
            tracing::error!(error = %e, "Failed to stop server");
        }
    });

    server.start_in_current_thread().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
