//! Lifecycle router server.
//!
//! Loads configuration, wires the bundled runtime through the bootstrap and
//! blocks until the server shuts down (SIGINT / SIGTERM).

use std::path::PathBuf;

use clap::Parser;

use lifecycle_router::config::{load_config, ConfigWatcher, RouterConfig};
use lifecycle_router::error::{HookError, RouterError};
use lifecycle_router::observability::{logging, metrics};
use lifecycle_router::{Bootstrap, Descriptor, Event, RawRequest, RawResponse, Runtime, TcpRuntime};

#[derive(Debug, Parser)]
#[command(name = "lifecycle-router", version, about = "Lifecycle event router server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server.host`.
    #[arg(long)]
    host: Option<String>,

    /// Override `server.port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override `process.name_prefix`.
    #[arg(long)]
    process_name: Option<String>,

    /// Answer HTTP requests with the built-in status bridge.
    #[arg(long)]
    forward_requests: bool,

    /// Reload workers when the configuration file changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

/// Lifecycle events worth a log line.
const LOGGED_EVENTS: [Descriptor; 8] = [
    Descriptor::Start,
    Descriptor::ManagerStart,
    Descriptor::ManagerStop,
    Descriptor::WorkerStart,
    Descriptor::WorkerStop,
    Descriptor::WorkerError,
    Descriptor::Reload,
    Descriptor::Shutdown,
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(prefix) = cli.process_name {
        config.process.name_prefix = Some(prefix);
    }
    config.http.forward_requests |= cli.forward_requests;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lifecycle-router starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bootstrap: Bootstrap<TcpRuntime> = Bootstrap::from_endpoint(config.server.endpoint());

    if let Some(prefix) = &config.process.name_prefix {
        bootstrap.set_process_name(prefix.clone())?;
    }
    log_lifecycle(&bootstrap)?;
    if config.http.forward_requests {
        bootstrap.enable_request_forwarding(status_bridge)?;
    }

    // Dropping the watcher stops it; keep it for the life of the server.
    let _watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => Some(watch_config(&bootstrap, path)?),
        _ => None,
    };

    tracing::info!(
        endpoint = %config.server.endpoint(),
        forward_requests = config.http.forward_requests,
        "Configuration loaded"
    );

    bootstrap.start(config.settings)?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn log_lifecycle(bootstrap: &Bootstrap<TcpRuntime>) -> Result<(), RouterError> {
    for descriptor in LOGGED_EVENTS {
        bootstrap.on(descriptor.after(), |_server: &dyn Runtime, event: &Event| {
            tracing::info!(
                event = event.descriptor.name(),
                seq = event.seq,
                payload = ?event.payload,
                "Lifecycle event"
            );
            Ok(())
        })?;
    }
    Ok(())
}

/// Answers every request with a JSON status document.
fn status_bridge(request: &RawRequest, response: &RawResponse) -> Result<(), HookError> {
    let body = serde_json::json!({
        "status": "ok",
        "request_id": request.id(),
        "method": request.method().as_str(),
        "path": request.uri().path(),
        "pid": std::process::id(),
    });
    let body = serde_json::to_vec(&body).map_err(|e| HookError::Bridge(e.to_string()))?;

    response.status(200)?;
    response.header("content-type", "application/json")?;
    response.end(body);
    Ok(())
}

fn watch_config(
    bootstrap: &Bootstrap<TcpRuntime>,
    path: &std::path::Path,
) -> Result<notify::RecommendedWatcher, Box<dyn std::error::Error>> {
    let server = bootstrap.server()?;
    let (watcher, mut updates) = ConfigWatcher::new(path);
    let watcher = watcher.run()?;

    std::thread::Builder::new()
        .name("config-watch".into())
        .spawn(move || {
            while let Some(update) = updates.blocking_recv() {
                tracing::info!(
                    endpoint = %update.server.endpoint(),
                    "Configuration changed; endpoint and settings apply on restart"
                );
                server.reload();
            }
        })?;

    Ok(watcher)
}
