//! Beacon - keep a service registered, or watch another one
//!
//! # Usage
//!
//! ```bash
//! # Register billing on port 8090, heartbeating every 3s, until Ctrl+C
//! beacon register --service billing --port 8090
//!
//! # Report health from a TCP connect to the local listener
//! beacon register --service billing --port 8090 --check-tcp 127.0.0.1:8090
//!
//! # Print endpoint changes of the ledger service
//! beacon watch --service ledger
//!
//! # Point at a different agent
//! BEACON_CATALOG_ADDR=consul.internal:8500 beacon watch --service ledger
//!
//! # Enable debug logging
//! RUST_LOG=beacon_agent=debug beacon register --service billing --port 8090
//! ```
//!
//! Settings come from `~/.config/beacon/beacon.toml` (or `--config`), then
//! the environment, then flags.
//!
//! # Signal Handling
//!
//! SIGINT and SIGTERM close the handle or watcher. A registered service is
//! deregistered before the process exits.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use beacon_agent::{
    register, BeaconConfig, HealthProbe, NoopProbe, Resolver, TcpProbe, Watch, WatchError,
};
use beacon_core::Update;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "beacon", version, about)]
struct Cli {
    /// Config file (default: ~/.config/beacon/beacon.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog agent address, host:port or URL
    #[arg(long, global = true)]
    catalog: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a service and heartbeat it until interrupted
    Register {
        /// Service name
        #[arg(long)]
        service: Option<String>,

        /// Service port
        #[arg(long)]
        port: Option<u16>,

        /// Advertised address (default: detected outbound address)
        #[arg(long)]
        address: Option<String>,

        /// Tag to attach; repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Heartbeat interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Report health from a TCP connect to this address
        #[arg(long)]
        check_tcp: Option<SocketAddr>,
    },

    /// Print endpoint changes of a service until interrupted
    Watch {
        /// Service name
        #[arg(long)]
        service: Option<String>,
    },
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("beacon").join("beacon.toml"))
}

/// Reads the config file, then layers environment and flag overrides.
fn load_config(cli: &Cli) -> Result<BeaconConfig> {
    let mut config = match (&cli.config, default_config_path()) {
        (Some(path), _) => BeaconConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        (None, Some(path)) => BeaconConfig::load_or_default(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        (None, None) => BeaconConfig::default(),
    }
    .with_env_overrides();

    if let Some(address) = &cli.catalog {
        config.catalog.address = Some(address.clone());
    }

    match &cli.command {
        Command::Register {
            service,
            port,
            address,
            tags,
            interval,
            ..
        } => {
            let section = &mut config.registration;
            if service.is_some() {
                section.service = service.clone();
            }
            if port.is_some() {
                section.port = *port;
            }
            if address.is_some() {
                section.address = address.clone();
            }
            if !tags.is_empty() {
                section.tags = tags.clone();
            }
            if let Some(secs) = interval {
                section.interval_secs = *secs;
            }
        }
        Command::Watch { service } => {
            if service.is_some() {
                config.watch.service = service.clone();
            }
        }
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    run(cli, config)
}

#[tokio::main]
async fn run(cli: Cli, config: BeaconConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("beacon=info".parse()?)
                .add_directive("beacon_agent=info".parse()?)
                .add_directive("beacon_catalog=info".parse()?),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "beacon starting");

    match cli.command {
        Command::Register { check_tcp, .. } => run_register(&config, check_tcp).await,
        Command::Watch { .. } => run_watch(&config).await,
    }
}

async fn run_register(config: &BeaconConfig, check_tcp: Option<SocketAddr>) -> Result<()> {
    let registration = config
        .registration_config()
        .context("Incomplete registration settings")?;

    let probe: Arc<dyn HealthProbe> = match check_tcp {
        Some(addr) => Arc::new(TcpProbe::new(addr)),
        None => Arc::new(NoopProbe),
    };

    info!(
        service = %registration.service,
        port = registration.port,
        interval_secs = registration.interval.as_secs(),
        "Starting registration"
    );

    let handle = register(registration, config.catalog_options(), probe)
        .context("Failed to start registration")?;

    if let Err(e) = wait_for_shutdown_signal().await {
        error!(error = %e, "Error waiting for shutdown signal");
    }

    info!("Shutting down, deregistering");
    handle.close().await;
    info!("beacon stopped");
    Ok(())
}

async fn run_watch(config: &BeaconConfig) -> Result<()> {
    let service = config
        .watch
        .service
        .clone()
        .context("No service to watch; pass --service or set watch.service")?;

    let resolver = Resolver::http(config.catalog_options(), service, config.watch_config())
        .context("Failed to start watcher")?;
    let watcher = resolver.resolve(resolver.service());

    info!(service = %resolver.service(), "Watching service");

    let shutdown = wait_for_shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            signal = &mut shutdown => {
                if let Err(e) = signal {
                    error!(error = %e, "Error waiting for shutdown signal");
                }
                watcher.close();
                break;
            }

            batch = watcher.next() => match batch {
                Ok(updates) => print_updates(&updates),
                Err(WatchError::Cancelled) => break,
                Err(e) => return Err(e).context("Watch failed"),
            },
        }
    }

    info!("beacon stopped");
    Ok(())
}

fn print_updates(updates: &[Update]) {
    for update in updates {
        println!("{update}");
    }
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
