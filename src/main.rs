// src/main.rs - DDS host entry point
use clap::Parser;
use dds_host::config::{self, Config};
use dds_host::hardware::{DryRunTransport, SerialTransport, Transport};
use dds_host::{DdsDevice, Dispatcher, Session};
use std::path::PathBuf;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Serve the text control protocol for the triple AD9912 DDS board.
#[derive(Parser, Debug)]
#[command(name = "dds-host", version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "dds.toml")]
    config: PathBuf,

    /// Listen address, overrides [server].bind
    #[arg(long)]
    bind: Option<String>,

    /// State file, overrides [state].path
    #[arg(long)]
    state: Option<PathBuf>,

    /// Do not open the serial port; log register writes instead
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    tracing::info!("Starting DDS host {}", env!("CARGO_PKG_VERSION"));

    let mut config = if cli.config.exists() {
        tracing::info!("Loading configuration from: {}", cli.config.display());
        config::load_config(&cli.config).map_err(|e| {
            tracing::error!("Failed to load config from '{}': {}", cli.config.display(), e);
            Box::new(e) as BoxError
        })?
    } else {
        tracing::warn!("Configuration '{}' not found, using defaults", cli.config.display());
        Config::default()
    };
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(state) = cli.state {
        config.state.path = state;
    }

    let transport: Box<dyn Transport> = if cli.dry_run {
        tracing::info!("Dry run: register writes are not sent to hardware");
        Box::new(DryRunTransport::new())
    } else {
        if config.serial.port.is_empty() {
            tracing::error!("No serial port configured; set [serial].port or use --dry-run");
            return Err("no serial port configured".into());
        }
        Box::new(SerialTransport::open(&config.serial.port, config.serial.baud)?)
    };

    let limits = config.limits.to_limits();
    tracing::info!("Frequency limits: {} - {} MHz", limits.min_freq_mhz, limits.max_freq_mhz);
    let mut session = Session::new(DdsDevice::new(transport, limits, config.mode.clone()));

    // Replaying the saved state is the only way hardware gets initialized.
    let saved = config::load_state(&config.state.path)?;
    session.restore(&saved).await.map_err(|e| {
        tracing::error!("Failed to restore DDS state: {}", e);
        Box::new(e) as BoxError
    })?;

    let dispatcher = Dispatcher::new(session);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    dds_host::server::serve(listener, dispatcher.clone(), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    })
    .await?;

    let exported = dispatcher.session().lock().await.store().export();
    config::save_state(&config.state.path, &exported)?;
    tracing::info!("DDS host stopped");
    Ok(())
}
