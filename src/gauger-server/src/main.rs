// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod auth;
mod config;
mod connection;
mod device;
mod handle;
mod listener;
mod mock;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use gauger_app::{init_logging, ConfigFile};
use gauger_core::{DisabledController, DynResult, GaugerSession};

use auth::TokenAuth;
use config::ServerConfig;
use connection::{ConnectionManager, ConnectionSettings};
use device::{DeviceAccess, DeviceOpener};
use handle::GaugerHandle;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - gauger command dispatcher");
const MOCK_TELEMETRY_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Gauger serial port path
    #[arg(short = 'p', long = "port")]
    port: Option<String>,
    /// Serial baud rate
    #[arg(short = 'b', long = "baud")]
    baud: Option<u32>,
    /// Use the simulated gauger instead of a serial port
    #[arg(long = "mock")]
    mock: bool,
    /// IP address for the JSON TCP listener
    #[arg(short = 'l', long = "listen")]
    listen: Option<IpAddr>,
    /// Port for the JSON TCP listener
    #[arg(long = "listen-port")]
    listen_port: Option<u16>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level")]
    log_level: Option<String>,
    /// Only log warnings and errors
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

/// Fold command-line overrides into the loaded configuration.
fn apply_cli(cli: &Cli, cfg: &mut ServerConfig) {
    if let Some(ref port) = cli.port {
        cfg.device.port = Some(port.clone());
    }
    if let Some(baud) = cli.baud {
        cfg.device.baud = baud;
    }
    if cli.mock {
        cfg.device.mock = true;
    }
    if let Some(listen) = cli.listen {
        cfg.listen.listen = listen;
    }
    if let Some(port) = cli.listen_port {
        cfg.listen.port = port;
    }
    if let Some(ref level) = cli.log_level {
        cfg.general.log_level = Some(level.clone());
    }
}

fn device_access(cfg: &ServerConfig) -> DynResult<DeviceAccess> {
    if cfg.device.mock {
        return Ok(DeviceAccess::Mock {
            telemetry_period: MOCK_TELEMETRY_PERIOD,
        });
    }
    let path = cfg
        .device
        .port
        .clone()
        .ok_or("Gauger port not specified. Use --port or set [device].port in config.")?;
    Ok(DeviceAccess::Serial {
        path,
        baud: cfg.device.baud,
    })
}

fn connection_settings(cfg: &ServerConfig) -> ConnectionSettings {
    let behavior = &cfg.behavior;
    ConnectionSettings {
        open_delay: behavior.open_delay(),
        worker_delay: behavior.worker_delay(),
        streaming_command: behavior.streaming_command.clone(),
        position_poll: behavior
            .poll_position
            .then(|| behavior.position_poll_interval()),
    }
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = ServerConfig::load(cli.config.as_deref())?;
    apply_cli(&cli, &mut cfg);
    cfg.validate()
        .map_err(|e| format!("Invalid server configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref(), cli.quiet);

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let access = device_access(&cfg)?;
    info!("Starting gauger-server (device: {})", access.describe());

    let session = Arc::new(Mutex::new(GaugerSession::new(
        cfg.behavior.command_timeout(),
    )));
    let manager = Arc::new(ConnectionManager::new(
        session,
        Arc::new(access),
        connection_settings(&cfg),
    ));
    let handle = GaugerHandle::new(manager, Arc::new(DisabledController));

    let mut task_handles: Vec<JoinHandle<()>> = Vec::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if cfg.listen.enabled {
        let listen_addr = SocketAddr::from((cfg.listen.listen, cfg.listen.port));
        let auth = TokenAuth::new(cfg.listen.auth.tokens.iter().cloned());
        let listener_handle = handle.clone();
        let listener_shutdown_rx = shutdown_rx.clone();
        task_handles.push(tokio::spawn(async move {
            if let Err(e) =
                listener::run_listener(listen_addr, listener_handle, auth, listener_shutdown_rx)
                    .await
            {
                error!("Listener error: {:?}", e);
            }
        }));
    }

    // Connect at startup; on failure keep serving so clients can retry.
    if let Err(e) = handle.connect().await {
        error!("Initial gauger connect failed: {}", e);
    }

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    let _ = shutdown_tx.send(true);
    handle.disconnect().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    for task in &task_handles {
        if !task.is_finished() {
            task.abort();
        }
    }
    for task in task_handles {
        let _ = task.await;
    }
    Ok(())
}
