// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for gauger-server.
//!
//! Config is loaded from the `[gauger-server]` section of `gauger.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./gauger.toml`
//! 3. `~/.config/gauger/gauger.toml`
//! 4. `/etc/gauger/gauger.toml`

use std::net::IpAddr;
use std::time::Duration;

use gauger_app::ConfigFile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Gauger serial device
    pub device: DeviceConfig,
    /// Dispatch timing and connection behaviour
    pub behavior: BehaviorConfig,
    /// TCP listener configuration
    pub listen: ListenConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// Serial device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial port path, e.g. `/dev/ttyACM0`
    pub port: Option<String>,
    /// Baud rate
    pub baud: u32,
    /// Use the in-process simulated gauger instead of a serial port
    pub mock: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 9600,
            mock: false,
        }
    }
}

/// Timing of the connection manager and dispatch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Settle time after opening the port, before any traffic
    pub open_delay_ms: u64,
    /// Dispatch loop tick period
    pub worker_delay_ms: u64,
    /// Time allowed for an ACK before a job is failed with a timeout
    pub command_timeout_ms: u64,
    /// Body of the command that switches the gauger into streaming mode
    pub streaming_command: String,
    /// Poll motor positions while the dispatcher is idle
    pub poll_position: bool,
    /// Minimum time between position polls
    pub position_poll_interval_ms: u64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            open_delay_ms: 2000,
            worker_delay_ms: 100,
            command_timeout_ms: 5000,
            streaming_command: ":71 2;\n".to_string(),
            poll_position: false,
            position_poll_interval_ms: 1000,
        }
    }
}

impl BehaviorConfig {
    pub fn open_delay(&self) -> Duration {
        Duration::from_millis(self.open_delay_ms)
    }

    pub fn worker_delay(&self) -> Duration {
        Duration::from_millis(self.worker_delay_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn position_poll_interval(&self) -> Duration {
        Duration::from_millis(self.position_poll_interval_ms)
    }
}

/// TCP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Whether the listener is enabled
    pub enabled: bool,
    /// IP address to listen on
    pub listen: IpAddr,
    /// TCP port to listen on
    pub port: u16,
    /// Authentication configuration
    pub auth: AuthConfig,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port: 4540,
            auth: AuthConfig::default(),
        }
    }
}

/// Authentication configuration for the TCP listener.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Valid authentication tokens (empty = no auth required)
    pub tokens: Vec<String>,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;
        validate_device(&self.device)?;

        let b = &self.behavior;
        for (name, value) in [
            ("open_delay_ms", b.open_delay_ms),
            ("worker_delay_ms", b.worker_delay_ms),
            ("command_timeout_ms", b.command_timeout_ms),
            ("position_poll_interval_ms", b.position_poll_interval_ms),
        ] {
            if value == 0 {
                return Err(format!("[behavior].{} must be > 0", name));
            }
        }
        if b.streaming_command.trim().is_empty() {
            return Err("[behavior].streaming_command must not be empty".to_string());
        }

        validate_tokens("[listen.auth].tokens", &self.listen.auth.tokens)?;
        if self.listen.enabled && self.listen.port == 0 {
            return Err("[listen].port must be > 0 when listener is enabled".to_string());
        }

        Ok(())
    }

    /// Generate an example configuration wrapped under the `[gauger-server]`
    /// section header.
    pub fn example_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(rename = "gauger-server")]
            inner: ServerConfig,
        }
        let example = ServerConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            device: DeviceConfig {
                port: Some("/dev/ttyACM0".to_string()),
                ..DeviceConfig::default()
            },
            behavior: BehaviorConfig::default(),
            listen: ListenConfig::default(),
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

fn validate_device(device: &DeviceConfig) -> Result<(), String> {
    if device.mock {
        return Ok(());
    }
    if device.port.as_deref().unwrap_or("").trim().is_empty() {
        return Err("[device].port must be set unless [device].mock = true".to_string());
    }
    if device.baud == 0 {
        return Err("[device].baud must be > 0".to_string());
    }
    Ok(())
}

fn validate_tokens(path: &str, tokens: &[String]) -> Result<(), String> {
    if tokens.iter().any(|t| t.trim().is_empty()) {
        return Err(format!("{path} must not contain empty tokens"));
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "gauger-server"
    }
}
