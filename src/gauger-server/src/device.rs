// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Byte-stream access to the gauger.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{error, info};

use gauger_core::DynResult;

use crate::mock;

const MOCK_PIPE_CAPACITY: usize = 4096;

/// An open device stream.
pub trait DeviceIo: AsyncRead + AsyncWrite + Send + Unpin {
    /// Drop whatever the device sent before we started listening.
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DeviceIo for SerialStream {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

impl DeviceIo for DuplexStream {}

pub type DeviceFuture<'a> =
    Pin<Box<dyn Future<Output = DynResult<Box<dyn DeviceIo>>> + Send + 'a>>;

/// Something that can (re)open the device.
pub trait DeviceOpener: Send + Sync {
    fn open(&self) -> DeviceFuture<'_>;

    /// True for the in-process simulated gauger. Frames for a real device
    /// are written trimmed.
    fn is_simulated(&self) -> bool {
        false
    }

    fn describe(&self) -> String;
}

/// How the gauger is reached.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceAccess {
    Serial { path: String, baud: u32 },
    /// In-process simulated gauger.
    Mock { telemetry_period: Duration },
}

impl DeviceAccess {
    async fn open_device(&self) -> DynResult<Box<dyn DeviceIo>> {
        match self {
            DeviceAccess::Serial { path, baud } => {
                let port = tokio_serial::new(path.as_str(), *baud).open_native_async()?;
                info!("Opened gauger serial port {} @ {} baud", path, baud);
                Ok(Box::new(port))
            }
            DeviceAccess::Mock { telemetry_period } => {
                let (host, device) = tokio::io::duplex(MOCK_PIPE_CAPACITY);
                let period = *telemetry_period;
                tokio::spawn(async move {
                    if let Err(e) = mock::run_mock_gauger(device, period).await {
                        error!("Mock gauger stopped: {}", e);
                    }
                });
                info!("Opened mock gauger");
                Ok(Box::new(host))
            }
        }
    }
}

impl DeviceOpener for DeviceAccess {
    fn open(&self) -> DeviceFuture<'_> {
        Box::pin(self.open_device())
    }

    fn is_simulated(&self) -> bool {
        matches!(self, DeviceAccess::Mock { .. })
    }

    fn describe(&self) -> String {
        match self {
            DeviceAccess::Serial { path, baud } => format!("serial {} @ {} baud", path, baud),
            DeviceAccess::Mock { .. } => "mock".to_string(),
        }
    }
}
