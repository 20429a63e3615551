// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod client;
pub mod command;
pub mod controller;
pub mod dispatch;
pub mod protocol;
pub mod response;
pub mod session;
pub mod telemetry;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use client::{ClientCommand, ClientEnvelope, ClientResponse};
pub use command::{CommandJob, CommandQueue, JobId, JobIdAllocator};
pub use controller::{ControllerGpio, ControllerState, DisabledController};
pub use dispatch::{DispatchStep, Dispatcher, Flight, JobTable};
pub use response::{CommandResponse, CommandResult, DeviceStatus, GaugerError};
pub use session::{ConnectionState, GaugerSession, GaugerStatus, RouteOutcome};
pub use telemetry::{TelemetryError, TelemetryState, TelemetryUpdate};
