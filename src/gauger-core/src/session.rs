// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! State shared by the connection manager, dispatch loop and response router.
//!
//! One [`GaugerSession`] exists per service. Every successful open starts a
//! new connection generation; work tagged with an older generation is
//! ignored so a late line from a closed port cannot complete a job sent on
//! the current one.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::command::JobId;
use crate::controller::ControllerState;
use crate::dispatch::{DispatchStep, Dispatcher};
use crate::protocol::{classify_line, parse_ack_payload, parse_job_id, InboundLine};
use crate::response::{CommandResponse, CommandResult, GaugerError};
use crate::telemetry::{decode_line, decode_motor_fields, TelemetryState, TelemetryUpdate};

/// Lifecycle of the single device connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Closed,
    Opening,
    PendingHandshake,
    Streaming,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            ConnectionState::PendingHandshake | ConnectionState::Streaming
        )
    }
}

/// What the router did with one inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// An ACK completed the job with this id.
    Completed(JobId),
    /// An ACK named a job that is not pending.
    UnknownJob(String),
    /// Telemetry decoded and applied.
    Telemetry,
    /// Telemetry that failed to decode; state left unchanged.
    Rejected,
    /// Line belongs to a connection that is no longer current.
    Stale,
}

/// Status snapshot served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugerStatus {
    #[serde(default)]
    pub controller_state: Option<ControllerState>,
    pub connection: ConnectionState,
    pub is_gauger_connected: bool,
    pub gauger_connected_status: String,
    #[serde(flatten)]
    pub telemetry: TelemetryState,
    pub queued: usize,
    #[serde(default)]
    pub outstanding: Option<JobId>,
}

#[derive(Debug)]
pub struct GaugerSession {
    connection: ConnectionState,
    generation: u64,
    dispatcher: Dispatcher,
    telemetry: TelemetryState,
}

impl GaugerSession {
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            connection: ConnectionState::Closed,
            generation: 0,
            dispatcher: Dispatcher::new(command_timeout),
            telemetry: TelemetryState::new(),
        }
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn telemetry(&self) -> &TelemetryState {
        &self.telemetry
    }

    /// Queue a command. Accepted in every connection state; it is only
    /// dispatched while a connection is open.
    pub fn enqueue(
        &mut self,
        body: impl Into<String>,
        is_system: bool,
    ) -> (JobId, oneshot::Receiver<CommandResult>) {
        self.dispatcher.enqueue(body, is_system)
    }

    /// Queue the streaming-mode handshake ahead of everything else.
    pub fn enqueue_handshake(
        &mut self,
        body: impl Into<String>,
    ) -> (JobId, oneshot::Receiver<CommandResult>) {
        self.dispatcher.enqueue_front(body, true)
    }

    pub fn begin_open(&mut self) {
        self.connection = ConnectionState::Opening;
    }

    /// Opening failed; back to closed without touching queued work.
    pub fn abort_open(&mut self) {
        if self.connection == ConnectionState::Opening {
            self.connection = ConnectionState::Closed;
        }
    }

    /// The port is open and settled. Returns the new generation.
    pub fn mark_opened(&mut self) -> u64 {
        self.generation += 1;
        self.connection = ConnectionState::PendingHandshake;
        self.generation
    }

    /// Handshake finished (successfully or not) on `generation`.
    pub fn mark_streaming(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.connection != ConnectionState::PendingHandshake {
            return false;
        }
        self.connection = ConnectionState::Streaming;
        true
    }

    /// Tear down the current connection.
    ///
    /// Queued and outstanding jobs are dropped without a result and the
    /// controller status fields are reset. Sensor telemetry is kept.
    pub fn close(&mut self) -> usize {
        let dropped = self.dispatcher.abandon_all();
        if dropped > 0 {
            info!("Dropped {} pending gauger job(s) on close", dropped);
        }
        self.telemetry.clear_status();
        self.connection = ConnectionState::Closed;
        dropped
    }

    /// Close only if `generation` is still the live connection.
    pub fn close_generation(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.connection == ConnectionState::Closed {
            return false;
        }
        self.close();
        true
    }

    /// Run one dispatch tick for `generation`.
    ///
    /// Returns `None` when the generation is no longer live, which tells the
    /// dispatch loop to stop.
    pub fn poll_dispatch(&mut self, generation: u64, now: Instant) -> Option<DispatchStep> {
        if generation != self.generation || !self.is_connected() {
            return None;
        }
        Some(self.dispatcher.poll(now))
    }

    /// Fail the outstanding job of `generation` after a write error.
    pub fn fail_outstanding(&mut self, generation: u64, error: GaugerError) -> Option<JobId> {
        if generation != self.generation {
            return None;
        }
        self.dispatcher.fail_outstanding(error)
    }

    /// Route one line received on `generation`.
    pub fn route_line(&mut self, generation: u64, line: &str) -> RouteOutcome {
        if generation != self.generation || !self.is_connected() {
            return RouteOutcome::Stale;
        }

        match classify_line(line) {
            InboundLine::Ack { id, payload } => self.route_ack(id, payload.unwrap_or_default()),
            InboundLine::Telemetry(text) => match decode_line(text) {
                Ok(update) => {
                    match &update {
                        TelemetryUpdate::Modules(names) => {
                            debug!("Gauger modules: {}", names.join(", "))
                        }
                        TelemetryUpdate::Unknown(module) => {
                            debug!("Unknown gauger module {:?}", module)
                        }
                        _ => {}
                    }
                    self.telemetry.apply(&update);
                    RouteOutcome::Telemetry
                }
                Err(e) => {
                    warn!("Failed to decode gauger telemetry {:?}: {}", text, e);
                    RouteOutcome::Rejected
                }
            },
        }
    }

    fn route_ack(&mut self, id_text: &str, payload: &str) -> RouteOutcome {
        let id = match parse_job_id(id_text) {
            Some(id) if self.dispatcher.outstanding() == Some(id) => id,
            _ => {
                info!("Unknown gauger job ACKd: id={:?} res={:?}", id_text, payload);
                return RouteOutcome::UnknownJob(id_text.to_string());
            }
        };

        debug!("Gauger ACK job {} {:?}", id, payload);
        let result = parse_ack_payload(payload);
        if let Err(e) = &result {
            warn!("Gauger job {}: {}", id, e);
        }
        self.dispatcher.complete(id, result);
        RouteOutcome::Completed(id)
    }

    /// Apply the reply of a position query job.
    pub fn apply_position_response(&mut self, response: &CommandResponse) -> bool {
        match decode_motor_fields("position", &response.body) {
            Ok(update) => {
                self.telemetry.apply(&update);
                true
            }
            Err(e) => {
                warn!("Failed to decode position reply {:?}: {}", response.body, e);
                false
            }
        }
    }

    pub fn status(&self, controller_state: Option<ControllerState>) -> GaugerStatus {
        let connected = self.is_connected();
        GaugerStatus {
            controller_state,
            connection: self.connection,
            is_gauger_connected: connected,
            gauger_connected_status: if connected {
                "Connected".to_string()
            } else {
                "Disconnected".to_string()
            },
            telemetry: self.telemetry.clone(),
            queued: self.dispatcher.queued(),
            outstanding: self.dispatcher.outstanding(),
        }
    }
}
