// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::Arc;

use tracing::{error, info};

use gauger_core::{
    CommandResult, ConnectionState, ControllerGpio, ControllerState, GaugerError, GaugerStatus,
};

use crate::connection::ConnectionManager;

/// Cloneable entry point to the gauger service.
#[derive(Clone)]
pub struct GaugerHandle {
    manager: Arc<ConnectionManager>,
    controller: Arc<dyn ControllerGpio>,
}

impl GaugerHandle {
    pub fn new(manager: Arc<ConnectionManager>, controller: Arc<dyn ControllerGpio>) -> Self {
        Self {
            manager,
            controller,
        }
    }

    /// Queue a raw command body and wait for its result.
    ///
    /// Accepted while disconnected; it is sent once a connection is open.
    pub async fn command(&self, body: impl Into<String>) -> CommandResult {
        let (id, rx) = self.manager.session().lock().await.enqueue(body, false);
        match rx.await {
            Ok(result) => result,
            Err(_) => {
                info!("Gauger job {} dropped before completion", id);
                Err(GaugerError::Abandoned)
            }
        }
    }

    /// Like [`command`](Self::command), gated on the controller interlock.
    pub async fn controller_command(&self, body: impl Into<String>) -> CommandResult {
        let ready = self
            .controller
            .is_ready()
            .await
            .map_err(|e| GaugerError::Controller(e.to_string()))?;
        if !ready {
            return Err(GaugerError::ControllerNotReady);
        }
        self.command(body).await
    }

    pub async fn connect(&self) -> Result<GaugerStatus, GaugerError> {
        if self.manager.connection().await != ConnectionState::Closed {
            return Err(GaugerError::AlreadyConnected);
        }
        self.manager
            .open()
            .await
            .map_err(|e| GaugerError::Io(e.to_string()))?;
        Ok(self.status().await)
    }

    pub async fn disconnect(&self) -> GaugerStatus {
        self.manager.close().await;
        self.status().await
    }

    pub async fn status(&self) -> GaugerStatus {
        let controller_state = if self.controller.is_enabled() {
            match self.controller.state().await {
                Ok(state) => Some(state),
                Err(e) => {
                    error!("Failed to read controller state: {}", e);
                    None
                }
            }
        } else {
            None
        };
        self.manager.session().lock().await.status(controller_state)
    }

    pub async fn controller_state(&self) -> Result<ControllerState, GaugerError> {
        self.require_controller()?;
        self.controller
            .state()
            .await
            .map_err(|e| GaugerError::Controller(e.to_string()))
    }

    pub async fn controller_reset(&self) -> Result<(), GaugerError> {
        self.require_controller()?;
        info!("Sending controller reset");
        self.controller
            .send_reset()
            .await
            .map_err(|e| GaugerError::Controller(e.to_string()))
    }

    pub async fn controller_stop(&self) -> Result<(), GaugerError> {
        self.require_controller()?;
        info!("Sending controller stop");
        self.controller
            .send_stop()
            .await
            .map_err(|e| GaugerError::Controller(e.to_string()))
    }

    fn require_controller(&self) -> Result<(), GaugerError> {
        if self.controller.is_enabled() {
            Ok(())
        } else {
            Err(GaugerError::ControllerDisabled)
        }
    }
}
