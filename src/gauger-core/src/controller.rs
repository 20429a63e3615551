// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Interface to the motor controller's safety-interlock lines.
//!
//! Pin handling lives outside this workspace; the server only asks whether
//! the controller is ready and asks for reset/stop pulses.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::DynResult;

pub type ControllerFuture<'a, T> = Pin<Box<dyn Future<Output = DynResult<T>> + Send + 'a>>;

/// Snapshot of the interlock lines as reported by the collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_active: Option<bool>,
}

/// Operations the gauger service needs from the controller interlock.
pub trait ControllerGpio: Send + Sync {
    /// Whether interlock lines are wired up at all.
    fn is_enabled(&self) -> bool;

    fn is_ready(&self) -> ControllerFuture<'_, bool>;

    fn send_reset(&self) -> ControllerFuture<'_, ()>;

    fn send_stop(&self) -> ControllerFuture<'_, ()>;

    fn state(&self) -> ControllerFuture<'_, ControllerState>;
}

/// Stand-in used when no interlock is attached.
///
/// Always reports ready so commands flow; reset and stop are refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledController;

impl ControllerGpio for DisabledController {
    fn is_enabled(&self) -> bool {
        false
    }

    fn is_ready(&self) -> ControllerFuture<'_, bool> {
        Box::pin(async { Ok(true) })
    }

    fn send_reset(&self) -> ControllerFuture<'_, ()> {
        Box::pin(async { Err("gpio not enabled".into()) })
    }

    fn send_stop(&self) -> ControllerFuture<'_, ()> {
        Box::pin(async { Err("gpio not enabled".into()) })
    }

    fn state(&self) -> ControllerFuture<'_, ControllerState> {
        Box::pin(async { Ok(ControllerState::default()) })
    }
}
