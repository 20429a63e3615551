// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status codes reported by the gauger in the first two digits of an ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    Ok,
    DeviceClosed,
    CommandTimeout,
    FlushError,
    MissingDelimiter,
    InvalidCommand,
    InvalidMotorId,
    InvalidDirection,
    InvalidSteps,
    InvalidSpeed,
    InvalidParameter,
    OrientationUnavailable,
    LimitsUnavailable,
}

impl DeviceStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        let status = match code {
            0 => DeviceStatus::Ok,
            1 => DeviceStatus::DeviceClosed,
            2 => DeviceStatus::CommandTimeout,
            3 => DeviceStatus::FlushError,
            40 => DeviceStatus::MissingDelimiter,
            44 => DeviceStatus::InvalidCommand,
            45 => DeviceStatus::InvalidMotorId,
            46 => DeviceStatus::InvalidDirection,
            47 => DeviceStatus::InvalidSteps,
            48 => DeviceStatus::InvalidSpeed,
            49 => DeviceStatus::InvalidParameter,
            50 => DeviceStatus::OrientationUnavailable,
            51 => DeviceStatus::LimitsUnavailable,
            _ => return None,
        };
        Some(status)
    }

    pub fn code(self) -> u8 {
        match self {
            DeviceStatus::Ok => 0,
            DeviceStatus::DeviceClosed => 1,
            DeviceStatus::CommandTimeout => 2,
            DeviceStatus::FlushError => 3,
            DeviceStatus::MissingDelimiter => 40,
            DeviceStatus::InvalidCommand => 44,
            DeviceStatus::InvalidMotorId => 45,
            DeviceStatus::InvalidDirection => 46,
            DeviceStatus::InvalidSteps => 47,
            DeviceStatus::InvalidSpeed => 48,
            DeviceStatus::InvalidParameter => 49,
            DeviceStatus::OrientationUnavailable => 50,
            DeviceStatus::LimitsUnavailable => 51,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            DeviceStatus::Ok => "OK",
            DeviceStatus::DeviceClosed => "Device closed",
            DeviceStatus::CommandTimeout => "Command timeout",
            DeviceStatus::FlushError => "Flush error",
            DeviceStatus::MissingDelimiter => "Missing : before command",
            DeviceStatus::InvalidCommand => "Invalid command",
            DeviceStatus::InvalidMotorId => "Invalid motorId",
            DeviceStatus::InvalidDirection => "Invalid direction",
            DeviceStatus::InvalidSteps => "Invalid steps/degrees",
            DeviceStatus::InvalidSpeed => "Invalid speed/acceleration",
            DeviceStatus::InvalidParameter => "Invalid other parameter",
            DeviceStatus::OrientationUnavailable => "Orientation unavailable",
            DeviceStatus::LimitsUnavailable => "Limits unavailable",
        }
    }
}

/// Human-readable meaning of a raw status code.
pub fn status_message(code: u8) -> &'static str {
    DeviceStatus::from_code(code)
        .map(DeviceStatus::message)
        .unwrap_or("Unknown status")
}

/// Decoded acknowledgement for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: u8,
    pub message: String,
    /// Result text after the status digits.
    pub body: String,
    /// Result text exactly as the device sent it.
    pub raw: String,
}

impl CommandResponse {
    /// Response produced locally rather than by the device.
    pub fn synthetic(status: DeviceStatus) -> Self {
        Self {
            status: status.code(),
            message: status.message().to_string(),
            body: String::new(),
            raw: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == DeviceStatus::Ok.code()
    }
}

/// Errors surfaced to callers of gauger commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GaugerError {
    #[error("malformed ACK payload: {0:?}")]
    MalformedAck(String),

    #[error("device I/O error: {0}")]
    Io(String),

    #[error("Device already connected")]
    AlreadyConnected,

    #[error("not ready")]
    ControllerNotReady,

    #[error("gpio not enabled")]
    ControllerDisabled,

    #[error("controller error: {0}")]
    Controller(String),

    #[error("device closed before the command was acknowledged")]
    Abandoned,
}

pub type CommandResult = Result<CommandResponse, GaugerError>;
