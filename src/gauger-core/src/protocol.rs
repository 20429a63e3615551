// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Gauger wire format.
//!
//! Outbound commands are framed as `:<id><body>`, where the body already
//! carries its own arguments and terminator. Inbound lines are either
//! acknowledgements (`ACK:<id>:<NN><rest>`) or telemetry
//! (`<MODULE>:<field>|<field>|...`).

use crate::command::JobId;
use crate::response::{status_message, CommandResponse, GaugerError};

pub const ACK_PREFIX: &str = "ACK:";

/// Body of the system command that queries motor positions.
pub const POSITION_QUERY: &str = ":15 ;\n";

/// Frame a command body with its correlation id.
pub fn frame_command(id: JobId, body: &str) -> String {
    format!(":{}{}", id, body)
}

/// A line received from the device, classified by prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine<'a> {
    Ack {
        id: &'a str,
        payload: Option<&'a str>,
    },
    Telemetry(&'a str),
}

pub fn classify_line(line: &str) -> InboundLine<'_> {
    match line.strip_prefix(ACK_PREFIX) {
        Some(rest) => {
            let mut parts = rest.splitn(2, ':');
            let id = parts.next().unwrap_or_default();
            InboundLine::Ack {
                id,
                payload: parts.next(),
            }
        }
        None => InboundLine::Telemetry(line),
    }
}

pub fn parse_job_id(text: &str) -> Option<JobId> {
    text.trim().parse::<JobId>().ok().filter(|id| *id > 0)
}

/// Parse the result text of an ACK into a response.
///
/// Accepts an optional single leading delimiter before the two status
/// digits, and drops one separator between the status and the body.
pub fn parse_ack_payload(text: &str) -> Result<CommandResponse, GaugerError> {
    let malformed = || GaugerError::MalformedAck(text.to_string());

    let rest = match text.chars().next() {
        Some(c) if !c.is_ascii_digit() => &text[c.len_utf8()..],
        _ => text,
    };
    let digits = rest
        .get(..2)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(malformed)?;
    let status: u8 = digits.parse().map_err(|_| malformed())?;

    let body = &rest[2..];
    let body = body
        .strip_prefix(|c: char| matches!(c, '|' | ' ' | ','))
        .unwrap_or(body);

    Ok(CommandResponse {
        status,
        message: status_message(status).to_string(),
        body: body.to_string(),
        raw: text.to_string(),
    })
}
