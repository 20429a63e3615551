// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Simulated gauger for running without hardware.
//!
//! Speaks the device side of the line protocol: announces its modules,
//! acknowledges each `;`-terminated frame with status `00`, answers position
//! queries and streams motor telemetry.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

const MODULES_LINE: &str = "MOD:GPS|MAG|ORI|MCC\n";
const POSITION_CODE: &str = "15";

/// Device-side state of the simulation.
#[derive(Debug, Clone, Default)]
struct MockState {
    position: [f64; 2],
}

impl MockState {
    fn motor_fields(&self) -> String {
        format!("{}|{}|T|F", self.position[0], self.position[1])
    }

    /// Reply to one frame, or `None` if it carries no job id.
    fn reply(&mut self, frame: &str) -> Option<String> {
        let rest = frame.trim().strip_prefix(':')?;
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        let (id, command) = rest.split_at(digits);
        let command = command.trim_start_matches(':').trim_start();

        if command.starts_with(POSITION_CODE) {
            return Some(format!("ACK:{}:00|{}\n", id, self.motor_fields()));
        }
        Some(format!("ACK:{}:00OK\n", id))
    }

    fn tick(&mut self) -> String {
        self.position[0] = (self.position[0] + 1.0) % 360.0;
        format!("MCC:{}\n", self.motor_fields())
    }
}

/// Serve the simulated device on `stream` until the host side goes away.
pub async fn run_mock_gauger<S>(stream: S, telemetry_period: Duration) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut state = MockState::default();
    let mut telemetry = time::interval(telemetry_period);
    telemetry.set_missed_tick_behavior(MissedTickBehavior::Delay);
    telemetry.tick().await;

    writer.write_all(MODULES_LINE.as_bytes()).await?;
    writer.flush().await?;

    // Kept across select iterations so a cancelled read loses nothing.
    let mut frame = Vec::new();
    loop {
        tokio::select! {
            read = reader.read_until(b';', &mut frame) => {
                if read? == 0 {
                    debug!("Mock gauger: host closed");
                    return Ok(());
                }
                let text = String::from_utf8_lossy(&frame).into_owned();
                frame.clear();
                if let Some(reply) = state.reply(&text) {
                    writer.write_all(reply.as_bytes()).await?;
                    writer.flush().await?;
                }
            }
            _ = telemetry.tick() => {
                writer.write_all(state.tick().as_bytes()).await?;
                writer.flush().await?;
            }
        }
    }
}
