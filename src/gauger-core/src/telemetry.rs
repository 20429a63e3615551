// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Decoding of unsolicited gauger telemetry lines.
//!
//! Lines have the form `MODULE:field1|field2|...`. A numeric field equal to
//! [`SENTINEL`] means the sensor has no reading and decodes to `None`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder the device sends for "no reading".
pub const SENTINEL: f64 = 1000.0;

/// One decoded telemetry observation.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryUpdate {
    Gps([Option<f64>; 2]),
    Magnetometer {
        heading: Option<f64>,
        declination: Option<f64>,
    },
    Orientation {
        xyz: [Option<f64>; 3],
        calibrated: bool,
    },
    MotorController {
        position: [Option<f64>; 2],
        limits: [bool; 2],
    },
    /// Module list announced by the device; no state change.
    Modules(Vec<String>),
    /// Unrecognised module tag; no state change.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    #[error("{module}: missing field {index}")]
    MissingField { module: String, index: usize },

    #[error("{module}: invalid number {value:?} in field {index}")]
    InvalidNumber {
        module: String,
        index: usize,
        value: String,
    },
}

/// Decode one raw telemetry line.
///
/// Either the whole line decodes or an error is returned; no partial update
/// is ever produced.
pub fn decode_line(line: &str) -> Result<TelemetryUpdate, TelemetryError> {
    let line = line.trim();
    let (module, text) = line.split_once(':').unwrap_or((line, ""));
    let fields = Fields::new(module, text);

    match module {
        "GPS" => Ok(TelemetryUpdate::Gps([
            fields.reading(0)?,
            fields.reading(1)?,
        ])),
        "MAG" => Ok(TelemetryUpdate::Magnetometer {
            heading: fields.reading(0)?,
            declination: fields.reading(4)?,
        }),
        // x|y|z|cal_system|cal_gyro|cal_accel|cal_mag|isCalibrated
        "ORI" => Ok(TelemetryUpdate::Orientation {
            xyz: [fields.reading(0)?, fields.reading(1)?, fields.reading(2)?],
            calibrated: fields.flag(7)?,
        }),
        "MCC" => decode_motor_fields(module, text),
        "MOD" => Ok(TelemetryUpdate::Modules(
            text.split('|')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        other => Ok(TelemetryUpdate::Unknown(other.to_string())),
    }
}

/// Decode `pos1|pos2|limit1|limit2`, as found in `MCC` lines and in the
/// body of a position query reply.
pub fn decode_motor_fields(module: &str, text: &str) -> Result<TelemetryUpdate, TelemetryError> {
    let fields = Fields::new(module, text);
    Ok(TelemetryUpdate::MotorController {
        position: [fields.reading(0)?, fields.reading(1)?],
        limits: [fields.flag(2)?, fields.flag(3)?],
    })
}

struct Fields<'a> {
    module: &'a str,
    values: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    fn new(module: &'a str, text: &'a str) -> Self {
        Self {
            module,
            values: text.split('|').map(str::trim).collect(),
        }
    }

    fn raw(&self, index: usize) -> Result<&'a str, TelemetryError> {
        self.values
            .get(index)
            .copied()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| TelemetryError::MissingField {
                module: self.module.to_string(),
                index,
            })
    }

    fn reading(&self, index: usize) -> Result<Option<f64>, TelemetryError> {
        let value = self.raw(index)?;
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok((v != SENTINEL).then_some(v)),
            _ => Err(TelemetryError::InvalidNumber {
                module: self.module.to_string(),
                index,
                value: value.to_string(),
            }),
        }
    }

    fn flag(&self, index: usize) -> Result<bool, TelemetryError> {
        Ok(self.raw(index)? == "T")
    }
}

/// Most recent decoded observation of every telemetry field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryState {
    pub position: [Option<f64>; 2],
    pub limits_enabled: [Option<bool>; 2],
    pub gps_coords: [Option<f64>; 2],
    pub mag_heading: Option<f64>,
    pub declination_angle: Option<f64>,
    pub orientation: [Option<f64>; 3],
    pub is_orientation_calibrated: Option<bool>,
}

impl TelemetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, update: &TelemetryUpdate) {
        match update {
            TelemetryUpdate::Gps(coords) => self.gps_coords = *coords,
            TelemetryUpdate::Magnetometer {
                heading,
                declination,
            } => {
                self.mag_heading = *heading;
                self.declination_angle = *declination;
            }
            TelemetryUpdate::Orientation { xyz, calibrated } => {
                self.orientation = *xyz;
                self.is_orientation_calibrated = Some(*calibrated);
            }
            TelemetryUpdate::MotorController { position, limits } => {
                self.position = *position;
                self.limits_enabled = [Some(limits[0]), Some(limits[1])];
            }
            TelemetryUpdate::Modules(_) | TelemetryUpdate::Unknown(_) => {}
        }
    }

    /// Forget controller-adjacent status (positions and limits).
    pub fn clear_status(&mut self) {
        self.position = [None, None];
        self.limits_enabled = [None, None];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_sentinel() {
        assert_eq!(
            decode_line("GPS:1000|45.2"),
            Ok(TelemetryUpdate::Gps([None, Some(45.2)]))
        );
    }

    #[test]
    fn test_magnetometer_uses_fields_zero_and_four() {
        assert_eq!(
            decode_line("MAG:182.5|1|2|3|-4.25"),
            Ok(TelemetryUpdate::Magnetometer {
                heading: Some(182.5),
                declination: Some(-4.25)
            })
        );
        assert_eq!(
            decode_line("MAG:1000|0|0|0|1000"),
            Ok(TelemetryUpdate::Magnetometer {
                heading: None,
                declination: None
            })
        );
    }

    #[test]
    fn test_orientation() {
        assert_eq!(
            decode_line("ORI:1.0|2.0|3.0|0|0|0|0|T"),
            Ok(TelemetryUpdate::Orientation {
                xyz: [Some(1.0), Some(2.0), Some(3.0)],
                calibrated: true
            })
        );
        assert_eq!(
            decode_line("ORI:1000|2.0|3.0|3|3|3|3|F"),
            Ok(TelemetryUpdate::Orientation {
                xyz: [None, Some(2.0), Some(3.0)],
                calibrated: false
            })
        );
    }

    #[test]
    fn test_motor_controller() {
        assert_eq!(
            decode_line("MCC:10|20|T|F"),
            Ok(TelemetryUpdate::MotorController {
                position: [Some(10.0), Some(20.0)],
                limits: [true, false]
            })
        );
    }

    #[test]
    fn test_modules_and_unknown() {
        assert_eq!(
            decode_line("MOD:GPS|MAG|ORI"),
            Ok(TelemetryUpdate::Modules(vec![
                "GPS".to_string(),
                "MAG".to_string(),
                "ORI".to_string()
            ]))
        );
        assert_eq!(
            decode_line("XYZ:1|2"),
            Ok(TelemetryUpdate::Unknown("XYZ".to_string()))
        );
        assert_eq!(
            decode_line("garbage"),
            Ok(TelemetryUpdate::Unknown("garbage".to_string()))
        );
    }

    #[test]
    fn test_trailing_carriage_return() {
        assert_eq!(
            decode_line("GPS:1.5|2.5\r"),
            Ok(TelemetryUpdate::Gps([Some(1.5), Some(2.5)]))
        );
    }

    #[test]
    fn test_malformed_lines_are_rejected_whole() {
        assert!(matches!(
            decode_line("GPS:abc|45.2"),
            Err(TelemetryError::InvalidNumber { index: 0, .. })
        ));
        assert!(matches!(
            decode_line("GPS:45.2"),
            Err(TelemetryError::MissingField { index: 1, .. })
        ));
        assert!(matches!(
            decode_line("MCC:10|20|T"),
            Err(TelemetryError::MissingField { index: 3, .. })
        ));
        assert!(matches!(
            decode_line("ORI:1|2|3"),
            Err(TelemetryError::MissingField { index: 7, .. })
        ));
        assert!(decode_line("GPS:NaN|1").is_err());
        assert!(decode_line("GPS:").is_err());
    }

    #[test]
    fn test_apply_and_clear() {
        let mut state = TelemetryState::new();
        state.apply(&decode_line("MCC:10|20|T|F").expect("valid"));
        state.apply(&decode_line("GPS:1000|45.2").expect("valid"));
        assert_eq!(state.position, [Some(10.0), Some(20.0)]);
        assert_eq!(state.limits_enabled, [Some(true), Some(false)]);

        state.clear_status();
        assert_eq!(state.position, [None, None]);
        assert_eq!(state.limits_enabled, [None, None]);
        assert_eq!(state.gps_coords, [None, Some(45.2)]);
    }

    #[test]
    fn test_informational_updates_leave_state() {
        let mut state = TelemetryState::new();
        state.apply(&decode_line("GPS:1|2").expect("valid"));
        let before = state.clone();
        state.apply(&decode_line("MOD:GPS").expect("valid"));
        state.apply(&decode_line("WHAT:1").expect("valid"));
        assert_eq!(state, before);
    }
}
