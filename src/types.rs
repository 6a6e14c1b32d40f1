use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, FromRepr};

use crate::constants::*;

/// Command codes carried in `data[0]` of a frame.
#[derive(Debug, EnumIter, FromRepr, Display, Clone, Copy, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Command {
    #[strum(serialize = "READ_ANGLE")]
    ReadAngle = CMD_READ_ANGLE,
    #[strum(serialize = "SET_ANGLE")]
    SetAngle = CMD_SET_ANGLE,
    #[strum(serialize = "CLOSE")]
    Close = CMD_CLOSE,
    #[strum(serialize = "STOP")]
    Stop = CMD_STOP,
}

impl Command {
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(
    Debug, EnumIter, EnumString, Display, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AxisRole {
    Yaw,   // pan
    Pitch, // tilt
    Lift,
}

/// Symbolic fault tags kept per axis (`Range`, `CommSim`) or globally (`WriteFail`).
#[derive(
    Debug, EnumIter, EnumString, Display, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Fault {
    Range,
    CommSim,
    WriteFail,
}

/// Decoded READ_ANGLE / SET_ANGLE response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotorStatus {
    pub id: u8,
    pub temperature_c: i8,
    pub angle_raw: u16,
    pub angle_0_360: f64,
    pub angle_deg: f64,
    /// Undecoded response payload; bytes 2..6 are reserved.
    pub data: [u8; DATA_SIZE],
}

impl MotorStatus {
    pub(crate) fn from_data(id: u8, data: [u8; DATA_SIZE]) -> Self {
        let angle_raw = u16::from_le_bytes([data[6], data[7]]);
        let angle_0_360 = angle_raw as f64 / ANGLE_LSB_PER_DEG;
        MotorStatus {
            id,
            temperature_c: data[1] as i8,
            angle_raw,
            angle_0_360,
            angle_deg: normalize_deg(angle_0_360),
            data,
        }
    }
}

/// Maps any angle into (-180, 180].
pub fn normalize_deg(angle: f64) -> f64 {
    let reduced = angle.rem_euclid(360.0);
    if reduced > 180.0 {
        reduced - 360.0
    } else {
        reduced
    }
}
