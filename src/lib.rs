mod axis;
mod codec;
mod config;
mod constants;
mod controller;
mod engine;
mod error;
mod safety;
mod transport;
mod types;

pub use axis::{AxisModel, AxisState};
pub use codec::{angle_to_lsb, crc16, decode, encode, set_angle_payload, Frame};
pub use config::{AxisConfig, GimbalConfig, LinkConfig};
pub use controller::{AxisSnapshot, GimbalController, GimbalStatus};
pub use engine::{RetryPolicy, TransactionEngine};
pub use error::{Error, FrameError, Result};
pub use safety::{LinkHealth, SafetyMonitor, SafetyStatus};
pub use transport::{Endpoint, Link, Transport};
pub use types::{normalize_deg, AxisRole, Command, Fault, MotorStatus};

// Re-export commonly used items
pub use constants::{
    BROADCAST_ID, CMD_CLOSE, CMD_READ_ANGLE, CMD_SET_ANGLE, CMD_STOP, DATA_SIZE, FRAME_HEADER,
    FRAME_SIZE, LEN_BYTE,
};
