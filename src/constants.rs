// Frame layout
pub const FRAME_HEADER: u8 = 0x3E;
pub const LEN_BYTE: u8 = 0x08;
pub const FRAME_SIZE: usize = 13;
pub const DATA_SIZE: usize = 8;
pub const MAX_PAYLOAD: usize = DATA_SIZE - 1;
pub const CRC_SPAN: usize = FRAME_SIZE - 2;

// Accepted by every axis on the bus, never answered
pub const BROADCAST_ID: u8 = 0xCD;

// Command constants
pub const CMD_READ_ANGLE: u8 = 0x94;
pub const CMD_SET_ANGLE: u8 = 0xA4;
pub const CMD_CLOSE: u8 = 0x80;
pub const CMD_STOP: u8 = 0x81;

// Angle encoding, 0.01 degree per LSB
pub const ANGLE_LSB_PER_DEG: f64 = 100.0;

// Transaction timing
pub const DEFAULT_TIMEOUT_MS: u64 = 200;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const RETRY_BACKOFF_MS: u64 = 10;
pub const RECV_POLL_MS: u64 = 1;
pub const BROADCAST_SETTLE_MS: u64 = 50;
pub const SERIAL_READ_TIMEOUT_MS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

// Controller defaults
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_STALE_AFTER_POLLS: u32 = 4;
pub const DEFAULT_SPEED_RPM: u16 = 100;
pub const DEFAULT_SIMULATE_JITTER_DEG: f64 = 0.5;
