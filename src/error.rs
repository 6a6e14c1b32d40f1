use thiserror::Error;

/// Reasons a 13-byte buffer is not a valid frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame must be {expected} bytes, got {actual}")]
    BadLength { expected: usize, actual: usize },

    #[error("bad frame header 0x{0:02X}")]
    BadHeader(u8),

    #[error("bad length byte 0x{0:02X}")]
    BadLengthByte(u8),

    #[error("CRC mismatch: computed 0x{computed:04X}, received 0x{received:04X}")]
    CrcMismatch { computed: u16, received: u16 },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),

    #[error("payload of {0} bytes exceeds the 7-byte command payload")]
    PayloadTooLong(usize),

    #[error("angle {0} cannot be encoded as a signed 32-bit value")]
    EncodingOverflow(f64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("transport unavailable")]
    Unavailable,

    #[error("blocking I/O task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
