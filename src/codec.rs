//! Frame codec: `0x3E | id | 0x08 | data[8] | crc16 (LE)`.
//!
//! Pure functions, no I/O. The CRC is Modbus CRC16 (poly 0xA001, init
//! 0xFFFF) over the first 11 bytes.

use crate::constants::*;
use crate::error::{Error, FrameError, Result};

pub type Frame = [u8; FRAME_SIZE];

pub fn crc16(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in bytes {
        crc ^= b as u16;
        for _ in 0..8 {
            crc = if crc & 0x0001 != 0 {
                (crc >> 1) ^ 0xA001
            } else {
                crc >> 1
            };
        }
    }
    crc
}

/// Builds a request frame with `data = [cmd] + payload + zero padding`.
pub fn encode(id: u8, cmd: u8, payload: &[u8]) -> Result<Frame> {
    if payload.len() > MAX_PAYLOAD {
        return Err(Error::PayloadTooLong(payload.len()));
    }

    let mut frame = [0u8; FRAME_SIZE];
    frame[0] = FRAME_HEADER;
    frame[1] = id;
    frame[2] = LEN_BYTE;
    frame[3] = cmd;
    frame[4..4 + payload.len()].copy_from_slice(payload);

    let crc = crc16(&frame[..CRC_SPAN]);
    frame[CRC_SPAN..].copy_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// Validates a received frame and splits out `(id, data)`.
pub fn decode(bytes: &[u8]) -> std::result::Result<(u8, [u8; DATA_SIZE]), FrameError> {
    if bytes.len() != FRAME_SIZE {
        return Err(FrameError::BadLength {
            expected: FRAME_SIZE,
            actual: bytes.len(),
        });
    }
    if bytes[0] != FRAME_HEADER {
        return Err(FrameError::BadHeader(bytes[0]));
    }
    if bytes[2] != LEN_BYTE {
        return Err(FrameError::BadLengthByte(bytes[2]));
    }

    let computed = crc16(&bytes[..CRC_SPAN]);
    let received = u16::from_le_bytes([bytes[CRC_SPAN], bytes[CRC_SPAN + 1]]);
    if computed != received {
        return Err(FrameError::CrcMismatch { computed, received });
    }

    let mut data = [0u8; DATA_SIZE];
    data.copy_from_slice(&bytes[3..3 + DATA_SIZE]);
    Ok((bytes[1], data))
}

/// SET_ANGLE payload: `0x00 | speed u16 LE | target i32 LE` (0.01 deg/LSB).
pub fn set_angle_payload(target_deg: f64, speed_rpm: u16) -> Result<[u8; MAX_PAYLOAD]> {
    let lsb = angle_to_lsb(target_deg)?;
    let mut payload = [0u8; MAX_PAYLOAD];
    payload[1..3].copy_from_slice(&speed_rpm.to_le_bytes());
    payload[3..7].copy_from_slice(&lsb.to_le_bytes());
    Ok(payload)
}

pub fn angle_to_lsb(target_deg: f64) -> Result<i32> {
    let lsb = (target_deg * ANGLE_LSB_PER_DEG).round();
    if !lsb.is_finite() || lsb < i32::MIN as f64 || lsb > i32::MAX as f64 {
        return Err(Error::EncodingOverflow(target_deg));
    }
    Ok(lsb as i32)
}
