#![allow(dead_code)]

use async_trait::async_trait;
use gimbal_controller::{
    decode, encode, Link, Result, RetryPolicy, BROADCAST_ID, CMD_CLOSE, CMD_READ_ANGLE,
    CMD_SET_ANGLE, CMD_STOP,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

pub type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
pub struct Wire {
    pub sent: Vec<Vec<u8>>,
    pub inbound: VecDeque<u8>,
    pub clears: usize,
}

impl Wire {
    /// Commands of every frame sent so far, as `(id, cmd)`.
    pub fn commands(&self) -> Vec<(u8, u8)> {
        self.sent.iter().map(|f| (f[1], f[3])).collect()
    }
}

/// In-memory link: every sent frame goes to the responder, whose reply is
/// queued for the next reads.
pub struct FakeLink {
    wire: Arc<Mutex<Wire>>,
    responder: Responder,
}

impl FakeLink {
    pub fn new(
        responder: impl FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    ) -> (Self, Arc<Mutex<Wire>>) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        let link = FakeLink {
            wire: Arc::clone(&wire),
            responder: Box::new(responder),
        };
        (link, wire)
    }

    pub fn silent() -> (Self, Arc<Mutex<Wire>>) {
        Self::new(|_| None)
    }
}

#[async_trait]
impl Link for FakeLink {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let reply = (self.responder)(bytes);
        let mut wire = self.wire.lock();
        wire.sent.push(bytes.to_vec());
        if let Some(reply) = reply {
            wire.inbound.extend(reply);
        }
        Ok(())
    }

    async fn recv_into(&mut self, buf: &mut [u8], _deadline: Instant) -> Result<usize> {
        let mut wire = self.wire.lock();
        let n = buf.len().min(wire.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(wire.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn clear_input(&mut self) -> Result<()> {
        let mut wire = self.wire.lock();
        wire.inbound.clear();
        wire.clears += 1;
        Ok(())
    }
}

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_millis(20),
        max_retries: 3,
        backoff: Duration::from_millis(1),
        recv_poll: Duration::from_millis(1),
        broadcast_settle: Duration::from_millis(1),
    }
}

/// READ_ANGLE/SET_ANGLE style response frame.
pub fn status_frame(id: u8, cmd: u8, temperature_c: i8, raw: u16) -> Vec<u8> {
    let [lo, hi] = raw.to_le_bytes();
    encode(id, cmd, &[temperature_c as u8, 0, 0, 0, 0, lo, hi])
        .unwrap()
        .to_vec()
}

/// A bus of motors keyed by id, each holding `(temperature, raw angle)`.
/// SET_ANGLE moves the motor to its target immediately. Replies stop while
/// `online` is false.
pub fn motor_bus(
    motors: &[(u8, i8, u16)],
    online: Arc<AtomicBool>,
) -> impl FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static {
    let mut state: HashMap<u8, (i8, u16)> = motors
        .iter()
        .map(|&(id, temp, raw)| (id, (temp, raw)))
        .collect();
    move |request: &[u8]| {
        let (id, data) = decode(request).ok()?;
        if id == BROADCAST_ID || !online.load(Ordering::SeqCst) {
            return None;
        }
        let motor = state.get_mut(&id)?;
        match data[0] {
            CMD_READ_ANGLE => Some(status_frame(id, CMD_READ_ANGLE, motor.0, motor.1)),
            CMD_SET_ANGLE => {
                let lsb = i32::from_le_bytes([data[4], data[5], data[6], data[7]]);
                motor.1 = lsb.rem_euclid(36_000) as u16;
                Some(status_frame(id, CMD_SET_ANGLE, motor.0, motor.1))
            }
            cmd @ (CMD_CLOSE | CMD_STOP) => Some(encode(id, cmd, &[]).unwrap().to_vec()),
            _ => None,
        }
    }
}

pub fn online() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(true))
}
