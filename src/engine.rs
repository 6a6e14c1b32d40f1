use crate::codec::{self, Frame};
use crate::config::LinkConfig;
use crate::constants::*;
use crate::error::{Error, Result};
use crate::transport::{Link, Transport};
use crate::types::{normalize_deg, Command, MotorStatus};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
    pub recv_poll: Duration,
    pub broadcast_settle: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Duration::from_millis(RETRY_BACKOFF_MS),
            recv_poll: Duration::from_millis(RECV_POLL_MS),
            broadcast_settle: Duration::from_millis(BROADCAST_SETTLE_MS),
        }
    }
}

impl From<&LinkConfig> for RetryPolicy {
    fn from(config: &LinkConfig) -> Self {
        RetryPolicy {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            ..RetryPolicy::default()
        }
    }
}

// Why a single attempt failed.
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error("timed out with {received}/{} bytes", FRAME_SIZE)]
    Timeout { received: usize },
    #[error("corrupt response: {0}")]
    Corrupt(crate::error::FrameError),
    #[error("response from id {actual} while waiting on {expected}")]
    Mismatch { expected: u8, actual: u8 },
    #[error(transparent)]
    Io(Error),
}

/// Turns `(id, cmd, payload)` into a validated response, one exchange on the
/// wire at a time.
pub struct TransactionEngine<L: Link = Transport> {
    // Held for the whole send/receive exchange; the protocol has no request ids.
    link: Mutex<Option<L>>,
    available: bool,
    policy: RetryPolicy,
}

impl<L: Link> TransactionEngine<L> {
    pub fn new(link: L, policy: RetryPolicy) -> Self {
        TransactionEngine {
            link: Mutex::new(Some(link)),
            available: true,
            policy,
        }
    }

    /// An engine whose link could not be opened. Every transaction fails.
    pub fn offline(policy: RetryPolicy) -> Self {
        TransactionEngine {
            link: Mutex::new(None),
            available: false,
            policy,
        }
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends a request and returns the 8-byte response payload, or `None`
    /// once every attempt has failed.
    pub async fn transact(
        &self,
        motor_id: u8,
        cmd: Command,
        payload: &[u8],
        timeout: Duration,
    ) -> Option<[u8; DATA_SIZE]> {
        let frame = match codec::encode(motor_id, cmd.code(), payload) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Refusing to send {} to {}: {}", cmd, motor_id, e);
                return None;
            }
        };

        if motor_id == BROADCAST_ID {
            return match self.send_broadcast(&frame).await {
                Ok(()) => {
                    let mut data = [0u8; DATA_SIZE];
                    data[0] = cmd.code();
                    Some(data)
                }
                Err(e) => {
                    warn!("Broadcast {} failed: {}", cmd, e);
                    None
                }
            };
        }

        let attempts = self.policy.max_retries + 1;
        for attempt in 1..=attempts {
            match self.exchange(motor_id, &frame, timeout).await {
                Ok(data) => {
                    debug!("{} <- {:02x?} (attempt {})", motor_id, data, attempt);
                    return Some(data);
                }
                Err(AttemptError::Io(Error::Unavailable)) => return None,
                Err(e) => {
                    warn!(
                        "Motor {} {} attempt {}/{} failed: {}",
                        motor_id, cmd, attempt, attempts, e
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        warn!("Motor {} {}: retries exhausted", motor_id, cmd);
        None
    }

    async fn exchange(
        &self,
        motor_id: u8,
        frame: &Frame,
        timeout: Duration,
    ) -> std::result::Result<[u8; DATA_SIZE], AttemptError> {
        let mut buf = [0u8; FRAME_SIZE];
        let received = {
            let mut guard = self.link.lock().await;
            let link = guard
                .as_mut()
                .ok_or(AttemptError::Io(Error::Unavailable))?;

            link.clear_input().await.map_err(AttemptError::Io)?;
            debug!("{} -> {:02x?}", motor_id, frame);
            link.send(frame).await.map_err(AttemptError::Io)?;

            let deadline = Instant::now() + timeout;
            let mut received = 0;
            while received < FRAME_SIZE && Instant::now() < deadline {
                let n = link
                    .recv_into(&mut buf[received..], deadline)
                    .await
                    .map_err(AttemptError::Io)?;
                if n == 0 {
                    tokio::time::sleep(self.policy.recv_poll).await;
                }
                received += n;
            }
            received
        };

        if received < FRAME_SIZE {
            return Err(AttemptError::Timeout { received });
        }
        let (id, data) = codec::decode(&buf).map_err(AttemptError::Corrupt)?;
        if id != motor_id {
            return Err(AttemptError::Mismatch {
                expected: motor_id,
                actual: id,
            });
        }
        Ok(data)
    }

    async fn send_broadcast(&self, frame: &Frame) -> Result<()> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or(Error::Unavailable)?;
        debug!("broadcast -> {:02x?}", frame);
        link.send(frame).await?;
        // Keep the bus quiet while every axis acts on it
        tokio::time::sleep(self.policy.broadcast_settle).await;
        Ok(())
    }

    async fn broadcast(&self, cmd: Command) -> Result<()> {
        let frame = codec::encode(BROADCAST_ID, cmd.code(), &[])?;
        self.send_broadcast(&frame).await?;
        info!("Broadcast {} sent", cmd);
        Ok(())
    }

    /// READ_ANGLE: temperature and single-turn angle.
    pub async fn read_status(&self, motor_id: u8) -> Option<MotorStatus> {
        let data = self
            .transact(motor_id, Command::ReadAngle, &[], self.policy.timeout)
            .await?;
        if data[0] != Command::ReadAngle.code() {
            warn!(
                "Motor {} answered READ_ANGLE with echo 0x{:02X}",
                motor_id, data[0]
            );
            return None;
        }
        Some(MotorStatus::from_data(motor_id, data))
    }

    pub async fn read_angle(&self, motor_id: u8) -> Option<f64> {
        self.read_status(motor_id).await.map(|s| s.angle_deg)
    }

    /// SET_ANGLE. `Ok(None)` means the motor did not acknowledge; encoding
    /// errors are rejected before anything is sent.
    pub async fn set_target_angle(
        &self,
        motor_id: u8,
        target_deg: f64,
        speed_rpm: u16,
    ) -> Result<Option<MotorStatus>> {
        let target = normalize_deg(target_deg);
        let payload = codec::set_angle_payload(target, speed_rpm)?;
        debug!(
            "Motor {} target {:.2} deg @ {} rpm",
            motor_id, target, speed_rpm
        );

        let Some(data) = self
            .transact(motor_id, Command::SetAngle, &payload, self.policy.timeout)
            .await
        else {
            return Ok(None);
        };
        if data[0] != Command::SetAngle.code() {
            warn!(
                "Motor {} answered SET_ANGLE with echo 0x{:02X}",
                motor_id, data[0]
            );
            return Ok(None);
        }
        Ok(Some(MotorStatus::from_data(motor_id, data)))
    }

    pub async fn close_motor(&self, motor_id: u8) -> bool {
        self.simple_command(motor_id, Command::Close).await
    }

    pub async fn stop_motor(&self, motor_id: u8) -> bool {
        self.simple_command(motor_id, Command::Stop).await
    }

    async fn simple_command(&self, motor_id: u8, cmd: Command) -> bool {
        matches!(
            self.transact(motor_id, cmd, &[], self.policy.timeout).await,
            Some(data) if data[0] == cmd.code()
        )
    }

    pub async fn broadcast_shutdown(&self) -> Result<()> {
        self.broadcast(Command::Close).await
    }

    pub async fn broadcast_stop(&self) -> Result<()> {
        self.broadcast(Command::Stop).await
    }

    /// Closes the underlying link. Later transactions fail immediately.
    pub async fn close(&self) -> Result<()> {
        let link = self.link.lock().await.take();
        match link {
            Some(mut link) => link.close().await,
            None => Ok(()),
        }
    }
}
