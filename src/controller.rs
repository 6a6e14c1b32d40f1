use crate::{
    axis::{AxisModel, AxisState},
    config::{AxisConfig, GimbalConfig},
    engine::{RetryPolicy, TransactionEngine},
    error::Result,
    safety::{SafetyMonitor, SafetyStatus},
    transport::{Link, Transport},
    types::{AxisRole, Fault, MotorStatus},
};
use futures::future::join_all;
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisSnapshot {
    pub role: AxisRole,
    pub name: String,
    pub id: u8,
    #[serde(flatten)]
    pub state: AxisState,
}

/// Point-in-time copy of the cache, safe to hand to any consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GimbalStatus {
    pub axes: Vec<AxisSnapshot>,
    pub safety: SafetyStatus,
    pub link_available: bool,
}

impl GimbalStatus {
    pub fn axis(&self, role: AxisRole) -> Option<&AxisSnapshot> {
        self.axes.iter().find(|a| a.role == role)
    }
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    poll_interval: Duration,
    simulate_on_fail: bool,
    simulate_jitter_deg: f64,
    speed_rpm: u16,
}

struct Cache {
    axes: Vec<AxisModel>,
    safety: SafetyMonitor,
}

impl Cache {
    fn axis_mut(&mut self, role: AxisRole) -> Option<&mut AxisModel> {
        self.axes.iter_mut().find(|a| a.config().role == role)
    }
}

struct Shared<L: Link> {
    engine: TransactionEngine<L>,
    // Same order as `cache.axes`; immutable after construction.
    axes: Vec<AxisConfig>,
    cache: Mutex<Cache>,
    settings: Settings,
}

struct Poller {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct GimbalController<L: Link = Transport> {
    shared: Arc<Shared<L>>,
    poller: Mutex<Option<Poller>>,
}

impl GimbalController<Transport> {
    /// Opens the configured transport and builds the controller.
    ///
    /// With `simulate_on_fail` set, an unopenable transport yields an offline
    /// controller serving simulated readings instead of an error.
    pub async fn connect(config: GimbalConfig) -> Result<Self> {
        config.validate()?;
        let policy = RetryPolicy::from(&config.link);
        let engine = match Transport::open(&config.link).await {
            Ok(transport) => {
                info!("Gimbal link {} open", transport.describe());
                TransactionEngine::new(transport, policy)
            }
            Err(e) if config.simulate_on_fail => {
                warn!("Starting offline with simulated readings: {}", e);
                TransactionEngine::offline(policy)
            }
            Err(e) => return Err(e),
        };
        Ok(Self::from_engine(config, engine))
    }
}

impl<L: Link + 'static> GimbalController<L> {
    pub fn with_link(config: GimbalConfig, link: L) -> Result<Self> {
        config.validate()?;
        let engine = TransactionEngine::new(link, RetryPolicy::from(&config.link));
        Ok(Self::from_engine(config, engine))
    }

    pub fn with_engine(config: GimbalConfig, engine: TransactionEngine<L>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_engine(config, engine))
    }

    fn from_engine(config: GimbalConfig, engine: TransactionEngine<L>) -> Self {
        let cache = Cache {
            axes: config.axes.iter().cloned().map(AxisModel::new).collect(),
            safety: SafetyMonitor::new(config.stale_after()),
        };
        let settings = Settings {
            poll_interval: config.poll_interval(),
            simulate_on_fail: config.simulate_on_fail,
            simulate_jitter_deg: config.simulate_jitter_deg,
            speed_rpm: config.speed_rpm,
        };
        GimbalController {
            shared: Arc::new(Shared {
                engine,
                axes: config.axes,
                cache: Mutex::new(cache),
                settings,
            }),
            poller: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &TransactionEngine<L> {
        &self.shared.engine
    }

    pub fn link_available(&self) -> bool {
        self.shared.engine.available()
    }

    /// Spawns the background polling task. No-op if it is already running.
    pub fn start(&self) {
        let mut poller = self.poller.lock();
        if poller.is_some() {
            debug!("Polling already running");
            return;
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(poll_loop(Arc::clone(&self.shared), stop_rx));
        *poller = Some(Poller { stop_tx, handle });
        info!(
            "Polling {} axes every {:?}",
            self.shared.axes.len(),
            self.shared.settings.poll_interval
        );
    }

    pub fn is_running(&self) -> bool {
        self.poller.lock().is_some()
    }

    /// Signals the polling task and waits for its current cycle to finish.
    pub async fn stop(&self) {
        let poller = self.poller.lock().take();
        let Some(poller) = poller else {
            return;
        };
        let _ = poller.stop_tx.send(true);
        if let Err(e) = poller.handle.await {
            error!("Polling task ended abnormally: {}", e);
        }
        info!("Polling stopped");
    }

    /// Runs one poll cycle on the caller's task.
    pub async fn poll_once(&self) {
        self.shared.poll_once().await;
    }

    pub async fn set_angles(&self, yaw_deg: f64, pitch_deg: f64) -> bool {
        self.set_targets(&[(AxisRole::Yaw, yaw_deg), (AxisRole::Pitch, pitch_deg)])
            .await
    }

    pub async fn set_axis(&self, role: AxisRole, target_deg: f64) -> bool {
        self.set_targets(&[(role, target_deg)]).await
    }

    /// Soft-limit gates every target before anything is written; the writes
    /// themselves are independent of each other. `RANGE` tracks each axis's
    /// latest target, so a passing axis is cleared even when another fails.
    pub async fn set_targets(&self, targets: &[(AxisRole, f64)]) -> bool {
        let mut writes = Vec::with_capacity(targets.len());
        let mut rejected = false;
        {
            let mut cache = self.shared.cache.lock();
            for &(role, target) in targets {
                let Some(axis) = cache.axis_mut(role) else {
                    warn!("No {} axis configured", role);
                    rejected = true;
                    continue;
                };
                if axis.validate(target) {
                    axis.clear_fault(Fault::Range);
                    writes.push((axis.config().id, target));
                } else {
                    let cfg = axis.config();
                    warn!(
                        "{} target {:.2} outside soft limits [{}, {}]",
                        cfg.name, target, cfg.min_deg, cfg.max_deg
                    );
                    axis.add_fault(Fault::Range);
                    rejected = true;
                }
            }
        }
        if rejected {
            return false;
        }

        let engine = &self.shared.engine;
        let speed = self.shared.settings.speed_rpm;
        let results = join_all(
            writes
                .iter()
                .map(|&(id, target)| engine.set_target_angle(id, target, speed)),
        )
        .await;

        let mut ok = true;
        for (&(id, target), result) in writes.iter().zip(results) {
            match result {
                Ok(Some(_)) => debug!("Motor {} accepted target {:.2}", id, target),
                Ok(None) => {
                    warn!("Motor {} did not acknowledge target {:.2}", id, target);
                    ok = false;
                }
                Err(e) => {
                    error!("Motor {} target {:.2} rejected: {}", id, target, e);
                    ok = false;
                }
            }
        }

        let mut cache = self.shared.cache.lock();
        if ok {
            cache.safety.clear_fault(Fault::WriteFail);
        } else {
            cache.safety.add_fault(Fault::WriteFail);
        }
        ok
    }

    /// Moves an axis by `delta_deg` relative to its live angle.
    pub async fn nudge(&self, role: AxisRole, delta_deg: f64) -> bool {
        let Some(axis) = self.axis_config(role) else {
            warn!("No {} axis configured", role);
            return false;
        };
        let Some(status) = self.shared.engine.read_status(axis.id).await else {
            return false;
        };
        self.set_axis(role, status.angle_deg + delta_deg).await
    }

    /// Live read that bypasses the cache.
    pub async fn read_axis(&self, role: AxisRole) -> Option<MotorStatus> {
        let id = self.axis_config(role)?.id;
        self.shared.engine.read_status(id).await
    }

    pub async fn stop_axis(&self, role: AxisRole) -> bool {
        match self.axis_config(role) {
            Some(axis) => self.shared.engine.stop_motor(axis.id).await,
            None => false,
        }
    }

    pub async fn close_axis(&self, role: AxisRole) -> bool {
        match self.axis_config(role) {
            Some(axis) => self.shared.engine.close_motor(axis.id).await,
            None => false,
        }
    }

    pub async fn shutdown_all(&self) -> Result<()> {
        self.shared.engine.broadcast_shutdown().await
    }

    pub async fn stop_all(&self) -> Result<()> {
        self.shared.engine.broadcast_stop().await
    }

    pub fn get_status(&self) -> GimbalStatus {
        let link_available = self.shared.engine.available();
        let cache = self.shared.cache.lock();
        let axes = cache
            .axes
            .iter()
            .map(|axis| AxisSnapshot {
                role: axis.config().role,
                name: axis.config().name.clone(),
                id: axis.config().id,
                state: axis.state().clone(),
            })
            .collect();
        let axis_faults = cache
            .axes
            .iter()
            .flat_map(|axis| axis.state().faults.iter().copied());
        let safety = cache.safety.compose_status(
            Instant::now(),
            cache.safety.last_ok(),
            link_available,
            axis_faults,
        );
        GimbalStatus {
            axes,
            safety,
            link_available,
        }
    }

    /// Stops polling and closes the transport.
    pub async fn close(self) -> Result<()> {
        self.stop().await;
        self.shared.engine.close().await
    }

    fn axis_config(&self, role: AxisRole) -> Option<&AxisConfig> {
        self.shared.axes.iter().find(|a| a.role == role)
    }
}

impl<L: Link> Shared<L> {
    async fn poll_once(&self) {
        let reads = join_all(self.axes.iter().map(|axis| self.engine.read_status(axis.id))).await;

        let mut guard = self.cache.lock();
        let cache = &mut *guard;
        let mut any_ok = false;
        for (axis, reading) in cache.axes.iter_mut().zip(reads) {
            match reading {
                Some(status) => {
                    axis.update_reading(status.angle_0_360, status.temperature_c);
                    axis.clear_fault(Fault::CommSim);
                    cache.safety.mark_comm_ok();
                    any_ok = true;
                }
                None if self.settings.simulate_on_fail => {
                    let simulated =
                        simulate_reading(axis.config(), self.settings.simulate_jitter_deg);
                    debug!("{} simulated at {:.2}", axis.config().name, simulated);
                    axis.update_raw(simulated + axis.config().zero_offset_deg);
                    axis.add_fault(Fault::CommSim);
                }
                // Keep the last good reading
                None => {}
            }
        }
        if !any_ok {
            cache.safety.mark_comm_error();
        }
    }
}

fn simulate_reading(axis: &AxisConfig, jitter_deg: f64) -> f64 {
    if jitter_deg > 0.0 {
        axis.midpoint() + rand::thread_rng().gen_range(-jitter_deg..=jitter_deg)
    } else {
        axis.midpoint()
    }
}

async fn poll_loop<L: Link>(shared: Arc<Shared<L>>, mut stop_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(shared.settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => shared.poll_once().await,
            _ = stop_rx.changed() => break,
        }
    }
    debug!("Poll loop exited");
}
