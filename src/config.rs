//! Construction-time configuration, passed in by whichever entry point wires
//! the system together.

use crate::constants::*;
use crate::error::{Error, Result};
use crate::types::AxisRole;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial port name, or `host:port` for TCP.
    pub endpoint: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub connect_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            endpoint: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl LinkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub role: AxisRole,
    pub name: String,
    /// Bus address of the axis motor.
    pub id: u8,
    pub min_deg: f64,
    pub max_deg: f64,
    #[serde(default)]
    pub zero_offset_deg: f64,
}

impl AxisConfig {
    pub fn new(role: AxisRole, id: u8, min_deg: f64, max_deg: f64) -> Self {
        AxisConfig {
            role,
            name: role.to_string(),
            id,
            min_deg,
            max_deg,
            zero_offset_deg: 0.0,
        }
    }

    pub fn with_zero_offset(mut self, zero_offset_deg: f64) -> Self {
        self.zero_offset_deg = zero_offset_deg;
        self
    }

    pub fn midpoint(&self) -> f64 {
        (self.min_deg + self.max_deg) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GimbalConfig {
    pub link: LinkConfig,
    pub axes: Vec<AxisConfig>,
    pub poll_interval_ms: u64,
    /// Readings older than this many poll intervals count as stale.
    pub stale_after_polls: u32,
    pub simulate_on_fail: bool,
    pub simulate_jitter_deg: f64,
    pub speed_rpm: u16,
}

impl Default for GimbalConfig {
    fn default() -> Self {
        GimbalConfig {
            link: LinkConfig::default(),
            axes: vec![
                AxisConfig::new(AxisRole::Yaw, 1, -85.0, 85.0),
                AxisConfig::new(AxisRole::Pitch, 2, -10.0, 85.0),
            ],
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            stale_after_polls: DEFAULT_STALE_AFTER_POLLS,
            simulate_on_fail: false,
            simulate_jitter_deg: DEFAULT_SIMULATE_JITTER_DEG,
            speed_rpm: DEFAULT_SPEED_RPM,
        }
    }
}

impl GimbalConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        self.poll_interval() * self.stale_after_polls
    }

    pub fn validate(&self) -> Result<()> {
        if self.axes.is_empty() {
            return Err(Error::Config("at least one axis is required".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll interval must be positive".into()));
        }
        if !(self.simulate_jitter_deg >= 0.0) {
            return Err(Error::Config("simulate jitter must be non-negative".into()));
        }

        let mut roles = HashSet::new();
        let mut ids = HashSet::new();
        for axis in &self.axes {
            if !roles.insert(axis.role) {
                return Err(Error::Config(format!("duplicate axis role {}", axis.role)));
            }
            if !ids.insert(axis.id) {
                return Err(Error::Config(format!("duplicate axis id {}", axis.id)));
            }
            if axis.id == BROADCAST_ID {
                return Err(Error::Config(format!(
                    "axis {} uses the broadcast id 0x{:02X}",
                    axis.name, BROADCAST_ID
                )));
            }
            if !(axis.min_deg <= axis.max_deg) {
                return Err(Error::Config(format!(
                    "axis {} soft limits are inverted ({} > {})",
                    axis.name, axis.min_deg, axis.max_deg
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GimbalConfig::default();
        config.validate().unwrap();
        assert_eq!(config.stale_after(), Duration::from_millis(2000));
        assert_eq!(config.link.timeout(), Duration::from_millis(200));
        assert_eq!(config.axes[0].name, "yaw");
    }

    #[test]
    fn rejects_duplicate_ids_and_inverted_limits() {
        let mut config = GimbalConfig::default();
        config.axes[1].id = 1;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = GimbalConfig::default();
        config.axes[0].min_deg = 90.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = GimbalConfig::default();
        config.axes.push(AxisConfig::new(AxisRole::Lift, BROADCAST_ID, -180.0, 180.0));
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = GimbalConfig {
            axes: Vec::new(),
            ..GimbalConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn deserializes_partial_config() {
        let config: GimbalConfig = serde_json::from_str(
            r#"{
                "link": { "endpoint": "192.168.25.78:502" },
                "axes": [
                    { "role": "yaw", "name": "pan", "id": 1, "min_deg": -85.0, "max_deg": 85.0 },
                    { "role": "lift", "name": "lift", "id": 3, "min_deg": -180.0, "max_deg": 180.0,
                      "zero_offset_deg": 12.5 }
                ],
                "simulate_on_fail": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.link.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.axes[1].role, AxisRole::Lift);
        assert_eq!(config.axes[1].zero_offset_deg, 12.5);
        assert!(config.simulate_on_fail);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        config.validate().unwrap();
    }
}
