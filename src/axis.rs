use crate::config::AxisConfig;
use crate::types::{normalize_deg, Fault};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AxisState {
    /// Angle as reported by the motor, 0..360.
    pub raw_deg: f64,
    /// `raw_deg - zero_offset`, in (-180, 180].
    pub corrected_deg: f64,
    pub rad: f64,
    pub in_range: bool,
    pub temperature_c: Option<i8>,
    pub faults: BTreeSet<Fault>,
}

#[derive(Debug, Clone)]
pub struct AxisModel {
    config: AxisConfig,
    state: AxisState,
}

impl AxisModel {
    pub fn new(config: AxisConfig) -> Self {
        AxisModel {
            config,
            state: AxisState::default(),
        }
    }

    pub fn config(&self) -> &AxisConfig {
        &self.config
    }

    pub fn state(&self) -> &AxisState {
        &self.state
    }

    pub fn validate(&self, target_deg: f64) -> bool {
        self.config.min_deg <= target_deg && target_deg <= self.config.max_deg
    }

    pub fn add_fault(&mut self, fault: Fault) {
        self.state.faults.insert(fault);
    }

    pub fn clear_fault(&mut self, fault: Fault) {
        self.state.faults.remove(&fault);
    }

    pub fn has_fault(&self, fault: Fault) -> bool {
        self.state.faults.contains(&fault)
    }

    pub fn update_raw(&mut self, raw_deg: f64) {
        let raw_deg = raw_deg.rem_euclid(360.0);
        let corrected = normalize_deg(raw_deg - self.config.zero_offset_deg);
        self.state.raw_deg = raw_deg;
        self.state.corrected_deg = corrected;
        self.state.rad = corrected.to_radians();
        self.state.in_range = self.validate(corrected);
    }

    pub fn update_reading(&mut self, raw_deg: f64, temperature_c: i8) {
        self.update_raw(raw_deg);
        self.state.temperature_c = Some(temperature_c);
    }
}
