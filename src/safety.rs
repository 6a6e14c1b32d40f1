use crate::types::Fault;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkHealth {
    Nominal,
    /// No successful poll within the staleness window.
    Stale,
    /// Transport unavailable, or every read in the last cycle failed.
    CommError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyStatus {
    pub health: LinkHealth,
    pub comm_ever_ok: bool,
    pub stale: bool,
    pub last_update_age_ms: Option<u64>,
    /// Write-path faults plus every fault set on any axis.
    pub faults: BTreeSet<Fault>,
}

impl SafetyStatus {
    pub fn is_nominal(&self) -> bool {
        self.health == LinkHealth::Nominal && self.faults.is_empty()
    }
}

/// Cross-axis and communication fault bookkeeping.
#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    faults: BTreeSet<Fault>,
    comm_error: bool,
    comm_ever_ok: bool,
    last_ok: Option<Instant>,
    stale_after: Duration,
}

impl SafetyMonitor {
    pub fn new(stale_after: Duration) -> Self {
        SafetyMonitor {
            faults: BTreeSet::new(),
            comm_error: false,
            comm_ever_ok: false,
            last_ok: None,
            stale_after,
        }
    }

    pub fn add_fault(&mut self, fault: Fault) {
        self.faults.insert(fault);
    }

    pub fn clear_fault(&mut self, fault: Fault) {
        self.faults.remove(&fault);
    }

    pub fn faults(&self) -> &BTreeSet<Fault> {
        &self.faults
    }

    pub fn mark_comm_ok(&mut self) {
        self.comm_error = false;
        self.comm_ever_ok = true;
        self.last_ok = Some(Instant::now());
    }

    pub fn mark_comm_error(&mut self) {
        self.comm_error = true;
    }

    /// When the cache last took a real reading.
    pub fn last_ok(&self) -> Option<Instant> {
        self.last_ok
    }

    pub fn compose_status(
        &self,
        now: Instant,
        last_update: Option<Instant>,
        link_available: bool,
        axis_faults: impl IntoIterator<Item = Fault>,
    ) -> SafetyStatus {
        let age = last_update.map(|ts| now.saturating_duration_since(ts));
        let stale = age.map_or(true, |age| age > self.stale_after);

        let health = if !link_available || self.comm_error {
            LinkHealth::CommError
        } else if stale {
            LinkHealth::Stale
        } else {
            LinkHealth::Nominal
        };

        let mut faults = self.faults.clone();
        faults.extend(axis_faults);

        SafetyStatus {
            health,
            comm_ever_ok: self.comm_ever_ok,
            stale,
            last_update_age_ms: age.map(|age| age.as_millis() as u64),
            faults,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_polled_is_stale() {
        let monitor = SafetyMonitor::new(Duration::from_secs(2));
        let status = monitor.compose_status(Instant::now(), None, true, []);
        assert_eq!(status.health, LinkHealth::Stale);
        assert!(!status.comm_ever_ok);
        assert_eq!(status.last_update_age_ms, None);
    }

    #[test]
    fn fresh_update_is_nominal() {
        let mut monitor = SafetyMonitor::new(Duration::from_secs(2));
        monitor.mark_comm_ok();
        let status = monitor.compose_status(Instant::now(), monitor.last_ok(), true, []);
        assert_eq!(status.health, LinkHealth::Nominal);
        assert!(status.is_nominal());
        assert!(status.comm_ever_ok);
    }

    #[test]
    fn old_update_goes_stale() {
        let mut monitor = SafetyMonitor::new(Duration::from_millis(500));
        monitor.mark_comm_ok();
        let later = Instant::now() + Duration::from_secs(1);
        let status = monitor.compose_status(later, monitor.last_ok(), true, []);
        assert_eq!(status.health, LinkHealth::Stale);
        assert!(status.stale);
        assert!(status.last_update_age_ms.unwrap() >= 1000);
    }

    #[test]
    fn comm_error_wins_until_next_success() {
        let mut monitor = SafetyMonitor::new(Duration::from_secs(2));
        monitor.mark_comm_ok();
        monitor.mark_comm_error();
        let now = Instant::now();
        assert_eq!(
            monitor.compose_status(now, monitor.last_ok(), true, []).health,
            LinkHealth::CommError
        );
        monitor.mark_comm_ok();
        assert_eq!(
            monitor.compose_status(Instant::now(), monitor.last_ok(), true, []).health,
            LinkHealth::Nominal
        );
        assert_eq!(
            monitor.compose_status(Instant::now(), monitor.last_ok(), false, []).health,
            LinkHealth::CommError
        );
    }

    #[test]
    fn merges_axis_and_write_faults() {
        let mut monitor = SafetyMonitor::new(Duration::from_secs(2));
        monitor.add_fault(Fault::WriteFail);
        let status = monitor.compose_status(Instant::now(), None, true, [Fault::Range]);
        assert_eq!(
            status.faults.iter().copied().collect::<Vec<_>>(),
            vec![Fault::Range, Fault::WriteFail]
        );
        assert!(!status.is_nominal());
        monitor.clear_fault(Fault::WriteFail);
        assert!(monitor.faults().is_empty());
    }
}
