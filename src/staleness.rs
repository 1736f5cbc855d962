//! Staleness tracking (heartbeat / dead-man's switch).
//!
//! Every telemetry event routed to a channel marks it active. On a fixed sweep interval,
//! independent of the broadcast period, every channel that stayed inactive for the whole
//! window has its telemetry reset to the unknown display state; then all channels start
//! the next window inactive.
//!
//! ```text
//! Unknown ──telemetry──> Active ──sweep w/o telemetry──> Stale ──telemetry──> Active
//! ```
//!
//! The sweep interval must be longer than the telemetry cadence or channels will flap.
//! Device id, setpoint and the device info snapshot survive a reset.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::registry::{Channel, ChannelRegistry};

/// Per-channel liveness state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Liveness {
    /// No telemetry ever received
    Unknown,
    /// Telemetry received and not yet swept away
    Active,
    /// Reset by a sweep; waiting for telemetry
    Stale,
}

/// Result of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sequence number of the sweep, starting at 1
    pub sweep: u64,
    /// Channels that went stale in this sweep
    pub reset: Vec<usize>,
}

/// Periodic liveness check over a [`ChannelRegistry`].
#[derive(Debug, Clone)]
pub struct StalenessTracker {
    interval: Duration,
    sweeps: u64,
}

impl StalenessTracker {
    /// Tracker sweeping every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            sweeps: 0,
        }
    }

    /// Configured sweep interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of sweeps run so far.
    pub fn sweep_count(&self) -> u64 {
        self.sweeps
    }

    /// Record telemetry for a channel.
    pub fn mark_active(channel: &mut Channel, now: Instant) {
        channel.last_update = Some(now);
        channel.active = true;
        channel.stale = false;
    }

    /// Reset channels without telemetry since the previous sweep, then open a new window.
    pub fn sweep(&mut self, registry: &mut ChannelRegistry) -> SweepReport {
        self.sweeps += 1;
        let mut reset = Vec::new();

        for channel in registry.channels_mut() {
            if !channel.active {
                channel.telemetry.reset();
                if channel.last_update.is_some() && !channel.stale {
                    channel.stale = true;
                    reset.push(channel.index());
                }
            }
            channel.active = false;
        }

        if !reset.is_empty() {
            debug!(sweep = self.sweeps, channels = ?reset, "telemetry went stale");
        }

        SweepReport {
            sweep: self.sweeps,
            reset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;
    use crate::telemetry::{FieldValue, TelemetryField};

    fn registry_with_telemetry() -> ChannelRegistry {
        let mut reg = ChannelRegistry::new(&PanelConfig::generic());
        reg.resize(2).unwrap();
        reg.set_device_id(1, 2).unwrap();
        reg.set_setpoint(0, 42).unwrap();
        for channel in reg.matching_mut(1) {
            channel
                .telemetry
                .merge([(TelemetryField::Current, FieldValue::Value(0.8))]);
            StalenessTracker::mark_active(channel, Instant::now());
        }
        reg
    }

    #[test]
    fn fresh_channels_stay_unknown() {
        let mut reg = ChannelRegistry::new(&PanelConfig::generic());
        let mut tracker = StalenessTracker::new(Duration::from_secs(2));
        let report = tracker.sweep(&mut reg);
        assert!(report.reset.is_empty());
        assert_eq!(reg.channel(0).unwrap().liveness(), Liveness::Unknown);
    }

    #[test]
    fn active_channel_survives_one_sweep_then_decays() {
        let mut reg = registry_with_telemetry();
        let mut tracker = StalenessTracker::new(Duration::from_secs(2));

        let first = tracker.sweep(&mut reg);
        assert!(first.reset.is_empty());
        let ch = reg.channel(0).unwrap();
        assert_eq!(ch.liveness(), Liveness::Active);
        assert!(!ch.is_active());
        assert_eq!(ch.telemetry().get(TelemetryField::Current), FieldValue::Value(0.8));

        let second = tracker.sweep(&mut reg);
        assert_eq!(second.reset, vec![0]);
        assert_eq!(second.sweep, 2);
        let ch = reg.channel(0).unwrap();
        assert_eq!(ch.liveness(), Liveness::Stale);
        assert!(ch.telemetry().is_unknown());
        assert_eq!(ch.setpoint(), 42);
        assert_eq!(ch.device_id(), 1);
    }

    #[test]
    fn stale_channel_reported_once() {
        let mut reg = registry_with_telemetry();
        let mut tracker = StalenessTracker::new(Duration::from_secs(2));
        tracker.sweep(&mut reg);
        tracker.sweep(&mut reg);
        let third = tracker.sweep(&mut reg);
        assert!(third.reset.is_empty());
        assert_eq!(tracker.sweep_count(), 3);
    }

    #[test]
    fn telemetry_revives_stale_channel() {
        let mut reg = registry_with_telemetry();
        let mut tracker = StalenessTracker::new(Duration::from_secs(2));
        tracker.sweep(&mut reg);
        tracker.sweep(&mut reg);

        for channel in reg.matching_mut(1) {
            StalenessTracker::mark_active(channel, Instant::now());
        }
        assert_eq!(reg.channel(0).unwrap().liveness(), Liveness::Active);
        assert!(tracker.sweep(&mut reg).reset.is_empty());
    }
}
