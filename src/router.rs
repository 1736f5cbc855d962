//! Telemetry router.
//!
//! Demultiplexes inbound telemetry events onto channels by device id. The scan is
//! linear and applies the update to every matching channel: duplicate device ids fan
//! the same telemetry out to each of them. Events whose source matches no channel are
//! dropped without error.
//!
//! Field transforms run once per event, before the fan-out, so every matching channel
//! receives identical display values.

use tokio::time::Instant;
use tracing::trace;

use crate::config::PanelConfig;
use crate::registry::ChannelRegistry;
use crate::staleness::StalenessTracker;
use crate::telemetry::{EventSource, FieldTransforms, TelemetryEvent, TelemetryPayload};

/// Routes telemetry events to channels.
#[derive(Debug, Clone)]
pub struct TelemetryRouter {
    transforms: FieldTransforms,
    id_offset: u8,
}

impl TelemetryRouter {
    /// Router using the variant's telemetry units and node id offset.
    pub fn new(config: &PanelConfig) -> Self {
        Self {
            transforms: FieldTransforms::new(config.telemetry),
            id_offset: config.id_offset,
        }
    }

    /// Device id an event source maps to, if any.
    pub fn resolve(&self, source: EventSource) -> Option<u8> {
        match source {
            EventSource::Actuator(id) => Some(id),
            EventSource::Node(node) => node.checked_sub(self.id_offset),
        }
    }

    /// Apply an event to every channel whose device id matches its source.
    ///
    /// Status telemetry merges into the channel's fields and marks it active. Info
    /// responses replace the channel's device info snapshot only.
    /// Returns the indices of the updated channels.
    pub fn route(
        &self,
        registry: &mut ChannelRegistry,
        event: &TelemetryEvent,
        now: Instant,
    ) -> Vec<usize> {
        let Some(device_id) = self.resolve(event.source) else {
            trace!(source = ?event.source, "telemetry source below id offset, dropped");
            return Vec::new();
        };

        let mut matched = Vec::new();
        match &event.payload {
            TelemetryPayload::VolzInfo(info) => {
                let info = self.transforms.device_info(info);
                for channel in registry.matching_mut(device_id) {
                    channel.info = info;
                    matched.push(channel.index());
                }
            }
            payload => {
                let updates = self.transforms.status_fields(payload);
                for channel in registry.matching_mut(device_id) {
                    channel.telemetry.merge(updates.iter().copied());
                    StalenessTracker::mark_active(channel, now);
                    matched.push(channel.index());
                }
            }
        }

        if matched.is_empty() {
            trace!(device_id, kind = %event.kind(), "unmatched telemetry dropped");
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staleness::Liveness;
    use crate::telemetry::{FieldValue, TelemetryField, VolzInfo, VolzStatus};

    fn setup(channels: usize) -> (ChannelRegistry, TelemetryRouter) {
        let config = PanelConfig::volz();
        let mut reg = ChannelRegistry::new(&config);
        reg.resize(channels).unwrap();
        (reg, TelemetryRouter::new(&config))
    }

    #[test]
    fn current_scaled_for_matching_channel() {
        let (mut reg, router) = setup(2);
        reg.set_device_id(1, 5).unwrap();

        let event = TelemetryEvent::fields(5, [(TelemetryField::Current, 40.0)]);
        let matched = router.route(&mut reg, &event, Instant::now());

        assert_eq!(matched, vec![1]);
        let ch = reg.channel(1).unwrap();
        assert_eq!(ch.telemetry().display(TelemetryField::Current), "0.80");
        assert!(ch.is_active());
        assert_eq!(ch.liveness(), Liveness::Active);
        // Only the matching channel was touched
        assert!(reg.channel(0).unwrap().telemetry().is_unknown());
        assert!(!reg.channel(0).unwrap().is_active());
    }

    #[test]
    fn unmatched_event_changes_nothing() {
        let (mut reg, router) = setup(3);
        let before: Vec<_> = reg.channels().to_vec();

        let event = TelemetryEvent::fields(99, [(TelemetryField::Pwm, 10.0)]);
        assert!(router.route(&mut reg, &event, Instant::now()).is_empty());
        assert_eq!(reg.channels(), before.as_slice());
    }

    #[test]
    fn duplicate_ids_fan_out() {
        let (mut reg, router) = setup(3);
        reg.set_device_id(2, 7).unwrap();

        let status = VolzStatus {
            actual_position: std::f64::consts::FRAC_PI_6,
            current: 10,
            voltage: 60,
            motor_temperature: 0,
            motor_pwm: 33,
        };
        let matched = router.route(
            &mut reg,
            &TelemetryEvent::volz_status(1, status),
            Instant::now(),
        );
        assert_eq!(matched, vec![0, 1]);
        for index in [0, 1] {
            let t = reg.channel(index).unwrap().telemetry();
            assert_eq!(t.display(TelemetryField::Position), "30.0");
            assert_eq!(t.display(TelemetryField::Current), "0.20");
            assert_eq!(t.display(TelemetryField::Voltage), "12.0");
            assert_eq!(t.get(TelemetryField::Temperature), FieldValue::Invalid);
            assert_eq!(t.display(TelemetryField::Pwm), "33");
        }
        assert!(reg.channel(2).unwrap().telemetry().is_unknown());
    }

    #[test]
    fn info_response_matched_by_node_offset() {
        let (mut reg, router) = setup(2);
        reg.set_device_id(1, 3).unwrap();

        let info = VolzInfo {
            cpu_temperature: 85,
            stall_counter: 2,
            max_current: 50,
            total_power_on_time: 7200,
        };
        // Volz node ids are device id + 49
        let matched = router.route(&mut reg, &TelemetryEvent::volz_info(52, info), Instant::now());
        assert_eq!(matched, vec![1]);

        let ch = reg.channel(1).unwrap();
        assert_eq!(ch.info().cpu_temperature_text(), "35");
        assert_eq!(ch.info().power_on_text(), "2:00:00");
        // Info responses do not count as stream telemetry
        assert_eq!(ch.liveness(), Liveness::Unknown);
    }

    #[test]
    fn node_below_offset_is_unmatched() {
        let (mut reg, router) = setup(1);
        reg.set_device_id(0, 0).unwrap();
        assert_eq!(router.resolve(EventSource::Node(10)), None);
        assert_eq!(router.resolve(EventSource::Node(49)), Some(0));
        let info = VolzInfo {
            cpu_temperature: 60,
            stall_counter: 0,
            max_current: 0,
            total_power_on_time: 0,
        };
        assert!(router
            .route(&mut reg, &TelemetryEvent::volz_info(10, info), Instant::now())
            .is_empty());
    }

    #[test]
    fn reassigned_id_redirects_telemetry() {
        let (mut reg, router) = setup(2);
        reg.set_device_id(0, 4).unwrap();
        let event = TelemetryEvent::fields(4, [(TelemetryField::Pwm, 1.0)]);
        assert_eq!(router.route(&mut reg, &event, Instant::now()), vec![0]);

        reg.set_device_id(0, 8).unwrap();
        reg.set_device_id(1, 4).unwrap();
        assert_eq!(router.route(&mut reg, &event, Instant::now()), vec![1]);
    }
}
