//! Channel registry.
//!
//! Holds the ordered list of operator-controlled channels. Each channel carries a device
//! id (used to address commands and match inbound telemetry), a setpoint and the last
//! telemetry seen for that device.
//!
//! # Invariants
//!
//! - The channel count stays within `[min_channels, max_channels]`.
//! - Growing appends fresh channels; shrinking drops from the tail. Lower-indexed
//!   channels are never renumbered, and their state survives any resize.
//! - A channel's device id can change at any time without moving the channel.
//! - Duplicate device ids are stored under [`DuplicateIdPolicy::FanOut`] and rejected
//!   under [`DuplicateIdPolicy::Reject`].

use std::ops::RangeInclusive;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{DuplicateIdPolicy, PanelConfig};
use crate::error::{AppResult, PanelError};
use crate::frame::{ActuatorCommand, CommandFrame, CommandType};
use crate::staleness::Liveness;
use crate::telemetry::{DeviceInfo, Telemetry};

/// One operator-controlled actuator slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    index: usize,
    device_id: u8,
    setpoint: i32,
    pub(crate) telemetry: Telemetry,
    pub(crate) info: DeviceInfo,
    pub(crate) last_update: Option<Instant>,
    pub(crate) active: bool,
    pub(crate) stale: bool,
}

impl Channel {
    fn new(index: usize, device_id: u8) -> Self {
        Self {
            index,
            device_id,
            setpoint: 0,
            telemetry: Telemetry::default(),
            info: DeviceInfo::default(),
            last_update: None,
            active: false,
            stale: false,
        }
    }

    /// Position in the channel list.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Assigned device id.
    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    /// Current setpoint.
    pub fn setpoint(&self) -> i32 {
        self.setpoint
    }

    /// Last-known telemetry.
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Last device info response.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Time of the most recent telemetry event.
    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    /// True if telemetry arrived since the previous sweep.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Liveness state derived from the telemetry history.
    pub fn liveness(&self) -> Liveness {
        if self.last_update.is_none() {
            Liveness::Unknown
        } else if self.stale {
            Liveness::Stale
        } else {
            Liveness::Active
        }
    }
}

/// Ordered list of channels for one panel session.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
    config: PanelConfig,
}

impl ChannelRegistry {
    /// Create a registry with `min_channels` default channels (at least one).
    pub fn new(config: &PanelConfig) -> Self {
        let mut registry = Self {
            channels: Vec::with_capacity(config.max_channels),
            config: config.clone(),
        };
        let initial = config.min_channels.max(1);
        for _ in 0..initial {
            registry.push_default();
        }
        registry
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// All channels in index order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// One channel.
    pub fn channel(&self, index: usize) -> AppResult<&Channel> {
        let count = self.channels.len();
        self.channels
            .get(index)
            .ok_or(PanelError::Index { index, count })
    }

    fn channel_mut(&mut self, index: usize) -> AppResult<&mut Channel> {
        let count = self.channels.len();
        self.channels
            .get_mut(index)
            .ok_or(PanelError::Index { index, count })
    }

    /// Accepted setpoint range.
    pub fn setpoint_range(&self) -> RangeInclusive<i32> {
        self.config.setpoint_min..=self.config.setpoint_max
    }

    fn push_default(&mut self) {
        let device_id = match self.config.duplicate_ids {
            DuplicateIdPolicy::FanOut => self.config.default_device_id,
            DuplicateIdPolicy::Reject => self.next_free_id(),
        };
        let index = self.channels.len();
        self.channels.push(Channel::new(index, device_id));
    }

    fn next_free_id(&self) -> u8 {
        let start = u16::from(self.config.default_device_id);
        (0..=u8::MAX as u16)
            .map(|k| ((start + k) % 256) as u8)
            .find(|id| self.channels.iter().all(|c| c.device_id != *id))
            .unwrap_or(self.config.default_device_id)
    }

    /// Grow by appending default channels or shrink by dropping the highest indices.
    pub fn resize(&mut self, n: usize) -> AppResult<()> {
        if n < self.config.min_channels || n > self.config.max_channels {
            return Err(PanelError::InvalidArgument(format!(
                "channel count {} outside [{}, {}]",
                n, self.config.min_channels, self.config.max_channels
            )));
        }

        let before = self.channels.len();
        self.channels.truncate(n);
        while self.channels.len() < n {
            self.push_default();
        }
        debug!(from = before, to = n, "channel registry resized");
        Ok(())
    }

    /// Setpoint of one channel.
    pub fn setpoint(&self, index: usize) -> AppResult<i32> {
        Ok(self.channel(index)?.setpoint)
    }

    /// Set the setpoint of one channel.
    pub fn set_setpoint(&mut self, index: usize, value: i32) -> AppResult<()> {
        let range = self.setpoint_range();
        let channel = self.channel_mut(index)?;
        if !range.contains(&value) {
            return Err(PanelError::InvalidArgument(format!(
                "setpoint {} outside [{}, {}]",
                value,
                range.start(),
                range.end()
            )));
        }
        channel.setpoint = value;
        Ok(())
    }

    /// Device id of one channel.
    pub fn device_id(&self, index: usize) -> AppResult<u8> {
        Ok(self.channel(index)?.device_id)
    }

    /// Reassign the device id of one channel.
    ///
    /// The value is stored as given; bounding it is the caller's job.
    pub fn set_device_id(&mut self, index: usize, id: u8) -> AppResult<()> {
        self.channel(index)?;
        if self.config.duplicate_ids == DuplicateIdPolicy::Reject {
            if let Some(other) = self
                .channels
                .iter()
                .find(|c| c.index != index && c.device_id == id)
            {
                return Err(PanelError::InvalidArgument(format!(
                    "device id {} already assigned to channel {}",
                    id, other.index
                )));
            }
        }
        let channel = self.channel_mut(index)?;
        if channel.device_id != id {
            debug!(index, from = channel.device_id, to = id, "device id reassigned");
        }
        channel.device_id = id;
        Ok(())
    }

    /// Drive one channel to zero.
    pub fn zero(&mut self, index: usize) -> AppResult<()> {
        self.set_setpoint(index, 0)
    }

    /// Drive one channel to the range minimum.
    pub fn to_min(&mut self, index: usize) -> AppResult<()> {
        self.set_setpoint(index, self.config.setpoint_min)
    }

    /// Drive one channel to the range maximum.
    pub fn to_max(&mut self, index: usize) -> AppResult<()> {
        self.set_setpoint(index, self.config.setpoint_max)
    }

    fn set_all(&mut self, value: i32) {
        for channel in &mut self.channels {
            channel.setpoint = value;
        }
    }

    /// Drive every channel to zero.
    pub fn zero_all(&mut self) {
        self.set_all(0);
    }

    /// Drive every channel to the range minimum.
    pub fn min_all(&mut self) {
        self.set_all(self.config.setpoint_min);
    }

    /// Drive every channel to the range maximum.
    pub fn max_all(&mut self) {
        self.set_all(self.config.setpoint_max);
    }

    /// Build the outbound frame: one command per channel, in index order.
    pub fn materialize_frame(&self) -> CommandFrame {
        let units = self.config.command_units;
        CommandFrame {
            commands: self
                .channels
                .iter()
                .map(|c| ActuatorCommand {
                    actuator_id: c.device_id,
                    command_type: CommandType::Position,
                    command_value: units.apply(c.setpoint),
                })
                .collect(),
        }
    }

    /// Channels whose device id equals `id`.
    pub(crate) fn matching_mut(&mut self, id: u8) -> impl Iterator<Item = &mut Channel> + '_ {
        self.channels.iter_mut().filter(move |c| c.device_id == id)
    }

    pub(crate) fn channels_mut(&mut self) -> impl Iterator<Item = &mut Channel> + '_ {
        self.channels.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandUnits;

    fn registry() -> ChannelRegistry {
        ChannelRegistry::new(&PanelConfig::generic())
    }

    #[test]
    fn starts_with_one_default_channel() {
        let reg = registry();
        assert_eq!(reg.channel_count(), 1);
        assert_eq!(reg.setpoint(0).unwrap(), 0);
        assert_eq!(reg.device_id(0).unwrap(), 1);
        assert!(reg.channel(0).unwrap().telemetry().is_unknown());
    }

    #[test]
    fn resize_within_bounds() {
        let mut reg = registry();
        for n in 1..=4 {
            reg.resize(n).unwrap();
            assert_eq!(reg.channel_count(), n);
        }
    }

    #[test]
    fn resize_out_of_bounds_leaves_state() {
        let mut reg = registry();
        reg.resize(2).unwrap();
        assert!(matches!(reg.resize(0), Err(PanelError::InvalidArgument(_))));
        assert!(matches!(reg.resize(5), Err(PanelError::InvalidArgument(_))));
        assert_eq!(reg.channel_count(), 2);
    }

    #[test]
    fn shrink_then_grow_keeps_lower_channels() {
        let mut reg = registry();
        reg.resize(4).unwrap();
        for i in 0..4 {
            reg.set_setpoint(i, 10 * (i as i32 + 1)).unwrap();
            reg.set_device_id(i, 20 + i as u8).unwrap();
        }

        reg.resize(2).unwrap();
        reg.resize(4).unwrap();

        assert_eq!(reg.setpoint(0).unwrap(), 10);
        assert_eq!(reg.setpoint(1).unwrap(), 20);
        assert_eq!(reg.device_id(0).unwrap(), 20);
        assert_eq!(reg.device_id(1).unwrap(), 21);
        // Truncated channels come back fresh
        assert_eq!(reg.setpoint(2).unwrap(), 0);
        assert_eq!(reg.device_id(3).unwrap(), 1);
        assert_eq!(reg.channel(3).unwrap().index(), 3);
    }

    #[test]
    fn index_errors() {
        let mut reg = registry();
        assert!(matches!(
            reg.set_setpoint(1, 0),
            Err(PanelError::Index { index: 1, count: 1 })
        ));
        assert!(matches!(reg.device_id(3), Err(PanelError::Index { .. })));
        assert!(matches!(reg.set_device_id(2, 5), Err(PanelError::Index { .. })));
    }

    #[test]
    fn setpoint_range_enforced() {
        let mut reg = registry();
        assert!(reg.set_setpoint(0, 170).is_ok());
        assert!(reg.set_setpoint(0, -170).is_ok());
        assert!(matches!(
            reg.set_setpoint(0, 171),
            Err(PanelError::InvalidArgument(_))
        ));
        assert_eq!(reg.setpoint(0).unwrap(), -170);
    }

    #[test]
    fn device_id_stored_unclamped() {
        let mut reg = registry();
        reg.set_device_id(0, 0).unwrap();
        assert_eq!(reg.device_id(0).unwrap(), 0);
        reg.set_device_id(0, 255).unwrap();
        assert_eq!(reg.device_id(0).unwrap(), 255);
    }

    #[test]
    fn frame_uses_scaled_units() {
        let mut reg = registry();
        reg.resize(3).unwrap();
        reg.set_setpoint(0, 170).unwrap();
        reg.set_setpoint(1, -170).unwrap();
        reg.set_setpoint(2, 0).unwrap();

        let frame = reg.materialize_frame();
        let pairs = frame.pairs();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].0, 1);
        assert!((pairs[0].1 - 1.70).abs() < 1e-12);
        assert!((pairs[1].1 + 1.70).abs() < 1e-12);
        assert_eq!(pairs[2], (1, 0.0));
    }

    #[test]
    fn frame_uses_radians_for_volz() {
        let mut reg = ChannelRegistry::new(
            &PanelConfig::generic().with_command_units(CommandUnits::DegreesToRadians),
        );
        reg.set_setpoint(0, 90).unwrap();
        let value = reg.materialize_frame().commands[0].command_value;
        assert!((value - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn frame_tracks_current_ids_in_order() {
        let mut reg = registry();
        reg.resize(3).unwrap();
        reg.set_device_id(2, 9).unwrap();
        reg.set_device_id(0, 7).unwrap();
        let ids: Vec<u8> = reg
            .materialize_frame()
            .commands
            .iter()
            .map(|c| c.actuator_id)
            .collect();
        assert_eq!(ids, vec![7, 1, 9]);
    }

    #[test]
    fn bulk_moves() {
        let mut reg = registry();
        reg.resize(3).unwrap();
        reg.max_all();
        assert!(reg.channels().iter().all(|c| c.setpoint() == 170));
        reg.min_all();
        assert!(reg.channels().iter().all(|c| c.setpoint() == -170));
        reg.zero_all();
        assert!(reg.channels().iter().all(|c| c.setpoint() == 0));

        reg.to_max(1).unwrap();
        assert_eq!(reg.setpoint(1).unwrap(), 170);
        reg.to_min(1).unwrap();
        assert_eq!(reg.setpoint(1).unwrap(), -170);
        reg.zero(1).unwrap();
        assert_eq!(reg.setpoint(1).unwrap(), 0);
    }

    #[test]
    fn reject_policy_refuses_duplicates() {
        let config = PanelConfig::generic().with_duplicate_ids(DuplicateIdPolicy::Reject);
        let mut reg = ChannelRegistry::new(&config);
        reg.resize(3).unwrap();
        let ids: Vec<u8> = reg.channels().iter().map(|c| c.device_id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        assert!(matches!(
            reg.set_device_id(2, 1),
            Err(PanelError::InvalidArgument(_))
        ));
        assert_eq!(reg.device_id(2).unwrap(), 3);
        // Reassigning a channel its own id is not a duplicate
        assert!(reg.set_device_id(0, 1).is_ok());
    }

    #[test]
    fn fan_out_policy_allows_duplicates() {
        let mut reg = registry();
        reg.resize(2).unwrap();
        assert_eq!(reg.device_id(0).unwrap(), reg.device_id(1).unwrap());
        assert_eq!(reg.matching_mut(1).count(), 2);
    }
}
