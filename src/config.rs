//! Panel Configuration using Figment
//!
//! This module provides strongly-typed configuration for a panel session.
//! Configuration is layered:
//! 1. A variant preset (`PanelVariant::Generic` or `PanelVariant::Volz`)
//! 2. An optional TOML file
//! 3. Environment variables (prefixed with `ACTUATOR_CONSOLE_`, `__` separated)
//!
//! The resulting [`PanelConfig`] is the immutable record a session is built from:
//! channel bounds, broadcast rate bounds, the command unit transform, the telemetry
//! scale constants and the staleness sweep interval.
//!
//! # Example
//! ```no_run
//! use actuator_console::config::{AppConfig, PanelVariant};
//!
//! let config = AppConfig::load_from("config/panel.toml", PanelVariant::Volz)?;
//! config.validate()?;
//! println!("Channels: {}..={}", config.panel.min_channels, config.panel.max_channels);
//! # Ok::<(), actuator_console::error::PanelError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AppResult, PanelError};
use crate::transport::MessageKind;

/// Configuration file read when no path is given; a missing file is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "config/actuator_console.toml";

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Panel session settings
    #[serde(default)]
    pub panel: PanelConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Actuator Console".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Panel variant presets.
///
/// The variants differ in unit-conversion constants, channel limits and broadcast rate;
/// they share one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PanelVariant {
    /// Generic actuator panel: 1–4 channels, 100 ms period, setpoint / 100
    Generic,
    /// Volz servo panel: 1–8 channels, 50 Hz, degrees to radians, telemetry + info
    Volz,
}

impl PanelVariant {
    /// Preset configuration for this variant.
    pub fn config(self) -> PanelConfig {
        match self {
            PanelVariant::Generic => PanelConfig::generic(),
            PanelVariant::Volz => PanelConfig::volz(),
        }
    }
}

/// Transform from an operator setpoint to the command value put on the bus.
///
/// Applied once per channel when a frame is materialized. Pure and stateless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandUnits {
    /// `setpoint * scale` (percent-style panels use 0.01)
    Scaled {
        /// Multiplier applied to the setpoint
        scale: f64,
    },
    /// Setpoint is in degrees, command is in radians
    DegreesToRadians,
}

impl CommandUnits {
    /// Convert a setpoint to its command value.
    pub fn apply(self, setpoint: i32) -> f64 {
        match self {
            CommandUnits::Scaled { scale } => f64::from(setpoint) * scale,
            CommandUnits::DegreesToRadians => f64::from(setpoint).to_radians(),
        }
    }
}

/// What to do when the operator assigns a device id that another channel already uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateIdPolicy {
    /// Store it; telemetry for that id is applied to every matching channel
    #[default]
    FanOut,
    /// Reject the assignment with `InvalidArgument`
    Reject,
}

/// Scale constants for raw telemetry fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryUnits {
    /// Amps per raw current count
    pub current_unit: f64,
    /// Volts per raw voltage count
    pub voltage_unit: f64,
    /// Offset subtracted from raw temperatures (°C)
    pub temperature_offset: f64,
    /// Raw temperature value meaning "sensor invalid"
    pub temperature_invalid_raw: u16,
}

impl Default for TelemetryUnits {
    fn default() -> Self {
        Self {
            current_unit: 0.02,
            voltage_unit: 0.2,
            temperature_offset: 50.0,
            temperature_invalid_raw: 0,
        }
    }
}

/// Immutable configuration record for one panel session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanelConfig {
    /// Minimum number of channels
    pub min_channels: usize,
    /// Maximum number of channels
    pub max_channels: usize,
    /// Broadcast period used when the session opens
    #[serde(with = "humantime_serde")]
    pub default_period: Duration,
    /// Shortest period the operator may select
    #[serde(with = "humantime_serde")]
    pub min_period: Duration,
    /// Longest period the operator may select
    #[serde(with = "humantime_serde")]
    pub max_period: Duration,
    /// Setpoint to command value transform
    pub command_units: CommandUnits,
    /// Lowest accepted setpoint
    pub setpoint_min: i32,
    /// Highest accepted setpoint
    pub setpoint_max: i32,
    /// Device id given to newly created channels
    pub default_device_id: u8,
    /// Offset between device id and the node id answering service requests
    pub id_offset: u8,
    /// Interval between staleness sweeps
    #[serde(with = "humantime_serde")]
    pub stale_sweep_interval: Duration,
    /// Interval between min/max flips in movement mode
    #[serde(with = "humantime_serde")]
    pub movement_interval: Duration,
    /// Raw telemetry scale constants
    #[serde(default)]
    pub telemetry: TelemetryUnits,
    /// Duplicate device id handling
    #[serde(default)]
    pub duplicate_ids: DuplicateIdPolicy,
    /// Message kinds the router subscribes to
    #[serde(default)]
    pub telemetry_kinds: Vec<MessageKind>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self::generic()
    }
}

impl PanelConfig {
    /// Generic actuator panel preset.
    pub fn generic() -> Self {
        Self {
            min_channels: 1,
            max_channels: 4,
            default_period: Duration::from_millis(100),
            min_period: Duration::from_millis(10),
            max_period: Duration::from_secs(1),
            command_units: CommandUnits::Scaled { scale: 0.01 },
            setpoint_min: -170,
            setpoint_max: 170,
            default_device_id: 1,
            id_offset: 0,
            stale_sweep_interval: Duration::from_secs(2),
            movement_interval: Duration::from_secs(2),
            telemetry: TelemetryUnits::default(),
            duplicate_ids: DuplicateIdPolicy::FanOut,
            telemetry_kinds: vec![MessageKind::ActuatorStatus],
        }
    }

    /// Volz servo panel preset.
    pub fn volz() -> Self {
        Self {
            min_channels: 1,
            max_channels: 8,
            default_period: Duration::from_millis(20), // 50 Hz
            min_period: Duration::from_millis(10),     // 100 Hz
            max_period: Duration::from_secs(1),        // 1 Hz
            command_units: CommandUnits::DegreesToRadians,
            setpoint_min: -170,
            setpoint_max: 170,
            default_device_id: 1,
            id_offset: 49,
            stale_sweep_interval: Duration::from_secs(2),
            movement_interval: Duration::from_secs(2),
            telemetry: TelemetryUnits::default(),
            duplicate_ids: DuplicateIdPolicy::FanOut,
            telemetry_kinds: vec![MessageKind::VolzActuatorStatus, MessageKind::VolzActuatorInfo],
        }
    }

    /// Set the channel bounds.
    pub fn with_channel_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_channels = min;
        self.max_channels = max;
        self
    }

    /// Set the default broadcast period.
    pub fn with_default_period(mut self, period: Duration) -> Self {
        self.default_period = period;
        self
    }

    /// Set the command unit transform.
    pub fn with_command_units(mut self, units: CommandUnits) -> Self {
        self.command_units = units;
        self
    }

    /// Set the staleness sweep interval.
    pub fn with_stale_sweep_interval(mut self, interval: Duration) -> Self {
        self.stale_sweep_interval = interval;
        self
    }

    /// Set the duplicate device id policy.
    pub fn with_duplicate_ids(mut self, policy: DuplicateIdPolicy) -> Self {
        self.duplicate_ids = policy;
        self
    }

    /// Validate the record after loading.
    pub fn validate(&self) -> AppResult<()> {
        if self.min_channels == 0 {
            return Err(PanelError::Configuration(
                "min_channels must be at least 1".to_string(),
            ));
        }
        if self.min_channels > self.max_channels {
            return Err(PanelError::Configuration(format!(
                "min_channels ({}) must not exceed max_channels ({})",
                self.min_channels, self.max_channels
            )));
        }
        if self.min_period.is_zero() {
            return Err(PanelError::Configuration(
                "min_period must be positive".to_string(),
            ));
        }
        if self.min_period > self.max_period {
            return Err(PanelError::Configuration(format!(
                "min_period ({:?}) must not exceed max_period ({:?})",
                self.min_period, self.max_period
            )));
        }
        if self.default_period < self.min_period || self.default_period > self.max_period {
            return Err(PanelError::Configuration(format!(
                "default_period {:?} outside [{:?}, {:?}]",
                self.default_period, self.min_period, self.max_period
            )));
        }
        if self.setpoint_min >= self.setpoint_max {
            return Err(PanelError::Configuration(format!(
                "setpoint range [{}, {}] is empty",
                self.setpoint_min, self.setpoint_max
            )));
        }
        if self.setpoint_min > 0 || self.setpoint_max < 0 {
            return Err(PanelError::Configuration(format!(
                "setpoint range [{}, {}] must contain 0",
                self.setpoint_min, self.setpoint_max
            )));
        }
        if let CommandUnits::Scaled { scale } = self.command_units {
            if !scale.is_finite() {
                return Err(PanelError::Configuration(format!(
                    "command scale {scale} is not finite"
                )));
            }
        }
        if self.stale_sweep_interval.is_zero() {
            return Err(PanelError::Configuration(
                "stale_sweep_interval must be positive".to_string(),
            ));
        }
        if self.movement_interval.is_zero() {
            return Err(PanelError::Configuration(
                "movement_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Preset configuration for a variant with default application settings.
    pub fn for_variant(variant: PanelVariant) -> Self {
        Self {
            application: ApplicationConfig::default(),
            panel: variant.config(),
        }
    }

    /// Load configuration from [`DEFAULT_CONFIG_PATH`] and environment variables.
    pub fn load(variant: PanelVariant) -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH, variant)
    }

    /// Load configuration from a specific file path on top of a variant preset.
    ///
    /// Environment variables can override configuration with prefix `ACTUATOR_CONSOLE_`
    /// and `__` as the nesting separator.
    /// Example: `ACTUATOR_CONSOLE_PANEL__MAX_CHANNELS=6`
    pub fn load_from<P: AsRef<Path>>(path: P, variant: PanelVariant) -> AppResult<Self> {
        let config = Figment::from(Serialized::defaults(Self::for_variant(variant)))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ACTUATOR_CONSOLE_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(PanelError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }
        self.panel.validate()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::for_variant(PanelVariant::Generic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn presets_are_valid() {
        assert!(PanelConfig::generic().validate().is_ok());
        assert!(PanelConfig::volz().validate().is_ok());
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn scaled_units_divide_percent() {
        let units = CommandUnits::Scaled { scale: 0.01 };
        assert!((units.apply(170) - 1.70).abs() < 1e-12);
        assert!((units.apply(-170) + 1.70).abs() < 1e-12);
        assert_eq!(units.apply(0), 0.0);
    }

    #[test]
    fn degrees_convert_to_radians() {
        let units = CommandUnits::DegreesToRadians;
        assert!((units.apply(90) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn inverted_channel_bounds_rejected() {
        let config = PanelConfig::generic().with_channel_bounds(5, 2);
        assert!(matches!(
            config.validate(),
            Err(PanelError::Configuration(_))
        ));
    }

    #[test]
    fn default_period_outside_bounds_rejected() {
        let config = PanelConfig::generic().with_default_period(Duration::from_secs(5));
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_log_level_rejected() {
        let mut config = AppConfig::default();
        config.application.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_overrides_variant_preset() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[application]
name = "bench"
log_level = "debug"

[panel]
min_channels = 2
max_channels = 6
default_period = "40ms"
min_period = "10ms"
max_period = "1s"
setpoint_min = -90
setpoint_max = 90
default_device_id = 3
id_offset = 49
stale_sweep_interval = "3s"
movement_interval = "2s"
duplicate_ids = "reject"

[panel.command_units]
kind = "degrees_to_radians"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path(), PanelVariant::Volz).unwrap();
        assert_eq!(config.application.name, "bench");
        assert_eq!(config.panel.max_channels, 6);
        assert_eq!(config.panel.default_period, Duration::from_millis(40));
        assert_eq!(config.panel.stale_sweep_interval, Duration::from_secs(3));
        assert_eq!(config.panel.duplicate_ids, DuplicateIdPolicy::Reject);
        assert_eq!(config.panel.command_units, CommandUnits::DegreesToRadians);
        // Not in the file: comes from the Volz preset
        assert_eq!(config.panel.telemetry.current_unit, 0.02);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_falls_back_to_preset() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            AppConfig::load_from(dir.path().join("absent.toml"), PanelVariant::Generic).unwrap();
        assert_eq!(config.panel, PanelConfig::generic());
    }
}
