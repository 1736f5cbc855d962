//! Inbound telemetry: event types, field values and the ingestion transforms.
//!
//! Raw values arrive in device counts. Each field is transformed exactly once, when it
//! is ingested, into the value shown to the operator:
//!
//! | Field         | Transform                                     | Placeholder |
//! |---------------|-----------------------------------------------|-------------|
//! | `Position`    | radians → degrees, 0.1 resolution             | `--.-`      |
//! | `Current`     | `raw · current_unit`, 0.01 resolution         | `-.--`      |
//! | `Voltage`     | `raw · voltage_unit`, 0.1 resolution          | `--.-`      |
//! | `Temperature` | `raw − offset`, invalid sentinel → `XX`       | `--`        |
//! | `Pwm`         | raw                                           | `---`       |
//!
//! Device info responses are kept in a separate [`DeviceInfo`] snapshot: they are
//! answers to explicit requests, not part of the periodic stream.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::config::TelemetryUnits;
use crate::transport::MessageKind;

/// Telemetry field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryField {
    /// Actual position, degrees
    Position,
    /// Motor current, amps
    Current,
    /// Supply voltage, volts
    Voltage,
    /// Motor temperature, °C
    Temperature,
    /// Motor PWM duty
    Pwm,
    /// Force, device units
    Force,
    /// Speed, device units
    Speed,
    /// Power rating, percent
    PowerRating,
}

impl TelemetryField {
    /// Fields carried by a Volz status message.
    pub const STATUS: [TelemetryField; 5] = [
        TelemetryField::Position,
        TelemetryField::Current,
        TelemetryField::Voltage,
        TelemetryField::Temperature,
        TelemetryField::Pwm,
    ];

    /// Display text while the value is unknown.
    pub fn placeholder(self) -> &'static str {
        match self {
            TelemetryField::Position | TelemetryField::Voltage => "--.-",
            TelemetryField::Current => "-.--",
            TelemetryField::Temperature => "--",
            TelemetryField::Pwm | TelemetryField::PowerRating => "---",
            TelemetryField::Force | TelemetryField::Speed => "--.--",
        }
    }

    /// Decimal places kept for display.
    pub fn decimals(self) -> usize {
        match self {
            TelemetryField::Position | TelemetryField::Voltage => 1,
            TelemetryField::Current | TelemetryField::Force | TelemetryField::Speed => 2,
            TelemetryField::Temperature | TelemetryField::Pwm | TelemetryField::PowerRating => 0,
        }
    }
}

impl fmt::Display for TelemetryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TelemetryField::Position => "position",
            TelemetryField::Current => "current",
            TelemetryField::Voltage => "voltage",
            TelemetryField::Temperature => "temperature",
            TelemetryField::Pwm => "pwm",
            TelemetryField::Force => "force",
            TelemetryField::Speed => "speed",
            TelemetryField::PowerRating => "power_rating",
        };
        write!(f, "{}", label)
    }
}

/// Last-known value of a telemetry field.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum FieldValue {
    /// Never received, or reset by a staleness sweep
    #[default]
    Unknown,
    /// The device reported its "sensor invalid" sentinel
    Invalid,
    /// Display-ready value
    Value(f64),
}

impl FieldValue {
    /// The numeric value, if known and valid.
    pub fn value(self) -> Option<f64> {
        match self {
            FieldValue::Value(v) => Some(v),
            _ => None,
        }
    }

    /// True unless the value is `Unknown`.
    pub fn is_known(self) -> bool {
        !matches!(self, FieldValue::Unknown)
    }

    /// Display text for this value as the given field.
    pub fn display(self, field: TelemetryField) -> String {
        match self {
            FieldValue::Unknown => field.placeholder().to_string(),
            FieldValue::Invalid => "XX".to_string(),
            FieldValue::Value(v) => format!("{:.*}", field.decimals(), v),
        }
    }
}

/// Per-channel telemetry snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    values: BTreeMap<TelemetryField, FieldValue>,
}

impl Telemetry {
    /// Value of a field, `Unknown` if never set.
    pub fn get(&self, field: TelemetryField) -> FieldValue {
        self.values.get(&field).copied().unwrap_or_default()
    }

    /// Display text of a field.
    pub fn display(&self, field: TelemetryField) -> String {
        self.get(field).display(field)
    }

    /// Merge already-transformed values; fields not mentioned keep their value.
    pub fn merge<I>(&mut self, updates: I)
    where
        I: IntoIterator<Item = (TelemetryField, FieldValue)>,
    {
        for (field, value) in updates {
            self.values.insert(field, value);
        }
    }

    /// Reset every field to `Unknown`.
    pub fn reset(&mut self) {
        self.values.clear();
    }

    /// True if no field holds a known value.
    pub fn is_unknown(&self) -> bool {
        self.values.values().all(|v| !v.is_known())
    }

    /// Iterate over fields that have been set.
    pub fn iter(&self) -> impl Iterator<Item = (TelemetryField, FieldValue)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

/// Snapshot of the last device info response for a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// CPU temperature, °C
    pub cpu_temperature: FieldValue,
    /// Number of recorded stalls
    pub stall_counter: Option<u32>,
    /// Maximum recorded current, amps
    pub max_current: FieldValue,
    /// Total power-on time
    pub power_on_time: Option<Duration>,
}

impl DeviceInfo {
    /// CPU temperature display text.
    pub fn cpu_temperature_text(&self) -> String {
        self.cpu_temperature.display(TelemetryField::Temperature)
    }

    /// Stall counter display text.
    pub fn stalls_text(&self) -> String {
        self.stall_counter
            .map_or_else(|| "---".to_string(), |n| n.to_string())
    }

    /// Max current display text.
    pub fn max_current_text(&self) -> String {
        self.max_current.display(TelemetryField::Current)
    }

    /// Power-on time as `H:MM:SS`, hours unbounded.
    pub fn power_on_text(&self) -> String {
        match self.power_on_time {
            None => "---:--:--".to_string(),
            Some(t) => {
                let secs = t.as_secs();
                format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
            }
        }
    }
}

/// Where a telemetry event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    /// Actuator id carried inside the message payload
    Actuator(u8),
    /// Node id of the responding node; matched as `node - id_offset`
    Node(u8),
}

/// Generic actuator status (unscaled except position).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuatorStatus {
    /// Position, radians
    pub position: f64,
    /// Force
    pub force: f64,
    /// Speed
    pub speed: f64,
    /// Power rating, percent
    pub power_rating_pct: u8,
}

/// Volz servo status message, raw counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolzStatus {
    /// Actual position, radians
    pub actual_position: f64,
    /// Current, counts of `current_unit`
    pub current: u16,
    /// Voltage, counts of `voltage_unit`
    pub voltage: u16,
    /// Motor temperature, offset by `temperature_offset`; sentinel means invalid
    pub motor_temperature: u16,
    /// Motor PWM
    pub motor_pwm: u16,
}

/// Volz device info response, raw counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolzInfo {
    /// CPU temperature, offset by `temperature_offset`
    pub cpu_temperature: u16,
    /// Stall counter
    pub stall_counter: u32,
    /// Maximum current, counts of `current_unit`
    pub max_current: u16,
    /// Total power-on time, seconds
    pub total_power_on_time: u32,
}

/// A raw field/value pair, before transformation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawField {
    /// Field name
    pub field: TelemetryField,
    /// Raw device value
    pub raw: f64,
}

/// Telemetry message payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryPayload {
    /// Generic actuator status
    Status(ActuatorStatus),
    /// Volz status
    VolzStatus(VolzStatus),
    /// Volz info response
    VolzInfo(VolzInfo),
    /// Loose field/value pairs
    Fields(Vec<RawField>),
}

/// One inbound telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Source identifier
    pub source: EventSource,
    /// Payload
    pub payload: TelemetryPayload,
}

impl TelemetryEvent {
    /// Event for a Volz status message from `actuator_id`.
    pub fn volz_status(actuator_id: u8, status: VolzStatus) -> Self {
        Self {
            source: EventSource::Actuator(actuator_id),
            payload: TelemetryPayload::VolzStatus(status),
        }
    }

    /// Event for a Volz info response from `node_id`.
    pub fn volz_info(node_id: u8, info: VolzInfo) -> Self {
        Self {
            source: EventSource::Node(node_id),
            payload: TelemetryPayload::VolzInfo(info),
        }
    }

    /// Event for a generic actuator status from `actuator_id`.
    pub fn status(actuator_id: u8, status: ActuatorStatus) -> Self {
        Self {
            source: EventSource::Actuator(actuator_id),
            payload: TelemetryPayload::Status(status),
        }
    }

    /// Event carrying loose raw fields for `actuator_id`.
    pub fn fields(actuator_id: u8, fields: impl IntoIterator<Item = (TelemetryField, f64)>) -> Self {
        Self {
            source: EventSource::Actuator(actuator_id),
            payload: TelemetryPayload::Fields(
                fields
                    .into_iter()
                    .map(|(field, raw)| RawField { field, raw })
                    .collect(),
            ),
        }
    }

    /// Message kind used for subscription dispatch.
    pub fn kind(&self) -> MessageKind {
        match self.payload {
            TelemetryPayload::Status(_) | TelemetryPayload::Fields(_) => MessageKind::ActuatorStatus,
            TelemetryPayload::VolzStatus(_) => MessageKind::VolzActuatorStatus,
            TelemetryPayload::VolzInfo(_) => MessageKind::VolzActuatorInfo,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Pure per-field ingestion transforms, configured once per panel variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldTransforms {
    units: TelemetryUnits,
}

impl FieldTransforms {
    /// Build transforms from the configured unit constants.
    pub fn new(units: TelemetryUnits) -> Self {
        Self { units }
    }

    /// Transform one raw field value.
    pub fn apply(&self, field: TelemetryField, raw: f64) -> FieldValue {
        let value = match field {
            TelemetryField::Position => round_to(raw.to_degrees(), 1),
            TelemetryField::Current => round_to(raw * self.units.current_unit, 2),
            TelemetryField::Voltage => round_to(raw * self.units.voltage_unit, 1),
            TelemetryField::Temperature => {
                if raw == f64::from(self.units.temperature_invalid_raw) {
                    return FieldValue::Invalid;
                }
                raw - self.units.temperature_offset
            }
            TelemetryField::Pwm
            | TelemetryField::Force
            | TelemetryField::Speed
            | TelemetryField::PowerRating => raw,
        };
        FieldValue::Value(value)
    }

    /// Transformed field updates for a status-like payload; empty for info responses.
    pub fn status_fields(&self, payload: &TelemetryPayload) -> Vec<(TelemetryField, FieldValue)> {
        let raw: Vec<(TelemetryField, f64)> = match payload {
            TelemetryPayload::Status(s) => vec![
                (TelemetryField::Position, s.position),
                (TelemetryField::Force, s.force),
                (TelemetryField::Speed, s.speed),
                (TelemetryField::PowerRating, f64::from(s.power_rating_pct)),
            ],
            TelemetryPayload::VolzStatus(s) => vec![
                (TelemetryField::Current, f64::from(s.current)),
                (TelemetryField::Voltage, f64::from(s.voltage)),
                (TelemetryField::Temperature, f64::from(s.motor_temperature)),
                (TelemetryField::Pwm, f64::from(s.motor_pwm)),
                (TelemetryField::Position, s.actual_position),
            ],
            TelemetryPayload::Fields(fields) => fields.iter().map(|f| (f.field, f.raw)).collect(),
            TelemetryPayload::VolzInfo(_) => Vec::new(),
        };
        raw.into_iter()
            .map(|(field, value)| (field, self.apply(field, value)))
            .collect()
    }

    /// Transform an info response.
    pub fn device_info(&self, info: &VolzInfo) -> DeviceInfo {
        DeviceInfo {
            cpu_temperature: FieldValue::Value(
                f64::from(info.cpu_temperature) - self.units.temperature_offset,
            ),
            stall_counter: Some(info.stall_counter),
            max_current: FieldValue::Value(round_to(
                f64::from(info.max_current) * self.units.current_unit,
                2,
            )),
            power_on_time: Some(Duration::from_secs(u64::from(info.total_power_on_time))),
        }
    }
}
