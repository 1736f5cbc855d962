//! Outbound command frame.
//!
//! One frame is emitted per broadcast tick and carries one command per channel, in
//! channel index order. The layout mirrors an actuator array command on the bus:
//! an actuator id, a command type and a command value.

use serde::{Deserialize, Serialize};

/// Interpretation of a command value by the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    /// Unitless, typically -1..1
    Unitless,
    /// Position (radians or meters)
    Position,
    /// Force (newtons or newton-meters)
    Force,
    /// Speed (radians/s or meters/s)
    Speed,
}

/// Command for a single actuator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    /// Device id the command is addressed to
    pub actuator_id: u8,
    /// How `command_value` is interpreted
    pub command_type: CommandType,
    /// Transformed setpoint
    pub command_value: f64,
}

/// Aggregated outbound command covering all channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandFrame {
    /// Commands in channel index order
    pub commands: Vec<ActuatorCommand>,
}

impl CommandFrame {
    /// Number of commands in the frame.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True if the frame carries no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// `(device_id, command_value)` pairs in index order.
    pub fn pairs(&self) -> Vec<(u8, f64)> {
        self.commands
            .iter()
            .map(|cmd| (cmd.actuator_id, cmd.command_value))
            .collect()
    }

    /// Render the frame as YAML for display.
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self)
            .unwrap_or_else(|e| format!("<frame not renderable: {e}>"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_lists_every_command() {
        let frame = CommandFrame {
            commands: vec![
                ActuatorCommand {
                    actuator_id: 1,
                    command_type: CommandType::Position,
                    command_value: 1.7,
                },
                ActuatorCommand {
                    actuator_id: 2,
                    command_type: CommandType::Position,
                    command_value: -0.5,
                },
            ],
        };

        let yaml = frame.to_yaml();
        assert!(yaml.contains("actuator_id: 1"));
        assert!(yaml.contains("actuator_id: 2"));
        assert!(yaml.contains("command_type: position"));
        assert!(yaml.contains("command_value: -0.5"));
        assert_eq!(frame.pairs(), vec![(1, 1.7), (2, -0.5)]);
    }
}
