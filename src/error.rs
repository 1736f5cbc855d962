//! Custom error types for the actuator console.
//!
//! This module defines the primary error type, `PanelError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the few kinds of errors a panel session can raise, from configuration problems to
//! operator input that violates a channel or scheduler invariant.
//!
//! ## Error Hierarchy
//!
//! `PanelError` is an enum that consolidates the error sources:
//!
//! - **`ConfigLoad`**: Wraps errors from `figment`, typically a malformed TOML file or an
//!   environment override that does not deserialize.
//! - **`Configuration`**: Semantic errors in a configuration that parsed correctly but is
//!   logically inconsistent (e.g. `min_channels > max_channels`).
//! - **`InvalidArgument`**: Operator input rejected synchronously: a non-positive broadcast
//!   period, a channel count outside the configured bounds, a setpoint outside its range.
//!   State is never modified when this is returned.
//! - **`Index`**: A channel index outside the current channel count.
//! - **`Transport`**: A failure reported by the bus collaborator. Timer and event callbacks
//!   never return this upward; they record it for display and keep running.
//! - **`Runtime`**: The surrounding process cannot host a session: no tokio runtime is
//!   running, or a logging subscriber could not be installed.
//!
//! Unmatched telemetry is deliberately absent: an event for a device id that no channel
//! carries is a silent no-op, not an error.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, PanelError>;

/// Failure reported by the bus transport collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The outbound frame could not be handed to the bus.
    #[error("send failed: {0}")]
    Send(String),

    /// A handler could not be registered for a message kind.
    #[error("subscribe to {kind} failed: {message}")]
    Subscribe {
        /// Message kind the subscription was for
        kind: String,
        /// Transport-specific reason
        message: String,
    },

    /// A service request could not be issued.
    #[error("request to node {target} failed: {message}")]
    Request {
        /// Target node id
        target: u8,
        /// Transport-specific reason
        message: String,
    },

    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,
}

/// Primary error type for panel sessions.
#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Channel index {index} out of range (channel count {count})")]
    Index {
        /// Requested index
        index: usize,
        /// Channel count at the time of the request
        count: usize,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<figment::Error> for PanelError {
    fn from(value: figment::Error) -> Self {
        PanelError::ConfigLoad(Box::new(value))
    }
}

impl PanelError {
    /// Returns true if the error was caused by operator input and the caller may
    /// simply correct the input and try again.
    pub fn is_input_error(&self) -> bool {
        matches!(self, PanelError::InvalidArgument(_) | PanelError::Index { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_converts_with_question_mark() {
        fn send() -> AppResult<()> {
            Err(TransportError::Send("bus off".into()))?;
            Ok(())
        }

        let err = send().unwrap_err();
        assert!(matches!(err, PanelError::Transport(TransportError::Send(_))));
        assert_eq!(err.to_string(), "Transport error: send failed: bus off");
    }

    #[test]
    fn index_error_message_names_count() {
        let err = PanelError::Index { index: 4, count: 2 };
        assert_eq!(
            err.to_string(),
            "Channel index 4 out of range (channel count 2)"
        );
        assert!(err.is_input_error());
    }

    #[test]
    fn configuration_errors_are_not_input_errors() {
        let err = PanelError::Configuration("min_channels > max_channels".into());
        assert!(!err.is_input_error());
    }
}
