//! Mock Bus Transport
//!
//! Provides a simulated bus for testing without hardware and for the CLI demo.
//! Nothing here blocks: events are delivered synchronously on the caller's thread.
//!
//! # Features
//!
//! - Records every sent frame
//! - Injectable send and subscribe failures
//! - Delivers events to subscribed handlers (`emit`)
//! - Answers info requests with canned responses
//! - Optional loopback: every sent command is echoed back as a status message from
//!   the addressed actuator, as if the servo had reached its setpoint
//!
//! # Example
//!
//! ```rust,ignore
//! let bus = MockTransport::new().with_loopback(MessageKind::VolzActuatorStatus);
//! let session = PanelSession::open(PanelConfig::volz(), Arc::new(bus.clone()))?;
//! // ...
//! assert!(bus.send_count() > 0);
//! ```

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::frame::CommandFrame;
use crate::telemetry::{ActuatorStatus, TelemetryEvent, VolzInfo, VolzStatus};
use crate::transport::{MessageKind, ServiceKind, Subscription, TelemetryHandler, Transport};

// =============================================================================
// MockTransport - Simulated Bus
// =============================================================================

/// Simulated bus with recording and fault injection.
///
/// Cloning is cheap and yields a handle to the same simulated bus, so a test can keep
/// one clone for inspection while the session owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    sent: Vec<CommandFrame>,
    send_failure: Option<String>,
    subscribe_failure: Option<String>,
    handlers: Vec<(u64, MessageKind, TelemetryHandler)>,
    next_handler_id: u64,
    requests: Vec<(ServiceKind, u8)>,
    info_responses: HashMap<u8, VolzInfo>,
    loopback: Option<MessageKind>,
    closed: bool,
}

impl MockTransport {
    /// Create an empty simulated bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo every sent command back as a status message of `kind`.
    pub fn with_loopback(self, kind: MessageKind) -> Self {
        self.state.lock().loopback = Some(kind);
        self
    }

    /// All frames sent so far.
    pub fn sent_frames(&self) -> Vec<CommandFrame> {
        self.state.lock().sent.clone()
    }

    /// Number of successful sends.
    pub fn send_count(&self) -> usize {
        self.state.lock().sent.len()
    }

    /// Most recent successfully sent frame.
    pub fn last_frame(&self) -> Option<CommandFrame> {
        self.state.lock().sent.last().cloned()
    }

    /// Make every subsequent send fail with `message`.
    pub fn fail_sends(&self, message: impl Into<String>) {
        self.state.lock().send_failure = Some(message.into());
    }

    /// Stop injecting send failures.
    pub fn restore_sends(&self) {
        self.state.lock().send_failure = None;
    }

    /// Make every subsequent subscribe fail with `message`.
    pub fn fail_subscriptions(&self, message: impl Into<String>) {
        self.state.lock().subscribe_failure = Some(message.into());
    }

    /// Number of handlers registered for `kind`.
    pub fn subscriber_count(&self, kind: MessageKind) -> usize {
        self.state
            .lock()
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }

    /// Answer `GetActuatorInfo` requests to `node_id` with `info`.
    pub fn set_info_response(&self, node_id: u8, info: VolzInfo) {
        self.state.lock().info_responses.insert(node_id, info);
    }

    /// Requests issued so far.
    pub fn requests(&self) -> Vec<(ServiceKind, u8)> {
        self.state.lock().requests.clone()
    }

    /// Mark the bus closed; every later call fails with `TransportError::Closed`.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// Deliver an event to every handler subscribed to its kind.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, event: TelemetryEvent) -> usize {
        let kind = event.kind();
        // Handlers run without the bus lock held
        let handlers: Vec<TelemetryHandler> = self
            .state
            .lock()
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, h)| Arc::clone(h))
            .collect();

        trace!(%kind, handlers = handlers.len(), "MockTransport: delivering event");
        for handler in &handlers {
            handler(event.clone());
        }
        handlers.len()
    }

    fn loopback_event(kind: MessageKind, actuator_id: u8, command_value: f64) -> TelemetryEvent {
        match kind {
            MessageKind::VolzActuatorStatus | MessageKind::VolzActuatorInfo => {
                TelemetryEvent::volz_status(
                    actuator_id,
                    VolzStatus {
                        actual_position: command_value,
                        current: 40,
                        voltage: 61,
                        motor_temperature: 75,
                        motor_pwm: 120,
                    },
                )
            }
            MessageKind::ActuatorStatus => TelemetryEvent::status(
                actuator_id,
                ActuatorStatus {
                    position: command_value,
                    force: 0.0,
                    speed: 0.0,
                    power_rating_pct: 50,
                },
            ),
        }
    }
}

impl Transport for MockTransport {
    fn send(&self, frame: &CommandFrame) -> Result<(), TransportError> {
        let loopback = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            if let Some(message) = &state.send_failure {
                return Err(TransportError::Send(message.clone()));
            }
            state.sent.push(frame.clone());
            state.loopback
        };

        debug!(commands = frame.len(), "MockTransport: frame sent");

        if let Some(kind) = loopback {
            for cmd in &frame.commands {
                self.emit(Self::loopback_event(kind, cmd.actuator_id, cmd.command_value));
            }
        }
        Ok(())
    }

    fn subscribe(
        &self,
        kind: MessageKind,
        handler: TelemetryHandler,
    ) -> Result<Subscription, TransportError> {
        let id = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            if let Some(message) = &state.subscribe_failure {
                return Err(TransportError::Subscribe {
                    kind: kind.to_string(),
                    message: message.clone(),
                });
            }
            let id = state.next_handler_id;
            state.next_handler_id += 1;
            state.handlers.push((id, kind, handler));
            id
        };

        debug!(%kind, id, "MockTransport: handler registered");

        let weak = Arc::downgrade(&self.state);
        Ok(Subscription::new(kind, move || {
            if let Some(state) = weak.upgrade() {
                state.lock().handlers.retain(|(hid, _, _)| *hid != id);
            }
        }))
    }

    fn request(&self, service: ServiceKind, target_node: u8) -> Result<(), TransportError> {
        let response = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            state.requests.push((service, target_node));
            match service {
                ServiceKind::GetActuatorInfo => state.info_responses.get(&target_node).copied(),
            }
        };

        debug!(?service, target_node, "MockTransport: request issued");

        if let Some(info) = response {
            self.emit(TelemetryEvent::volz_info(target_node, info));
        }
        Ok(())
    }
}
