//! Bus Transport Seam
//!
//! The field bus itself (wire format, node configuration, discovery) is an external
//! collaborator. This module defines the narrow interface the panel core needs from it:
//!
//! - `send` — hand one command frame to the bus, once per broadcast tick
//! - `subscribe` — register a handler for a telemetry message kind
//! - `request` — fire a service request whose response arrives through the same
//!   handlers as broadcast telemetry
//!
//! # Contract
//!
//! - All methods are synchronous and must not block on I/O; a transport that talks to
//!   real hardware queues internally and reports failures it already knows about.
//! - Handlers may be invoked from any thread. They must be cheap.
//! - Callers never hold session locks across a transport call, so a transport may
//!   invoke handlers re-entrantly from inside `send` or `request` (the mock does).
//!
//! # Thread Safety
//!
//! `Transport` requires `Send + Sync`; implementations use interior mutability.

pub mod mock;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::TransportError;
use crate::frame::CommandFrame;
use crate::telemetry::TelemetryEvent;

pub use mock::MockTransport;

/// Telemetry message kinds a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Generic actuator status broadcast
    ActuatorStatus,
    /// Volz servo status broadcast
    VolzActuatorStatus,
    /// Volz "get actuator info" service response
    VolzActuatorInfo,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MessageKind::ActuatorStatus => "actuator.Status",
            MessageKind::VolzActuatorStatus => "volz.ActuatorStatus",
            MessageKind::VolzActuatorInfo => "volz.GetActuatorInfo",
        };
        write!(f, "{}", label)
    }
}

/// On-demand service requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Volz device information (temperatures, stalls, power-on time)
    GetActuatorInfo,
}

impl ServiceKind {
    /// Message kind the response is delivered as.
    pub fn response_kind(self) -> MessageKind {
        match self {
            ServiceKind::GetActuatorInfo => MessageKind::VolzActuatorInfo,
        }
    }
}

/// Callback invoked for every delivered telemetry event.
pub type TelemetryHandler = Arc<dyn Fn(TelemetryEvent) + Send + Sync>;

/// Handle for a registered telemetry handler.
///
/// The handler stays registered until the handle is removed or dropped.
pub struct Subscription {
    kind: MessageKind,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("active", &self.release.is_some())
            .finish()
    }
}

impl Subscription {
    /// Create a handle that runs `release` when removed.
    pub fn new(kind: MessageKind, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            kind,
            release: Some(Box::new(release)),
        }
    }

    /// Message kind this subscription is for.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Unregister the handler now.
    pub fn remove(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

/// The bus collaborator used by a panel session.
pub trait Transport: Send + Sync {
    /// Broadcast one command frame.
    fn send(&self, frame: &CommandFrame) -> Result<(), TransportError>;

    /// Register `handler` for every event of `kind`.
    fn subscribe(
        &self,
        kind: MessageKind,
        handler: TelemetryHandler,
    ) -> Result<Subscription, TransportError>;

    /// Issue a service request to `target_node`. The response, if any, is delivered
    /// asynchronously to handlers subscribed to `service.response_kind()`.
    fn request(&self, service: ServiceKind, target_node: u8) -> Result<(), TransportError>;
}
