//! # Actuator Console Core Library
//!
//! The UI-independent core of an actuator test panel: an operator keeps a list of
//! channels, each addressing one actuator on a field bus by device id, and the panel
//! broadcasts every channel's setpoint as one command frame at a fixed rate while
//! showing the telemetry each actuator reports back.
//!
//! ## Crate Structure
//!
//! - **`config`**: `figment`-loaded configuration and the variant presets
//!   (`PanelConfig::generic()`, `PanelConfig::volz()`).
//! - **`error`**: The `PanelError` enum and `AppResult` alias.
//! - **`frame`**: The outbound `CommandFrame` and its YAML rendering.
//! - **`registry`**: `ChannelRegistry`, the ordered channel list with resize,
//!   setpoint and device id edits, and frame materialization.
//! - **`scheduler`**: `BroadcastScheduler`, the period/pause state machine driven by
//!   the broadcast timer.
//! - **`router`**: `TelemetryRouter`, matching inbound telemetry to channels.
//! - **`staleness`**: `StalenessTracker`, the periodic sweep that resets channels
//!   whose telemetry stopped.
//! - **`telemetry`**: Telemetry events, field values and ingestion transforms.
//! - **`transport`**: The `Transport` trait the bus collaborator implements, plus
//!   `MockTransport` for tests and the CLI demo.
//! - **`session`**: `PanelSession`, tying the above together on a tokio runtime.
//! - **`logging`**: `tracing-subscriber` setup for binaries.

pub mod config;
pub mod error;
pub mod frame;
pub mod logging;
pub mod registry;
pub mod router;
pub mod scheduler;
pub mod session;
pub mod staleness;
pub mod telemetry;
pub mod transport;

pub use config::{AppConfig, PanelConfig, PanelVariant};
pub use error::{AppResult, PanelError, TransportError};
pub use session::{PanelSession, PanelSnapshot};
pub use transport::{MockTransport, Transport};
