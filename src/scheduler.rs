//! Broadcast scheduler.
//!
//! Owns the broadcast period and the pause flag, and turns every timer tick into at
//! most one outbound frame. The timer itself lives in the session's broadcast task;
//! this type is the synchronous state machine the task drives, split in two halves so
//! the registry lock is never held across the transport call:
//!
//! 1. [`BroadcastScheduler::prepare`] runs under the registry lock and materializes the
//!    frame (or records the paused status and returns nothing).
//! 2. [`BroadcastScheduler::complete`] records the outcome of `Transport::send`.
//!
//! A failed send is recorded and logged, never propagated: the next tick tries again.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PanelConfig;
use crate::error::{AppResult, PanelError, TransportError};
use crate::frame::CommandFrame;
use crate::registry::ChannelRegistry;
use crate::transport::Transport;

/// Observable status of the broadcast loop.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum BroadcastStatus {
    /// No tick has fired yet
    #[default]
    Idle,
    /// The last tick published this frame
    Published(CommandFrame),
    /// The last tick was skipped because broadcasting is paused
    Paused,
    /// The last send failed with this message
    Failed(String),
}

impl BroadcastStatus {
    /// Text shown in the panel's message viewer.
    pub fn display_text(&self) -> String {
        match self {
            BroadcastStatus::Idle => String::new(),
            BroadcastStatus::Published(frame) => frame.to_yaml(),
            BroadcastStatus::Paused => "Paused".to_string(),
            BroadcastStatus::Failed(message) => format!("Publishing failed:\n{}", message),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Paused; nothing sent
    Paused,
    /// Frame handed to the transport
    Sent,
    /// Transport rejected the frame
    Failed,
}

/// Tick counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastStats {
    /// Ticks observed, paused ones included
    pub ticks: u64,
    /// Successful sends
    pub sends: u64,
    /// Failed sends
    pub failures: u64,
}

/// Broadcast period, pause flag and last outcome.
#[derive(Debug, Clone)]
pub struct BroadcastScheduler {
    period: Duration,
    min_period: Duration,
    max_period: Duration,
    paused: bool,
    status: BroadcastStatus,
    last_frame: Option<CommandFrame>,
    last_error: Option<String>,
    stats: BroadcastStats,
}

impl BroadcastScheduler {
    /// Scheduler at the configured default period, not paused.
    pub fn new(config: &PanelConfig) -> Self {
        Self {
            period: config.default_period,
            min_period: config.min_period,
            max_period: config.max_period,
            paused: false,
            status: BroadcastStatus::Idle,
            last_frame: None,
            last_error: None,
            stats: BroadcastStats::default(),
        }
    }

    /// Current broadcast period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Change the broadcast period.
    ///
    /// Fails with `InvalidArgument` for a zero period or one outside the configured
    /// bounds; the current period is kept in that case.
    pub fn set_period(&mut self, period: Duration) -> AppResult<()> {
        if period.is_zero() {
            return Err(PanelError::InvalidArgument(
                "broadcast period must be positive".to_string(),
            ));
        }
        if period < self.min_period || period > self.max_period {
            return Err(PanelError::InvalidArgument(format!(
                "broadcast period {:?} outside [{:?}, {:?}]",
                period, self.min_period, self.max_period
            )));
        }
        if period != self.period {
            debug!(from = ?self.period, to = ?period, "broadcast period changed");
        }
        self.period = period;
        Ok(())
    }

    /// Change the broadcast rate, in hertz.
    pub fn set_rate_hz(&mut self, hz: f64) -> AppResult<()> {
        if !hz.is_finite() || hz <= 0.0 {
            return Err(PanelError::InvalidArgument(format!(
                "broadcast rate {} Hz must be positive",
                hz
            )));
        }
        let nanos = (1e9 / hz).round();
        if nanos < 1.0 {
            return Err(PanelError::InvalidArgument(format!(
                "broadcast rate {} Hz is too high",
                hz
            )));
        }
        self.set_period(Duration::from_nanos(nanos as u64))
    }

    /// Current broadcast rate, in hertz.
    pub fn rate_hz(&self) -> f64 {
        1.0 / self.period.as_secs_f64()
    }

    /// True while broadcasting is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stop sending frames; ticks keep firing and report `Paused`.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume sending frames on the next tick.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Flip the pause flag and return the new value.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Status after the most recent tick.
    pub fn status(&self) -> &BroadcastStatus {
        &self.status
    }

    /// Most recently published frame.
    pub fn last_frame(&self) -> Option<&CommandFrame> {
        self.last_frame.as_ref()
    }

    /// Most recent transport error, kept after later successes.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Tick counters.
    pub fn stats(&self) -> BroadcastStats {
        self.stats
    }

    /// First half of a tick: build the frame to send, or record the paused status.
    pub fn prepare(&mut self, registry: &ChannelRegistry) -> Option<CommandFrame> {
        self.stats.ticks += 1;
        if self.paused {
            self.status = BroadcastStatus::Paused;
            return None;
        }
        Some(registry.materialize_frame())
    }

    /// Second half of a tick: record what the transport did with `frame`.
    pub fn complete(
        &mut self,
        frame: CommandFrame,
        result: Result<(), TransportError>,
    ) -> TickOutcome {
        match result {
            Ok(()) => {
                self.stats.sends += 1;
                debug!(tick = self.stats.ticks, commands = frame.len(), "frame published");
                self.status = BroadcastStatus::Published(frame.clone());
                self.last_frame = Some(frame);
                TickOutcome::Sent
            }
            Err(err) => {
                self.stats.failures += 1;
                warn!(tick = self.stats.ticks, error = %err, "publishing failed");
                let message = err.to_string();
                self.status = BroadcastStatus::Failed(message.clone());
                self.last_error = Some(message);
                TickOutcome::Failed
            }
        }
    }

    /// Run a whole tick against `transport`.
    ///
    /// The caller must not hold any lock the transport's handlers need.
    pub fn tick(&mut self, registry: &ChannelRegistry, transport: &dyn Transport) -> TickOutcome {
        match self.prepare(registry) {
            None => TickOutcome::Paused,
            Some(frame) => {
                let result = transport.send(&frame);
                self.complete(frame, result)
            }
        }
    }
}
