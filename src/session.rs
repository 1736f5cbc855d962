//! Panel session.
//!
//! A [`PanelSession`] owns everything one actuator panel needs while it is open:
//!
//! - the [`ChannelRegistry`], [`BroadcastScheduler`] and [`StalenessTracker`], all behind
//!   one mutex so a frame is never materialized from a half-applied edit
//! - the broadcast task, re-armed through a `watch` channel when the period changes
//! - the staleness sweep task, on its own fixed interval
//! - the optional movement task, flipping all channels between max and min
//! - one transport subscription per telemetry kind, each routing into the registry
//!
//! Operator calls, timer tasks and transport callbacks all take the mutex briefly. It
//! is never held across a transport call, so transports may deliver telemetry from
//! inside `send` or `request`.
//!
//! Every state change publishes a [`PanelSnapshot`] on a `watch` channel; a UI is a
//! plain observer of those snapshots.
//!
//! Closing the session (explicitly or by dropping it) stops every task and releases
//! every subscription. In-flight sends are not awaited.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn, Instrument, Span};

use crate::config::PanelConfig;
use crate::error::{AppResult, PanelError};
use crate::frame::CommandFrame;
use crate::registry::{Channel, ChannelRegistry};
use crate::router::TelemetryRouter;
use crate::scheduler::{BroadcastScheduler, BroadcastStats, BroadcastStatus};
use crate::staleness::StalenessTracker;
use crate::transport::{ServiceKind, Subscription, TelemetryHandler, Transport};

/// Point-in-time view of a session, as published to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSnapshot {
    /// Increases with every published snapshot
    pub revision: u64,
    /// Channels in index order
    pub channels: Vec<Channel>,
    /// Outcome of the last broadcast tick
    pub status: BroadcastStatus,
    /// Broadcasting paused
    pub paused: bool,
    /// Current broadcast period
    pub period: Duration,
    /// Movement exerciser running
    pub movement_active: bool,
    /// Most recent transport error
    pub last_error: Option<String>,
    /// Tick counters
    pub stats: BroadcastStats,
}

struct Core {
    registry: ChannelRegistry,
    scheduler: BroadcastScheduler,
    tracker: StalenessTracker,
    movement_active: bool,
    // Last movement flip went to max; carried across start/stop cycles
    movement_at_max: bool,
    revision: u64,
}

impl Core {
    fn snapshot(&self) -> PanelSnapshot {
        PanelSnapshot {
            revision: self.revision,
            channels: self.registry.channels().to_vec(),
            status: self.scheduler.status().clone(),
            paused: self.scheduler.is_paused(),
            period: self.scheduler.period(),
            movement_active: self.movement_active,
            last_error: self.scheduler.last_error().map(str::to_string),
            stats: self.scheduler.stats(),
        }
    }

    fn ensure_editable(&self) -> AppResult<()> {
        if self.movement_active {
            return Err(PanelError::InvalidArgument(
                "channel edits are disabled while movement is active".to_string(),
            ));
        }
        Ok(())
    }
}

struct Shared {
    core: Mutex<Core>,
    snapshots: watch::Sender<PanelSnapshot>,
}

impl Shared {
    fn publish(&self) {
        let snapshot = {
            let mut core = self.core.lock();
            core.revision += 1;
            core.snapshot()
        };
        // Publishers race outside the lock; never let an older snapshot win
        self.snapshots.send_if_modified(|current| {
            if snapshot.revision > current.revision {
                *current = snapshot;
                true
            } else {
                false
            }
        });
    }
}

struct TaskHandle {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    fn spawn<F, Fut>(runtime: &Handle, task: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        // Task events stay inside the span the session was opened in
        let handle = runtime.spawn(task(shutdown_rx).instrument(Span::current()));
        Self {
            shutdown: Some(shutdown_tx),
            handle,
        }
    }

    fn stop(mut self) {
        if let Some(shutdown_tx) = self.shutdown.take() {
            let _ = shutdown_tx.send(());
        }
        self.handle.abort();
    }
}

/// Interval whose first tick is at `start`; late ticks are dropped.
fn rearm(start: Instant, period: Duration) -> Interval {
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Deadline of the tick after the one scheduled for `fired`.
///
/// A tick that fired a full period or more late skips ahead to the next boundary
/// on the same grid, matching `MissedTickBehavior::Skip`.
fn following_tick(fired: Instant, period: Duration, now: Instant) -> Instant {
    let next = fired + period;
    if next > now {
        return next;
    }
    let behind = now.duration_since(fired).as_nanos() % period.as_nanos();
    now + period - Duration::from_nanos(behind as u64)
}

async fn broadcast_loop(
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    mut period_rx: watch::Receiver<Duration>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut period = *period_rx.borrow_and_update();
    let mut pending = Instant::now() + period;
    let mut ticker = rearm(pending, period);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            changed = period_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                // The tick already scheduled still fires; the new period starts after it
                period = *period_rx.borrow_and_update();
                debug!(?period, next = ?pending, "broadcast timer re-armed");
                ticker = rearm(pending, period);
            }
            fired = ticker.tick() => {
                pending = following_tick(fired, period, Instant::now());
                let frame = {
                    let mut guard = shared.core.lock();
                    let core = &mut *guard;
                    core.scheduler.prepare(&core.registry)
                };
                if let Some(frame) = frame {
                    let result = transport.send(&frame);
                    shared.core.lock().scheduler.complete(frame, result);
                }
                shared.publish();
            }
        }
    }
    debug!("broadcast task stopped");
}

async fn sweep_loop(shared: Arc<Shared>, interval: Duration, mut shutdown_rx: oneshot::Receiver<()>) {
    let mut ticker = rearm(Instant::now() + interval, interval);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                {
                    let mut guard = shared.core.lock();
                    let core = &mut *guard;
                    core.tracker.sweep(&mut core.registry);
                }
                shared.publish();
            }
        }
    }
    debug!("sweep task stopped");
}

async fn movement_loop(
    shared: Arc<Shared>,
    interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut ticker = rearm(Instant::now() + interval, interval);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                let to_max = {
                    let mut core = shared.core.lock();
                    let to_max = !core.movement_at_max;
                    if to_max {
                        core.registry.max_all();
                    } else {
                        core.registry.min_all();
                    }
                    core.movement_at_max = to_max;
                    to_max
                };
                debug!(to_max, "movement flip");
                shared.publish();
            }
        }
    }
}

fn telemetry_handler(shared: Arc<Shared>, router: TelemetryRouter) -> TelemetryHandler {
    Arc::new(move |event| {
        let matched = {
            let mut core = shared.core.lock();
            router.route(&mut core.registry, &event, Instant::now())
        };
        if !matched.is_empty() {
            shared.publish();
        }
    })
}

/// One open actuator panel.
///
/// All methods take `&self`; a session can be shared behind an `Arc` by several
/// operator front-ends.
pub struct PanelSession {
    config: PanelConfig,
    runtime: Handle,
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    period_tx: watch::Sender<Duration>,
    subscriptions: Vec<Subscription>,
    broadcast: Option<TaskHandle>,
    sweep: Option<TaskHandle>,
    movement: Mutex<Option<TaskHandle>>,
}

impl std::fmt::Debug for PanelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelSession")
            .field("config", &self.config)
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

impl PanelSession {
    /// Open a session: validate the configuration, subscribe the telemetry router and
    /// start the broadcast and sweep timers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: PanelConfig, transport: Arc<dyn Transport>) -> AppResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| PanelError::Runtime(e.to_string()))?;

        let core = Core {
            registry: ChannelRegistry::new(&config),
            scheduler: BroadcastScheduler::new(&config),
            tracker: StalenessTracker::new(config.stale_sweep_interval),
            movement_active: false,
            movement_at_max: false,
            revision: 0,
        };
        let (snapshots, _) = watch::channel(core.snapshot());
        let shared = Arc::new(Shared {
            core: Mutex::new(core),
            snapshots,
        });

        let router = TelemetryRouter::new(&config);
        let mut subscriptions = Vec::with_capacity(config.telemetry_kinds.len());
        for &kind in &config.telemetry_kinds {
            let handler = telemetry_handler(Arc::clone(&shared), router.clone());
            match transport.subscribe(kind, handler) {
                Ok(subscription) => subscriptions.push(subscription),
                Err(err) => {
                    warn!(%kind, error = %err, "telemetry subscription failed");
                    // Subscriptions made so far are released on drop
                    return Err(err.into());
                }
            }
        }

        let (period_tx, period_rx) = watch::channel(config.default_period);
        let broadcast = TaskHandle::spawn(&runtime, |shutdown_rx| {
            broadcast_loop(
                Arc::clone(&shared),
                Arc::clone(&transport),
                period_rx,
                shutdown_rx,
            )
        });
        let sweep_interval = config.stale_sweep_interval;
        let sweep = TaskHandle::spawn(&runtime, |shutdown_rx| {
            sweep_loop(Arc::clone(&shared), sweep_interval, shutdown_rx)
        });

        info!(
            channels = config.min_channels.max(1),
            period = ?config.default_period,
            sweep = ?config.stale_sweep_interval,
            kinds = ?config.telemetry_kinds,
            "panel session opened"
        );

        Ok(Self {
            config,
            runtime,
            shared,
            transport,
            period_tx,
            subscriptions,
            broadcast: Some(broadcast),
            sweep: Some(sweep),
            movement: Mutex::new(None),
        })
    }

    /// Configuration the session was opened with.
    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Apply an operator edit to the registry, refusing it while movement runs.
    fn edit<T>(&self, f: impl FnOnce(&mut ChannelRegistry) -> AppResult<T>) -> AppResult<T> {
        let value = {
            let mut core = self.shared.core.lock();
            core.ensure_editable()?;
            f(&mut core.registry)?
        };
        self.shared.publish();
        Ok(value)
    }

    fn read<T>(&self, f: impl FnOnce(&ChannelRegistry) -> T) -> T {
        f(&self.shared.core.lock().registry)
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.read(ChannelRegistry::channel_count)
    }

    /// Copy of one channel.
    pub fn channel(&self, index: usize) -> AppResult<Channel> {
        self.read(|registry| registry.channel(index).cloned())
    }

    /// Copy of every channel.
    pub fn channels(&self) -> Vec<Channel> {
        self.read(|registry| registry.channels().to_vec())
    }

    /// Grow or shrink the channel list.
    pub fn resize(&self, n: usize) -> AppResult<()> {
        self.edit(|registry| registry.resize(n))
    }

    /// Setpoint of one channel.
    pub fn setpoint(&self, index: usize) -> AppResult<i32> {
        self.read(|registry| registry.setpoint(index))
    }

    /// Set the setpoint of one channel.
    pub fn set_setpoint(&self, index: usize, value: i32) -> AppResult<()> {
        self.edit(|registry| registry.set_setpoint(index, value))
    }

    /// Device id of one channel.
    pub fn device_id(&self, index: usize) -> AppResult<u8> {
        self.read(|registry| registry.device_id(index))
    }

    /// Reassign the device id of one channel.
    pub fn set_device_id(&self, index: usize, id: u8) -> AppResult<()> {
        self.edit(|registry| registry.set_device_id(index, id))
    }

    /// Drive one channel to zero.
    pub fn zero(&self, index: usize) -> AppResult<()> {
        self.edit(|registry| registry.zero(index))
    }

    /// Drive one channel to the range minimum.
    pub fn to_min(&self, index: usize) -> AppResult<()> {
        self.edit(|registry| registry.to_min(index))
    }

    /// Drive one channel to the range maximum.
    pub fn to_max(&self, index: usize) -> AppResult<()> {
        self.edit(|registry| registry.to_max(index))
    }

    /// Drive every channel to zero.
    pub fn zero_all(&self) -> AppResult<()> {
        self.edit(|registry| {
            registry.zero_all();
            Ok(())
        })
    }

    /// Drive every channel to the range minimum.
    pub fn min_all(&self) -> AppResult<()> {
        self.edit(|registry| {
            registry.min_all();
            Ok(())
        })
    }

    /// Drive every channel to the range maximum.
    pub fn max_all(&self) -> AppResult<()> {
        self.edit(|registry| {
            registry.max_all();
            Ok(())
        })
    }

    /// The frame the next unpaused tick would send.
    pub fn preview_frame(&self) -> CommandFrame {
        self.read(ChannelRegistry::materialize_frame)
    }

    // =========================================================================
    // Broadcast
    // =========================================================================

    /// Current broadcast period.
    pub fn period(&self) -> Duration {
        self.shared.core.lock().scheduler.period()
    }

    /// Change the broadcast period.
    ///
    /// The tick already scheduled still fires at its deadline; the new period applies
    /// from that tick on.
    pub fn set_period(&self, period: Duration) -> AppResult<()> {
        self.reconfigure(|scheduler| scheduler.set_period(period))
    }

    /// Change the broadcast rate, in hertz.
    pub fn set_rate_hz(&self, hz: f64) -> AppResult<()> {
        self.reconfigure(|scheduler| scheduler.set_rate_hz(hz))
    }

    fn reconfigure(
        &self,
        f: impl FnOnce(&mut BroadcastScheduler) -> AppResult<()>,
    ) -> AppResult<()> {
        {
            let mut core = self.shared.core.lock();
            f(&mut core.scheduler)?;
            let period = core.scheduler.period();
            // Signalled under the lock so the timer never lags the scheduler
            self.period_tx.send_if_modified(|current| {
                if *current == period {
                    false
                } else {
                    *current = period;
                    true
                }
            });
        }
        self.shared.publish();
        Ok(())
    }

    /// True while broadcasting is paused.
    pub fn is_paused(&self) -> bool {
        self.shared.core.lock().scheduler.is_paused()
    }

    /// Stop sending frames.
    pub fn pause(&self) {
        self.shared.core.lock().scheduler.pause();
        debug!("broadcast paused");
        self.shared.publish();
    }

    /// Resume sending frames.
    pub fn resume(&self) {
        self.shared.core.lock().scheduler.resume();
        debug!("broadcast resumed");
        self.shared.publish();
    }

    /// Flip the pause flag and return the new value.
    pub fn toggle_pause(&self) -> bool {
        let paused = self.shared.core.lock().scheduler.toggle_pause();
        self.shared.publish();
        paused
    }

    /// Outcome of the last broadcast tick.
    pub fn status(&self) -> BroadcastStatus {
        self.shared.core.lock().scheduler.status().clone()
    }

    /// Most recent transport error.
    pub fn last_error(&self) -> Option<String> {
        self.shared
            .core
            .lock()
            .scheduler
            .last_error()
            .map(str::to_string)
    }

    // =========================================================================
    // Movement
    // =========================================================================

    /// True while the movement exerciser runs.
    pub fn is_movement_active(&self) -> bool {
        self.shared.core.lock().movement_active
    }

    /// Alternate every channel between max and min, one flip per
    /// `movement_interval`. Operator edits are refused until stopped.
    ///
    /// The first flip comes one interval after the start and continues the
    /// alternation where the previous run left off.
    pub fn start_movement(&self) -> AppResult<()> {
        let mut movement = self.movement.lock();
        if movement.is_some() {
            return Ok(());
        }
        self.shared.core.lock().movement_active = true;
        let interval = self.config.movement_interval;
        let shared = Arc::clone(&self.shared);
        *movement = Some(TaskHandle::spawn(&self.runtime, |shutdown_rx| {
            movement_loop(shared, interval, shutdown_rx)
        }));
        info!(interval = ?interval, "movement started");
        drop(movement);
        self.shared.publish();
        Ok(())
    }

    /// Stop the movement exerciser; setpoints stay where they are.
    pub fn stop_movement(&self) {
        let Some(task) = self.movement.lock().take() else {
            return;
        };
        task.stop();
        self.shared.core.lock().movement_active = false;
        info!("movement stopped");
        self.shared.publish();
    }

    // =========================================================================
    // Device info
    // =========================================================================

    /// Ask the device behind `index` for its info block.
    ///
    /// The request goes to node `device_id + id_offset`; the response arrives
    /// through the telemetry path and lands in the channel's [`Channel::info`].
    pub fn request_info(&self, index: usize) -> AppResult<()> {
        let device_id = self.device_id(index)?;
        let target = device_id.checked_add(self.config.id_offset).ok_or_else(|| {
            PanelError::InvalidArgument(format!(
                "device id {} plus offset {} exceeds the node id range",
                device_id, self.config.id_offset
            ))
        })?;

        self.transport
            .request(ServiceKind::GetActuatorInfo, target)
            .map_err(|err| {
                warn!(index, target, error = %err, "info request failed");
                PanelError::from(err)
            })?;
        debug!(index, target, "info requested");
        Ok(())
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Current state.
    pub fn snapshot(&self) -> PanelSnapshot {
        self.shared.core.lock().snapshot()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<PanelSnapshot> {
        self.shared.snapshots.subscribe()
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Stop every timer and release every subscription.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let tasks = [
            self.broadcast.take(),
            self.sweep.take(),
            self.movement.get_mut().take(),
        ];
        let stopped = tasks.into_iter().flatten().map(TaskHandle::stop).count();
        let released = self.subscriptions.len();
        for subscription in self.subscriptions.drain(..) {
            subscription.remove();
        }
        if stopped > 0 || released > 0 {
            info!(tasks = stopped, subscriptions = released, "panel session closed");
        }
    }
}

impl Drop for PanelSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MessageKind, MockTransport};
    use tracing_test::traced_test;

    fn open(config: PanelConfig, bus: &MockTransport) -> PanelSession {
        PanelSession::open(config, Arc::new(bus.clone())).unwrap()
    }

    #[test]
    fn open_outside_runtime_fails() {
        let bus = MockTransport::new();
        let err = PanelSession::open(PanelConfig::generic(), Arc::new(bus)).unwrap_err();
        assert!(matches!(err, PanelError::Runtime(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_rejected() {
        let bus = MockTransport::new();
        let config = PanelConfig::generic().with_channel_bounds(3, 2);
        let err = PanelSession::open(config, Arc::new(bus.clone())).unwrap_err();
        assert!(matches!(err, PanelError::Configuration(_)));
        assert_eq!(bus.subscriber_count(MessageKind::ActuatorStatus), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_failure_releases_earlier_subscriptions() {
        let bus = MockTransport::new();
        bus.fail_subscriptions("no such type");
        let err = PanelSession::open(PanelConfig::volz(), Arc::new(bus.clone())).unwrap_err();
        assert!(matches!(err, PanelError::Transport(_)));
        assert_eq!(bus.subscriber_count(MessageKind::VolzActuatorStatus), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn edits_publish_snapshots() {
        let bus = MockTransport::new();
        let session = open(PanelConfig::generic(), &bus);
        let mut rx = session.subscribe();

        session.resize(2).unwrap();
        session.set_setpoint(1, -40).unwrap();
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.channels.len(), 2);
        assert_eq!(snapshot.channels[1].setpoint(), -40);

        // Rejected edits leave state untouched
        assert!(session.set_setpoint(5, 0).is_err());
        assert!(session.resize(9).is_err());
        assert_eq!(session.channel_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn failed_sends_are_logged_and_ticking_continues() {
        let bus = MockTransport::new();
        bus.fail_sends("interface down");
        let session = open(PanelConfig::generic(), &bus);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(bus.send_count(), 0);
        assert_eq!(session.snapshot().stats.failures, 3);
        assert_eq!(
            session.status().display_text(),
            "Publishing failed:\nsend failed: interface down"
        );
        assert!(logs_contain("publishing failed"));

        bus.restore_sends();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(bus.send_count(), 1);
        assert!(matches!(session.status(), BroadcastStatus::Published(_)));
        assert_eq!(
            session.last_error().as_deref(),
            Some("send failed: interface down")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn request_info_overflow_rejected() {
        let bus = MockTransport::new();
        let session = open(PanelConfig::volz(), &bus);
        session.set_device_id(0, 250).unwrap();
        assert!(matches!(
            session.request_info(0),
            Err(PanelError::InvalidArgument(_))
        ));
        assert!(bus.requests().is_empty());

        session.set_device_id(0, 206).unwrap();
        session.request_info(0).unwrap();
        assert_eq!(bus.requests(), vec![(ServiceKind::GetActuatorInfo, 255)]);
    }

    #[tokio::test(start_paused = true)]
    async fn request_info_transport_error_surfaces() {
        let bus = MockTransport::new();
        let session = open(PanelConfig::volz(), &bus);
        bus.close();
        assert!(matches!(
            session.request_info(0),
            Err(PanelError::Transport(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_period_does_not_rearm() {
        let bus = MockTransport::new();
        let session = open(PanelConfig::generic(), &bus);
        let period_rx = session.period_tx.subscribe();

        tokio::time::sleep(Duration::from_millis(150)).await;
        session.set_period(Duration::from_millis(100)).unwrap();
        assert!(!period_rx.has_changed().unwrap());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(bus.send_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_period_changes_leave_timer_in_step() {
        let bus = MockTransport::new();
        let session = open(PanelConfig::generic(), &bus);

        std::thread::scope(|scope| {
            for offset in [0u64, 1] {
                let session = &session;
                scope.spawn(move || {
                    for i in 0..500u64 {
                        let ms = 20 + (i * 2 + offset) % 300;
                        session.set_period(Duration::from_millis(ms)).unwrap();
                    }
                });
            }
        });

        assert_eq!(*session.period_tx.borrow(), session.period());
    }

    #[test]
    fn following_tick_keeps_grid() {
        let start = Instant::now();
        let period = Duration::from_millis(100);

        // On time: one period after the fired deadline
        let next = following_tick(start, period, start + Duration::from_millis(3));
        assert_eq!(next, start + period);

        // Two and a half periods late: skip to the next boundary
        let next = following_tick(start, period, start + Duration::from_millis(250));
        assert_eq!(next, start + Duration::from_millis(300));

        // Exactly on a later boundary: the following one
        let next = following_tick(start, period, start + Duration::from_millis(200));
        assert_eq!(next, start + Duration::from_millis(300));
    }
}
