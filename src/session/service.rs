//! Device session — the aggregate root.
//!
//! One [`DeviceSession`] exists per connection attempt. It owns the
//! connection state, the last strength snapshot, both channels' streaming
//! and fire-mode state, the hold gates, and the persisted feature flags.
//! A transport adapter drives it through the connection lifecycle and
//! feeds hardware reports in; the OSC binding dispatch (external) invokes
//! the public operations. Internal job failures never propagate out of an
//! operation — they surface through logs and [`SessionEvent`]s.
//!
//! ```text
//!  OSC dispatch ──▶ ┌───────────────────────────┐ ──▶ EventSink
//!                   │       DeviceSession        │
//!  Transport   ◀────│  streams · fire · holds    │◀── hardware reports
//!                   └───────────────────────────┘
//! ```

use core::cell::{Cell, RefCell};
use core::time::Duration;
use std::rc::{Rc, Weak};

use log::{debug, info, warn};

use crate::channel::{Channel, PerChannel, StrengthSnapshot};
use crate::config::SessionConfig;
use crate::connection::ConnectionState;
use crate::pulse::Pulse;
use crate::runtime::Executor;
use crate::session::events::SessionEvent;
use crate::session::fire::{self, FireState};
use crate::session::hold::HoldGate;
use crate::session::ports::{EventSink, SettingsStore, Transport};
use crate::session::settings::SessionSettings;
use crate::session::stream::{self, StreamState};

/// Strength adjustment requests accepted by [`DeviceSession::adjust_strength`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthOp {
    /// Set to an absolute value.
    SetTo(u16),
    /// Raise by a positive amount.
    Increase(u16),
    /// Lower by a positive amount.
    Decrease(u16),
}

/// The aggregate root for one connection attempt.
pub struct DeviceSession<T: Transport + 'static> {
    weak: Weak<Self>,
    transport: Rc<T>,
    executor: Rc<Executor>,
    config: SessionConfig,
    sink: Rc<RefCell<dyn EventSink>>,

    state: Cell<ConnectionState>,
    snapshot: Cell<Option<StrengthSnapshot>>,
    streams: PerChannel<StreamState>,
    fire: PerChannel<FireState>,
    hold: PerChannel<HoldGate>,
    pending_strength: PerChannel<Cell<Option<u16>>>,

    settings: RefCell<SessionSettings>,
    settings_dirty: Cell<bool>,
    bound_once: Cell<bool>,
    closed: Cell<bool>,
}

impl<T: Transport + 'static> DeviceSession<T> {
    /// Create a session and start its background strength coalescer.
    ///
    /// The session lives until [`shutdown`](Self::shutdown); dropping the
    /// last external handle without shutting down leaves the coalescer
    /// holding the session alive on the executor.
    pub fn new(
        transport: Rc<T>,
        executor: Rc<Executor>,
        config: SessionConfig,
        settings: SessionSettings,
        sink: Rc<RefCell<dyn EventSink>>,
    ) -> Rc<Self> {
        let session = Rc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            transport,
            executor,
            config,
            sink,
            state: Cell::new(ConnectionState::Disconnected),
            snapshot: Cell::new(None),
            streams: PerChannel::from_fn(|_| StreamState::new()),
            fire: PerChannel::from_fn(|_| FireState::new()),
            hold: PerChannel::from_fn(|_| HoldGate::new()),
            pending_strength: PerChannel::from_fn(|_| Cell::new(None)),
            settings: RefCell::new(settings),
            settings_dirty: Cell::new(false),
            bound_once: Cell::new(false),
            closed: Cell::new(false),
        });
        session.spawn_strength_flush();
        session
    }

    // ── Read-side accessors ───────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn snapshot(&self) -> Option<StrengthSnapshot> {
        self.snapshot.get()
    }

    /// Copy of the live settings (flags, ranges, fire step).
    pub fn settings(&self) -> SessionSettings {
        self.settings.borrow().clone()
    }

    pub fn selected_channel(&self) -> Channel {
        self.settings.borrow().selected_channel
    }

    pub fn active_pulse(&self, channel: Channel) -> Option<Rc<Pulse>> {
        self.streams.get(channel).active()
    }

    pub fn fire_active(&self, channel: Channel) -> bool {
        self.fire.get(channel).is_active()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ── Connection lifecycle ──────────────────────────────────

    /// Request a connection-state transition. Illegal transitions (and any
    /// transition after shutdown other than the final Disconnected) are
    /// logged no-ops. Returns whether the transition was applied.
    pub fn transition(&self, next: ConnectionState, message: Option<&str>) -> bool {
        if self.closed.get() && next != ConnectionState::Disconnected {
            debug!("session closed, dropping transition to {next}");
            return false;
        }
        let current = self.state.get();
        if current == next {
            return false;
        }
        if !current.can_transition_to(next) {
            warn!("illegal connection transition {current} -> {next}, ignoring");
            return false;
        }
        self.state.set(next);
        match message {
            Some(msg) => info!("connection {current} -> {next}: {msg}"),
            None => info!("connection {current} -> {next}"),
        }
        self.emit(SessionEvent::ConnectionChanged {
            state: next,
            message: message.map(String::from),
        });
        true
    }

    /// A physical peer has bound. The first bind of a session starts from
    /// empty streaming/fire-mode state; a rebind after a recoverable drop
    /// keeps the current assignments.
    pub fn bind_established(&self) {
        if !self.transition(ConnectionState::Connected, None) {
            return;
        }
        if !self.bound_once.replace(true) {
            self.reset_runtime_state();
        }
    }

    /// End the session: cancel all channel jobs, wake any settle waiter,
    /// drop stale callbacks from here on, and report Disconnected.
    pub fn shutdown(&self) {
        if self.closed.replace(true) {
            return;
        }
        for channel in Channel::BOTH {
            self.streams.get(channel).bump();
            self.streams.get(channel).set_active(None);
            self.hold.get(channel).release();
            self.pending_strength.get(channel).set(None);
            // An in-flight settle wait is abandoned; the revert command was
            // already issued before the wait.
            self.fire.get(channel).settle().signal(());
        }
        self.state.set(ConnectionState::Disconnected);
        self.emit(SessionEvent::ConnectionChanged {
            state: ConnectionState::Disconnected,
            message: None,
        });
        info!("session shut down");
    }

    fn reset_runtime_state(&self) {
        for channel in Channel::BOTH {
            let stream = self.streams.get(channel);
            stream.bump();
            stream.set_active(None);
            let fire = self.fire.get(channel);
            fire.set_active(false);
            fire.set_origin(0);
            self.pending_strength.get(channel).set(None);
        }
        self.snapshot.set(None);
    }

    // ── Inbound hardware reports ──────────────────────────────

    /// Apply a hardware strength report. Reports are applied in arrival
    /// order; every report satisfies both channels' settle signals.
    pub fn on_strength_report(&self, snapshot: StrengthSnapshot) {
        if self.closed.get() {
            return;
        }
        self.snapshot.set(Some(snapshot));
        for channel in Channel::BOTH {
            self.fire.get(channel).settle().signal(());
        }
        self.emit(SessionEvent::StrengthUpdated(snapshot));
    }

    /// Battery level report from a direct-radio device.
    pub fn on_battery_report(&self, percent: u8) {
        if self.closed.get() {
            return;
        }
        self.emit(SessionEvent::BatteryLevel(percent));
    }

    // ── Strength operations ───────────────────────────────────

    /// Panel strength adjustment. Gated on panel control; transport
    /// failures are logged, never raised.
    pub async fn adjust_strength(&self, channel: Channel, op: StrengthOp) {
        if self.closed.get() {
            return;
        }
        if !self.settings.borrow().panel_control {
            debug!("panel control disabled, ignoring strength adjust on {channel}");
            return;
        }
        let result = match op {
            StrengthOp::SetTo(value) => self.transport.send_strength_set(channel, value).await,
            StrengthOp::Increase(delta) => {
                self.transport
                    .send_strength_delta(channel, i16::try_from(delta).unwrap_or(i16::MAX))
                    .await
            }
            StrengthOp::Decrease(delta) => {
                self.transport
                    .send_strength_delta(channel, -i16::try_from(delta).unwrap_or(i16::MAX))
                    .await
            }
        };
        if let Err(e) = result {
            warn!("strength adjust {op:?} on {channel} failed: {e}");
        }
    }

    /// Continuous interaction-mode input (0.0–1.0). Maps into the
    /// channel's configured output range, clamps at the reported limit,
    /// and stages the value for the coalescer — high-rate input never
    /// floods the transport.
    pub fn float_output(&self, channel: Channel, value: f32) {
        if self.closed.get() || value < 0.0 {
            return;
        }
        let settings = self.settings.borrow();
        if !settings.panel_control || !*settings.interaction_mode.get(channel) {
            return;
        }
        let Some(snapshot) = self.snapshot.get() else {
            return;
        };
        let min = f32::from(*settings.interaction_min.get(channel));
        let max = f32::from(*settings.interaction_max.get(channel));
        let mapped = min + value.clamp(0.0, 1.0) * (max - min);
        let target = (mapped.ceil() as u16).min(snapshot.limit_of(channel));
        self.pending_strength.get(channel).set(Some(target));
    }

    fn spawn_strength_flush(&self) {
        let Some(session) = self.weak.upgrade() else {
            return;
        };
        let interval = Duration::from_millis(self.config.strength_flush_interval_ms);
        self.executor
            .spawn(async move {
                loop {
                    async_io_mini::Timer::after(interval).await;
                    if session.closed.get() {
                        return;
                    }
                    for channel in Channel::BOTH {
                        if let Some(value) = session.pending_strength.get(channel).take() {
                            if let Err(e) =
                                session.transport.send_strength_set(channel, value).await
                            {
                                debug!("coalesced strength write on {channel} failed: {e}");
                            }
                        }
                    }
                }
            })
            .detach();
    }

    // ── Pulse streaming ───────────────────────────────────────

    /// Assign a pulse to a channel (or clear it with `None`).
    ///
    /// Supersedes any running streaming job for the channel via the
    /// generation counter — without waiting for it — and starts the new
    /// job, which clears the device queue before its first send.
    /// Re-assigning the currently active pulse is a no-op.
    pub fn assign_pulse(&self, channel: Channel, pulse: Option<Rc<Pulse>>) {
        if self.closed.get() {
            return;
        }
        let stream = self.streams.get(channel);
        if let (Some(new), Some(current)) = (&pulse, &stream.active()) {
            if Rc::ptr_eq(new, current) {
                debug!("pulse '{}' already active on {channel}, ignoring", new.name());
                return;
            }
        }

        let generation = stream.bump();
        stream.set_active(pulse.clone());
        self.emit(SessionEvent::PulseChanged {
            channel,
            name: pulse.as_ref().map(|p| p.name().to_string()),
        });

        let Some(session) = self.weak.upgrade() else {
            return;
        };
        match pulse {
            Some(p) => {
                info!("assigning pulse '{}' to {channel}", p.name());
                self.executor
                    .spawn(stream::run_stream_job(session, channel, p, generation))
                    .detach();
            }
            None => {
                info!("clearing pulse on {channel}");
                self.executor
                    .spawn(async move {
                        if session.is_stream_stale(channel, generation) {
                            return;
                        }
                        if let Err(e) = session.transport.clear_queue(channel).await {
                            warn!("queue clear on {channel} failed: {e}");
                        }
                    })
                    .detach();
            }
        }
    }

    pub(crate) fn is_stream_stale(&self, channel: Channel, generation: u64) -> bool {
        self.closed.get() || self.streams.get(channel).generation() != generation
    }

    pub(crate) fn transport_handle(&self) -> Rc<T> {
        Rc::clone(&self.transport)
    }

    // ── Fire mode ─────────────────────────────────────────────

    /// Momentary strength override. Press borrows the channel's strength
    /// (clamped boost), release restores the exact pre-press value; both
    /// halves block on device confirmation so a fast release cannot race
    /// the boost. Redundant triggers are no-ops; the per-channel lock
    /// serialises pairs without blocking the other channel.
    pub async fn trigger_fire_mode(&self, channel: Channel, pressed: bool) {
        if self.closed.get() {
            return;
        }
        if self.settings.borrow().fire_mode_disabled {
            debug!("fire mode disabled, ignoring trigger on {channel}");
            return;
        }

        let fire = self.fire.get(channel);
        // Cheap rejection of bouncing triggers before taking the lock.
        if pressed && fire.is_active() {
            debug!("fire already active on {channel}, ignoring start");
            return;
        }
        if !pressed && !fire.is_active() {
            debug!("no fire active on {channel}, ignoring stop");
            return;
        }

        let _guard = fire.pairing_lock().lock().await;
        if self.closed.get() {
            return;
        }

        if pressed {
            if fire.is_active() {
                return;
            }
            let Some(snapshot) = self.snapshot.get() else {
                info!("fire start on {channel}: no strength report yet, ignoring");
                return;
            };
            let origin = snapshot.strength_of(channel);
            let step = self.settings.borrow().fire_step;
            let target = fire::clamp_target(origin, step, snapshot.limit_of(channel));
            fire.set_active(true);
            fire.set_origin(origin);
            info!("fire start on {channel}: {origin} -> {target}");
            if let Err(e) = self.transport.send_strength_set(channel, target).await {
                warn!("fire start on {channel} failed: {e}");
                fire.set_active(false);
                return;
            }
            self.wait_settle(channel).await;
        } else {
            let origin = fire.origin();
            info!("fire end on {channel}: restoring {origin}");
            match self.transport.send_strength_set(channel, origin).await {
                Ok(()) => self.wait_settle(channel).await,
                Err(e) => warn!("fire revert on {channel} failed: {e}"),
            }
            fire.set_active(false);
        }
    }

    /// Block until the device confirms the last strength command (next
    /// hardware report), bounded by the configured settle timeout.
    async fn wait_settle(&self, channel: Channel) {
        let fire = self.fire.get(channel);
        fire.settle().reset();
        let timeout = Duration::from_millis(self.config.settle_timeout_ms);
        let settled = futures_lite::future::or(
            async {
                fire.settle().wait().await;
                true
            },
            async {
                async_io_mini::Timer::after(timeout).await;
                false
            },
        )
        .await;
        if !settled && !self.closed.get() {
            warn!("fire mode on {channel}: no strength confirmation within {timeout:?}");
        }
    }

    // ── Mode and flag operations ──────────────────────────────

    /// Panel page selection: pages 0–1 target channel A, higher pages B.
    pub fn select_channel(&self, page: i64) {
        if self.closed.get() || page < 0 {
            return;
        }
        let channel = if page <= 1 { Channel::A } else { Channel::B };
        self.settings.borrow_mut().selected_channel = channel;
        self.settings_dirty.set(true);
        info!("selected channel {channel}");
        self.emit(SessionEvent::ChannelSelected(channel));
    }

    /// Hold/tap input for a channel's interaction-mode toggle: a sustained
    /// press toggles the mode once; a tap does nothing.
    pub fn signal_mode_hold(&self, channel: Channel, pressed: bool) {
        if self.closed.get() {
            return;
        }
        if !self.settings.borrow().panel_control {
            return;
        }
        let gate = self.hold.get(channel);
        if pressed {
            let Some(session) = self.weak.upgrade() else {
                return;
            };
            let delay = Duration::from_millis(self.config.hold_delay_ms);
            gate.press(&self.executor, delay, move || {
                let enabled = !*session.settings.borrow().interaction_mode.get(channel);
                session.set_interaction_mode(channel, enabled);
            });
        } else if gate.release() {
            debug!("mode hold on {channel} released before the delay");
        }
    }

    pub fn set_interaction_mode(&self, channel: Channel, enabled: bool) {
        if self.closed.get() {
            return;
        }
        *self.settings.borrow_mut().interaction_mode.get_mut(channel) = enabled;
        self.settings_dirty.set(true);
        info!(
            "channel {channel} switched to {} mode",
            if enabled { "interaction" } else { "panel" }
        );
        self.emit(SessionEvent::InteractionModeChanged { channel, enabled });
    }

    /// Bounds for the interaction-mode output mapping.
    pub fn set_interaction_range(&self, channel: Channel, min: u16, max: u16) {
        if self.closed.get() || min > max {
            return;
        }
        {
            let mut settings = self.settings.borrow_mut();
            *settings.interaction_min.get_mut(channel) = min;
            *settings.interaction_max.get_mut(channel) = max;
        }
        self.settings_dirty.set(true);
        info!("channel {channel} interaction range set to {min}..{max}");
    }

    pub fn set_panel_control(&self, enabled: bool) {
        if self.closed.get() {
            return;
        }
        self.settings.borrow_mut().panel_control = enabled;
        self.settings_dirty.set(true);
        info!(
            "panel control {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn set_fire_mode_disabled(&self, disabled: bool) {
        if self.closed.get() {
            return;
        }
        self.settings.borrow_mut().fire_mode_disabled = disabled;
        self.settings_dirty.set(true);
        info!(
            "fire mode {}",
            if disabled { "disabled" } else { "enabled" }
        );
    }

    pub fn set_fire_step(&self, step: u16) {
        if self.closed.get() {
            return;
        }
        self.settings.borrow_mut().fire_step = step;
        self.settings_dirty.set(true);
        info!("fire step set to {step}");
        self.emit(SessionEvent::FireStepChanged(step));
    }

    /// Fire step from a 0.0–1.0 input, mapped onto 0–100.
    pub fn set_fire_step_scaled(&self, value: f32) {
        if !(0.0..=1.0).contains(&value) {
            return;
        }
        self.set_fire_step((value * 100.0).floor() as u16);
    }

    // ── Settings persistence ──────────────────────────────────

    /// Persist settings if anything changed since the last save. Returns
    /// whether a save happened.
    pub fn persist_if_dirty(&self, store: &mut dyn SettingsStore) -> bool {
        if !self.settings_dirty.get() {
            return false;
        }
        match self.settings.borrow().save(store) {
            Ok(()) => {
                self.settings_dirty.set(false);
                debug!("session settings persisted");
                true
            }
            Err(e) => {
                warn!("session settings save failed: {e}");
                false
            }
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn emit(&self, event: SessionEvent) {
        self.sink.borrow_mut().emit(&event);
    }
}
