//! Channel streaming scheduler.
//!
//! Keeps a channel's onboard waveform queue topped up indefinitely from
//! the assigned pulse without starving or overflowing it:
//!
//! ```text
//!  priming ──▶ |batch|batch|batch| … (refill_interval apart)
//!  steady  ──▶ |batch| ……… |batch| ……… (one batch per batch-duration)
//! ```
//!
//! Each steady-state send replaces exactly the playback consumed since the
//! previous send, so the queue depth converges near device capacity.
//!
//! Cancellation is cooperative: every job carries the generation it was
//! spawned under and exits at its next send checkpoint once superseded.
//! `assign` never waits for the old job — sends are overwrite-idempotent
//! and the new job clears the device queue before its first send, so the
//! device's final state does not depend on shutdown ordering.

use core::cell::{Cell, RefCell};
use core::time::Duration;
use std::rc::Rc;

use log::{debug, warn};

use crate::channel::Channel;
use crate::config::SessionConfig;
use crate::error::TransportError;
use crate::pulse::Pulse;
use crate::session::ports::Transport;
use crate::session::service::DeviceSession;

// ───────────────────────────────────────────────────────────────
// Batch arithmetic
// ───────────────────────────────────────────────────────────────

/// Derived send-plan for one pulse under one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    /// Playback time of one full pass over the pulse elements.
    pub cycle_ms: u64,
    /// Whole cycles per sent batch (≥ 1).
    pub repeats_per_batch: u32,
    /// Playback time of one batch.
    pub batch_ms: u64,
    /// Batches queued up front without exceeding device capacity (≥ 1).
    pub priming_batches: u32,
}

impl BatchPlan {
    /// Compute the plan for a pulse with `element_count` elements.
    ///
    /// `priming_batches * batch_ms` stays within `buffer_capacity_ms`
    /// whenever a single cycle fits the capacity at all; a pulse longer
    /// than the device queue still yields a minimum plan and is rejected
    /// by the device itself on send.
    pub fn compute(element_count: usize, config: &SessionConfig) -> Self {
        let cycle_ms = element_count as u64 * config.element_duration_ms;
        let repeats_per_batch = (config.send_window_ms / cycle_ms).max(1) as u32;
        let batch_ms = u64::from(repeats_per_batch) * cycle_ms;
        let priming_batches = (config.buffer_capacity_ms / batch_ms).max(1) as u32;
        Self {
            cycle_ms,
            repeats_per_batch,
            batch_ms,
            priming_batches,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Per-channel stream state
// ───────────────────────────────────────────────────────────────

/// Streaming bookkeeping for one channel.
///
/// The generation counter doubles as the job handle: bumping it is the
/// cancellation request, and a job whose generation no longer matches is
/// superseded.
pub(crate) struct StreamState {
    active: RefCell<Option<Rc<Pulse>>>,
    generation: Cell<u64>,
}

impl StreamState {
    pub(crate) fn new() -> Self {
        Self {
            active: RefCell::new(None),
            generation: Cell::new(0),
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Advance the generation, invalidating any running job. Returns the
    /// new value for the successor job.
    pub(crate) fn bump(&self) -> u64 {
        let next = self.generation.get() + 1;
        self.generation.set(next);
        next
    }

    pub(crate) fn set_active(&self, pulse: Option<Rc<Pulse>>) {
        *self.active.borrow_mut() = pulse;
    }

    pub(crate) fn active(&self) -> Option<Rc<Pulse>> {
        self.active.borrow().clone()
    }
}

// ───────────────────────────────────────────────────────────────
// Streaming job
// ───────────────────────────────────────────────────────────────

/// Body of one channel streaming job. Spawned detached by
/// [`DeviceSession::assign_pulse`]; exits on supersession, session
/// shutdown, or the first transport failure.
pub(crate) async fn run_stream_job<T: Transport + 'static>(
    session: Rc<DeviceSession<T>>,
    channel: Channel,
    pulse: Rc<Pulse>,
    generation: u64,
) {
    let plan = BatchPlan::compute(pulse.element_count(), session.config());
    debug!(
        "stream {}: '{}' cycle={}ms repeats={} batch={}ms priming={}",
        channel, pulse.name(), plan.cycle_ms, plan.repeats_per_batch, plan.batch_ms,
        plan.priming_batches
    );

    let transport = session.transport_handle();

    if session.is_stream_stale(channel, generation) {
        return;
    }
    // Stale waveform data from the previous assignment must never play
    // after the switch.
    if let Err(e) = transport.clear_queue(channel).await {
        warn!("stream {}: queue clear failed: {e}", channel);
        return;
    }

    let refill = Duration::from_millis(session.config().refill_interval_ms);

    // Priming phase: fill the device queue close to capacity.
    for _ in 0..plan.priming_batches {
        if session.is_stream_stale(channel, generation) {
            return;
        }
        if !send_batch(&*transport, channel, &pulse, plan.repeats_per_batch).await {
            return;
        }
        async_io_mini::Timer::after(refill).await;
    }

    // Absorb the slack between the refill cadence and one cycle before
    // switching to replacement-rate sending.
    let slack = plan.cycle_ms.abs_diff(session.config().refill_interval_ms);
    async_io_mini::Timer::after(Duration::from_millis(slack)).await;

    // Steady state: one batch per batch-duration, forever.
    let pause = Duration::from_millis(plan.batch_ms);
    loop {
        if session.is_stream_stale(channel, generation) {
            return;
        }
        if !send_batch(&*transport, channel, &pulse, plan.repeats_per_batch).await {
            return;
        }
        async_io_mini::Timer::after(pause).await;
    }
}

/// Send one batch; returns `false` when the job must stop.
async fn send_batch<T: Transport>(
    transport: &T,
    channel: Channel,
    pulse: &Pulse,
    repeats: u32,
) -> bool {
    match transport
        .send_pulse_batch(channel, pulse.elements(), repeats)
        .await
    {
        Ok(()) => true,
        Err(TransportError::BatchTooLong) => {
            // The same batch would be rejected again; reassignment is the
            // caller's recovery path.
            warn!("stream {}: batch rejected as too long, stopping", channel);
            false
        }
        Err(e) => {
            warn!("stream {}: send failed ({e}), stopping", channel);
            false
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
