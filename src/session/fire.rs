//! Fire-mode per-channel state.
//!
//! Fire mode is a momentary additive strength override: press borrows the
//! channel's strength, release restores the exact pre-press value. The
//! per-channel async lock serialises start/stop pairs; the settle signal is
//! a single-slot wake primitive the transport satisfies on every hardware
//! strength report, letting a trigger block until the device has actually
//! acknowledged the change.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

/// Fire-mode bookkeeping for one channel.
pub(crate) struct FireState {
    active: Cell<bool>,
    origin: Cell<u16>,
    lock: Mutex<CriticalSectionRawMutex, ()>,
    settle: Signal<CriticalSectionRawMutex, ()>,
}

impl FireState {
    pub(crate) fn new() -> Self {
        Self {
            active: Cell::new(false),
            origin: Cell::new(0),
            lock: Mutex::new(()),
            settle: Signal::new(),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.set(active);
    }

    pub(crate) fn origin(&self) -> u16 {
        self.origin.get()
    }

    pub(crate) fn set_origin(&self, origin: u16) {
        self.origin.set(origin);
    }

    pub(crate) fn pairing_lock(&self) -> &Mutex<CriticalSectionRawMutex, ()> {
        &self.lock
    }

    pub(crate) fn settle(&self) -> &Signal<CriticalSectionRawMutex, ()> {
        &self.settle
    }
}

/// Boost target: origin plus step, clamped to the device-reported limit.
/// The revert always uses the true origin, never the clamped target.
pub(crate) fn clamp_target(origin: u16, step: u16, limit: u16) -> u16 {
    origin.saturating_add(step).min(limit)
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
