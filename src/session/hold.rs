//! Hold/tap debouncer.
//!
//! Distinguishes a momentary tap from a sustained hold on a single boolean
//! press signal: press arms a delayed action, release before the delay
//! cancels it, and only a hold past the delay fires the bound effect —
//! exactly once.
//!
//! Cancellation uses the same generation-token scheme as the streaming
//! scheduler: press and release bump a sequence counter, and the armed
//! task only fires if its token is still current when the delay elapses.
//! Because the bump happens before the caller proceeds, a released press
//! can never fire late.

use core::cell::Cell;
use core::time::Duration;
use std::rc::Rc;

use crate::runtime::Executor;

/// One independent hold/tap gate. Each consumer owns its own instance;
/// gates never interact.
pub struct HoldGate {
    seq: Rc<Cell<u64>>,
    armed: Rc<Cell<bool>>,
}

impl HoldGate {
    pub fn new() -> Self {
        Self {
            seq: Rc::new(Cell::new(0)),
            armed: Rc::new(Cell::new(false)),
        }
    }

    /// Arm the gate: after `delay`, run `effect` — unless a release or a
    /// newer press intervenes. A second press restarts the timer rather
    /// than stacking a second pending effect.
    pub fn press<F>(&self, executor: &Executor, delay: Duration, effect: F)
    where
        F: FnOnce() + 'static,
    {
        let token = self.seq.get() + 1;
        self.seq.set(token);
        self.armed.set(true);

        let seq = Rc::clone(&self.seq);
        let armed = Rc::clone(&self.armed);
        executor
            .spawn(async move {
                async_io_mini::Timer::after(delay).await;
                if seq.get() != token {
                    return;
                }
                armed.set(false);
                effect();
            })
            .detach();
    }

    /// Disarm a pending action. Returns `true` if one was pending.
    /// Takes effect before this call returns — the cancelled effect can
    /// never fire afterwards.
    pub fn release(&self) -> bool {
        self.seq.set(self.seq.get() + 1);
        self.armed.replace(false)
    }

    /// Whether a delayed action is currently armed.
    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }
}

impl Default for HoldGate {
    fn default() -> Self {
        Self::new()
    }
}
