//! Cooperative session runtime.
//!
//! The whole engine multiplexes on one single-threaded executor: channel
//! streaming jobs, fire-mode settle waits, hold timers, the strength
//! coalescer, and the adapter lifecycle are all cooperative tasks on the
//! same [`Executor`]. No OS thread is required beyond the one driving
//! [`drive`]; timers come from the `async-io-mini` reactor.

use std::future::Future;
use std::rc::Rc;

/// Maximum concurrently scheduled tasks per session executor.
pub const TASK_SLOTS: usize = 16;

/// The session executor type. `'static` because every spawned job owns
/// `Rc` handles into the session rather than borrowing it.
pub type Executor = edge_executor::LocalExecutor<'static, TASK_SLOTS>;

/// Create a shared session executor.
pub fn executor() -> Rc<Executor> {
    Rc::new(Executor::new())
}

/// Drive `main` to completion while servicing all spawned session tasks.
///
/// This is the blocking entry point an embedding shell (or a test) wraps
/// around the adapter lifecycle future.
pub fn drive<T>(executor: &Executor, main: impl Future<Output = T>) -> T {
    futures_lite::future::block_on(executor.run(main))
}
