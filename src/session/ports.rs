//! Port traits — the boundary between the session core and the outside
//! world.
//!
//! ```text
//!   OSC dispatch ──▶ DeviceSession ──▶ Transport (adapter ──▶ wire library)
//!                        │
//!                        └──▶ EventSink / SettingsStore
//! ```
//!
//! Transport adapters implement [`Transport`] and feed hardware reports
//! back through `DeviceSession` methods; status consumers implement
//! [`EventSink`]; the settings layer implements [`SettingsStore`].
//! The session consumes all of them via generics or trait objects and
//! never touches a wire format directly.

use crate::channel::Channel;
use crate::error::{SettingsError, TransportError};
use crate::pulse::PulseElement;
use crate::session::events::SessionEvent;

// ───────────────────────────────────────────────────────────────
// Transport port (session → device)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the session calls this to command the device.
///
/// All sends are overwrite-idempotent from the device's perspective — a
/// repeated or reordered send converges to the same queue state — which is
/// what allows the streaming scheduler's fire-and-forget cancellation.
///
/// Send bounds are intentionally absent: the engine runs on a
/// single-threaded cooperative executor.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Set a channel's strength to an absolute value.
    async fn send_strength_set(&self, channel: Channel, value: u16) -> Result<(), TransportError>;

    /// Adjust a channel's strength by a signed delta.
    async fn send_strength_delta(&self, channel: Channel, delta: i16)
    -> Result<(), TransportError>;

    /// Append `elements`, repeated `repeats` times, to a channel's device
    /// queue. Fails with [`TransportError::BatchTooLong`] when the device
    /// rejects the batch size.
    async fn send_pulse_batch(
        &self,
        channel: Channel,
        elements: &[PulseElement],
        repeats: u32,
    ) -> Result<(), TransportError>;

    /// Drop all queued waveform data for a channel.
    async fn clear_queue(&self, channel: Channel) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (session → status consumers)
// ───────────────────────────────────────────────────────────────

/// The session emits structured [`SessionEvent`]s through this port.
///
/// Implementations should record or forward the event and return; calling
/// back into the session from `emit` re-enters the aggregate and is not
/// supported.
pub trait EventSink {
    fn emit(&mut self, event: &SessionEvent);
}

/// Sink that discards everything. Useful for tests and headless runs.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&mut self, _event: &SessionEvent) {}
}

// ───────────────────────────────────────────────────────────────
// Settings store port (session ↔ persistent settings)
// ───────────────────────────────────────────────────────────────

/// Persistent namespaced key-value storage for session settings.
///
/// Persistence mechanics (file, database, platform store) live entirely on
/// the implementing side; the session only reads and writes opaque blobs.
pub trait SettingsStore {
    /// Read a value.
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, SettingsError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), SettingsError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), SettingsError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}
