//! Session configuration parameters
//!
//! All tunable timing and default values for the session engine. The
//! embedding application may override them from its settings layer; tests
//! compress the millisecond values to keep wall-clock time short.

use serde::{Deserialize, Serialize};

/// Core session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    // --- Streaming ---
    /// Playback duration of one pulse element (fixed by the device's frame
    /// format; never derived from pulse content)
    pub element_duration_ms: u64,
    /// Target playback span of one sent batch
    pub send_window_ms: u64,
    /// Maximum bufferable playback duration on the device
    pub buffer_capacity_ms: u64,
    /// Pause between priming-phase sends
    pub refill_interval_ms: u64,

    // --- Strength ---
    /// Flush interval of the coalesced interaction-strength writer
    pub strength_flush_interval_ms: u64,

    // --- Fire mode ---
    /// Default additive strength boost
    pub fire_step: u16,
    /// Upper bound on any settle wait before it is abandoned with a warning
    pub settle_timeout_ms: u64,

    // --- Input ---
    /// Press duration that turns a tap into a hold
    pub hold_delay_ms: u64,

    // --- Radio transport ---
    /// Pause between reconnect attempts after a dropped peer
    pub retry_pause_ms: u64,
    /// Battery level polling period while a device is bound
    pub battery_poll_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            // Streaming
            element_duration_ms: 100,
            send_window_ms: 5_000,
            buffer_capacity_ms: 50_000,
            refill_interval_ms: 1_000,

            // Strength
            strength_flush_interval_ms: 100,

            // Fire mode
            fire_step: 30,
            settle_timeout_ms: 4_000,

            // Input
            hold_delay_ms: 1_000,

            // Radio
            retry_pause_ms: 1_000,
            battery_poll_interval_ms: 60_000,
        }
    }
}
