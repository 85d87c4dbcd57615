//! Persisted session settings.
//!
//! The feature flags and tunables a user expects to survive restarts,
//! packed into one postcard blob behind the
//! [`SettingsStore`](super::ports::SettingsStore) port. The session keeps
//! the live copy and a dirty flag; the embedding shell decides when to
//! call the save hook.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::channel::{Channel, PerChannel};
use crate::error::SettingsError;
use crate::session::ports::SettingsStore;

/// Storage namespace for the session blob.
pub const SETTINGS_NAMESPACE: &str = "session";
/// Storage key for the session blob.
pub const SETTINGS_KEY: &str = "settings";

/// User-facing session state that persists across connection attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Master gate: when off, panel-driven operations are ignored.
    pub panel_control: bool,
    /// Per-channel interaction mode (continuous float input drives output
    /// strength instead of discrete panel commands).
    pub interaction_mode: PerChannel<bool>,
    /// Lower bound of the interaction-mode output mapping.
    pub interaction_min: PerChannel<u16>,
    /// Upper bound of the interaction-mode output mapping.
    pub interaction_max: PerChannel<u16>,
    /// Additive fire-mode strength step.
    pub fire_step: u16,
    /// Global fire-mode kill switch.
    pub fire_mode_disabled: bool,
    /// Channel currently targeted by panel page selection.
    pub selected_channel: Channel,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            panel_control: true,
            interaction_mode: PerChannel::splat(false),
            interaction_min: PerChannel::splat(0),
            interaction_max: PerChannel::splat(100),
            fire_step: 30,
            fire_mode_disabled: false,
            selected_channel: Channel::A,
        }
    }
}

impl SessionSettings {
    /// Load from the store; a missing or corrupt blob falls back to
    /// defaults with a log line, never an error.
    pub fn load(store: &dyn SettingsStore) -> Self {
        match store.read(SETTINGS_NAMESPACE, SETTINGS_KEY) {
            Ok(bytes) => match postcard::from_bytes(&bytes) {
                Ok(settings) => settings,
                Err(_) => {
                    warn!("settings blob corrupted, using defaults");
                    Self::default()
                }
            },
            Err(SettingsError::NotFound) => {
                debug!("no stored settings, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!("settings load failed ({e}), using defaults");
                Self::default()
            }
        }
    }

    /// Persist to the store as one postcard blob.
    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
        let bytes = postcard::to_allocvec(self).map_err(|_| SettingsError::IoError)?;
        store.write(SETTINGS_NAMESPACE, SETTINGS_KEY, &bytes)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
