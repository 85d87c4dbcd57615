//! Outbound session events.
//!
//! The [`DeviceSession`](super::service::DeviceSession) emits these through
//! the [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them — update status widgets, forward over
//! OSC, log. The core never reads anything back through this channel.

use crate::channel::{Channel, StrengthSnapshot};
use crate::connection::ConnectionState;

/// Structured events emitted by the session core.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The connection lifecycle advanced. Failure states always carry a
    /// human-readable message.
    ConnectionChanged {
        state: ConnectionState,
        message: Option<String>,
    },

    /// The device reported a new strength snapshot.
    StrengthUpdated(StrengthSnapshot),

    /// A channel's assigned pulse changed (`None` = cleared).
    PulseChanged {
        channel: Channel,
        name: Option<String>,
    },

    /// A channel's interaction mode was toggled.
    InteractionModeChanged { channel: Channel, enabled: bool },

    /// The panel's selected channel changed.
    ChannelSelected(Channel),

    /// The fire-mode strength step changed.
    FireStepChanged(u16),

    /// Battery level report from a direct-radio device (percent).
    BatteryLevel(u8),
}
