//! Connection lifecycle states.
//!
//! One state machine shared by both transport adapters:
//!
//! ```text
//! DISCONNECTED ──▶ CONNECTING ──▶ WAITING ◀──▶ CONNECTED
//!                      │             │             │
//!                      └──────┬──────┴──────┬──────┘
//!                             ▼             ▼
//!                          FAILED         ERROR ──▶ DISCONNECTED (stop/reset)
//! ```
//!
//! `Waiting` means the transport is up (server listening / radio ready) but
//! no physical peer is bound; `Connected` means a peer is bound and
//! exchanging data. A recoverable peer drop moves `Connected` back to
//! `Waiting` — never to `Disconnected` — so callers can distinguish "never
//! connected" from "temporarily lost". An explicit stop reaches
//! `Disconnected` from anywhere.

use core::fmt;

/// Connection lifecycle state of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial and terminal state; no transport activity.
    Disconnected,
    /// Start requested; transport is coming up.
    Connecting,
    /// Transport ready, no physical peer bound yet (also held while
    /// rebinding after a recoverable drop).
    Waiting,
    /// A physical device is bound and exchanging data.
    Connected,
    /// Startup failed; carries a message, cleared only by stop/reset.
    Failed,
    /// Unrecoverable runtime error; carries a message, cleared only by
    /// stop/reset.
    Error,
}

impl ConnectionState {
    /// Whether the transition `self -> next` follows the lifecycle graph.
    ///
    /// The graph is deliberately strict: a bind can never skip `Waiting`,
    /// and `Failed`/`Error` only leave via the explicit-stop edge.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::{Connected, Connecting, Disconnected, Error, Failed, Waiting};
        match (self, next) {
            // Explicit stop/reset is always allowed.
            (_, Disconnected) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Waiting) => true,
            (Waiting, Connected) => true,
            // Recoverable peer drop.
            (Connected, Waiting) => true,
            (Connecting | Waiting | Connected, Failed | Error) => true,
            _ => false,
        }
    }

    /// True while a connection attempt or bound link is in progress.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Waiting | Self::Connected)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Waiting => "waiting",
            Self::Connected => "connected",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
