//! Unified error types for the session engine.
//!
//! A single enum per concern, convertible where a subsystem funnels into
//! another. Transport variants are `Copy` except where a message payload is
//! required, so they can be passed through job loops without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Every fallible transport operation funnels into this type.
///
/// `BatchTooLong` is special-cased by the streaming scheduler: the job for
/// that channel stops without retrying, since the same batch would be
/// rejected again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The backend refused the connection attempt outright.
    ConnectionRefused,
    /// An established link was lost mid-operation.
    ConnectionLost,
    /// A send was attempted while no physical peer is bound.
    NotBound,
    /// The device rejected a waveform batch as exceeding its queue capacity.
    BatchTooLong,
    /// The link has been shut down and accepts no further operations.
    LinkClosed,
    /// The backend reported a protocol-level violation.
    Protocol(&'static str),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionRefused => write!(f, "connection refused"),
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::NotBound => write!(f, "no device bound"),
            Self::BatchTooLong => write!(f, "waveform batch too long for device queue"),
            Self::LinkClosed => write!(f, "link closed"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

// ---------------------------------------------------------------------------
// Pulse errors
// ---------------------------------------------------------------------------

/// Errors constructing waveform definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseError {
    /// A pulse must contain at least one element.
    EmptyElements,
}

impl fmt::Display for PulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyElements => write!(f, "pulse has no elements"),
        }
    }
}

impl std::error::Error for PulseError {}

// ---------------------------------------------------------------------------
// Settings-store errors
// ---------------------------------------------------------------------------

/// Errors from [`SettingsStore`](crate::session::ports::SettingsStore)
/// operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// Requested key does not exist.
    NotFound,
    /// Stored blob failed deserialization.
    Corrupted,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Corrupted => write!(f, "settings blob corrupted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for SettingsError {}
