//! Output channels and per-channel state containers.
//!
//! The device exposes exactly two independent output lines. Everything
//! channel-scoped in this crate is indexed by [`Channel`] through
//! [`PerChannel`] — a closed two-slot container, never an open-ended map,
//! so a missing-channel case cannot exist by construction.

use core::fmt;

use serde::{Deserialize, Serialize};

/// One of the two independent output lines on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    /// Both channels, in fixed order. Handy for "apply to every channel"
    /// loops without allocating.
    pub const BOTH: [Channel; 2] = [Channel::A, Channel::B];

    /// Short display label ("A" / "B").
    pub fn label(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fixed two-slot container indexed by [`Channel`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerChannel<T> {
    pub a: T,
    pub b: T,
}

impl<T> PerChannel<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    pub fn get(&self, channel: Channel) -> &T {
        match channel {
            Channel::A => &self.a,
            Channel::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, channel: Channel) -> &mut T {
        match channel {
            Channel::A => &mut self.a,
            Channel::B => &mut self.b,
        }
    }
}

impl<T: Clone> PerChannel<T> {
    /// Both slots initialised to the same value.
    pub fn splat(value: T) -> Self {
        Self {
            a: value.clone(),
            b: value,
        }
    }
}

impl<T> PerChannel<T> {
    /// Build each slot from its channel.
    pub fn from_fn(mut f: impl FnMut(Channel) -> T) -> Self {
        Self {
            a: f(Channel::A),
            b: f(Channel::B),
        }
    }
}

/// Last strength state reported by the physical device.
///
/// Produced by a transport adapter on every hardware report and applied in
/// arrival order; the core exposes it read-only and never synthesises one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrengthSnapshot {
    /// Current output strength per channel.
    pub strength: PerChannel<u16>,
    /// Device-enforced strength ceiling per channel.
    pub limit: PerChannel<u16>,
}

impl StrengthSnapshot {
    pub fn new(strength: PerChannel<u16>, limit: PerChannel<u16>) -> Self {
        Self { strength, limit }
    }

    pub fn strength_of(&self, channel: Channel) -> u16 {
        *self.strength.get(channel)
    }

    pub fn limit_of(&self, channel: Channel) -> u16 {
        *self.limit.get(channel)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
