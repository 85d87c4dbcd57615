//! Relay-mediated transport adapter.
//!
//! The device binds through an intermediary relay server: the adapter
//! starts a listener, publishes a join token out-of-band, and waits for a
//! physical peer to bind. A recoverable peer drop surfaces `Waiting` and
//! triggers exactly **one** rebind attempt — a failed rebind leaves the
//! session in `Waiting` for a fresh manual bind rather than looping.
//!
//! The relay wire protocol itself lives behind [`RelayLink`]; this adapter
//! only translates session intents and lifecycle events.

use core::cell::Cell;

use anyhow::anyhow;
use log::{info, warn};

use crate::channel::{Channel, StrengthSnapshot};
use crate::connection::ConnectionState;
use crate::error::TransportError;
use crate::pulse::PulseElement;
use crate::session::ports::Transport;
use crate::session::service::DeviceSession;

// ───────────────────────────────────────────────────────────────
// Link port
// ───────────────────────────────────────────────────────────────

/// Inbound events from the relay backend.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// A physical peer has bound through the relay.
    Bound,
    /// The device reported a strength snapshot.
    StrengthReport(StrengthSnapshot),
    /// The bound peer dropped; the listener is still up.
    PeerDropped,
    /// The link was shut down; no further events follow.
    Closed,
    /// Unrecoverable backend fault.
    Fault(String),
}

/// Seam to the external relay protocol library.
///
/// `next_event` must be cancel-safe: dropping its future between events
/// loses nothing.
///
/// Send bounds are intentionally absent: the engine runs on a
/// single-threaded cooperative executor.
#[allow(async_fn_in_trait)]
pub trait RelayLink {
    /// Bring the listener up.
    async fn start(&self) -> Result<(), TransportError>;

    /// Tear the link down; `next_event` yields [`RelayEvent::Closed`].
    async fn shutdown(&self);

    /// Re-offer the previous bind to a dropped peer.
    async fn rebind(&self) -> Result<(), TransportError>;

    /// Next inbound event.
    async fn next_event(&self) -> RelayEvent;

    async fn set_strength(&self, channel: Channel, value: u16) -> Result<(), TransportError>;
    async fn adjust_strength(&self, channel: Channel, delta: i16) -> Result<(), TransportError>;
    async fn queue_elements(
        &self,
        channel: Channel,
        elements: &[PulseElement],
        repeats: u32,
    ) -> Result<(), TransportError>;
    async fn clear_queue(&self, channel: Channel) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

/// Relay-mediated [`Transport`] implementation and lifecycle driver.
pub struct RelayAdapter<L: RelayLink> {
    link: L,
    bound: Cell<bool>,
}

impl<L: RelayLink + 'static> RelayAdapter<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            bound: Cell::new(false),
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn is_bound(&self) -> bool {
        self.bound.get()
    }

    /// Drive the session through the connection lifecycle until the link
    /// closes or faults. Runs as one cooperative task alongside the
    /// session's jobs.
    pub async fn run(&self, session: &DeviceSession<Self>) -> anyhow::Result<()> {
        session.transition(ConnectionState::Connecting, None);

        if let Err(e) = self.link.start().await {
            let msg = format!("relay start failed: {e}");
            session.transition(ConnectionState::Failed, Some(&msg));
            return Err(anyhow!(msg));
        }
        session.transition(ConnectionState::Waiting, None);

        loop {
            match self.link.next_event().await {
                RelayEvent::Bound => {
                    self.bound.set(true);
                    session.bind_established();
                }
                RelayEvent::StrengthReport(snapshot) => {
                    session.on_strength_report(snapshot);
                }
                RelayEvent::PeerDropped => {
                    self.bound.set(false);
                    session.transition(ConnectionState::Waiting, Some("peer dropped"));
                    // One rebind attempt; on failure the session stays in
                    // Waiting for a fresh bind.
                    match self.link.rebind().await {
                        Ok(()) => {
                            info!("relay rebind succeeded");
                            self.bound.set(true);
                            session.bind_established();
                        }
                        Err(e) => warn!("relay rebind failed: {e}"),
                    }
                }
                RelayEvent::Closed => break,
                RelayEvent::Fault(msg) => {
                    self.bound.set(false);
                    session.transition(ConnectionState::Error, Some(&msg));
                    return Err(anyhow!(msg));
                }
            }
            if session.is_closed() {
                break;
            }
        }

        self.bound.set(false);
        session.shutdown();
        Ok(())
    }

    /// Request an orderly stop; [`run`](Self::run) returns once the link
    /// reports closure.
    pub async fn stop(&self) {
        self.link.shutdown().await;
    }
}

// ───────────────────────────────────────────────────────────────
// Transport
// ───────────────────────────────────────────────────────────────

impl<L: RelayLink> Transport for RelayAdapter<L> {
    async fn send_strength_set(&self, channel: Channel, value: u16) -> Result<(), TransportError> {
        if !self.bound.get() {
            return Err(TransportError::NotBound);
        }
        self.link.set_strength(channel, value).await
    }

    async fn send_strength_delta(
        &self,
        channel: Channel,
        delta: i16,
    ) -> Result<(), TransportError> {
        if !self.bound.get() {
            return Err(TransportError::NotBound);
        }
        self.link.adjust_strength(channel, delta).await
    }

    async fn send_pulse_batch(
        &self,
        channel: Channel,
        elements: &[PulseElement],
        repeats: u32,
    ) -> Result<(), TransportError> {
        if !self.bound.get() {
            return Err(TransportError::NotBound);
        }
        self.link.queue_elements(channel, elements, repeats).await
    }

    async fn clear_queue(&self, channel: Channel) -> Result<(), TransportError> {
        if !self.bound.get() {
            return Err(TransportError::NotBound);
        }
        self.link.clear_queue(channel).await
    }
}
