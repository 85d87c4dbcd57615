//! Direct-radio transport adapter.
//!
//! The device is reached over a local radio (BLE-class) link with no
//! intermediary. Policy differences from the relay adapter: after a
//! dropped peer this adapter retries **unboundedly** with a fixed pause —
//! the radio is assumed to be within range again eventually — and while a
//! device is bound it polls the battery level periodically.
//!
//! Byte-level command framing lives behind [`RadioLink`]; this adapter
//! only translates session intents and lifecycle events.

use core::cell::Cell;
use core::time::Duration;

use anyhow::anyhow;
use log::{debug, info};

use crate::channel::{Channel, StrengthSnapshot};
use crate::connection::ConnectionState;
use crate::error::TransportError;
use crate::pulse::PulseElement;
use crate::session::ports::Transport;
use crate::session::service::DeviceSession;

// ───────────────────────────────────────────────────────────────
// Link port
// ───────────────────────────────────────────────────────────────

/// Inbound events from the radio backend.
#[derive(Debug, Clone)]
pub enum RadioEvent {
    /// The device reported a strength snapshot.
    StrengthReport(StrengthSnapshot),
    /// The bound device dropped out of range or powered off.
    Dropped,
    /// Unrecoverable backend fault.
    Fault(String),
}

/// Seam to the external radio stack.
///
/// `next_event` must be cancel-safe: the adapter races it against its
/// battery-poll timer and drops the losing future.
///
/// Send bounds are intentionally absent: the engine runs on a
/// single-threaded cooperative executor.
#[allow(async_fn_in_trait)]
pub trait RadioLink {
    /// Power the radio up.
    async fn power_on(&self) -> Result<(), TransportError>;

    /// Scan for and bind the first reachable device.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Release the bound device and power the radio down.
    async fn disconnect(&self);

    /// Next inbound event.
    async fn next_event(&self) -> RadioEvent;

    async fn write_strength(&self, channel: Channel, value: u16) -> Result<(), TransportError>;
    async fn adjust_strength(&self, channel: Channel, delta: i16) -> Result<(), TransportError>;
    async fn write_elements(
        &self,
        channel: Channel,
        elements: &[PulseElement],
        repeats: u32,
    ) -> Result<(), TransportError>;
    async fn erase_queue(&self, channel: Channel) -> Result<(), TransportError>;

    /// Battery level in percent.
    async fn read_battery(&self) -> Result<u8, TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

/// Direct-radio [`Transport`] implementation and lifecycle driver.
pub struct RadioAdapter<L: RadioLink> {
    link: L,
    bound: Cell<bool>,
    stopping: Cell<bool>,
}

impl<L: RadioLink + 'static> RadioAdapter<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            bound: Cell::new(false),
            stopping: Cell::new(false),
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn is_bound(&self) -> bool {
        self.bound.get()
    }

    /// Drive the session through the connection lifecycle until stopped or
    /// faulted. Runs as one cooperative task alongside the session's jobs.
    pub async fn run(&self, session: &DeviceSession<Self>) -> anyhow::Result<()> {
        session.transition(ConnectionState::Connecting, None);

        if let Err(e) = self.link.power_on().await {
            let msg = format!("radio power-on failed: {e}");
            session.transition(ConnectionState::Failed, Some(&msg));
            return Err(anyhow!(msg));
        }
        session.transition(ConnectionState::Waiting, None);

        if !self.connect_until_bound(session).await {
            self.finish(session).await;
            return Ok(());
        }

        let battery_interval = Duration::from_millis(session.config().battery_poll_interval_ms);
        loop {
            if self.stopping.get() || session.is_closed() {
                break;
            }
            let event = futures_lite::future::or(
                async { Some(self.link.next_event().await) },
                async {
                    async_io_mini::Timer::after(battery_interval).await;
                    None
                },
            )
            .await;

            match event {
                None => {
                    if self.bound.get() {
                        match self.link.read_battery().await {
                            Ok(percent) => session.on_battery_report(percent),
                            Err(e) => debug!("battery poll failed: {e}"),
                        }
                    }
                }
                Some(RadioEvent::StrengthReport(snapshot)) => {
                    session.on_strength_report(snapshot);
                }
                Some(RadioEvent::Dropped) => {
                    self.bound.set(false);
                    session.transition(ConnectionState::Waiting, Some("device link lost"));
                    if !self.connect_until_bound(session).await {
                        break;
                    }
                }
                Some(RadioEvent::Fault(msg)) => {
                    self.bound.set(false);
                    session.transition(ConnectionState::Error, Some(&msg));
                    return Err(anyhow!(msg));
                }
            }
        }

        self.finish(session).await;
        Ok(())
    }

    /// Request an orderly stop; [`run`](Self::run) returns at its next
    /// checkpoint.
    pub fn stop(&self) {
        self.stopping.set(true);
    }

    /// Retry binding with a fixed pause until success or stop. There is no
    /// backoff cap; the session holds Waiting the whole time so callers
    /// can distinguish "retrying" from "gone".
    async fn connect_until_bound(&self, session: &DeviceSession<Self>) -> bool {
        let pause = Duration::from_millis(session.config().retry_pause_ms);
        loop {
            if self.stopping.get() || session.is_closed() {
                return false;
            }
            match self.link.connect().await {
                Ok(()) => {
                    info!("radio device bound");
                    self.bound.set(true);
                    session.bind_established();
                    return true;
                }
                Err(e) => {
                    debug!("radio connect attempt failed: {e}");
                    async_io_mini::Timer::after(pause).await;
                }
            }
        }
    }

    async fn finish(&self, session: &DeviceSession<Self>) {
        self.bound.set(false);
        self.link.disconnect().await;
        session.shutdown();
    }
}

// ───────────────────────────────────────────────────────────────
// Transport
// ───────────────────────────────────────────────────────────────

impl<L: RadioLink> Transport for RadioAdapter<L> {
    async fn send_strength_set(&self, channel: Channel, value: u16) -> Result<(), TransportError> {
        if !self.bound.get() {
            return Err(TransportError::NotBound);
        }
        self.link.write_strength(channel, value).await
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
        self.link.write_elements(channel, elements, repeats).await
    }

    async fn clear_queue(&self, channel: Channel) -> Result<(), TransportError> {
        if !self.bound.get() {
            return Err(TransportError::NotBound);
        }
        self.link.erase_queue(channel).await
    }
}
