//! Shared fakes for integration tests: a recording transport, a recording
//! event sink, an in-memory settings store, and session construction
//! helpers with compressed timing.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use pulselink::channel::{Channel, PerChannel, StrengthSnapshot};
use pulselink::config::SessionConfig;
use pulselink::connection::ConnectionState;
use pulselink::error::{SettingsError, TransportError};
use pulselink::pulse::{Pulse, PulseElement};
use pulselink::runtime::{self, Executor};
use pulselink::session::events::SessionEvent;
use pulselink::session::ports::{EventSink, SettingsStore, Transport};
use pulselink::session::service::DeviceSession;
use pulselink::session::settings::SessionSettings;

// ── Recording transport ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    StrengthSet { channel: Channel, value: u16 },
    StrengthDelta { channel: Channel, delta: i16 },
    Batch { channel: Channel, marker: u8, repeats: u32 },
    Clear { channel: Channel },
}

pub struct FakeTransport {
    pub sent: RefCell<Vec<Sent>>,
    pub batch_times: RefCell<Vec<Instant>>,
    pub batch_attempts: Cell<usize>,
    pub reject_batches: Cell<bool>,
}

impl FakeTransport {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            sent: RefCell::new(Vec::new()),
            batch_times: RefCell::new(Vec::new()),
            batch_attempts: Cell::new(0),
            reject_batches: Cell::new(false),
        })
    }

    pub fn log(&self) -> Vec<Sent> {
        self.sent.borrow().clone()
    }

    pub fn strength_sets(&self) -> Vec<(Channel, u16)> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|s| match s {
                Sent::StrengthSet { channel, value } => Some((*channel, *value)),
                _ => None,
            })
            .collect()
    }

    pub fn batch_markers(&self) -> Vec<u8> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|s| match s {
                Sent::Batch { marker, .. } => Some(*marker),
                _ => None,
            })
            .collect()
    }

    pub fn batch_count(&self) -> usize {
        self.batch_times.borrow().len()
    }
}

impl Transport for FakeTransport {
    async fn send_strength_set(&self, channel: Channel, value: u16) -> Result<(), TransportError> {
        self.sent.borrow_mut().push(Sent::StrengthSet { channel, value });
        Ok(())
    }

    async fn send_strength_delta(
        &self,
        channel: Channel,
        delta: i16,
    ) -> Result<(), TransportError> {
        self.sent
            .borrow_mut()
            .push(Sent::StrengthDelta { channel, delta });
        Ok(())
    }

    async fn send_pulse_batch(
        &self,
        channel: Channel,
        elements: &[PulseElement],
        repeats: u32,
    ) -> Result<(), TransportError> {
        self.batch_attempts.set(self.batch_attempts.get() + 1);
        if self.reject_batches.get() {
            return Err(TransportError::BatchTooLong);
        }
        let marker = elements.first().map_or(0, |e| e.frequency[0]);
        self.sent.borrow_mut().push(Sent::Batch {
            channel,
            marker,
            repeats,
        });
        self.batch_times.borrow_mut().push(Instant::now());
        Ok(())
    }

    async fn clear_queue(&self, channel: Channel) -> Result<(), TransportError> {
        self.sent.borrow_mut().push(Sent::Clear { channel });
        Ok(())
    }
}

// ── Recording event sink ──────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<SessionEvent>,
}

impl RecordingSink {
    pub fn shared() -> Rc<RefCell<RecordingSink>> {
        Rc::new(RefCell::new(RecordingSink { events: Vec::new() }))
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &SessionEvent) {
        self.events.push(event.clone());
    }
}

/// Connection states in emission order.
pub fn connection_states(sink: &Rc<RefCell<RecordingSink>>) -> Vec<ConnectionState> {
    sink.borrow()
        .events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::ConnectionChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

pub fn mode_toggle_count(sink: &Rc<RefCell<RecordingSink>>) -> usize {
    sink.borrow()
        .events
        .iter()
        .filter(|e| matches!(e, SessionEvent::InteractionModeChanged { .. }))
        .count()
}

// ── In-memory settings store ──────────────────────────────────

pub struct MemStore(pub HashMap<String, Vec<u8>>);

impl MemStore {
    pub fn new() -> Self {
        Self(HashMap::new())
    }
}

impl SettingsStore for MemStore {
    fn read(&self, ns: &str, key: &str) -> Result<Vec<u8>, SettingsError> {
        self.0
            .get(&format!("{ns}::{key}"))
            .cloned()
            .ok_or(SettingsError::NotFound)
    }
    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), SettingsError> {
        self.0.insert(format!("{ns}::{key}"), data.to_vec());
        Ok(())
    }
    fn delete(&mut self, ns: &str, key: &str) -> Result<(), SettingsError> {
        self.0.remove(&format!("{ns}::{key}"));
        Ok(())
    }
    fn exists(&self, ns: &str, key: &str) -> bool {
        self.0.contains_key(&format!("{ns}::{key}"))
    }
}

// ── Construction helpers ──────────────────────────────────────

/// Timing compressed ~5×–50× so integration tests finish in well under a
/// second of wall clock each.
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        element_duration_ms: 20,
        send_window_ms: 100,
        buffer_capacity_ms: 400,
        refill_interval_ms: 40,
        strength_flush_interval_ms: 25,
        fire_step: 30,
        settle_timeout_ms: 300,
        hold_delay_ms: 60,
        retry_pause_ms: 15,
        battery_poll_interval_ms: 100,
    }
}

pub type FakeSession = Rc<DeviceSession<FakeTransport>>;

pub fn make_session(
    config: SessionConfig,
) -> (
    FakeSession,
    Rc<FakeTransport>,
    Rc<RefCell<RecordingSink>>,
    Rc<Executor>,
) {
    let transport = FakeTransport::new();
    let sink = RecordingSink::shared();
    let executor = runtime::executor();
    let session = DeviceSession::new(
        transport.clone(),
        executor.clone(),
        config,
        SessionSettings::default(),
        sink.clone(),
    );
    (session, transport, sink, executor)
}

pub fn element(marker: u8) -> PulseElement {
    PulseElement::new([marker; 4], [50; 4])
}

pub fn pulse(name: &str, marker: u8, elements: usize) -> Rc<Pulse> {
    Rc::new(Pulse::new(name, vec![element(marker); elements]).unwrap())
}

pub fn snapshot(a: u16, b: u16, limit_a: u16, limit_b: u16) -> StrengthSnapshot {
    StrengthSnapshot::new(PerChannel::new(a, b), PerChannel::new(limit_a, limit_b))
}

/// Poll `condition` every few milliseconds until it holds, panicking after
/// roughly two seconds.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        async_io_mini::Timer::after(std::time::Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {what}");
}

pub async fn sleep_ms(ms: u64) {
    async_io_mini::Timer::after(std::time::Duration::from_millis(ms)).await;
}
