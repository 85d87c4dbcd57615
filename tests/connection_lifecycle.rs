//! Integration tests: connection state machine driven by scripted
//! transport links — happy path, drop recovery policies, and faults.

mod common;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use common::{connection_states, fast_config, sleep_ms, snapshot, wait_until, RecordingSink};
use pulselink::adapters::radio::{RadioAdapter, RadioEvent, RadioLink};
use pulselink::adapters::relay::{RelayAdapter, RelayEvent, RelayLink};
use pulselink::channel::Channel;
use pulselink::connection::ConnectionState;
use pulselink::error::TransportError;
use pulselink::pulse::PulseElement;
use pulselink::runtime::{self, drive};
use pulselink::session::service::DeviceSession;
use pulselink::session::settings::SessionSettings;

use ConnectionState::{Connected, Connecting, Disconnected, Waiting};

// ── Scripted relay link ───────────────────────────────────────

struct ScriptedRelay {
    events: RefCell<VecDeque<RelayEvent>>,
    rebind_ok: bool,
    rebinds: Cell<usize>,
    closed: Cell<bool>,
}

impl ScriptedRelay {
    fn new(events: Vec<RelayEvent>, rebind_ok: bool) -> Self {
        Self {
            events: RefCell::new(events.into()),
            rebind_ok,
            rebinds: Cell::new(0),
            closed: Cell::new(false),
        }
    }
}

impl RelayLink for ScriptedRelay {
    async fn start(&self) -> Result<(), TransportError> {
        Ok(())
    }
    async fn shutdown(&self) {
        self.closed.set(true);
    }
    async fn rebind(&self) -> Result<(), TransportError> {
        self.rebinds.set(self.rebinds.get() + 1);
        if self.rebind_ok {
            Ok(())
        } else {
            Err(TransportError::ConnectionLost)
        }
    }
    async fn next_event(&self) -> RelayEvent {
        loop {
            if let Some(event) = self.events.borrow_mut().pop_front() {
                return event;
            }
            if self.closed.get() {
                return RelayEvent::Closed;
            }
            common::sleep_ms(5).await;
        }
    }
    async fn set_strength(&self, _c: Channel, _v: u16) -> Result<(), TransportError> {
        Ok(())
    }
    async fn adjust_strength(&self, _c: Channel, _d: i16) -> Result<(), TransportError> {
        Ok(())
    }
    async fn queue_elements(
        &self,
        _c: Channel,
        _e: &[PulseElement],
        _r: u32,
    ) -> Result<(), TransportError> {
        Ok(())
    }
    async fn clear_queue(&self, _c: Channel) -> Result<(), TransportError> {
        Ok(())
    }
}

fn relay_session(
    events: Vec<RelayEvent>,
    rebind_ok: bool,
) -> (
    Rc<RelayAdapter<ScriptedRelay>>,
    Rc<DeviceSession<RelayAdapter<ScriptedRelay>>>,
    Rc<RefCell<RecordingSink>>,
    Rc<runtime::Executor>,
) {
    let adapter = Rc::new(RelayAdapter::new(ScriptedRelay::new(events, rebind_ok)));
    let sink = RecordingSink::shared();
    let executor = runtime::executor();
    let session = DeviceSession::new(
        adapter.clone(),
        executor.clone(),
        fast_config(),
        SessionSettings::default(),
        sink.clone(),
    );
    (adapter, session, sink, executor)
}

// ── Relay lifecycle ───────────────────────────────────────────

#[test]
fn relay_happy_path_reaches_connected_without_skips() {
    let (adapter, session, sink, ex) = relay_session(
        vec![
            RelayEvent::Bound,
            RelayEvent::StrengthReport(snapshot(5, 5, 100, 100)),
        ],
        true,
    );

    drive(&ex, async {
        let a = adapter.clone();
        let s = session.clone();
        let run = ex.spawn(async move { a.run(&s).await });

        wait_until("connected", || session.state() == Connected).await;
        assert!(session.snapshot().is_some(), "strength report was applied");

        adapter.stop().await;
        run.await.unwrap();
    });

    assert_eq!(
        connection_states(&sink),
        vec![Connecting, Waiting, Connected, Disconnected]
    );
}

#[test]
fn relay_peer_drop_rebinds_once_and_recovers() {
    let (adapter, session, sink, ex) = relay_session(
        vec![RelayEvent::Bound, RelayEvent::PeerDropped],
        true,
    );

    drive(&ex, async {
        let a = adapter.clone();
        let s = session.clone();
        let run = ex.spawn(async move { a.run(&s).await });

        wait_until("reconnected after drop", || {
            connection_states(&sink) == vec![Connecting, Waiting, Connected, Waiting, Connected]
        })
        .await;
        assert_eq!(adapter.link().rebinds.get(), 1);

        adapter.stop().await;
        run.await.unwrap();
    });

    assert_eq!(*connection_states(&sink).last().unwrap(), Disconnected);
}

#[test]
fn relay_failed_rebind_stays_waiting() {
    let (adapter, session, sink, ex) = relay_session(
        vec![RelayEvent::Bound, RelayEvent::PeerDropped],
        false,
    );

    drive(&ex, async {
        let a = adapter.clone();
        let s = session.clone();
        let run = ex.spawn(async move { a.run(&s).await });

        wait_until("dropped to waiting", || {
            connection_states(&sink) == vec![Connecting, Waiting, Connected, Waiting]
        })
        .await;
        sleep_ms(60).await;
        // Single-attempt policy: no further rebinds, still waiting.
        assert_eq!(adapter.link().rebinds.get(), 1);
        assert_eq!(session.state(), Waiting);

        adapter.stop().await;
        run.await.unwrap();
    });

    let states = connection_states(&sink);
    assert_eq!(
        states,
        vec![Connecting, Waiting, Connected, Waiting, Disconnected]
    );
}

#[test]
fn relay_fault_surfaces_error_with_message() {
    let (adapter, session, sink, ex) = relay_session(
        vec![
            RelayEvent::Bound,
            RelayEvent::Fault("relay tunnel collapsed".into()),
        ],
        true,
    );

    drive(&ex, async {
        let a = adapter.clone();
        let s = session.clone();
        let run = ex.spawn(async move { a.run(&s).await });
        let err = run.await.unwrap_err();
        assert!(err.to_string().contains("relay tunnel collapsed"));
    });

    assert_eq!(session.state(), ConnectionState::Error);
    let carried = sink.borrow().events.iter().any(|e| {
        matches!(
            e,
            pulselink::session::events::SessionEvent::ConnectionChanged {
                state: ConnectionState::Error,
                message: Some(msg)
            } if msg.contains("relay tunnel collapsed")
        )
    });
    assert!(carried, "error state must carry the fault message");
}

// ── Scripted radio link ───────────────────────────────────────

struct ScriptedRadio {
    events: RefCell<VecDeque<RadioEvent>>,
    connect_plan: RefCell<VecDeque<Result<(), TransportError>>>,
    connect_attempts: Cell<usize>,
    battery: u8,
}

impl ScriptedRadio {
    fn new(events: Vec<RadioEvent>, connect_plan: Vec<Result<(), TransportError>>) -> Self {
        Self {
            events: RefCell::new(events.into()),
            connect_plan: RefCell::new(connect_plan.into()),
            connect_attempts: Cell::new(0),
            battery: 77,
        }
    }
}

impl RadioLink for ScriptedRadio {
    async fn power_on(&self) -> Result<(), TransportError> {
        Ok(())
    }
    async fn connect(&self) -> Result<(), TransportError> {
        self.connect_attempts.set(self.connect_attempts.get() + 1);
        self.connect_plan.borrow_mut().pop_front().unwrap_or(Ok(()))
    }
    async fn disconnect(&self) {}
    async fn next_event(&self) -> RadioEvent {
        loop {
            if let Some(event) = self.events.borrow_mut().pop_front() {
                return event;
            }
            common::sleep_ms(5).await;
        }
    }
    async fn write_strength(&self, _c: Channel, _v: u16) -> Result<(), TransportError> {
        Ok(())
    }
    async fn adjust_strength(&self, _c: Channel, _d: i16) -> Result<(), TransportError> {
        Ok(())
    }
    async fn write_elements(
        &self,
        _c: Channel,
        _e: &[PulseElement],
        _r: u32,
    ) -> Result<(), TransportError> {
        Ok(())
    }
    async fn erase_queue(&self, _c: Channel) -> Result<(), TransportError> {
        Ok(())
    }
    async fn read_battery(&self) -> Result<u8, TransportError> {
        Ok(self.battery)
    }
}

fn radio_session(
    events: Vec<RadioEvent>,
    connect_plan: Vec<Result<(), TransportError>>,
) -> (
    Rc<RadioAdapter<ScriptedRadio>>,
    Rc<DeviceSession<RadioAdapter<ScriptedRadio>>>,
    Rc<RefCell<RecordingSink>>,
    Rc<runtime::Executor>,
) {
    let adapter = Rc::new(RadioAdapter::new(ScriptedRadio::new(events, connect_plan)));
    let sink = RecordingSink::shared();
    let executor = runtime::executor();
    let session = DeviceSession::new(
        adapter.clone(),
        executor.clone(),
        fast_config(),
        SessionSettings::default(),
        sink.clone(),
    );
    (adapter, session, sink, executor)
}

// ── Radio lifecycle ───────────────────────────────────────────

#[test]
fn radio_retries_unbounded_until_bound() {
    use TransportError::ConnectionRefused;
    let (adapter, session, sink, ex) = radio_session(
        vec![],
        vec![Err(ConnectionRefused), Err(ConnectionRefused), Err(ConnectionRefused), Ok(())],
    );

    drive(&ex, async {
        let a = adapter.clone();
        let s = session.clone();
        let run = ex.spawn(async move { a.run(&s).await });

        wait_until("bound after retries", || session.state() == Connected).await;
        assert!(adapter.link().connect_attempts.get() >= 4);

        adapter.stop();
        run.await.unwrap();
    });

    // Retries happen entirely inside Waiting — never Disconnected.
    assert_eq!(
        connection_states(&sink),
        vec![Connecting, Waiting, Connected, Disconnected]
    );
}

#[test]
fn radio_drop_reenters_waiting_and_reconnects() {
    use TransportError::ConnectionRefused;
    let (adapter, session, sink, ex) = radio_session(
        vec![
            RadioEvent::StrengthReport(snapshot(1, 1, 100, 100)),
            RadioEvent::Dropped,
        ],
        vec![Ok(()), Err(ConnectionRefused), Err(ConnectionRefused), Ok(())],
    );

    drive(&ex, async {
        let a = adapter.clone();
        let s = session.clone();
        let run = ex.spawn(async move { a.run(&s).await });

        wait_until("reconnected after drop", || {
            connection_states(&sink) == vec![Connecting, Waiting, Connected, Waiting, Connected]
        })
        .await;
        assert!(adapter.link().connect_attempts.get() >= 4);

        adapter.stop();
        run.await.unwrap();
    });
}

#[test]
fn radio_polls_battery_while_bound() {
    use pulselink::session::events::SessionEvent;
    let (adapter, session, sink, ex) = radio_session(vec![], vec![Ok(())]);

    drive(&ex, async {
        let a = adapter.clone();
        let s = session.clone();
        let run = ex.spawn(async move { a.run(&s).await });

        // fast_config polls every 100ms.
        wait_until("battery report", || {
            sink.borrow()
                .events
                .iter()
                .any(|e| matches!(e, SessionEvent::BatteryLevel(77)))
        })
        .await;

        adapter.stop();
        run.await.unwrap();
    });
}

#[test]
fn radio_fault_surfaces_error() {
    let (adapter, session, _sink, ex) = radio_session(
        vec![RadioEvent::Fault("radio firmware wedged".into())],
        vec![Ok(())],
    );

    drive(&ex, async {
        let a = adapter.clone();
        let s = session.clone();
        let run = ex.spawn(async move { a.run(&s).await });
        let err = run.await.unwrap_err();
        assert!(err.to_string().contains("radio firmware wedged"));
    });
    assert_eq!(session.state(), ConnectionState::Error);
}

// ── Direct state-machine misuse ───────────────────────────────

#[test]
fn illegal_transitions_are_ignored() {
    let (_adapter, session, sink, ex) = relay_session(vec![], true);
    drive(&ex, async {
        assert!(!session.transition(Connected, None), "skip to Connected must be rejected");
        assert!(!session.transition(Waiting, None), "skip to Waiting must be rejected");
        assert_eq!(session.state(), Disconnected);

        assert!(session.transition(Connecting, None));
        assert!(!session.transition(Connected, None), "Connecting cannot skip Waiting");
        session.shutdown();
    });
    assert_eq!(connection_states(&sink), vec![Connecting, Disconnected]);
}
