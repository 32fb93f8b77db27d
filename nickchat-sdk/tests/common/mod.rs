//! Shared helpers for nickchat-sdk integration tests.
//!
//! [`ScriptedConnector`] hands out in-memory transports that replay a fixed
//! list of reads and record everything written to them.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nickchat_sdk::config::Tuning;
use nickchat_sdk::event::{ChatLine, Event, Origin};
use nickchat_sdk::state::ConnectionState;
use nickchat_sdk::transport::{Connector, Transport, TransportError};
use tokio::sync::{mpsc, watch};

/// Upper bound on any single wait in a test.
pub const TEST_WAIT: Duration = Duration::from_secs(5);

/// Route SDK logs through the test harness; `RUST_LOG=nickchat_sdk=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fast_tuning() -> Tuning {
    Tuning {
        connect_timeout: Duration::from_millis(500),
        handshake_timeout: Duration::from_millis(300),
        reply_timeout: Duration::from_millis(100),
        write_timeout: Duration::from_millis(500),
        receive_poll: Duration::from_millis(20),
        ..Tuning::default()
    }
}

/// One scripted outcome for a `receive` call.
#[derive(Debug, Clone)]
pub enum Step {
    Data(Vec<u8>),
    /// Nothing arrives: the read waits out its timeout.
    Silence,
    /// Zero-length read.
    Eof,
    Fail(String),
}

impl Step {
    pub fn text(s: &str) -> Self {
        Step::Data(s.as_bytes().to_vec())
    }
}

/// What the next `connect` call will do.
#[derive(Debug, Clone)]
pub struct Script {
    pub connect: Result<(), TransportError>,
    pub connect_delay: Duration,
    pub reads: Vec<Step>,
    /// Writes after this many successful ones fail.
    pub writes_before_failure: Option<usize>,
}

impl Script {
    pub fn reads(reads: Vec<Step>) -> Self {
        Self {
            connect: Ok(()),
            connect_delay: Duration::ZERO,
            reads,
            writes_before_failure: None,
        }
    }

    pub fn refused() -> Self {
        Self {
            connect: Err(TransportError::Refused),
            ..Self::reads(Vec::new())
        }
    }

    /// `NICK`, then silence through the reply window, then `rest`.
    pub fn accepted_then(rest: Vec<Step>) -> Self {
        let mut reads = vec![Step::text("NICK"), Step::Silence];
        reads.extend(rest);
        Self::reads(reads)
    }
}

/// Observations of one transport instance.
#[derive(Debug, Default)]
pub struct Probe {
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub closed: AtomicBool,
    pub shutdowns: AtomicUsize,
    pub receives: AtomicUsize,
}

impl Probe {
    pub fn sent_text(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn receive_count(&self) -> usize {
        self.receives.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct ConnectorState {
    scripts: Mutex<VecDeque<Script>>,
    probes: Mutex<Vec<Arc<Probe>>>,
    attempts: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct ScriptedConnector(Arc<ConnectorState>);

impl ScriptedConnector {
    pub fn new(scripts: Vec<Script>) -> Self {
        let c = Self::default();
        c.0.scripts.lock().unwrap().extend(scripts);
        c
    }

    /// Probe of the n-th transport handed out.
    pub fn probe(&self, n: usize) -> Arc<Probe> {
        self.0.probes.lock().unwrap()[n].clone()
    }

    pub fn transports(&self) -> usize {
        self.0.probes.lock().unwrap().len()
    }

    pub fn attempts(&self) -> usize {
        self.0.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(
        &self,
        _host: &str,
        _port: u16,
        timeout: Duration,
    ) -> Result<ScriptedTransport, TransportError> {
        self.0.attempts.fetch_add(1, Ordering::SeqCst);
        let script = self
            .0
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Script::refused);

        if script.connect_delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(TransportError::TimedOut);
        }
        tokio::time::sleep(script.connect_delay).await;
        script.connect.clone()?;

        let probe = Arc::new(Probe::default());
        self.0.probes.lock().unwrap().push(probe.clone());
        let (closed, _) = watch::channel(false);
        Ok(ScriptedTransport {
            reads: Mutex::new(script.reads.into_iter().collect()),
            writes_before_failure: script.writes_before_failure,
            probe,
            closed,
        })
    }
}

pub struct ScriptedTransport {
    reads: Mutex<VecDeque<Step>>,
    writes_before_failure: Option<usize>,
    probe: Arc<Probe>,
    closed: watch::Sender<bool>,
}

impl ScriptedTransport {
    async fn wait_closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|c| *c).await;
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if *self.closed.borrow() {
            return Err(TransportError::Closed);
        }
        let mut sent = self.probe.sent.lock().unwrap();
        if self.writes_before_failure.is_some_and(|n| sent.len() >= n) {
            return Err(TransportError::Io("broken pipe".to_string()));
        }
        sent.push(bytes.to_vec());
        Ok(())
    }

    async fn receive(&self, max_bytes: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        if *self.closed.borrow() {
            return Err(TransportError::Closed);
        }
        self.probe.receives.fetch_add(1, Ordering::SeqCst);
        // Exhausted scripts behave like a quiet server.
        let step = self.reads.lock().unwrap().pop_front().unwrap_or(Step::Silence);
        match step {
            Step::Data(mut bytes) => {
                bytes.truncate(max_bytes);
                Ok(bytes)
            }
            Step::Eof => Ok(Vec::new()),
            Step::Fail(e) => Err(TransportError::Io(e)),
            Step::Silence => {
                tokio::select! {
                    _ = self.wait_closed() => Err(TransportError::Closed),
                    _ = tokio::time::sleep(timeout) => Err(TransportError::TimedOut),
                }
            }
        }
    }

    async fn shutdown(&self) {
        self.probe.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    async fn close(&self) {
        self.closed.send_replace(true);
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}

// ── Event helpers ──

pub async fn next_event(events: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(TEST_WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Collect events up to and including the first state change to `state`.
pub async fn until_state(events: &mut mpsc::UnboundedReceiver<Event>, state: ConnectionState) -> Vec<Event> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = matches!(&event, Event::ConnectionStateChanged { state: s, .. } if *s == state);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Drain whatever arrives within `window`.
pub async fn drain_for(events: &mut mpsc::UnboundedReceiver<Event>, window: Duration) -> Vec<Event> {
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.recv()).await {
        seen.push(event);
    }
    seen
}

pub fn states(events: &[Event]) -> Vec<ConnectionState> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::ConnectionStateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

pub fn lines(events: &[Event], origin: Origin) -> Vec<ChatLine> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::MessageReceived(line) if line.origin == origin => Some(line.clone()),
            _ => None,
        })
        .collect()
}

/// Every state change must be a legal step from the previous one.
pub fn assert_legal(from: ConnectionState, events: &[Event]) {
    let mut current = from;
    for next in states(events) {
        assert!(
            current.can_transition_to(next),
            "illegal transition {current} -> {next} in {events:#?}"
        );
        current = next;
    }
}
