//! Connection manager.
//!
//! This is the main entry point for SDK consumers. A [`ChatClient`] owns the
//! one transport, the lifecycle state and the background tasks, and publishes
//! [`Event`]s on the channel returned by [`ChatClient::new`].
//!
//! ## Concurrency
//!
//! State, session, transport handle and epoch live behind a single
//! `parking_lot::Mutex` that is never held across an `.await`. Every event is
//! published while that lock is held, so the event stream observes
//! transitions in the order they happened and a superseded task can never
//! slip a stale message in after the state moved on.
//!
//! Each `connect` and each `disconnect` bumps the epoch. Background tasks
//! carry the epoch they were started for and stop touching shared state once
//! it no longer matches.
//!
//! ## Reconnection
//!
//! The SDK does not reconnect on its own. Consumers listen for
//! `ConnectionStateChanged { state: Disconnected, .. }` and call
//! [`ChatClient::connect`] again.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::config::Tuning;
use crate::error::ChatError;
use crate::event::{ChatLine, Event, Origin};
use crate::handshake;
use crate::message::{OutboundMessage, Session};
use crate::receiver;
use crate::state::ConnectionState;
use crate::transport::{Connector, TcpConnector, Transport, TransportError};

/// Handle to the connection manager. Cheap to clone; all clones drive the
/// same connection.
pub struct ChatClient<C: Connector = TcpConnector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for ChatClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl ChatClient<TcpConnector> {
    /// Manager over plain TCP with the default timeouts.
    pub fn tcp() -> (Self, mpsc::UnboundedReceiver<Event>) {
        Self::new(TcpConnector, Tuning::default())
    }
}

impl<C: Connector> ChatClient<C> {
    /// Create a manager in the `Disconnected` state.
    ///
    /// Returns the manager and the receiver on which every [`Event`] arrives.
    pub fn new(connector: C, tuning: Tuning) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            connector,
            tuning,
            core: Mutex::new(Core {
                state: ConnectionState::Disconnected,
                epoch: 0,
                session: None,
                transport: None,
                attempt: None,
                events: event_tx,
            }),
            send_lock: tokio::sync::Mutex::new(()),
        });
        (Self { inner }, event_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.core.lock().state
    }

    /// The session of the current or in-flight connection.
    pub fn session(&self) -> Option<Session> {
        self.inner.core.lock().session.clone()
    }

    pub fn tuning(&self) -> &Tuning {
        &self.inner.tuning
    }

    /// Start connecting to `host:port` as `nickname`.
    ///
    /// Input is validated before anything else; a bad port or blank nickname
    /// fails with [`ChatError::InvalidInput`] and leaves the state untouched.
    /// While a connection is live or being set up this fails with
    /// [`ChatError::Busy`].
    ///
    /// Otherwise the state moves to `Connecting` and a background task runs
    /// the TCP connect and the handshake. Its outcome arrives as events.
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, host: &str, port: &str, nickname: &str) -> Result<(), ChatError> {
        let session = Session::parse(host, port, nickname)?;

        let mut core = self.inner.core.lock();
        if core.state.is_busy() {
            return Err(ChatError::Busy(core.state));
        }

        core.epoch += 1;
        let epoch = core.epoch;
        // Disconnected never keeps a transport; drop any leftover before opening another.
        let stale = core.transport.take();
        core.session = Some(session.clone());

        tracing::info!(epoch, addr = %session.addr(), nick = %session.nickname, "Connecting");
        core.emit(Event::status(format!(
            "Connecting to {} as {}...",
            session.addr(),
            session.nickname
        )));
        core.transition(ConnectionState::Connecting, None, None);

        let task = tokio::spawn(run_attempt(self.inner.clone(), session, epoch, stale));
        core.attempt = Some(task.abort_handle());
        Ok(())
    }

    /// Send a chat line as `"<nickname>: <text>"`.
    ///
    /// No-op unless `Connected`, and for blank text. Returns whether the line
    /// went out. A successful send is echoed back as a local
    /// `MessageReceived`; a failed one forces a disconnect.
    pub async fn send(&self, text: &str) -> bool {
        let _serial = self.inner.send_lock.lock().await;

        let (transport, message, epoch) = {
            let core = self.inner.core.lock();
            if core.state != ConnectionState::Connected {
                return false;
            }
            let (Some(transport), Some(session)) = (&core.transport, &core.session) else {
                return false;
            };
            let Some(message) = OutboundMessage::new(&session.nickname, text) else {
                return false;
            };
            (transport.clone(), message, core.epoch)
        };

        let wire = message.to_wire();
        let result = match tokio::time::timeout(
            self.inner.tuning.write_timeout,
            transport.send(wire.as_bytes()),
        )
        .await
        {
            Ok(r) => r,
            Err(_) => Err(TransportError::Io("write timed out".to_string())),
        };

        match result {
            Ok(()) => {
                tracing::debug!(epoch, bytes = wire.len(), "Sent");
                self.inner
                    .deliver(epoch, Event::MessageReceived(ChatLine::new(Origin::Local, wire, Utc::now())))
            }
            // Lost a race with disconnect(); the message was never ours to send.
            Err(TransportError::Closed) if !self.inner.is_live(epoch) => false,
            Err(e) => {
                let err = ChatError::from_io(e);
                tracing::warn!(epoch, error = %err, "Send failed, forcing disconnect");
                self.inner.deliver(
                    epoch,
                    Event::MessageReceived(ChatLine::system(format!(
                        "Send failed: {err}. Forcing disconnect."
                    ))),
                );
                self.inner.disconnect(Some(epoch), Some(err)).await;
                false
            }
        }
    }

    /// Tear the connection down. Idempotent and safe from any state.
    ///
    /// Cancels an in-flight handshake, shuts the transport down in both
    /// directions, closes it, and stops the receive loop.
    pub async fn disconnect(&self) {
        self.inner.disconnect(None, None).await;
    }
}

/// Shared state behind every [`ChatClient`] clone and background task.
pub(crate) struct Inner<C: Connector> {
    connector: C,
    pub(crate) tuning: Tuning,
    core: Mutex<Core<C::Transport>>,
    /// Serializes sends so wire order matches local echo order.
    send_lock: tokio::sync::Mutex<()>,
}

struct Core<T> {
    state: ConnectionState,
    epoch: u64,
    session: Option<Session>,
    transport: Option<Arc<T>>,
    /// Connect + handshake task of the current epoch.
    attempt: Option<AbortHandle>,
    events: mpsc::UnboundedSender<Event>,
}

impl<T> Core<T> {
    fn emit(&self, event: Event) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.events.send(event);
    }

    fn transition(&mut self, next: ConnectionState, error: Option<ChatError>, greeting: Option<String>) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(epoch = self.epoch, from = %self.state, to = %next, "State change");
        self.state = next;
        self.emit(Event::ConnectionStateChanged {
            state: next,
            error,
            greeting,
        });
    }

    fn is_attempt(&self, epoch: u64) -> bool {
        self.epoch == epoch
            && matches!(
                self.state,
                ConnectionState::Connecting | ConnectionState::Handshaking
            )
    }
}

impl<C: Connector> Inner<C> {
    /// Whether `epoch` is the live, connected session.
    pub(crate) fn is_live(&self, epoch: u64) -> bool {
        let core = self.core.lock();
        core.epoch == epoch && core.state == ConnectionState::Connected
    }

    pub(crate) fn listener_gone(&self) -> bool {
        self.core.lock().events.is_closed()
    }

    /// Publish `event` only if `epoch` is still the live session.
    pub(crate) fn deliver(&self, epoch: u64, event: Event) -> bool {
        let core = self.core.lock();
        if core.epoch != epoch || core.state != ConnectionState::Connected {
            tracing::debug!(epoch, current = core.epoch, "Dropping stale event");
            return false;
        }
        core.emit(event);
        true
    }

    /// Tear down the session.
    ///
    /// With `only_epoch` set, does nothing unless that epoch is still current
    /// (a background task reporting on its own connection). `error` is the
    /// reason carried on the final `Disconnected` event.
    pub(crate) async fn disconnect(&self, only_epoch: Option<u64>, error: Option<ChatError>) -> bool {
        let (transport, was) = {
            let mut core = self.core.lock();
            if only_epoch.is_some_and(|e| e != core.epoch) {
                return false;
            }
            let was = core.state;
            if matches!(
                was,
                ConnectionState::Disconnected | ConnectionState::Disconnecting
            ) {
                return false;
            }
            if let Some(attempt) = core.attempt.take() {
                attempt.abort();
            }
            core.epoch += 1;
            tracing::info!(epoch = core.epoch, from = %was, "Disconnecting");
            core.transition(ConnectionState::Disconnecting, None, None);
            (core.transport.take(), was)
        };

        if let Some(transport) = transport {
            // Best effort: the socket may already be broken.
            let _ = tokio::time::timeout(self.tuning.write_timeout, transport.shutdown()).await;
            transport.close().await;
        }

        let mut core = self.core.lock();
        core.session = None;
        let status = if was == ConnectionState::Connected {
            "Disconnected."
        } else {
            "Connection attempt cancelled."
        };
        core.emit(Event::status(status));
        core.transition(ConnectionState::Disconnected, error, None);
        true
    }

    /// The receive loop's exit path for an unexpected end of session.
    pub(crate) async fn end_session(&self, epoch: u64, error: ChatError) {
        tracing::warn!(epoch, error = %error, "Disconnected unexpectedly");
        self.deliver(
            epoch,
            Event::MessageReceived(ChatLine::system(format!("Disconnected unexpectedly: {error}"))),
        );
        self.disconnect(Some(epoch), Some(error)).await;
    }

    /// Make a freshly connected transport reachable by `disconnect()`.
    fn bind(&self, epoch: u64, transport: &Arc<C::Transport>) -> bool {
        let mut core = self.core.lock();
        if !core.is_attempt(epoch) || core.state != ConnectionState::Connecting {
            return false;
        }
        core.transport = Some(transport.clone());
        core.transition(ConnectionState::Handshaking, None, None);
        true
    }

    fn establish(&self, epoch: u64, greeting: Option<String>) -> bool {
        let mut core = self.core.lock();
        if !core.is_attempt(epoch) || core.state != ConnectionState::Handshaking {
            return false;
        }
        core.attempt = None;
        let nick = core.session.as_ref().map(|s| s.nickname.clone()).unwrap_or_default();
        tracing::info!(epoch, nick = %nick, greeting = ?greeting, "Connected");
        let status = match &greeting {
            Some(g) => format!("Connected as {nick} ({g})"),
            None => format!("Connected as {nick}"),
        };
        core.emit(Event::status(status));
        core.transition(ConnectionState::Connected, None, greeting);
        true
    }

    /// Close out a failed attempt: close its transport first, then report.
    async fn fail(&self, epoch: u64, error: ChatError) {
        let transport = {
            let mut core = self.core.lock();
            if !core.is_attempt(epoch) {
                return;
            }
            core.transport.take()
        };
        if let Some(transport) = transport {
            transport.close().await;
        }

        let mut core = self.core.lock();
        if !core.is_attempt(epoch) {
            return;
        }
        tracing::warn!(epoch, error = %error, "Connection attempt failed");
        core.attempt = None;
        core.session = None;
        core.emit(Event::status(format!("Connection failed: {error}")));
        core.transition(ConnectionState::Disconnected, Some(error), None);
    }
}

/// Background task for one `connect` call: TCP connect, handshake, then hand
/// the transport to a fresh receive loop.
async fn run_attempt<C: Connector>(
    inner: Arc<Inner<C>>,
    session: Session,
    epoch: u64,
    stale: Option<Arc<C::Transport>>,
) {
    if let Some(stale) = stale {
        stale.close().await;
    }

    let tuning = inner.tuning.clone();
    let transport = match inner
        .connector
        .connect(&session.host, session.port, tuning.connect_timeout)
        .await
    {
        Ok(t) => Arc::new(t),
        Err(e) => {
            inner.fail(epoch, ChatError::from_connect(e, &session.addr())).await;
            return;
        }
    };

    if !inner.bind(epoch, &transport) {
        // Cancelled while the TCP connect was in flight.
        transport.close().await;
        return;
    }

    match handshake::negotiate(&*transport, &session.nickname, &tuning).await {
        Ok(greeting) => {
            if inner.establish(epoch, greeting) {
                tokio::spawn(receiver::run(inner.clone(), transport, epoch));
            } else {
                transport.close().await;
            }
        }
        Err(e) => inner.fail(epoch, e).await,
    }
}
