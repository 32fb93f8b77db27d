//! Byte-stream transport consumed by the connection manager.
//!
//! The manager only needs a narrow capability set: open, write, read with a
//! deadline, shut down, close. [`TcpConnector`] / [`TcpTransport`] provide it
//! over tokio's `TcpStream`; tests plug in scripted fakes.
//!
//! Deadlines are per call. Nothing configured for one phase (connect,
//! handshake, steady-state polling) survives into the next.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, watch};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection refused")]
    Refused,
    #[error("timed out")]
    TimedOut,
    #[error("address invalid: {0}")]
    AddressInvalid(String),
    /// Closed locally via [`Transport::close`].
    #[error("transport closed")]
    Closed,
    #[error("{0}")]
    Io(String),
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => TransportError::Refused,
            io::ErrorKind::TimedOut => TransportError::TimedOut,
            _ => TransportError::Io(e.to_string()),
        }
    }
}

/// Opens transports.
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}

/// One open byte stream. Shared between the receive loop and senders, so
/// every method takes `&self`.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, bytes: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Read at most `max_bytes`, waiting at most `timeout`.
    ///
    /// `Ok` with an empty buffer means the peer closed its side.
    /// `Err(TimedOut)` means nothing arrived in time and is not fatal.
    fn receive(
        &self,
        max_bytes: usize,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Signal end-of-stream to the peer (FIN) and stop reading. Best effort.
    fn shutdown(&self) -> impl Future<Output = ()> + Send;

    /// Release the socket. Idempotent; wakes any pending `receive`/`send`
    /// with [`TransportError::Closed`].
    fn close(&self) -> impl Future<Output = ()> + Send;
}

// ── TCP ──

#[derive(Debug, Clone, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<TcpTransport, TransportError> {
        // One deadline covers resolution and every address tried.
        let stream = tokio::time::timeout(timeout, open_stream(host, port))
            .await
            .map_err(|_| TransportError::TimedOut)??;

        let _ = stream.set_nodelay(true);
        let peer = stream.peer_addr().ok();
        tracing::debug!(?peer, "TCP connected");
        Ok(TcpTransport::new(stream))
    }
}

async fn open_stream(host: &str, port: u16) -> Result<TcpStream, TransportError> {
    tracing::debug!(host, port, "Resolving...");
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| TransportError::AddressInvalid(format!("{host}: {e}")))?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::AddressInvalid(format!("{host}: no addresses")));
    }

    let mut last = TransportError::AddressInvalid(host.to_string());
    for addr in &addrs {
        match TcpStream::connect(addr).await {
            Ok(s) => return Ok(s),
            Err(e) => {
                tracing::debug!(%addr, error = %e, "TCP connect attempt failed");
                last = e.into();
            }
        }
    }
    Err(last)
}

pub struct TcpTransport {
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    closed: watch::Sender<bool>,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        let (closed, _) = watch::channel(false);
        Self {
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Resolves once `close()` has been called.
async fn wait_closed(mut rx: watch::Receiver<bool>) {
    // Err means the sender is gone, i.e. the transport itself was dropped.
    let _ = rx.wait_for(|closed| *closed).await;
}

impl Transport for TcpTransport {
    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(TransportError::Closed);
        }
        tokio::select! {
            _ = wait_closed(closed) => Err(TransportError::Closed),
            result = async {
                let mut guard = self.writer.lock().await;
                let writer = guard.as_mut().ok_or(TransportError::Closed)?;
                writer.write_all(bytes).await?;
                writer.flush().await?;
                Ok::<_, TransportError>(())
            } => result,
        }
    }

    async fn receive(&self, max_bytes: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(TransportError::Closed);
        }
        tokio::select! {
            _ = wait_closed(closed) => Err(TransportError::Closed),
            result = async {
                let mut guard = self.reader.lock().await;
                let reader = guard.as_mut().ok_or(TransportError::Closed)?;
                let mut buf = vec![0u8; max_bytes];
                let n = tokio::time::timeout(timeout, reader.read(&mut buf))
                    .await
                    .map_err(|_| TransportError::TimedOut)??;
                buf.truncate(n);
                Ok::<_, TransportError>(buf)
            } => result,
        }
    }

    async fn shutdown(&self) {
        if let Some(writer) = self.writer.lock().await.as_mut()
            && let Err(e) = writer.shutdown().await
        {
            tracing::debug!(error = %e, "Write shutdown failed (socket already broken?)");
        }
        // Dropping the read half stops further reads on our side. A reader
        // mid-poll keeps it until close() wakes it.
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
    }

    async fn close(&self) {
        self.closed.send_replace(true);
        // Pending I/O has been woken by the flag above, so these locks free up promptly.
        self.reader.lock().await.take();
        self.writer.lock().await.take();
    }
}
