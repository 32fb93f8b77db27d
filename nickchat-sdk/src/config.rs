//! Timeouts and buffer sizes used by the connection manager.

use std::time::Duration;

/// Default server port.
pub const DEFAULT_PORT: u16 = 55555;
/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Nickname offered when the operator gives none.
pub const DEFAULT_NICK: &str = "user";

/// Fixed tuning knobs. Every network call in the SDK is bounded by one of these.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// TCP connect deadline.
    pub connect_timeout: Duration,
    /// Wait for the server's opening `NICK`.
    pub handshake_timeout: Duration,
    /// Wait for an optional reply after sending our nickname.
    /// Silence for this long counts as acceptance.
    pub reply_timeout: Duration,
    /// Deadline for a single write (nickname or chat line).
    pub write_timeout: Duration,
    /// Steady-state receive poll. Bounds how long the receive loop can go
    /// without re-checking whether its connection is still current.
    pub receive_poll: Duration,
    /// Largest single read; one read is one message.
    pub max_receive_size: usize,
    /// Largest handshake read.
    pub handshake_read_size: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(5),
            reply_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(3),
            receive_poll: Duration::from_millis(500),
            max_receive_size: 4096,
            handshake_read_size: 1024,
        }
    }
}
