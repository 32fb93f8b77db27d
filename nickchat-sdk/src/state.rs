//! Connection lifecycle states.
//!
//! ```text
//!  Disconnected ──connect──▶ Connecting ──tcp up──▶ Handshaking ──accepted──▶ Connected
//!       ▲                        │                       │                       │
//!       │                        └──── failure ──────────┴───────────┐     disconnect
//!       │                                                            ▼           ▼
//!       └──────────────────────────────────────────────────── Disconnecting ◀────┘
//! ```
//!
//! Failures during `Connecting`/`Handshaking` go straight back to
//! `Disconnected`; an operator `disconnect()` in any live state passes through
//! `Disconnecting`.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport; initial and terminal state.
    Disconnected,
    /// TCP connect in flight.
    Connecting,
    /// Transport up; waiting on the `NICK` exchange.
    Handshaking,
    /// Steady state: send and receive allowed.
    Connected,
    /// Transport being shut down.
    Disconnecting,
}

impl ConnectionState {
    /// Whether the manager may move from `self` to `next`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Handshaking)
                | (Connecting, Disconnected)
                | (Connecting, Disconnecting)
                | (Handshaking, Connected)
                | (Handshaking, Disconnected)
                | (Handshaking, Disconnecting)
                | (Connected, Disconnecting)
                | (Disconnecting, Disconnected)
        )
    }

    /// States that resolve on their own to `Connected` or `Disconnected`.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Handshaking
                | ConnectionState::Disconnecting
        )
    }

    /// States in which a new `connect` must be refused.
    pub fn is_busy(self) -> bool {
        self != ConnectionState::Disconnected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        };
        f.write_str(s)
    }
}
