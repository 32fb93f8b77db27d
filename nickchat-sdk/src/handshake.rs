//! The `NICK` handshake.
//!
//! ```text
//! server: NICK
//! client: <nickname>
//! server: NICK_TAKEN | <welcome text> | (silence)
//! ```
//!
//! Silence for the reply window counts as acceptance. A server that is merely
//! slow will therefore be treated as having accepted us, and its late
//! `NICK_TAKEN` will show up as an ordinary chat line.

use crate::config::Tuning;
use crate::error::ChatError;
use crate::transport::{Transport, TransportError};

/// Token the server opens with.
pub const NICK_REQUEST: &str = "NICK";
/// Rejection reply.
pub const NICK_TAKEN: &str = "NICK_TAKEN";

/// Run the handshake on a freshly connected transport.
///
/// Returns the server's optional reply text (e.g. a welcome line) on success.
/// On error the caller closes the transport.
pub async fn negotiate<T: Transport>(
    transport: &T,
    nickname: &str,
    tuning: &Tuning,
) -> Result<Option<String>, ChatError> {
    let opening = match transport
        .receive(tuning.handshake_read_size, tuning.handshake_timeout)
        .await
    {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(TransportError::TimedOut) => return Err(ChatError::HandshakeTimeout),
        Err(e) => return Err(ChatError::from_io(e)),
    };
    if opening != NICK_REQUEST {
        tracing::debug!(reply = %opening, "Server did not open with NICK");
        return Err(ChatError::HandshakeFailed(opening));
    }

    tracing::debug!(nick = %nickname, "Sending nickname");
    match tokio::time::timeout(tuning.write_timeout, transport.send(nickname.as_bytes())).await {
        Ok(result) => result.map_err(ChatError::from_io)?,
        Err(_) => return Err(ChatError::HandshakeTimeout),
    }

    match transport
        .receive(tuning.handshake_read_size, tuning.reply_timeout)
        .await
    {
        Err(TransportError::TimedOut) => {
            tracing::debug!("No reply to nickname; assuming accepted");
            Ok(None)
        }
        Err(e) => Err(ChatError::from_io(e)),
        // The server hung up right after reading our nickname.
        Ok(bytes) if bytes.is_empty() => Err(ChatError::PeerClosed),
        Ok(bytes) => {
            let reply = String::from_utf8_lossy(&bytes).trim().to_string();
            if reply == NICK_TAKEN {
                Err(ChatError::NicknameTaken(nickname.to_string()))
            } else if reply.is_empty() {
                Ok(None)
            } else {
                Ok(Some(reply))
            }
        }
    }
}
