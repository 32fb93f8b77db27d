//! Session parameters and the two message shapes that cross the wire.

use chrono::{DateTime, Utc};

use crate::error::ChatError;

/// Who we are and where we are connected. Fixed for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub nickname: String,
    pub host: String,
    pub port: u16,
}

impl Session {
    /// Validate raw operator input. No I/O happens here.
    ///
    /// `port` is taken as text because that is what a connection form hands over.
    pub fn parse(host: &str, port: &str, nickname: &str) -> Result<Self, ChatError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ChatError::InvalidInput("host is empty".to_string()));
        }

        let port = match port.trim().parse::<u16>() {
            Ok(0) | Err(_) => {
                return Err(ChatError::InvalidInput(format!(
                    "port '{}' is not a number between 1 and 65535",
                    port.trim()
                )));
            }
            Ok(p) => p,
        };

        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(ChatError::InvalidInput("nickname is empty".to_string()));
        }

        Ok(Self {
            nickname: nickname.to_string(),
            host: host.to_string(),
            port,
        })
    }

    /// `host:port`, bracketing bare IPv6 literals.
    pub fn addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// One successful, non-empty read from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub raw_bytes: Vec<u8>,
    /// Decoded and trimmed. May be empty for whitespace-only reads.
    pub text: String,
    pub arrival_time: DateTime<Utc>,
}

impl InboundMessage {
    pub fn decode(raw_bytes: Vec<u8>) -> Result<Self, std::str::Utf8Error> {
        let text = std::str::from_utf8(&raw_bytes)?.trim().to_string();
        Ok(Self {
            raw_bytes,
            text,
            arrival_time: Utc::now(),
        })
    }
}

/// A chat line typed by the local operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub nickname: String,
    pub text: String,
}

impl OutboundMessage {
    /// `None` when `text` is blank; blank lines are never sent.
    pub fn new(nickname: &str, text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            nickname: nickname.to_string(),
            text: text.to_string(),
        })
    }

    /// Wire form: `<nickname>: <text>`.
    pub fn to_wire(&self) -> String {
        format!("{}: {}", self.nickname, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_valid_input() {
        let s = Session::parse(" 127.0.0.1 ", "55555", " alice ").unwrap();
        assert_eq!(s.host, "127.0.0.1");
        assert_eq!(s.port, 55555);
        assert_eq!(s.nickname, "alice");
        assert_eq!(s.addr(), "127.0.0.1:55555");
    }

    #[test]
    fn parse_rejects_bad_ports() {
        for port in ["", "abc", "0", "65536", "-1", "12.5"] {
            let err = Session::parse("localhost", port, "alice").unwrap_err();
            assert!(matches!(err, ChatError::InvalidInput(_)), "port {port:?}: {err}");
        }
        assert!(Session::parse("localhost", "65535", "alice").is_ok());
        assert!(Session::parse("localhost", "1", "alice").is_ok());
    }

    #[test]
    fn parse_rejects_blank_nickname_and_host() {
        assert!(matches!(
            Session::parse("localhost", "55555", "   "),
            Err(ChatError::InvalidInput(_))
        ));
        assert!(matches!(
            Session::parse("", "55555", "alice"),
            Err(ChatError::InvalidInput(_))
        ));
    }

    #[test]
    fn ipv6_addr_is_bracketed() {
        let s = Session::parse("::1", "55555", "alice").unwrap();
        assert_eq!(s.addr(), "[::1]:55555");
    }

    #[test]
    fn outbound_wire_format() {
        let msg = OutboundMessage::new("alice", "  hello  ").unwrap();
        assert_eq!(msg.to_wire(), "alice: hello");
        assert!(OutboundMessage::new("alice", " \t\n").is_none());
        assert!(OutboundMessage::new("alice", "").is_none());
    }

    #[test]
    fn inbound_decode_trims_and_keeps_raw() {
        let msg = InboundMessage::decode(b"bob: hi\r\n".to_vec()).unwrap();
        assert_eq!(msg.text, "bob: hi");
        assert_eq!(msg.raw_bytes, b"bob: hi\r\n");
    }

    #[test]
    fn inbound_decode_rejects_invalid_utf8() {
        assert!(InboundMessage::decode(vec![0xff, 0xfe, b'x']).is_err());
    }
}
