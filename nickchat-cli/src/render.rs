//! Plain-text rendering of chat lines for the terminal.
//!
//! Local lines sit on the right, remote lines on the left, system notices
//! are marked with `*`. The `"<nick>:"` prefix is stripped from the bubble
//! text; remote senders keep a short label so the operator can tell them
//! apart.

use chrono::{DateTime, Local, Utc};
use nickchat_sdk::event::{ChatLine, Origin};

/// Column width used for right-aligning local lines.
pub const WIDTH: usize = 72;

/// Split `"bob: hi"` into `(Some("bob"), "hi")`. Text without a colon is
/// returned whole.
pub fn split_sender(text: &str) -> (Option<&str>, &str) {
    match text.split_once(':') {
        Some((sender, body)) => (Some(sender.trim()), body.trim()),
        None => (None, text.trim()),
    }
}

pub fn clock(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

pub fn line(line: &ChatLine) -> String {
    let time = clock(line.at);
    match line.origin {
        Origin::Local => {
            let (_, body) = split_sender(&line.text);
            let bubble = format!("{body}  {time}");
            format!("{bubble:>WIDTH$}")
        }
        Origin::Remote => match split_sender(&line.text) {
            (Some(sender), body) if !sender.is_empty() => format!("{time}  {sender} | {body}"),
            (_, body) => format!("{time}  {body}"),
        },
        Origin::System => format!("{time}  * {}", line.text),
    }
}

pub fn status(text: &str) -> String {
    format!("-- {text}")
}
