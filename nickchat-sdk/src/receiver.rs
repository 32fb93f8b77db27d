//! Steady-state receive loop.
//!
//! One loop per successful handshake, bound to that connection's transport
//! and epoch. It never restarts itself; the next `connect` starts a new one.

use std::sync::Arc;

use crate::client::Inner;
use crate::error::ChatError;
use crate::event::{ChatLine, Event, Origin};
use crate::message::InboundMessage;
use crate::transport::{Connector, Transport, TransportError};

pub(crate) async fn run<C: Connector>(inner: Arc<Inner<C>>, transport: Arc<C::Transport>, epoch: u64) {
    tracing::debug!(epoch, "Receive loop started");
    let max = inner.tuning.max_receive_size;
    let poll = inner.tuning.receive_poll;

    loop {
        if !inner.is_live(epoch) {
            break;
        }
        if inner.listener_gone() {
            tracing::debug!(epoch, "Event receiver dropped, closing connection");
            inner.disconnect(Some(epoch), None).await;
            break;
        }

        match transport.receive(max, poll).await {
            Err(TransportError::TimedOut) => continue,
            Ok(bytes) if bytes.is_empty() => {
                inner.end_session(epoch, ChatError::PeerClosed).await;
                break;
            }
            Ok(bytes) => match InboundMessage::decode(bytes) {
                Ok(msg) if msg.text.is_empty() => {}
                Ok(msg) => {
                    let line = ChatLine::new(Origin::Remote, msg.text, msg.arrival_time);
                    if !inner.deliver(epoch, Event::MessageReceived(line)) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(epoch, error = %e, "Undecodable message");
                    inner.deliver(
                        epoch,
                        Event::MessageReceived(ChatLine::system(format!(
                            "Received a message that is not valid UTF-8 ({e})"
                        ))),
                    );
                }
            },
            // disconnect() closed it under us; nothing left to report.
            Err(TransportError::Closed) if !inner.is_live(epoch) => break,
            Err(e) => {
                inner.end_session(epoch, ChatError::from_io(e)).await;
                break;
            }
        }
    }
    tracing::debug!(epoch, "Receive loop exited");
}
