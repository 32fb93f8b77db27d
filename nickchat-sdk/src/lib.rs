//! # nickchat-sdk
//!
//! Client SDK for a plaintext chat protocol over TCP: open a socket, trade
//! `NICK` for a nickname, then exchange free-text messages until either side
//! hangs up.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use nickchat_sdk::client::ChatClient;
//! use nickchat_sdk::event::Event;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (client, mut events) = ChatClient::tcp();
//! client.connect("127.0.0.1", "55555", "alice")?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         Event::ConnectionStateChanged { state, .. } if state.is_busy() => {}
//!         Event::MessageReceived(line) => println!("{}", line.text),
//!         Event::StatusChanged { text } => eprintln!("{text}"),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`client`]: the connection manager (`connect` / `send` / `disconnect`)
//! - [`handshake`]: the `NICK` exchange
//! - [`transport`]: transport traits and the TCP implementation
//! - [`event`]: events published to the UI layer
//! - [`state`]: lifecycle states and legal transitions
//! - [`message`]: session parameters and wire messages
//! - [`config`]: timeouts and buffer sizes
//! - [`error`]: error taxonomy

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod handshake;
pub mod message;
mod receiver;
pub mod state;
pub mod transport;

pub use client::ChatClient;
pub use error::ChatError;
pub use event::Event;
pub use state::ConnectionState;
