//! nickchat: terminal client for nickchat servers.
//!
//! Usage:
//!   nickchat --host 127.0.0.1 --port 55555 --nick alice
//!
//! Then type to chat, or use `/connect`, `/disconnect`, `/quit`.
//! With `--json` every SDK event is printed as one JSON line on stdout.

mod command;
mod config;
mod render;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use nickchat_sdk::client::ChatClient;
use nickchat_sdk::error::ChatError;
use nickchat_sdk::event::Event;
use nickchat_sdk::state::ConnectionState;

use command::Command;
use config::{Config, Target};

/// Pause before re-offering the prompt after a failed attempt.
const RETRY_PROMPT_DELAY: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "nickchat", version, about = "Terminal client for nickchat servers")]
struct Args {
    /// Server host. Default: last used, else 127.0.0.1
    #[arg(long, env = "NICKCHAT_HOST")]
    host: Option<String>,

    /// Server port. Default: last used, else 55555
    #[arg(long, env = "NICKCHAT_PORT")]
    port: Option<String>,

    /// Nickname. Default: last used, else "user"
    #[arg(long, env = "NICKCHAT_NICK")]
    nick: Option<String>,

    /// Print SDK events as JSON lines instead of chat text
    #[arg(long)]
    json: bool,

    /// Don't connect on start; wait for /connect
    #[arg(long)]
    no_autoconnect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs with NICKCHAT_LOG_JSON=1, human-readable otherwise. Always stderr.
    let json_logs = std::env::var("NICKCHAT_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nickchat=warn"));
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let args = Args::parse();
    let config = Config::load();
    let target = config.resolve(args.host, args.port, args.nick);
    tracing::debug!(host = %target.host, port = %target.port, nick = %target.nick, "Starting");

    let (client, events) = ChatClient::tcp();
    let mut ui = Ui {
        client,
        config,
        target,
        json: args.json,
        prompt_at: None,
        last_state: ConnectionState::Disconnected,
        quitting: false,
    };

    if args.no_autoconnect {
        ui.prompt();
    } else {
        ui.connect(None, None, None);
    }
    ui.run(events).await
}

struct Ui {
    client: ChatClient,
    config: Config,
    /// Values the next `/connect` falls back to.
    target: Target,
    json: bool,
    /// When set, re-show the connection prompt at this instant.
    prompt_at: Option<Instant>,
    last_state: ConnectionState,
    quitting: bool,
}

impl Ui {
    async fn run(&mut self, mut events: mpsc::UnboundedReceiver<Event>) -> Result<()> {
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let prompt_at = self.prompt_at;
            tokio::select! {
                line = stdin.next_line() => match line? {
                    Some(line) => {
                        if !self.handle_input(&line).await {
                            break;
                        }
                    }
                    // stdin closed
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event)?,
                _ = tokio::time::sleep_until(prompt_at.unwrap_or_else(Instant::now)), if prompt_at.is_some() => {
                    self.prompt_at = None;
                    self.prompt();
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        self.quitting = true;
        self.client.disconnect().await;
        // Flush the teardown events.
        while let Ok(event) = events.try_recv() {
            self.handle_event(event)?;
        }
        Ok(())
    }

    /// Chat output. Goes to stderr in JSON mode so stdout stays machine-readable.
    fn say(&self, text: &str) {
        if self.json {
            eprintln!("{text}");
        } else {
            println!("{text}");
        }
    }

    fn prompt(&self) {
        let Target { host, port, nick } = &self.target;
        self.say(&format!(
            "Not connected. /connect {host} {port} {nick}  (or just /connect to use these)"
        ));
    }

    fn connect(&mut self, host: Option<String>, port: Option<String>, nick: Option<String>) {
        if let Some(host) = host {
            self.target.host = host;
        }
        if let Some(port) = port {
            self.target.port = port;
        }
        if let Some(nick) = nick {
            self.target.nick = nick;
        }

        let Target { host, port, nick } = &self.target;
        match self.client.connect(host, port, nick) {
            Ok(()) => self.prompt_at = None,
            Err(ChatError::Busy(ConnectionState::Connected)) => {
                self.say("Already connected. Use /disconnect first.");
            }
            Err(ChatError::Busy(state)) => {
                self.say(&format!("Busy ({state}), try again in a moment."));
            }
            Err(e) => {
                self.say(&render::status(&format!("Can't connect: {e}")));
                self.prompt();
            }
        }
    }

    /// Returns false when the operator asked to quit.
    async fn handle_input(&mut self, input: &str) -> bool {
        match command::parse(input) {
            Command::Empty => {}
            Command::Quit => return false,
            Command::Help => self.say(command::HELP),
            Command::Connect { host, port, nick } => self.connect(host, port, nick),
            Command::Disconnect => {
                if self.client.state() == ConnectionState::Disconnected {
                    self.say("Not connected.");
                } else {
                    self.client.disconnect().await;
                }
            }
            Command::Say(text) => {
                if self.client.state() != ConnectionState::Connected {
                    self.say("Not connected. Use /connect.");
                } else {
                    // Echo and failures come back as events.
                    self.client.send(&text).await;
                }
            }
            Command::Unknown(name) => self.say(&format!("Unknown command /{name}. Try /help.")),
        }
        true
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(&event)?);
        }

        match event {
            Event::StatusChanged { text } => {
                if !self.json {
                    println!("{}", render::status(&text));
                }
            }
            Event::MessageReceived(line) => {
                if !self.json {
                    println!("{}", render::line(&line));
                }
            }
            Event::ConnectionStateChanged { state, .. } => {
                let previous = std::mem::replace(&mut self.last_state, state);
                match state {
                    ConnectionState::Connected => {
                        self.prompt_at = None;
                        if let Some(session) = self.client.session() {
                            if self.config.remember(&session.host, session.port, &session.nickname) {
                                self.config.save();
                            }
                        }
                    }
                    ConnectionState::Disconnected if !self.quitting => match prompt_delay(previous) {
                        Some(delay) => self.prompt_at = Some(Instant::now() + delay),
                        None => self.prompt(),
                    },
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

/// How long to wait before re-offering the prompt once `Disconnected` is
/// reached from `previous`. Only a failed attempt waits; a session that ended,
/// cleanly or not, gets the prompt straight away.
fn prompt_delay(previous: ConnectionState) -> Option<Duration> {
    match previous {
        ConnectionState::Connecting | ConnectionState::Handshaking => Some(RETRY_PROMPT_DELAY),
        _ => None,
    }
}
