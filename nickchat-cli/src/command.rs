//! Operator input: slash commands or a chat line.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/connect [host [port [nick]]]`; missing parts fall back to the prompt values.
    Connect {
        host: Option<String>,
        port: Option<String>,
        nick: Option<String>,
    },
    Disconnect,
    Help,
    Quit,
    Say(String),
    Unknown(String),
    Empty,
}

pub fn parse(input: &str) -> Command {
    let input = input.trim();
    if input.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = input.strip_prefix('/') else {
        return Command::Say(input.to_string());
    };
    // `//text` sends a line that starts with a slash.
    if rest.starts_with('/') {
        return Command::Say(rest.to_string());
    }

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_ascii_lowercase();
    match name.as_str() {
        "connect" | "c" => {
            let mut next = || parts.next().map(str::to_string);
            Command::Connect {
                host: next(),
                port: next(),
                nick: next(),
            }
        }
        "disconnect" | "dc" => Command::Disconnect,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        _ => Command::Unknown(name),
    }
}

pub const HELP: &str = "\
Commands:
  /connect [host] [port] [nick]   connect (missing values use the last ones)
  /disconnect                     leave the server
  /quit                           disconnect and exit
  /help                           this text
Anything else is sent as a chat message. Start a message with // to send a leading /.";
