//! Persistent configuration for the nickchat CLI.
//!
//! Config file lives at `~/.config/nickchat/cli.toml` (or the platform's
//! config dir). It stores the last host, port and nickname that connected
//! successfully, so the next run can offer them again.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nickchat_sdk::config::{DEFAULT_HOST, DEFAULT_NICK, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Last server host.
    pub host: Option<String>,
    /// Last server port.
    pub port: Option<u16>,
    /// Last nickname.
    pub nick: Option<String>,
}

/// Connection prompt values after layering CLI args over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    /// Kept as typed; the SDK validates it on connect.
    pub port: String,
    pub nick: String,
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nickchat")
}

pub fn config_path() -> PathBuf {
    config_dir().join("cli.toml")
}

impl Config {
    /// Load from the default location. A missing or unreadable file yields
    /// the defaults with a warning.
    pub fn load() -> Self {
        let path = config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring config file");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("can't read {}", path.display()))?;
        toml::from_str(&s).with_context(|| format!("bad config file {}", path.display()))
    }

    pub fn save(&self) {
        let path = config_path();
        if let Err(e) = self.save_to(&path) {
            tracing::warn!(path = %path.display(), error = %e, "Can't save config");
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let s = toml::to_string_pretty(self)?;
        std::fs::write(path, s).with_context(|| format!("can't write {}", path.display()))?;
        Ok(())
    }

    /// Fill the connection prompt: explicit values win, then this file, then
    /// the built-in defaults.
    pub fn resolve(&self, host: Option<String>, port: Option<String>, nick: Option<String>) -> Target {
        Target {
            host: host
                .or_else(|| self.host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: port
                .or_else(|| self.port.map(|p| p.to_string()))
                .unwrap_or_else(|| DEFAULT_PORT.to_string()),
            nick: nick
                .or_else(|| self.nick.clone())
                .unwrap_or_else(|| DEFAULT_NICK.to_string()),
        }
    }

    /// Remember a session that connected.
    pub fn remember(&mut self, host: &str, port: u16, nick: &str) -> bool {
        let next = Config {
            host: Some(host.to_string()),
            port: Some(port),
            nick: Some(nick.to_string()),
        };
        if *self == next {
            return false;
        }
        *self = next;
        true
    }
}
