//! Application configuration
//!
//! Loaded from a TOML file. Lookup order: an explicit path, then
//! `relaycast.toml` beside the executable, then the platform config
//! directory.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub relay: RelayConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. `0.0.0.0:8000` or `:8000`
    pub listen: String,
    /// Realm advertised in `WWW-Authenticate` challenges
    pub realm: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            realm: DEFAULT_REALM.to_string(),
        }
    }
}

impl ServerConfig {
    /// Parse the listen address. A bare `:port` binds all interfaces.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let listen = self.listen.trim();
        let full = if listen.starts_with(':') {
            format!("0.0.0.0{listen}")
        } else {
            listen.to_string()
        };

        full.parse()
            .map_err(|e| Error::Config(format!("invalid listen address {listen:?}: {e}")))
    }
}

/// Credential verification service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Verification endpoint (required)
    pub url: String,
    /// Bearer token presented to the endpoint (required)
    pub api_token: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_token: String::new(),
            timeout_secs: AUTH_TIMEOUT_SECS,
            user_agent: format!("relaycast/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Relay sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bytes of recent stream kept for late joiners
    pub history_capacity: usize,
    /// Chunks queued per listener before drops start
    pub subscriber_queue: usize,
    /// Largest chunk published from inbound data
    pub ingest_chunk_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            subscriber_queue: DEFAULT_SUBSCRIBER_QUEUE,
            ingest_chunk_size: DEFAULT_INGEST_CHUNK_SIZE,
        }
    }
}

impl AppConfig {
    /// Locate, parse and validate the configuration file
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(explicit)?;
        tracing::info!(path = %path.display(), "Loading configuration");

        let text = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("error reading config file ({}): {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the relay cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.auth.url.trim().is_empty() {
            return Err(Error::Config("auth.url must be specified".into()));
        }
        if self.auth.api_token.trim().is_empty() {
            return Err(Error::Config("auth.api_token must be specified".into()));
        }
        self.server.bind_addr()?;

        let relay = &self.relay;
        for (name, value) in [
            ("relay.history_capacity", relay.history_capacity),
            ("relay.subscriber_queue", relay.subscriber_queue),
            ("relay.ingest_chunk_size", relay.ingest_chunk_size),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }

        Ok(())
    }

    fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }

        Self::search_paths()
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| {
                Error::Config(format!(
                    "no {CONFIG_FILE_NAME} found next to the executable or in the config directory"
                ))
            })
    }

    /// Default locations, in lookup order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                paths.push(dir.join(CONFIG_FILE_NAME));
            }
        }
        if let Some(dirs) = ProjectDirs::from("", "", "relaycast") {
            paths.push(dirs.config_dir().join(CONFIG_FILE_NAME));
        }

        paths
    }
}
