//! # Relaycast
//!
//! Single-publisher live audio relay over HTTP.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            PUBLISHER                                 │
//! │            POST /stream  (Basic / X-Source-Password / ?password)     │
//! └──────────────────────────────────┬───────────────────────────────────┘
//!                                    │ chunked request body
//!                                    ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                       HTTP Server (http::server)                     │
//! │  ┌───────────────┐    ┌────────────────────┐    ┌────────────────┐   │
//! │  │ ingest handler│───►│ Authenticator      │───►│ auth service   │   │
//! │  │  (409 / 401)  │    │ (auth::client)     │    │ (remote HTTPS) │   │
//! │  └───────┬───────┘    └────────────────────┘    └────────────────┘   │
//! │          │ push()                                                    │
//! │          ▼                                                           │
//! │  ┌────────────────────────────────────────────────────────────────┐  │
//! │  │                        Relay (relay)                           │  │
//! │  │   SessionController ── token + first-bytes gate per session    │  │
//! │  │   Broadcaster ──┬── HistoryBuffer (128 KiB catch-up tail)      │  │
//! │  │                 └── SubscriberRegistry (bounded queue each)    │  │
//! │  └───────┬──────────────────────┬──────────────────────┬──────────┘  │
//! │          ▼                      ▼                      ▼             │
//! │  ┌───────────────┐      ┌───────────────┐      ┌───────────────┐     │
//! │  │ listen handler│      │ listen handler│      │ listen handler│     │
//! │  └───────┬───────┘      └───────┬───────┘      └───────┬───────┘     │
//! └──────────┼──────────────────────┼──────────────────────┼─────────────┘
//!            ▼                      ▼                      ▼
//!      GET /listen            GET /listen            GET /listen
//!      (audio/mpeg)           (audio/mpeg)           (audio/mpeg)
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod relay;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default listen address
    pub const DEFAULT_LISTEN: &str = "0.0.0.0:8000";

    /// Default realm for `WWW-Authenticate` challenges
    pub const DEFAULT_REALM: &str = "relaycast";

    /// Default credential verification timeout in seconds
    pub const AUTH_TIMEOUT_SECS: u64 = 10;

    /// Default catch-up history size in bytes
    pub const DEFAULT_HISTORY_CAPACITY: usize = 128 * 1024;

    /// Default per-listener queue depth in chunks
    pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 100;

    /// Default largest published chunk in bytes
    pub const DEFAULT_INGEST_CHUNK_SIZE: usize = 1024;

    /// Configuration file name searched for at startup
    pub const CONFIG_FILE_NAME: &str = "relaycast.toml";
}
