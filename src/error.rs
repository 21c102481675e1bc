//! Error types for the relay

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Relay state errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("A publisher is already streaming")]
    AlreadyActive,

    #[error("No active stream")]
    NoActiveStream,

    #[error("Stream ended before any data arrived")]
    StreamEnded,
}

/// Credential extraction and verification errors
///
/// Every variant fails closed: the publisher is answered with 401.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No credentials supplied")]
    MissingCredentials,

    #[error("Verification request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Verification service returned status {0}")]
    Status(u16),

    #[error("Failed to decode verification response: {0}")]
    Decode(String),

    #[error("Credentials rejected{}", .0.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Rejected(Option<String>),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
