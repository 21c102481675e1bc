//! Publisher authentication
//!
//! Credentials are pulled from the ingest request and checked against an
//! external verification service. Every failure, including the service being
//! unreachable, rejects the publisher.

pub mod client;
pub mod credentials;

pub use client::RemoteAuthenticator;
pub use credentials::{extract_credentials, Credentials};

use async_trait::async_trait;

use crate::error::AuthError;

/// Decides whether a publisher may stream
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<(), AuthError>;
}
