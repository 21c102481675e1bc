//! Publisher credential extraction
//!
//! Source clients differ in how they send credentials. In order of
//! preference:
//! 1. `Authorization: Basic base64(name:secret)`
//! 2. `X-Source-Password: name:secret`
//! 3. `?password=name:secret`

use axum::http::HeaderMap;
use axum_extra::headers::{authorization::Basic, Authorization, HeaderMapExt};
use std::fmt;

use crate::error::AuthError;

/// Header carrying `name:secret` for clients without Basic auth support
pub const SOURCE_PASSWORD_HEADER: &str = "x-source-password";

/// Account name and secret presented by a publisher
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub name: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
        }
    }

    /// Split `name:secret` on the first colon
    pub fn parse_pair(value: &str) -> Option<Self> {
        let (name, secret) = value.split_once(':')?;
        Some(Self::new(name, secret))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Find publisher credentials in request headers or the `password` query value
pub fn extract_credentials(
    headers: &HeaderMap,
    password_param: Option<&str>,
) -> Result<Credentials, AuthError> {
    if let Some(Authorization(basic)) = headers.typed_get::<Authorization<Basic>>() {
        return Ok(Credentials::new(basic.username(), basic.password()));
    }

    let source_password = headers
        .get(SOURCE_PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .or(password_param.filter(|v| !v.is_empty()));

    source_password
        .and_then(Credentials::parse_pair)
        .ok_or(AuthError::MissingCredentials)
}
