//! Traits for the external collaborators of the sync controller: a clock,
//! an HTTP transport, and a cookie-like credential persistence surface.
//! Production adapters live in [`crate::adapters`]; tests substitute
//! hand-written doubles.

use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::mpsc;

use crate::session::Credential;

pub trait Clock: Clone + Send + Sync + 'static {
    type Sleep<'a>: Future<Output = ()> + Send + 'a
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime;
    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }
}

/// Transport failures, kept distinct for internal logging; user-facing
/// messages stay generic (see [`crate::store::StoreError`]).
#[derive(Debug)]
pub enum TransportError {
    /// The server could not be reached or the request timed out.
    Network(String),
    /// The server answered with a non-success status code.
    Status(u16),
    /// The response body was not what the caller expected.
    Decode(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Network(detail) => write!(f, "network failure: {detail}"),
            TransportError::Status(code) => write!(f, "server returned status {code}"),
            TransportError::Decode(detail) => write!(f, "undecodable response: {detail}"),
        }
    }
}

/// Asynchronous HTTP access to the fleet backend. Paths are relative to the
/// configured base URL; `auth` is attached as HTTP Basic Auth when present.
pub trait Transport: Clone + Send + Sync + 'static {
    fn request(
        &self,
        verb: Verb,
        path: &str,
        auth: Option<&Credential>,
        body: Option<serde_json::Value>,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Open a chunked response stream (the notification pairing endpoint).
    /// The receiver yields raw body chunks until the server closes the
    /// response.
    fn stream(
        &self,
        path: &str,
        auth: Option<&Credential>,
    ) -> impl Future<Output = Result<mpsc::Receiver<Result<Vec<u8>, TransportError>>, TransportError>>
    + Send;
}

/// An encoded credential at rest, with its absolute expiry in unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoredCredential {
    pub value: String,
    pub expires: i64,
}

/// Cookie-like persistence for the credential: get, set, remove. Expiry is
/// stored alongside the value; enforcing it is the session store's job.
/// Malformed content must read as absent, never as an error.
pub trait CredentialVault: Clone + Send + Sync + 'static {
    fn read(&self) -> Option<StoredCredential>;
    fn write(&self, stored: &StoredCredential) -> std::io::Result<()>;
    fn clear(&self) -> std::io::Result<()>;
}
