//! Production implementations of the ports: the tokio clock, the reqwest
//! transport, and the file-backed credential vault.

use std::path::PathBuf;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::mpsc;

use crate::ports::{
    Clock, CredentialVault, StoredCredential, Transport, TransportError, Verb,
};
use crate::session::Credential;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    type Sleep<'a> = tokio::time::Sleep;

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        tokio::time::sleep(duration)
    }
}

/// HTTP access to the fleet backend. The timeout is applied per request so
/// the long-lived pairing stream is exempt from it.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn builder(&self, verb: Verb, path: &str, auth: Option<&Credential>) -> reqwest::RequestBuilder {
        let url = self.url(path);
        let mut request = match verb {
            Verb::Get => self.client.get(&url),
            Verb::Post => self.client.post(&url),
            Verb::Put => self.client.put(&url),
            Verb::Delete => self.client.delete(&url),
        };
        if let Some(credential) = auth {
            request = request.basic_auth(&credential.team, Some(&credential.password));
        }
        request
    }
}

fn map_transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Network(format!("request timed out: {err}"))
    } else {
        TransportError::Network(err.to_string())
    }
}

impl Transport for HttpTransport {
    async fn request(
        &self,
        verb: Verb,
        path: &str,
        auth: Option<&Credential>,
        body: Option<serde_json::Value>,
    ) -> Result<Vec<u8>, TransportError> {
        let mut request = self.builder(verb, path, auth).timeout(self.timeout);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(bytes.to_vec())
    }

    async fn stream(
        &self,
        path: &str,
        auth: Option<&Credential>,
    ) -> Result<mpsc::Receiver<Result<Vec<u8>, TransportError>>, TransportError> {
        let mut response = self
            .builder(Verb::Get, path, auth)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        let (sender, receiver) = mpsc::channel(16);
        tokio::spawn(async move {
            loop {
                match response.chunk().await {
                    Ok(Some(chunk)) => {
                        if sender.send(Ok(chunk.to_vec())).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        let _ = sender.send(Err(map_transport_error(err))).await;
                        break;
                    }
                }
            }
        });
        Ok(receiver)
    }
}

/// The credential cookie at rest: one small JSON file.
#[derive(Debug, Clone)]
pub struct FileVault {
    path: PathBuf,
}

impl FileVault {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialVault for FileVault {
    fn read(&self) -> Option<StoredCredential> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    fn write(&self, stored: &StoredCredential) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(stored).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, raw)
    }

    fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}
