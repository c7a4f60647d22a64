//! Hand-written doubles for the ports, shared by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::mpsc;

use crate::ports::{Clock, CredentialVault, StoredCredential, Transport, TransportError, Verb};
use crate::session::Credential;

/// A clock pinned to a fixed instant; sleeps resolve immediately.
#[derive(Clone, Copy)]
pub(crate) struct TestClock {
    now: OffsetDateTime,
}

impl Default for TestClock {
    fn default() -> Self {
        Self {
            now: OffsetDateTime::parse("2025-01-12T09:30:00Z", &Rfc3339).expect("parse now"),
        }
    }
}

impl Clock for TestClock {
    type Sleep<'a> = std::future::Ready<()>;

    fn now(&self) -> OffsetDateTime {
        self.now
    }

    fn sleep<'a>(&'a self, _duration: Duration) -> Self::Sleep<'a> {
        std::future::ready(())
    }
}

/// An in-memory credential vault.
#[derive(Clone, Default)]
pub(crate) struct MemoryVault {
    stored: Arc<Mutex<Option<StoredCredential>>>,
}

impl CredentialVault for MemoryVault {
    fn read(&self) -> Option<StoredCredential> {
        self.stored.lock().expect("vault lock").clone()
    }

    fn write(&self, stored: &StoredCredential) -> std::io::Result<()> {
        *self.stored.lock().expect("vault lock") = Some(stored.clone());
        Ok(())
    }

    fn clear(&self) -> std::io::Result<()> {
        *self.stored.lock().expect("vault lock") = None;
        Ok(())
    }
}

#[derive(Clone)]
enum Stub {
    Body(Vec<u8>),
    Failure,
    Stream(Vec<Vec<u8>>),
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub verb: Verb,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub authenticated: bool,
}

/// A scripted transport that records every call it sees. Unstubbed routes
/// answer 404.
#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    stubs: Arc<Mutex<HashMap<(Verb, String), Stub>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl FakeTransport {
    pub fn stub(&self, verb: Verb, path: &str, body: serde_json::Value) {
        self.stubs.lock().expect("stubs lock").insert(
            (verb, path.to_string()),
            Stub::Body(serde_json::to_vec(&body).expect("encode stub")),
        );
    }

    pub fn fail(&self, verb: Verb, path: &str) {
        self.stubs
            .lock()
            .expect("stubs lock")
            .insert((verb, path.to_string()), Stub::Failure);
    }

    pub fn stub_stream(&self, path: &str, chunks: Vec<Vec<u8>>) {
        self.stubs
            .lock()
            .expect("stubs lock")
            .insert((Verb::Get, path.to_string()), Stub::Stream(chunks));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, verb: Verb, path: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|call| call.verb == verb && call.path == path)
            .count()
    }

    fn record(&self, verb: Verb, path: &str, body: Option<serde_json::Value>, authenticated: bool) {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            verb,
            path: path.to_string(),
            body,
            authenticated,
        });
    }
}

impl Transport for FakeTransport {
    async fn request(
        &self,
        verb: Verb,
        path: &str,
        auth: Option<&Credential>,
        body: Option<serde_json::Value>,
    ) -> Result<Vec<u8>, TransportError> {
        self.record(verb, path, body, auth.is_some());
        let stub = self
            .stubs
            .lock()
            .expect("stubs lock")
            .get(&(verb, path.to_string()))
            .cloned();
        match stub {
            Some(Stub::Body(bytes)) => Ok(bytes),
            Some(Stub::Failure) => Err(TransportError::Network("stubbed failure".to_string())),
            Some(Stub::Stream(_)) => Err(TransportError::Decode(
                "stream stub reached via request".to_string(),
            )),
            None => Err(TransportError::Status(404)),
        }
    }

    async fn stream(
        &self,
        path: &str,
        auth: Option<&Credential>,
    ) -> Result<mpsc::Receiver<Result<Vec<u8>, TransportError>>, TransportError> {
        self.record(Verb::Get, path, None, auth.is_some());
        let stub = self
            .stubs
            .lock()
            .expect("stubs lock")
            .get(&(Verb::Get, path.to_string()))
            .cloned();
        match stub {
            Some(Stub::Stream(chunks)) => {
                let (sender, receiver) = mpsc::channel(chunks.len().max(1));
                for chunk in chunks {
                    let _ = sender.try_send(Ok(chunk));
                }
                Ok(receiver)
            }
            Some(Stub::Failure) | None => {
                Err(TransportError::Network("stubbed failure".to_string()))
            }
            Some(Stub::Body(_)) => Err(TransportError::Decode(
                "body stub reached via stream".to_string(),
            )),
        }
    }
}
