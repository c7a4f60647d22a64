//! The authenticated session: a persisted team credential with a 7-day
//! sliding expiry, restored on mount and attached to every outbound call.

use std::sync::{Arc, Mutex};

use base64::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD, decode_config, encode_config};
use serde::{Deserialize, Serialize};

use crate::ports::{Clock, CredentialVault, StoredCredential, Transport, Verb};
use crate::records::{LoginReply, LoginRequest};

/// How long a restored credential stays valid. Rewritten on every
/// successful restore, so the window slides.
pub const CREDENTIAL_TTL: time::Duration = time::Duration::days(7);

/// The identity/secret pair a tenant logs in with. Sent as HTTP Basic Auth;
/// persisted encoded, not encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub team: String,
    pub password: String,
}

/// Ephemeral, in-memory session state derived from the credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub credential: Option<Credential>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }
}

#[derive(Debug)]
pub enum AuthError {
    /// Login rejected, or the server unreachable. The caller shows one
    /// generic message either way; the distinction is logged internally.
    InvalidCredentials,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidCredentials => f.write_str("Invalid team or password."),
        }
    }
}

/// A cheaply cloneable view of the current credential, shared with the
/// collection stores (request decoration) and the activity monitor
/// (unauthenticated-polling guard).
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<Option<Credential>>>,
}

impl SessionHandle {
    pub fn credential(&self) -> Option<Credential> {
        self.inner.lock().expect("session lock").clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().expect("session lock").is_some()
    }

    pub(crate) fn set(&self, credential: Option<Credential>) {
        *self.inner.lock().expect("session lock") = credential;
    }
}

#[derive(Clone)]
pub struct SessionStore<V, C> {
    vault: V,
    clock: C,
    handle: SessionHandle,
}

impl<V: CredentialVault, C: Clock> SessionStore<V, C> {
    pub fn new(vault: V, clock: C) -> Self {
        Self {
            vault,
            clock,
            handle: SessionHandle::default(),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Read the persisted credential. A present, unexpired cookie is
    /// decoded, re-persisted with a fresh expiry and loaded into memory;
    /// anything absent, expired or malformed degrades to an empty session.
    /// Never fails.
    pub fn restore(&self) -> Session {
        let Some(stored) = self.vault.read() else {
            self.handle.set(None);
            return Session::default();
        };
        if stored.expires <= self.clock.now().unix_timestamp() {
            tracing::debug!("stored credential expired");
            self.discard();
            return Session::default();
        }
        let Some(credential) = decode_credential(&stored.value) else {
            tracing::warn!("stored credential is malformed, treating as logged out");
            self.discard();
            return Session::default();
        };
        // Memory and the vault are updated in the same synchronous step.
        self.persist(&credential);
        self.handle.set(Some(credential.clone()));
        Session {
            credential: Some(credential),
        }
    }

    /// Exchange the pair for a session. Only a reply with `status == "ok"`
    /// succeeds; rejections and transport failures both come back as
    /// [`AuthError::InvalidCredentials`] and are never retried here.
    pub async fn login<T: Transport>(
        &self,
        transport: &T,
        team: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let request = LoginRequest {
            team: team.to_string(),
            password: password.to_string(),
        };
        let body = serde_json::to_value(&request)
            .map_err(|_| AuthError::InvalidCredentials)?;
        let bytes = transport
            .request(Verb::Post, "login", None, Some(body))
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "login transport failure");
                AuthError::InvalidCredentials
            })?;
        let reply: LoginReply = serde_json::from_slice(&bytes).map_err(|err| {
            tracing::warn!(error = %err, "login reply was not decodable");
            AuthError::InvalidCredentials
        })?;
        if reply.status.as_deref() != Some("ok") {
            tracing::debug!(team = %team, status = ?reply.status, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let credential = Credential {
            team: request.team,
            password: request.password,
        };
        self.persist(&credential);
        self.handle.set(Some(credential.clone()));
        tracing::info!(team = %credential.team, "logged in");
        Ok(Session {
            credential: Some(credential),
        })
    }

    /// Drop the persisted credential and the in-memory session. Safe to
    /// call with no active session.
    pub fn logout(&self) -> Session {
        self.discard();
        tracing::info!("logged out");
        Session::default()
    }

    fn persist(&self, credential: &Credential) {
        let Some(value) = encode_credential(credential) else {
            tracing::warn!("credential could not be encoded, not persisting");
            return;
        };
        let stored = StoredCredential {
            value,
            expires: (self.clock.now() + CREDENTIAL_TTL).unix_timestamp(),
        };
        if let Err(err) = self.vault.write(&stored) {
            tracing::warn!(error = %err, "credential could not be persisted");
        }
    }

    fn discard(&self) {
        if let Err(err) = self.vault.clear() {
            tracing::warn!(error = %err, "persisted credential could not be removed");
        }
        self.handle.set(None);
    }
}

fn encode_credential(credential: &Credential) -> Option<String> {
    let bytes = serde_json::to_vec(credential).ok()?;
    Some(encode_config(bytes, URL_SAFE_NO_PAD))
}

fn decode_credential(raw: &str) -> Option<Credential> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let decoded = decode_config(trimmed, URL_SAFE_NO_PAD)
        .or_else(|_| decode_config(trimmed, STANDARD))
        .or_else(|_| decode_config(trimmed, STANDARD_NO_PAD))
        .ok()?;
    serde_json::from_slice(&decoded).ok()
}
