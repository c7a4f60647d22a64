//! The per-resource authoritative client-side cache and its CRUD
//! operations.
//!
//! Reconciliation is server-wins: every successful mutation replaces the
//! whole local collection with the payload the server returns, so there is
//! no client-side merge logic and no stale-index bookkeeping. The flip side
//! is a known race: when a refresh for an older state resolves after a
//! mutation for a newer one, the later response still wins. That matches
//! the original client and is deliberately not "fixed" here.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ports::{Transport, Verb};
use crate::records::{Booking, NotifyTarget, Team, User};
use crate::session::SessionHandle;

/// A server-backed collection kind.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Wire path of the collection, relative to the API base URL.
    const PATH: &'static str;
    /// Human label used in log lines.
    const LABEL: &'static str;
}

/// Resource kinds addressable by record identity (update/delete).
pub trait Identified: Resource {
    fn id(&self) -> i64;
}

impl Resource for Booking {
    const PATH: &'static str = "booking";
    const LABEL: &'static str = "bookings";
}

impl Identified for Booking {
    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for String {
    const PATH: &'static str = "boat";
    const LABEL: &'static str = "boats";
}

impl Resource for User {
    const PATH: &'static str = "users";
    const LABEL: &'static str = "users";
}

impl Identified for User {
    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Team {
    const PATH: &'static str = "teams";
    const LABEL: &'static str = "teams";
}

impl Identified for Team {
    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for NotifyTarget {
    const PATH: &'static str = "whatsappto";
    const LABEL: &'static str = "notification targets";
}

/// The user-visible failure taxonomy. Validation never reaches the network;
/// everything else is a transport or server failure reduced to the generic
/// message the original client showed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// One or more missing/invalid fields, in render order.
    Validation(Vec<String>),
    /// A refresh could not reach the server. Rendered as a persistent
    /// banner, not a dismissible alert.
    Connection,
    CannotAdd,
    CannotUpdate,
    CannotDelete,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Validation(errors) => f.write_str(&errors.join("\n")),
            StoreError::Connection => f.write_str("Cannot load data. Server error!"),
            StoreError::CannotAdd => f.write_str("Cannot add data. Server error!"),
            StoreError::CannotUpdate => f.write_str("Update failed! Server error"),
            StoreError::CannotDelete => f.write_str("Delete failed! Server error"),
        }
    }
}

struct StoreState<R> {
    items: Vec<R>,
    connection_failed: bool,
    pending_error: Option<StoreError>,
}

impl<R> Default for StoreState<R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            connection_failed: false,
            pending_error: None,
        }
    }
}

/// One authoritative collection plus its CRUD against the remote API.
/// Clones share the same state, so the activity monitor and the view see
/// a single copy per kind.
#[derive(Clone)]
pub struct CollectionStore<R, T> {
    transport: T,
    session: SessionHandle,
    state: Arc<Mutex<StoreState<R>>>,
}

impl<R: Resource, T: Transport> CollectionStore<R, T> {
    pub fn new(transport: T, session: SessionHandle) -> Self {
        Self {
            transport,
            session,
            state: Arc::new(Mutex::new(StoreState::default())),
        }
    }

    pub fn items(&self) -> Vec<R> {
        self.state.lock().expect("store lock").items.clone()
    }

    /// Whether the last refresh failed to reach the server. Cleared by the
    /// next successful refresh.
    pub fn connection_failed(&self) -> bool {
        self.state.lock().expect("store lock").connection_failed
    }

    /// The last mutation failure, kept so the view can re-render it until
    /// the edit is retried or abandoned.
    pub fn pending_error(&self) -> Option<StoreError> {
        self.state.lock().expect("store lock").pending_error.clone()
    }

    /// Abandon an in-progress edit: drops the error state without
    /// contacting the server.
    pub fn cancel_pending_edit(&self) {
        self.state.lock().expect("store lock").pending_error = None;
    }

    /// Empty the collection locally (used while unauthenticated).
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("store lock");
        state.items.clear();
        state.connection_failed = false;
        state.pending_error = None;
    }

    /// Fetch the collection. Success replaces local state and clears the
    /// connection flag; failure empties the collection and raises it.
    pub async fn refresh(&self) {
        let auth = self.session.credential();
        let result = self
            .transport
            .request(Verb::Get, R::PATH, auth.as_ref(), None)
            .await
            .and_then(decode_collection::<R>);
        let mut state = self.state.lock().expect("store lock");
        match result {
            Ok(items) => {
                tracing::debug!(collection = R::LABEL, records = items.len(), "refreshed");
                state.items = items;
                state.connection_failed = false;
            }
            Err(err) => {
                tracing::warn!(collection = R::LABEL, error = %err, "refresh failed");
                state.items = Vec::new();
                state.connection_failed = true;
            }
        }
    }

    pub async fn create(&self, record: &R) -> Result<(), StoreError> {
        self.mutate(Verb::Post, R::PATH.to_string(), Some(record), StoreError::CannotAdd)
            .await
    }

    pub async fn update(&self, record: &R) -> Result<(), StoreError>
    where
        R: Identified,
    {
        let path = format!("{}/{}", R::PATH, record.id());
        self.mutate(Verb::Put, path, Some(record), StoreError::CannotUpdate)
            .await
    }

    pub async fn delete(&self, record: &R) -> Result<(), StoreError>
    where
        R: Identified,
    {
        let path = format!("{}/{}", R::PATH, record.id());
        self.mutate(Verb::Delete, path, None, StoreError::CannotDelete)
            .await
    }

    async fn mutate(
        &self,
        verb: Verb,
        path: String,
        record: Option<&R>,
        failure: StoreError,
    ) -> Result<(), StoreError> {
        let body = match record {
            Some(record) => match serde_json::to_value(record) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::warn!(collection = R::LABEL, error = %err, "record not encodable");
                    return self.fail(failure);
                }
            },
            None => None,
        };
        let auth = self.session.credential();
        let result = self
            .transport
            .request(verb, &path, auth.as_ref(), body)
            .await
            .and_then(decode_collection::<R>);
        match result {
            Ok(items) => {
                tracing::info!(
                    collection = R::LABEL,
                    verb = verb.as_str(),
                    records = items.len(),
                    "collection replaced"
                );
                let mut state = self.state.lock().expect("store lock");
                state.items = items;
                state.pending_error = None;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    collection = R::LABEL,
                    verb = verb.as_str(),
                    error = %err,
                    "mutation failed"
                );
                self.fail(failure)
            }
        }
    }

    fn fail(&self, failure: StoreError) -> Result<(), StoreError> {
        self.state.lock().expect("store lock").pending_error = Some(failure.clone());
        Err(failure)
    }
}

fn decode_collection<R: Resource>(
    bytes: Vec<u8>,
) -> Result<Vec<R>, crate::ports::TransportError> {
    serde_json::from_slice(&bytes)
        .map_err(|err| crate::ports::TransportError::Decode(err.to_string()))
}
