//! The coordinator the view layer consumes: one session store, six
//! server-backed collections, and the submission pipelines tying the
//! validators and the normalizer to them.

use std::sync::{Arc, Mutex};

use crate::activity::Refresh;
use crate::normalize::normalize_booking;
use crate::ports::{Clock, CredentialVault, Transport, Verb};
use crate::records::{
    Booking, BookingDraft, NotifyTarget, RemoteConfig, Team, TeamDraft, User, UserDraft,
};
use crate::session::{AuthError, Session, SessionHandle, SessionStore};
use crate::store::{CollectionStore, StoreError};
use crate::validate::{validate_booking, validate_team, validate_user};

#[derive(Clone)]
pub struct FleetClient<T, V, C>
where
    T: Transport,
    V: CredentialVault,
    C: Clock,
{
    transport: T,
    session: SessionStore<V, C>,
    handle: SessionHandle,
    config: Arc<Mutex<Option<RemoteConfig>>>,
    pub bookings: CollectionStore<Booking, T>,
    pub boats: CollectionStore<String, T>,
    pub users: CollectionStore<User, T>,
    pub teams: CollectionStore<Team, T>,
    pub targets: CollectionStore<NotifyTarget, T>,
}

impl<T, V, C> FleetClient<T, V, C>
where
    T: Transport,
    V: CredentialVault,
    C: Clock,
{
    pub fn new(transport: T, vault: V, clock: C) -> Self {
        let session = SessionStore::new(vault, clock);
        let handle = session.handle();
        Self {
            bookings: CollectionStore::new(transport.clone(), handle.clone()),
            boats: CollectionStore::new(transport.clone(), handle.clone()),
            users: CollectionStore::new(transport.clone(), handle.clone()),
            teams: CollectionStore::new(transport.clone(), handle.clone()),
            targets: CollectionStore::new(transport.clone(), handle.clone()),
            transport,
            session,
            handle,
            config: Arc::new(Mutex::new(None)),
        }
    }

    pub fn session(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// The last fetched server configuration, if any.
    pub fn remote_config(&self) -> Option<RemoteConfig> {
        self.config.lock().expect("config lock").clone()
    }

    /// The tenant identity of the current server configuration.
    pub fn tenant(&self) -> Option<String> {
        self.config
            .lock()
            .expect("config lock")
            .as_ref()
            .map(|config| config.team.clone())
    }

    /// Whether the stores may talk to the server at all. Until a
    /// configuration is known, auth is assumed to be required.
    pub fn polling_allowed(&self) -> bool {
        let auth_required = self
            .config
            .lock()
            .expect("config lock")
            .as_ref()
            .is_none_or(|config| config.auth_required);
        !auth_required || self.handle.is_authenticated()
    }

    /// Fetch the server configuration and keep it. On failure the previous
    /// configuration (if any) stays in place.
    pub async fn fetch_config(&self) -> Result<RemoteConfig, StoreError> {
        let auth = self.handle.credential();
        let bytes = self
            .transport
            .request(Verb::Get, "config", auth.as_ref(), None)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "config fetch failed");
                StoreError::Connection
            })?;
        let config: RemoteConfig = serde_json::from_slice(&bytes).map_err(|err| {
            tracing::warn!(error = %err, "config not decodable");
            StoreError::Connection
        })?;
        *self.config.lock().expect("config lock") = Some(config.clone());
        Ok(config)
    }

    /// Mount sequence: restore the persisted session, fetch the server
    /// configuration, then load every collection (or keep them empty when
    /// unauthenticated and auth is required).
    pub async fn bootstrap(&self) -> Session {
        let session = self.session.restore();
        if let Err(err) = self.fetch_config().await {
            tracing::warn!(error = %err, "starting without server configuration");
        }
        if self.polling_allowed() {
            self.refresh_all().await;
        } else {
            self.clear_collections();
        }
        session
    }

    pub async fn login(&self, team: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.session.login(&self.transport, team, password).await?;
        if let Err(err) = self.fetch_config().await {
            tracing::warn!(error = %err, "config fetch after login failed");
        }
        self.refresh_all().await;
        Ok(session)
    }

    pub async fn logout(&self) -> Session {
        let session = self.session.logout();
        if let Err(err) = self.fetch_config().await {
            tracing::warn!(error = %err, "config fetch after logout failed");
        }
        self.clear_collections();
        session
    }

    pub async fn refresh_all(&self) {
        tokio::join!(
            self.bookings.refresh(),
            self.boats.refresh(),
            self.users.refresh(),
            self.teams.refresh(),
            self.targets.refresh(),
        );
    }

    fn clear_collections(&self) {
        self.bookings.clear();
        self.boats.clear();
        self.users.clear();
        self.teams.clear();
        self.targets.clear();
    }

    /// Abandon whatever edit is in progress on any collection.
    pub fn cancel_pending_edits(&self) {
        self.bookings.cancel_pending_edit();
        self.boats.cancel_pending_edit();
        self.users.cancel_pending_edit();
        self.teams.cancel_pending_edit();
        self.targets.cancel_pending_edit();
    }

    /// Validate, normalize and submit a new booking. Creating a booking can
    /// create users and notification targets server-side, so both reference
    /// collections are re-fetched after success.
    pub async fn add_booking(&self, draft: &BookingDraft) -> Result<(), StoreError> {
        let errors = validate_booking(draft);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }
        let normalized = normalize_booking(draft.clone(), &self.users.items());
        self.bookings.create(&normalized.to_record()).await?;
        self.refresh_references().await;
        Ok(())
    }

    pub async fn update_booking(
        &self,
        draft: &BookingDraft,
        previous: &Booking,
    ) -> Result<(), StoreError> {
        let errors = validate_booking(draft);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }
        let normalized = normalize_booking(draft.clone(), &self.users.items());
        self.bookings
            .update(&normalized.to_update_record(previous))
            .await?;
        self.refresh_references().await;
        Ok(())
    }

    pub async fn delete_booking(&self, record: &Booking) -> Result<(), StoreError> {
        self.bookings.delete(record).await
    }

    async fn refresh_references(&self) {
        tokio::join!(self.users.refresh(), self.targets.refresh());
    }

    pub async fn add_team(&self, draft: &TeamDraft) -> Result<(), StoreError> {
        let errors = validate_team(draft, true);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }
        self.teams.create(&draft.to_record()).await
    }

    pub async fn update_team(&self, draft: &TeamDraft, previous: &Team) -> Result<(), StoreError> {
        let errors = validate_team(draft, false);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }
        self.teams.update(&draft.to_update_record(previous)).await
    }

    /// Whether the record may be offered for deletion: the active tenant's
    /// own team never is.
    pub fn can_delete_team(&self, record: &Team) -> bool {
        self.tenant().is_some_and(|tenant| tenant != record.team)
    }

    pub async fn delete_team(&self, record: &Team) -> Result<(), StoreError> {
        if !self.can_delete_team(record) {
            tracing::warn!(team = %record.team, "refusing to delete the active tenant");
            return Err(StoreError::CannotDelete);
        }
        self.teams.delete(record).await
    }

    pub async fn add_user(&self, draft: &UserDraft) -> Result<(), StoreError> {
        let errors = validate_user(draft);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }
        self.users.create(&draft.to_record()).await
    }

    pub async fn update_user(&self, draft: &UserDraft, previous: &User) -> Result<(), StoreError> {
        let errors = validate_user(draft);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }
        let mut record = draft.to_record();
        record.id = previous.id;
        record.team = previous.team.clone();
        record.lastused = previous.lastused;
        self.users.update(&record).await
    }

    pub async fn delete_user(&self, record: &User) -> Result<(), StoreError> {
        self.users.delete(record).await
    }

    /// Drive the notification pairing flow. The server streams
    /// newline-delimited JSON snapshots of the team: QR payloads to scan in
    /// `qrcode`, and finally the paired device in `whatsappid`. Every
    /// decoded snapshot is handed to `on_update`; the last one is returned.
    pub async fn pair_notifications<F>(&self, mut on_update: F) -> Result<Team, StoreError>
    where
        F: FnMut(&Team),
    {
        let auth = self.handle.credential();
        let mut chunks = self
            .transport
            .stream("whatsapp", auth.as_ref())
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "pairing stream could not be opened");
                StoreError::CannotUpdate
            })?;
        let mut buffer: Vec<u8> = Vec::new();
        let mut latest = None;
        while let Some(chunk) = chunks.recv().await {
            let chunk = chunk.map_err(|err| {
                tracing::warn!(error = %err, "pairing stream broke");
                StoreError::CannotUpdate
            })?;
            buffer.extend_from_slice(&chunk);
            while let Some(newline) = buffer.iter().position(|byte| *byte == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                decode_pairing_chunk(&line, &mut on_update, &mut latest);
            }
        }
        if !buffer.is_empty() {
            decode_pairing_chunk(&buffer, &mut on_update, &mut latest);
        }
        latest.ok_or(StoreError::CannotUpdate)
    }

    pub async fn unpair_notifications(&self) -> Result<(), StoreError> {
        let auth = self.handle.credential();
        self.transport
            .request(Verb::Delete, "whatsapp", auth.as_ref(), None)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "unpairing failed");
                StoreError::CannotDelete
            })?;
        Ok(())
    }
}

fn decode_pairing_chunk<F: FnMut(&Team)>(line: &[u8], on_update: &mut F, latest: &mut Option<Team>) {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    match serde_json::from_str::<Team>(text) {
        Ok(team) => {
            on_update(&team);
            *latest = Some(team);
        }
        Err(err) => tracing::warn!(error = %err, "undecodable pairing chunk"),
    }
}

impl<T, V, C> Refresh for FleetClient<T, V, C>
where
    T: Transport,
    V: CredentialVault,
    C: Clock,
{
    async fn refresh_bookings(&self) {
        self.bookings.refresh().await;
    }

    async fn refresh_active(&self) {
        tokio::join!(
            self.bookings.refresh(),
            self.users.refresh(),
            self.boats.refresh(),
        );
    }

    fn polling_allowed(&self) -> bool {
        FleetClient::polling_allowed(self)
    }
}
