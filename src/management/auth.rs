use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};

use crate::{
    error::{AuthError, StorageError},
    management::CredentialStore,
    spotify::SpotifyApi,
    types::{AuthorizationState, SessionLifecycleEvent},
    warning,
};

const EVENT_CAPACITY: usize = 16;

/// Owner of the authorization state.
///
/// The state lock is held for the whole duration of a refresh, so callers
/// arriving while a refresh is in flight wait for it and then see the fresh
/// token instead of issuing a second request. Every credential store write
/// also happens under that lock, which keeps the store in step with memory.
pub struct TokenSession {
    api: Arc<dyn SpotifyApi>,
    store: Arc<dyn CredentialStore>,
    state: Mutex<Option<AuthorizationState>>,
    events: broadcast::Sender<SessionLifecycleEvent>,
}

impl TokenSession {
    pub fn new(api: Arc<dyn SpotifyApi>, store: Arc<dyn CredentialStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            store,
            state: Mutex::new(None),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionLifecycleEvent> {
        self.events.subscribe()
    }

    pub async fn is_authorized(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Adopts freshly issued tokens, persists them and announces the session.
    pub async fn authorize(&self, state: AuthorizationState) {
        let mut guard = self.state.lock().await;
        self.persist(&state).await;
        *guard = Some(state);
        drop(guard);

        self.emit(SessionLifecycleEvent::Authorized);
    }

    /// Restores the session from the credential store.
    ///
    /// Returns `Ok(false)` when nothing usable is stored. Unreadable blobs are
    /// deleted. A stored session whose refresh is only temporarily
    /// unavailable is still adopted; the next `ensure_valid` retries.
    ///
    /// # Errors
    ///
    /// `AuthError::Storage` when the store cannot be read and
    /// `AuthError::RefreshFailed` when the stored refresh token was rejected.
    pub async fn restore(&self) -> Result<bool, AuthError> {
        let Some(blob) = self.store.load().await? else {
            return Ok(false);
        };

        let restored = match AuthorizationState::from_bytes(&blob) {
            Ok(state) => state,
            Err(e) => {
                warning!("Stored credentials are unreadable, discarding them: {}", e);
                if let Err(e) = self.store.delete().await {
                    warning!("{}", e);
                }
                return Ok(false);
            }
        };

        *self.state.lock().await = Some(restored);

        match self.ensure_valid().await {
            Ok(()) => {}
            Err(AuthError::RefreshUnavailable(reason)) => {
                warning!("Could not refresh restored session yet: {}", reason);
            }
            Err(e) => return Err(e),
        }

        self.emit(SessionLifecycleEvent::Authorized);
        Ok(true)
    }

    /// Makes sure the access token is usable, refreshing it when expired.
    ///
    /// # Errors
    ///
    /// See [`access_token`](Self::access_token).
    pub async fn ensure_valid(&self) -> Result<(), AuthError> {
        self.access_token().await.map(|_| ())
    }

    /// Returns a valid access token.
    ///
    /// # Errors
    ///
    /// - `NotAuthorized` when there is no session
    /// - `RefreshFailed` when the provider rejected the refresh token; the
    ///   session is torn down and credentials are deleted
    /// - `RefreshUnavailable` on transport errors, server errors or rate
    ///   limiting; the session is kept
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut guard = self.state.lock().await;
        let Some(current) = guard.as_ref() else {
            return Err(AuthError::NotAuthorized);
        };

        if !current.is_expired() {
            return Ok(current.access_token.clone());
        }

        let Some(refresh_token) = current.refresh_token.clone() else {
            guard.take();
            self.discard_stored().await;
            drop(guard);
            self.emit(SessionLifecycleEvent::RefreshFailed);
            return Err(AuthError::RefreshFailed(
                "token expired and no refresh token is available".to_string(),
            ));
        };

        match self.api.refresh_token(&refresh_token).await {
            Ok(grant) => {
                let refreshed = AuthorizationState::from_grant(grant, Some(refresh_token));
                let token = refreshed.access_token.clone();
                self.persist(&refreshed).await;
                *guard = Some(refreshed);
                Ok(token)
            }
            // a rejected refresh token cannot heal, tear the session down
            Err(e) if e.is_client_error() => {
                guard.take();
                self.discard_stored().await;
                drop(guard);
                self.emit(SessionLifecycleEvent::RefreshFailed);
                Err(AuthError::RefreshFailed(e.to_string()))
            }
            Err(e) => Err(AuthError::RefreshUnavailable(e.to_string())),
        }
    }

    /// Signs out: forgets the tokens in memory and in the store.
    pub async fn deauthorize(&self) {
        let mut guard = self.state.lock().await;
        guard.take();
        self.discard_stored().await;
        drop(guard);

        self.emit(SessionLifecycleEvent::Deauthorized);
    }

    async fn persist(&self, state: &AuthorizationState) {
        let blob = match state.to_bytes() {
            Ok(blob) => blob,
            Err(e) => {
                warning!("{}", StorageError::SaveFailed(e.to_string()));
                return;
            }
        };

        if let Err(e) = self.store.save(&blob).await {
            warning!("{}", e);
        }
    }

    async fn discard_stored(&self) {
        if let Err(e) = self.store.delete().await {
            warning!("{}", e);
        }
    }

    fn emit(&self, event: SessionLifecycleEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}
