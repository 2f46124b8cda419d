use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use url::Url;

use crate::{
    Res,
    config::{Config, Preferences},
    error::{AuthError, CommandError, ConfigError},
    info,
    management::{
        CommandCoordinator, CredentialStore, ErrorCategory, NowPlayingPoller, PublishedState,
        StateManager, TokenSession,
    },
    spotify::{PkceFlow, SpotifyApi},
    success,
    types::SessionLifecycleEvent,
    warning,
};

/// The one object collaborators talk to.
///
/// Owns the authorization flow, the token session, the poller and the
/// command coordinator, and turns session lifecycle events into poller
/// start/stop and published state. Build exactly one per process and hand
/// out the `Arc`.
pub struct SessionController {
    flow: PkceFlow,
    session: Arc<TokenSession>,
    state: Arc<StateManager>,
    poller: Arc<NowPlayingPoller>,
    commands: Arc<CommandCoordinator>,
    preferences: Arc<RwLock<Preferences>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    /// Wires the components together and starts listening for session
    /// events. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// `ConfigError` when the authorization endpoint is not a valid URL.
    pub fn new(
        config: &Config,
        api: Arc<dyn SpotifyApi>,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Arc<Self>, ConfigError> {
        let flow = PkceFlow::new(config.spotify.clone(), Arc::clone(&api))?;
        let session = Arc::new(TokenSession::new(Arc::clone(&api), store));
        let state = Arc::new(StateManager::new());
        let preferences = Arc::new(RwLock::new(config.preferences.clone()));
        let poller = Arc::new(NowPlayingPoller::new(
            Arc::clone(&api),
            Arc::clone(&session),
            Arc::clone(&state),
            config.poll_interval,
        ));
        let commands = Arc::new(CommandCoordinator::new(
            api,
            Arc::clone(&session),
            Arc::clone(&state),
            Arc::clone(&poller),
            Arc::clone(&preferences),
        ));

        let events = session.subscribe();
        let controller = Arc::new(Self {
            flow,
            session,
            state,
            poller,
            commands,
            preferences,
            listener: Mutex::new(None),
        });

        let listener = tokio::spawn(listen(Arc::downgrade(&controller), events));
        *controller.listener.lock() = Some(listener);

        Ok(controller)
    }

    /// Restores a stored session. Without stored credentials the controller
    /// simply stays signed out. A rejected refresh is published by the
    /// `RefreshFailed` handler.
    pub async fn init(&self) {
        match self.session.restore().await {
            Ok(true) => info!("Restored stored session"),
            Ok(false) => info!("No stored session, sign in to start"),
            Err(AuthError::Storage(e)) => warning!("Could not read stored session: {}", e),
            Err(e) => warning!("Stored session could not be restored: {}", e),
        }
    }

    pub fn state(&self) -> PublishedState {
        self.state.current()
    }

    /// Every committed state transition, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedState> {
        self.state.subscribe()
    }

    pub async fn is_authorized(&self) -> bool {
        self.session.is_authorized().await
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences.read().clone()
    }

    pub fn set_preferences(&self, preferences: Preferences) {
        *self.preferences.write() = preferences;
    }

    /// Starts a login and returns the URL to open in a browser. Replaces any
    /// login still pending.
    pub fn authorize(&self) -> Url {
        self.flow.begin_authorization()
    }

    /// Completes a login from the redirect URL delivered by the OS or the
    /// local callback server.
    ///
    /// # Errors
    ///
    /// The `AuthError` of the flow; it is also published as last error.
    pub async fn handle_callback(&self, callback_url: &str) -> Result<(), AuthError> {
        match self.flow.complete_authorization(callback_url).await {
            Ok(state) => {
                self.session.authorize(state).await;
                self.state.clear_error(ErrorCategory::Auth);
                success!("Authorization successful");
                Ok(())
            }
            Err(e) => {
                warning!("Authorization failed: {}", e);
                self.state
                    .set_error(ErrorCategory::Auth, format!("Authorization failed: {e}"));
                Err(e)
            }
        }
    }

    pub async fn sign_out(&self) {
        self.session.deauthorize().await;
        info!("Signed out");
    }

    /// # Errors
    ///
    /// See [`CommandCoordinator::remove_and_skip`].
    pub async fn remove_and_skip(&self) -> Result<(), CommandError> {
        self.commands.remove_and_skip().await
    }

    /// # Errors
    ///
    /// See [`CommandCoordinator::add_to_playlist`].
    pub async fn add_to_playlist(
        &self,
        target_playlist_id: &str,
        remove_from_current: bool,
    ) -> Result<(), CommandError> {
        self.commands
            .add_to_playlist(target_playlist_id, remove_from_current)
            .await
    }

    /// # Errors
    ///
    /// See [`CommandCoordinator::add_to_default_playlist`].
    pub async fn add_to_default_playlist(&self) -> Result<(), CommandError> {
        self.commands.add_to_default_playlist().await
    }

    /// # Errors
    ///
    /// See [`CommandCoordinator::skip_to_next`].
    pub async fn skip_to_next(&self) -> Result<(), CommandError> {
        self.commands.skip_to_next().await
    }

    /// # Errors
    ///
    /// See [`CommandCoordinator::fetch_playlists`].
    pub async fn fetch_playlists(&self) -> Result<(), CommandError> {
        self.commands.fetch_playlists().await
    }

    /// # Errors
    ///
    /// Returns the failure of the fetch.
    pub async fn refresh_now_playing(&self) -> Res<()> {
        self.poller.refresh_now().await
    }

    /// Stops polling and event handling. The session itself is kept.
    pub fn shutdown(&self) {
        self.poller.stop();
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
    }

    fn handle_event(&self, event: SessionLifecycleEvent) {
        match event {
            SessionLifecycleEvent::Authorized => {
                self.state.set_authorized(true);
                self.poller.start();
                // off the listener, so a later sign-out is not queued behind it
                let commands = Arc::clone(&self.commands);
                tokio::spawn(async move {
                    // failures are published by the coordinator
                    let _ = commands.fetch_playlists().await;
                });
            }
            SessionLifecycleEvent::Deauthorized | SessionLifecycleEvent::RefreshFailed => {
                self.poller.stop();
                self.state.reset_session();
                if event == SessionLifecycleEvent::RefreshFailed {
                    self.state
                        .set_error(ErrorCategory::Auth, "Session expired, please sign in again");
                }
            }
        }
    }
}

async fn listen(
    controller: Weak<SessionController>,
    mut events: broadcast::Receiver<SessionLifecycleEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                warning!("Missed {} session events", missed);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let Some(controller) = controller.upgrade() else {
            break;
        };
        controller.handle_event(event);
    }
}
