use std::{sync::Arc, time::Duration};

use parking_lot::RwLock;
use tokio::{sync::Mutex, time::sleep};

use crate::{
    config::Preferences,
    error::{CommandError, CommandStep},
    info,
    management::{ErrorCategory, NowPlayingPoller, StateManager, TokenSession},
    spotify::SpotifyApi,
    success,
    types::PlaylistRef,
    utils, warning,
};

/// Wait after a skip before seeking or re-reading playback, so the provider
/// has registered the new track.
pub const SKIP_SETTLE_DELAY: Duration = Duration::from_millis(300);
/// Wait after a playlist mutation before re-reading playback.
pub const MUTATION_SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const PLAYLIST_PAGE_SIZE: u32 = 50;

/// Runs user commands as ordered sequences of remote calls.
///
/// Commands are serialized against each other and read the latest published
/// snapshot before mutating anything. A failing step aborts the remaining
/// ones; steps already applied remotely are not rolled back.
pub struct CommandCoordinator {
    api: Arc<dyn SpotifyApi>,
    session: Arc<TokenSession>,
    state: Arc<StateManager>,
    poller: Arc<NowPlayingPoller>,
    preferences: Arc<RwLock<Preferences>>,
    serial: Mutex<()>,
    playlists: Mutex<()>,
}

impl CommandCoordinator {
    pub fn new(
        api: Arc<dyn SpotifyApi>,
        session: Arc<TokenSession>,
        state: Arc<StateManager>,
        poller: Arc<NowPlayingPoller>,
        preferences: Arc<RwLock<Preferences>>,
    ) -> Self {
        Self {
            api,
            session,
            state,
            poller,
            preferences,
            serial: Mutex::new(()),
            playlists: Mutex::new(()),
        }
    }

    /// Removes the current track from the playlist it plays from, skips to
    /// the next track and seeks into it by the configured offset.
    ///
    /// # Errors
    ///
    /// `NoEligibleTrack` without any remote call when nothing plays from a
    /// playlist, otherwise the first failing step.
    pub async fn remove_and_skip(&self) -> Result<(), CommandError> {
        let _serial = self.serial.lock().await;
        let result = self.run_remove_and_skip().await;
        self.publish(ErrorCategory::Command, "Remove and skip", result)
    }

    async fn run_remove_and_skip(&self) -> Result<(), CommandError> {
        let snapshot = self.state.snapshot();
        let (Some(track), Some(context)) = (snapshot.track, snapshot.playlist_context) else {
            return Err(CommandError::NoEligibleTrack);
        };
        let playlist = utils::playlist_uri(&context);
        let token = self.session.access_token().await?;

        info!("Removing '{}' from {}", track.name, playlist);
        self.api
            .remove_all_occurrences(&token, &playlist, &[track.uri.clone()])
            .await
            .map_err(CommandError::remote(CommandStep::RemoveTrack))?;

        self.api
            .skip_to_next(&token)
            .await
            .map_err(CommandError::remote(CommandStep::SkipToNext))?;

        sleep(SKIP_SETTLE_DELAY).await;
        let offset_ms = self.preferences.read().skip_offset_ms();
        self.api
            .seek(&token, offset_ms)
            .await
            .map_err(CommandError::remote(CommandStep::Seek))?;

        sleep(SKIP_SETTLE_DELAY).await;
        self.refresh_snapshot().await;

        success!("Removed '{}' and skipped", track.name);
        Ok(())
    }

    /// Adds the current track to `target_playlist_id`. With
    /// `remove_from_current` the track is also removed from the playlist it
    /// plays from and playback skips ahead; without a playlist context that
    /// part is left out.
    ///
    /// # Errors
    ///
    /// `NoEligibleTrack` when nothing plays, otherwise the first failing step.
    pub async fn add_to_playlist(
        &self,
        target_playlist_id: &str,
        remove_from_current: bool,
    ) -> Result<(), CommandError> {
        let _serial = self.serial.lock().await;
        let result = self
            .run_add_to_playlist(target_playlist_id, remove_from_current)
            .await;
        self.publish(ErrorCategory::Command, "Add to playlist", result)
    }

    async fn run_add_to_playlist(
        &self,
        target_playlist_id: &str,
        remove_from_current: bool,
    ) -> Result<(), CommandError> {
        let snapshot = self.state.snapshot();
        let Some(track) = snapshot.track else {
            return Err(CommandError::NoEligibleTrack);
        };
        let target = utils::playlist_uri(target_playlist_id);
        let token = self.session.access_token().await?;

        self.api
            .add_items(&token, &target, &[track.uri.clone()])
            .await
            .map_err(CommandError::remote(CommandStep::AddTrack))?;
        info!("Added '{}' to {}", track.name, target);

        let source = snapshot
            .playlist_context
            .map(|context| utils::playlist_uri(&context))
            // removing from the target would undo the add
            .filter(|source| *source != target);

        if remove_from_current {
            if let Some(source) = source {
                self.api
                    .remove_all_occurrences(&token, &source, &[track.uri.clone()])
                    .await
                    .map_err(CommandError::remote(CommandStep::RemoveTrack))?;

                self.api
                    .skip_to_next(&token)
                    .await
                    .map_err(CommandError::remote(CommandStep::SkipToNext))?;
                info!("Removed '{}' from {}", track.name, source);
            }
        }

        sleep(MUTATION_SETTLE_DELAY).await;
        self.refresh_snapshot().await;
        Ok(())
    }

    /// The "favorites" action: adds the current track to the configured
    /// default playlist and moves on.
    ///
    /// # Errors
    ///
    /// `NoDefaultPlaylist` without any remote call when none is configured.
    pub async fn add_to_default_playlist(&self) -> Result<(), CommandError> {
        let default_playlist = self
            .preferences
            .read()
            .default_playlist_id
            .clone()
            .filter(|id| !id.trim().is_empty());

        match default_playlist {
            Some(id) => self.add_to_playlist(&id, true).await,
            None => self.publish(
                ErrorCategory::Command,
                "Add to default playlist",
                Err(CommandError::NoDefaultPlaylist),
            ),
        }
    }

    /// # Errors
    ///
    /// Returns the failure of the skip call.
    pub async fn skip_to_next(&self) -> Result<(), CommandError> {
        let _serial = self.serial.lock().await;
        let result = self.run_skip_to_next().await;
        self.publish(ErrorCategory::Command, "Skip", result)
    }

    async fn run_skip_to_next(&self) -> Result<(), CommandError> {
        let token = self.session.access_token().await?;
        self.api
            .skip_to_next(&token)
            .await
            .map_err(CommandError::remote(CommandStep::SkipToNext))?;

        sleep(MUTATION_SETTLE_DELAY).await;
        self.refresh_snapshot().await;
        Ok(())
    }

    /// Reloads the whole playlist collection and replaces the published one
    /// in a single step. The loading flag is raised for the duration.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first page that could not be fetched; the
    /// previous collection is kept in that case. A collection fetched for a
    /// session that has since ended is dropped.
    pub async fn fetch_playlists(&self) -> Result<(), CommandError> {
        let _playlists = self.playlists.lock().await;
        let generation = self.state.generation();
        let _loading = self.state.loading();

        let result = match self.collect_playlists().await {
            Ok(playlists) => {
                let count = playlists.len();
                if self.session.is_authorized().await
                    && self.state.set_playlists_for(generation, playlists)
                {
                    info!("Loaded {} playlists", count);
                } else {
                    info!("Dropped playlists of an ended session");
                }
                Ok(())
            }
            Err(e) => Err(e),
        };
        self.publish(ErrorCategory::Playlists, "Fetch playlists", result)
    }

    async fn collect_playlists(&self) -> Result<Vec<PlaylistRef>, CommandError> {
        let token = self.session.access_token().await?;
        let mut playlists: Vec<PlaylistRef> = Vec::new();
        let mut offset = 0;

        loop {
            let page = self
                .api
                .list_current_user_playlists(&token, PLAYLIST_PAGE_SIZE, offset)
                .await
                .map_err(CommandError::remote(CommandStep::FetchPlaylists))?;

            let count = page.items.len();
            playlists.extend(page.items);

            if count < PLAYLIST_PAGE_SIZE as usize || playlists.len() >= page.total as usize {
                break;
            }
            offset += PLAYLIST_PAGE_SIZE;
        }

        Ok(playlists)
    }

    async fn refresh_snapshot(&self) {
        if let Err(e) = self.poller.refresh_now().await {
            warning!("Failed to refresh now playing: {}", e);
        }
    }

    fn publish<T>(
        &self,
        category: ErrorCategory,
        action: &str,
        result: Result<T, CommandError>,
    ) -> Result<T, CommandError> {
        match &result {
            Ok(_) => self.state.clear_error(category),
            Err(e) => {
                warning!("{} failed: {}", action, e);
                self.state.set_error(category, format!("{action} failed: {e}"));
            }
        }
        result
    }
}
