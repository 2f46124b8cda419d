#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use tunectl::{
    config::{Config, Preferences, SpotifyConfig},
    error::RemoteError,
    spotify::SpotifyApi,
    types::{
        AuthorizationState, CurrentPlayback, PlaybackContext, PlaylistPage, PlaylistRef,
        TokenGrant, TrackRef,
    },
};

/// A remote call as seen by the fake, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentPlayback,
    ListPlaylists { limit: u32, offset: u32 },
    Remove { playlist: String, tracks: Vec<String> },
    Add { playlist: String, tracks: Vec<String> },
    Skip,
    Seek(u64),
    Exchange { code: String, verifier: String },
    Refresh(String),
}

impl Call {
    /// Calls that change remote state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::Remove { .. } | Call::Add { .. } | Call::Skip | Call::Seek(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Playback,
    Playlists,
    Remove,
    Add,
    Skip,
    Seek,
    Exchange,
    Refresh,
}

/// Scripted in-memory Spotify.
#[derive(Default)]
pub struct FakeSpotify {
    calls: Mutex<Vec<Call>>,
    playback: Mutex<Option<CurrentPlayback>>,
    playlists: Mutex<Vec<PlaylistRef>>,
    failures: Mutex<HashMap<Op, RemoteError>>,
    delays: Mutex<HashMap<Op, Duration>>,
    grant_lifetime: Mutex<Option<u64>>,
    refreshes: AtomicUsize,
    playback_in_flight: AtomicUsize,
    playback_max_in_flight: AtomicUsize,
}

impl FakeSpotify {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_playback(&self, playback: Option<CurrentPlayback>) {
        *self.playback.lock() = playback;
    }

    pub fn set_playlists(&self, playlists: Vec<PlaylistRef>) {
        *self.playlists.lock() = playlists;
    }

    pub fn fail(&self, op: Op, err: RemoteError) {
        self.failures.lock().insert(op, err);
    }

    pub fn succeed(&self, op: Op) {
        self.failures.lock().remove(&op);
    }

    pub fn delay(&self, op: Op, delay: Duration) {
        self.delays.lock().insert(op, delay);
    }

    /// Lifetime in seconds of every issued grant. Anything at or below the
    /// expiry margin is already expired when issued.
    pub fn set_grant_lifetime(&self, secs: u64) {
        *self.grant_lifetime.lock() = Some(secs);
    }

    fn issue(&self, access_token: &str, refresh_token: Option<&str>) -> TokenGrant {
        let mut grant = grant(access_token, refresh_token);
        if let Some(secs) = *self.grant_lifetime.lock() {
            grant.expires_in = secs;
        }
        grant
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| matches(c)).count()
    }

    pub fn playback_fetches(&self) -> usize {
        self.count(|c| *c == Call::CurrentPlayback)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_playback_fetches(&self) -> usize {
        self.playback_max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: Op, call: Call) -> Result<(), RemoteError> {
        self.calls.lock().push(call);

        let delay = self.delays.lock().get(&op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.failures.lock().get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SpotifyApi for FakeSpotify {
    async fn get_current_playback(
        &self,
        _token: &str,
    ) -> Result<Option<CurrentPlayback>, RemoteError> {
        let now = self.playback_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.playback_max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.enter(Op::Playback, Call::CurrentPlayback).await;
        self.playback_in_flight.fetch_sub(1, Ordering::SeqCst);

        result.map(|()| self.playback.lock().clone())
    }

    async fn list_current_user_playlists(
        &self,
        _token: &str,
        limit: u32,
        offset: u32,
    ) -> Result<PlaylistPage, RemoteError> {
        self.enter(Op::Playlists, Call::ListPlaylists { limit, offset })
            .await?;

        let playlists = self.playlists.lock();
        let items = playlists
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(PlaylistPage {
            items,
            total: playlists.len() as u32,
        })
    }

    async fn remove_all_occurrences(
        &self,
        _token: &str,
        playlist_uri: &str,
        track_uris: &[String],
    ) -> Result<(), RemoteError> {
        self.enter(
            Op::Remove,
            Call::Remove {
                playlist: playlist_uri.to_string(),
                tracks: track_uris.to_vec(),
            },
        )
        .await
    }

    async fn add_items(
        &self,
        _token: &str,
        playlist_uri: &str,
        track_uris: &[String],
    ) -> Result<(), RemoteError> {
        self.enter(
            Op::Add,
            Call::Add {
                playlist: playlist_uri.to_string(),
                tracks: track_uris.to_vec(),
            },
        )
        .await
    }

    async fn skip_to_next(&self, _token: &str) -> Result<(), RemoteError> {
        self.enter(Op::Skip, Call::Skip).await
    }

    async fn seek(&self, _token: &str, position_ms: u64) -> Result<(), RemoteError> {
        self.enter(Op::Seek, Call::Seek(position_ms)).await
    }

    async fn exchange_authorization_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<TokenGrant, RemoteError> {
        self.enter(
            Op::Exchange,
            Call::Exchange {
                code: code.to_string(),
                verifier: verifier.to_string(),
            },
        )
        .await?;
        Ok(self.issue("access-1", Some("refresh-1")))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, RemoteError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        self.enter(Op::Refresh, Call::Refresh(refresh_token.to_string()))
            .await?;
        Ok(self.issue(&format!("access-refreshed-{n}"), None))
    }
}

pub fn grant(access_token: &str, refresh_token: Option<&str>) -> TokenGrant {
    TokenGrant {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        expires_in: 3600,
        scope: Some("user-read-playback-state playlist-modify-private".to_string()),
    }
}

pub fn valid_state() -> AuthorizationState {
    AuthorizationState {
        access_token: "access-stored".to_string(),
        refresh_token: Some("refresh-stored".to_string()),
        expires_at: Utc::now().timestamp() + 3600,
        scopes: vec!["user-read-playback-state".to_string()],
    }
}

pub fn expired_state() -> AuthorizationState {
    AuthorizationState {
        expires_at: Utc::now().timestamp() - 10,
        ..valid_state()
    }
}

pub fn invalid_grant() -> RemoteError {
    RemoteError::Status {
        status: 400,
        message: "invalid_grant: Refresh token revoked".to_string(),
    }
}

pub fn track(id: &str) -> TrackRef {
    TrackRef {
        id: Some(id.to_string()),
        uri: format!("spotify:track:{id}"),
        name: format!("Track {id}"),
        artists: vec!["Some Artist".to_string()],
        album: Some("Some Album".to_string()),
    }
}

pub fn playing(track_id: &str, context: Option<(&str, &str)>) -> CurrentPlayback {
    CurrentPlayback {
        track: Some(track(track_id)),
        context: context.map(|(kind, uri)| PlaybackContext {
            kind: kind.to_string(),
            uri: uri.to_string(),
        }),
        is_playing: true,
    }
}

pub fn playing_from_playlist(track_id: &str, playlist_uri: &str) -> CurrentPlayback {
    playing(track_id, Some(("playlist", playlist_uri)))
}

pub fn playlists(n: usize) -> Vec<PlaylistRef> {
    (0..n)
        .map(|i| PlaylistRef {
            id: format!("pl{i}"),
            uri: format!("spotify:playlist:pl{i}"),
            name: format!("Playlist {i}"),
        })
        .collect()
}

pub fn test_config() -> Config {
    Config {
        spotify: SpotifyConfig::new("test-client"),
        server_address: "127.0.0.1:0".to_string(),
        poll_interval: Duration::from_secs(5),
        preferences: Preferences {
            default_playlist_id: Some("favorites".to_string()),
            default_playlist_name: Some("Favorites".to_string()),
            skip_offset_secs: 30,
        },
    }
}

/// Waits (in virtual or real time) until `condition` holds.
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
