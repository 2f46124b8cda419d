use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Seconds before the provider's expiry at which a token is treated as
/// expired, so a request never races the real deadline.
pub const EXPIRY_MARGIN_SECS: i64 = 240;

/// Tokens issued by the accounts service, as held by the token session and
/// persisted (serialized) in the credential store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) at which the access token expires.
    pub expires_at: i64,
    pub scopes: Vec<String>,
}

impl AuthorizationState {
    pub fn from_grant(grant: TokenGrant, previous_refresh: Option<String>) -> Self {
        Self {
            access_token: grant.access_token,
            // the provider may omit the refresh token on refresh, keep the old one
            refresh_token: grant
                .refresh_token
                .filter(|t| !t.is_empty())
                .or(previous_refresh),
            expires_at: Utc::now().timestamp() + grant.expires_in as i64,
            scopes: grant
                .scope
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at - EXPIRY_MARGIN_SECS
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl fmt::Debug for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationState")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Raw grant returned by the token endpoint for both the code exchange and
/// the refresh grant.
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_expires_in() -> u64 {
    3600
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// State of a login between `begin_authorization` and the callback.
#[derive(Clone)]
pub struct PendingAuthorization {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
    pub created_at: i64,
}

impl fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("challenge", &self.challenge)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub id: Option<String>,
    pub uri: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
}

/// Most recently polled view of remote playback.
///
/// `playlist_context` is only ever set together with a track that is
/// playing from a playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub track: Option<TrackRef>,
    pub playlist_context: Option<String>,
}

impl PlaybackSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRef {
    pub id: String,
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLifecycleEvent {
    Authorized,
    Deauthorized,
    RefreshFailed,
}

/// Playback as reported by the player endpoint, reduced to what the core
/// classifies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentPlayback {
    pub track: Option<TrackRef>,
    pub context: Option<PlaybackContext>,
    pub is_playing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackContext {
    #[serde(rename = "type")]
    pub kind: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistPage {
    pub items: Vec<PlaylistRef>,
    pub total: u32,
}

// Wire shapes of the Web API.

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentPlaybackResponse {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub currently_playing_type: Option<String>,
    #[serde(default)]
    pub context: Option<PlaybackContext>,
    #[serde(default)]
    pub item: Option<PlayableItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayableItem {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistName>,
    #[serde(default)]
    pub album: Option<AlbumName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistName {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumName {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetUserPlaylistsResponse {
    // the API occasionally returns null entries
    pub items: Vec<Option<PlaylistItem>>,
    #[serde(default)]
    pub total: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    pub id: String,
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTrackToPlaylistRequest {
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveTracksRequest {
    pub tracks: Vec<TrackUri>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackUri {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot_id: String,
}
