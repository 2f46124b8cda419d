//! # Spotify Integration Module
//!
//! The remote side of tunectl: the [`SpotifyApi`] capability the session core
//! depends on, its reqwest implementation, and the PKCE authorization flow.
//!
//! ```text
//! Session core (management)
//!          ↓
//! SpotifyApi trait  ←  test doubles
//!          ↓
//! WebApiClient (reqwest, JSON)
//!          ↓
//! Accounts service + Web API
//! ```
//!
//! ## Modules
//!
//! - [`auth`] - PKCE authorization: verifier/challenge/state generation,
//!   authorization URL, callback validation and code exchange
//! - [`client`] - [`client::WebApiClient`], the HTTP implementation of
//!   [`SpotifyApi`]
//!
//! ## Endpoints
//!
//! - `GET /me/player` - current playback (204 when nothing is active)
//! - `GET /me/playlists` - the user's playlists, paginated
//! - `DELETE /playlists/{id}/tracks` - remove every occurrence of tracks
//! - `POST /playlists/{id}/tracks` - append tracks
//! - `POST /me/player/next` - skip
//! - `PUT /me/player/seek` - seek within the current track
//! - `POST /api/token` - code exchange and refresh grants
//!
//! Every call is a single attempt. Timeouts are left to the transport and
//! rate limiting is reported, not retried.

use async_trait::async_trait;

use crate::{
    error::RemoteError,
    types::{CurrentPlayback, PlaylistPage, TokenGrant},
};

pub mod auth;
pub mod client;

pub use auth::PkceFlow;
pub use client::WebApiClient;

/// Typed remote operations the session core relies on.
///
/// Web API calls take the bearer token explicitly; the token session decides
/// which token is valid. Playlist arguments are full `spotify:playlist:` URIs.
#[async_trait]
pub trait SpotifyApi: Send + Sync {
    async fn get_current_playback(&self, token: &str)
    -> Result<Option<CurrentPlayback>, RemoteError>;

    async fn list_current_user_playlists(
        &self,
        token: &str,
        limit: u32,
        offset: u32,
    ) -> Result<PlaylistPage, RemoteError>;

    async fn remove_all_occurrences(
        &self,
        token: &str,
        playlist_uri: &str,
        track_uris: &[String],
    ) -> Result<(), RemoteError>;

    async fn add_items(
        &self,
        token: &str,
        playlist_uri: &str,
        track_uris: &[String],
    ) -> Result<(), RemoteError>;

    async fn skip_to_next(&self, token: &str) -> Result<(), RemoteError>;

    async fn seek(&self, token: &str, position_ms: u64) -> Result<(), RemoteError>;

    async fn exchange_authorization_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<TokenGrant, RemoteError>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, RemoteError>;
}
