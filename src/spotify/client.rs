use async_trait::async_trait;
use reqwest::{
    Client, Response, StatusCode,
    header::{CONTENT_LENGTH, RETRY_AFTER},
};
use serde_json::Value;

use crate::{
    config::SpotifyConfig,
    error::RemoteError,
    spotify::SpotifyApi,
    types::{
        AddTrackToPlaylistRequest, CurrentPlayback, CurrentPlaybackResponse,
        GetUserPlaylistsResponse, PlaylistPage, PlaylistRef, RemoveTracksRequest,
        SnapshotResponse, TokenGrant, TrackRef, TrackUri,
    },
    utils,
};

/// [`SpotifyApi`] over the Spotify Web API and accounts service.
#[derive(Debug, Clone)]
pub struct WebApiClient {
    http: Client,
    config: SpotifyConfig,
}

impl WebApiClient {
    pub fn new(config: SpotifyConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn with_client(http: Client, config: SpotifyConfig) -> Self {
        Self { http, config }
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{base}{path}",
            base = self.config.api_url.trim_end_matches('/'),
        )
    }

    async fn token_grant(&self, form: &[(&str, &str)]) -> Result<TokenGrant, RemoteError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;

        let response = check_status(response).await?;
        response
            .json::<TokenGrant>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SpotifyApi for WebApiClient {
    async fn get_current_playback(
        &self,
        token: &str,
    ) -> Result<Option<CurrentPlayback>, RemoteError> {
        let response = self
            .http
            .get(self.api_url("/me/player"))
            .bearer_auth(token)
            .send()
            .await?;

        // no active device
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let response = check_status(response).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let playback: CurrentPlaybackResponse =
            serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))?;

        Ok(Some(into_current_playback(playback)))
    }

    async fn list_current_user_playlists(
        &self,
        token: &str,
        limit: u32,
        offset: u32,
    ) -> Result<PlaylistPage, RemoteError> {
        let response = self
            .http
            .get(self.api_url("/me/playlists"))
            .query(&[("limit", limit), ("offset", offset)])
            .bearer_auth(token)
            .send()
            .await?;

        let page = check_status(response)
            .await?
            .json::<GetUserPlaylistsResponse>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        Ok(PlaylistPage {
            items: page
                .items
                .into_iter()
                .flatten()
                .map(|p| PlaylistRef {
                    id: p.id,
                    uri: p.uri,
                    name: p.name,
                })
                .collect(),
            total: page.total,
        })
    }

    async fn remove_all_occurrences(
        &self,
        token: &str,
        playlist_uri: &str,
        track_uris: &[String],
    ) -> Result<(), RemoteError> {
        let body = RemoveTracksRequest {
            tracks: track_uris
                .iter()
                .map(|uri| TrackUri { uri: uri.clone() })
                .collect(),
        };

        let response = self
            .http
            .delete(self.api_url(&format!(
                "/playlists/{id}/tracks",
                id = utils::playlist_id(playlist_uri)
            )))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        check_status(response)
            .await?
            .json::<SnapshotResponse>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(())
    }

    async fn add_items(
        &self,
        token: &str,
        playlist_uri: &str,
        track_uris: &[String],
    ) -> Result<(), RemoteError> {
        let body = AddTrackToPlaylistRequest {
            uris: track_uris.to_vec(),
        };

        let response = self
            .http
            .post(self.api_url(&format!(
                "/playlists/{id}/tracks",
                id = utils::playlist_id(playlist_uri)
            )))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        check_status(response)
            .await?
            .json::<SnapshotResponse>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(())
    }

    async fn skip_to_next(&self, token: &str) -> Result<(), RemoteError> {
        let response = self
            .http
            .post(self.api_url("/me/player/next"))
            .bearer_auth(token)
            .header(CONTENT_LENGTH, 0)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn seek(&self, token: &str, position_ms: u64) -> Result<(), RemoteError> {
        let response = self
            .http
            .put(self.api_url("/me/player/seek"))
            .query(&[("position_ms", position_ms)])
            .bearer_auth(token)
            .header(CONTENT_LENGTH, 0)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn exchange_authorization_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<TokenGrant, RemoteError> {
        self.token_grant(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, RemoteError> {
        self.token_grant(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ])
        .await
    }
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);
        return Err(RemoteError::RateLimited { retry_after_secs });
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        message: error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        }),
    })
}

/// Pulls a message out of either error shape: the accounts service's
/// `{error, error_description}` or the Web API's `{error: {status, message}}`.
fn error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    match &json["error"] {
        Value::String(code) => Some(match json["error_description"].as_str() {
            Some(description) => format!("{code}: {description}"),
            None => code.clone(),
        }),
        Value::Object(error) => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn into_current_playback(playback: CurrentPlaybackResponse) -> CurrentPlayback {
    // episodes, ads and unknown items are not tracks
    let is_track = playback
        .currently_playing_type
        .as_deref()
        .is_none_or(|kind| kind == "track");

    let track = playback
        .item
        .filter(|item| is_track && item.kind.as_deref().is_none_or(|kind| kind == "track"))
        .and_then(|item| {
            let uri = item.uri?;
            Some(TrackRef {
                id: item.id,
                uri,
                name: item.name,
                artists: item.artists.into_iter().map(|a| a.name).collect(),
                album: item.album.map(|a| a.name),
            })
        });

    CurrentPlayback {
        track,
        context: playback.context,
        is_playing: playback.is_playing,
    }
}
