use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AuthError, CommandError},
    management::PublishedState,
    server::AppState,
};

/// Body of every command route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub ok: bool,
    pub error: Option<String>,
}

type CommandReply = (StatusCode, Json<CommandResponse>);

fn reply(result: Result<(), CommandError>) -> CommandReply {
    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(CommandResponse {
                ok: true,
                error: None,
            }),
        ),
        Err(e) => (
            status_for(&e),
            Json(CommandResponse {
                ok: false,
                error: Some(e.to_string()),
            }),
        ),
    }
}

/// Preconditions the caller can fix are a conflict, everything that failed
/// on the remote side is a bad gateway.
pub fn status_for(err: &CommandError) -> StatusCode {
    match err {
        CommandError::NoEligibleTrack | CommandError::NoDefaultPlaylist => StatusCode::CONFLICT,
        CommandError::NotAuthorized(AuthError::RefreshUnavailable(_)) => StatusCode::BAD_GATEWAY,
        CommandError::NotAuthorized(_) => StatusCode::CONFLICT,
        CommandError::RemoteCallFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

pub async fn state(State(app): State<AppState>) -> Json<PublishedState> {
    Json(app.controller.state())
}

pub async fn remove_and_skip(State(app): State<AppState>) -> CommandReply {
    reply(app.controller.remove_and_skip().await)
}

pub async fn skip(State(app): State<AppState>) -> CommandReply {
    reply(app.controller.skip_to_next().await)
}

pub async fn favorite(State(app): State<AppState>) -> CommandReply {
    reply(app.controller.add_to_default_playlist().await)
}

#[derive(Debug, Default, Deserialize)]
pub struct AddOptions {
    #[serde(default)]
    remove: bool,
}

pub async fn add_to_playlist(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(options): Query<AddOptions>,
) -> CommandReply {
    reply(app.controller.add_to_playlist(&id, options.remove).await)
}

pub async fn refresh_playlists(State(app): State<AppState>) -> CommandReply {
    reply(app.controller.fetch_playlists().await)
}

pub async fn sign_out(State(app): State<AppState>) -> CommandReply {
    app.controller.sign_out().await;
    reply(Ok(()))
}
