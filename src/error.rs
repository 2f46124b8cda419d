//! Error taxonomy of the session core.
//!
//! Storage and poll failures are absorbed where they occur; auth and command
//! errors are surfaced through the published `last_error` field and returned
//! to the caller.

use std::fmt;

use thiserror::Error;

/// Failure reported by the remote service or the transport in front of it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("spotify returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// A 4xx answer other than rate limiting. For the token endpoint this
    /// means the grant itself was rejected.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RemoteError::Status { status, .. } if (400..500).contains(status))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return RemoteError::Decode(err.to_string());
        }
        match err.status() {
            Some(status) => RemoteError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => RemoteError::Transport(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("failed to save credentials: {0}")]
    SaveFailed(String),

    #[error("failed to load credentials: {0}")]
    LoadFailed(String),

    #[error("failed to delete credentials: {0}")]
    DeleteFailed(String),

    #[error("stored credentials are unreadable: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("not authorized")]
    NotAuthorized,

    #[error("authorization state mismatch")]
    StateMismatch,

    #[error("authorization callback carried no code: {0}")]
    MissingCode(String),

    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("token refresh temporarily unavailable: {0}")]
    RefreshUnavailable(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Remote call a command was executing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStep {
    RemoveTrack,
    SkipToNext,
    Seek,
    AddTrack,
    FetchPlaylists,
}

impl fmt::Display for CommandStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            CommandStep::RemoveTrack => "remove track",
            CommandStep::SkipToNext => "skip to next",
            CommandStep::Seek => "seek",
            CommandStep::AddTrack => "add track",
            CommandStep::FetchPlaylists => "fetch playlists",
        };
        f.write_str(step)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("no eligible track playing")]
    NoEligibleTrack,

    #[error("no default playlist configured")]
    NoDefaultPlaylist,

    #[error(transparent)]
    NotAuthorized(#[from] AuthError),

    #[error("{step} failed: {cause}")]
    RemoteCallFailed {
        step: CommandStep,
        cause: RemoteError,
    },
}

impl CommandError {
    pub fn remote(step: CommandStep) -> impl FnOnce(RemoteError) -> CommandError {
        move |cause| CommandError::RemoteCallFailed { step, cause }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
