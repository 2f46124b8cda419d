//! Configuration management for tunectl.
//!
//! Values come from environment variables, optionally seeded from a `.env`
//! file in the local data directory:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults (where applicable)
//!
//! Preferences (default playlist, skip offset) are supplied from outside the
//! session core; the core only ever reads them.

use std::{env, path::PathBuf, time::Duration};

use crate::error::ConfigError;

pub const DEFAULT_REDIRECT_URI: &str = "tunectl://callback";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8888";
pub const DEFAULT_SCOPES: &[&str] = &[
    "user-read-currently-playing",
    "user-read-playback-state",
    "user-modify-playback-state",
    "playlist-read-private",
    "playlist-modify-private",
    "playlist-modify-public",
];
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_SKIP_OFFSET_SECS: u64 = 30;

/// Loads environment variables from a `.env` file in the local data directory.
///
/// The file lives at `<data_local_dir>/tunectl/.env`:
/// - Linux: `~/.local/share/tunectl/.env`
/// - macOS: `~/Library/Application Support/tunectl/.env`
/// - Windows: `%LOCALAPPDATA%/tunectl/.env`
///
/// The directory is created when missing. A missing `.env` file is not an
/// error, since every value can also come from the process environment.
///
/// # Errors
///
/// Returns an error string if the directory cannot be created or an existing
/// `.env` file cannot be parsed.
pub async fn load_env() -> Result<(), String> {
    let path = env_path();
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    match dotenv::from_path(&path) {
        Ok(()) => Ok(()),
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

pub fn env_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("tunectl/.env");
    path
}

/// Endpoints and client identity used by the authorization flow and the
/// Web API client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
}

impl SpotifyConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// User preferences the core consumes but does not own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    pub default_playlist_id: Option<String>,
    pub default_playlist_name: Option<String>,
    /// Seconds to seek into the next track after remove-and-skip. 0 means
    /// the default of 30 seconds.
    pub skip_offset_secs: u64,
}

impl Preferences {
    pub fn skip_offset_ms(&self) -> u64 {
        let secs = if self.skip_offset_secs > 0 {
            self.skip_offset_secs
        } else {
            DEFAULT_SKIP_OFFSET_SECS
        };
        secs.saturating_mul(1000)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub spotify: SpotifyConfig,
    pub server_address: String,
    pub poll_interval: Duration,
    pub preferences: Preferences,
}

impl Config {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// `ConfigError::Missing` when `SPOTIFY_API_AUTH_CLIENT_ID` is unset and
    /// `ConfigError::Invalid` when a numeric value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = var("SPOTIFY_API_AUTH_CLIENT_ID")
            .ok_or(ConfigError::Missing("SPOTIFY_API_AUTH_CLIENT_ID"))?;

        let spotify = SpotifyConfig {
            client_id,
            redirect_uri: var_or("SPOTIFY_API_REDIRECT_URI", DEFAULT_REDIRECT_URI),
            scopes: match var("SPOTIFY_API_AUTH_SCOPE") {
                Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
                None => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            },
            auth_url: var_or("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL),
            token_url: var_or("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL),
            api_url: var_or("SPOTIFY_API_URL", DEFAULT_API_URL),
        };

        let poll_secs = parse_u64("TUNECTL_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "TUNECTL_POLL_INTERVAL_SECS",
                value: poll_secs.to_string(),
            });
        }

        Ok(Self {
            spotify,
            server_address: var_or("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS),
            poll_interval: Duration::from_secs(poll_secs),
            preferences: Preferences {
                default_playlist_id: var("TUNECTL_DEFAULT_PLAYLIST_ID"),
                default_playlist_name: var("TUNECTL_DEFAULT_PLAYLIST_NAME"),
                skip_offset_secs: parse_u64("TUNECTL_SKIP_OFFSET_SECS", DEFAULT_SKIP_OFFSET_SECS)?,
            },
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn var_or(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| default.to_string())
}

fn parse_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
