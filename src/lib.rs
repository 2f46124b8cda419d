//! tunectl Library
//!
//! A background controller for Spotify: it signs in with OAuth 2.0 PKCE,
//! keeps the session alive across restarts through the platform keychain,
//! polls what is playing, and runs playlist commands (remove-and-skip, add,
//! skip) against the current track.
//!
//! # Modules
//!
//! - `api` - HTTP handlers of the local control server
//! - `config` - Configuration management and environment variables
//! - `error` - Error types of the session core
//! - `management` - Session core: token session, credentials, poller,
//!   commands and the controller composing them
//! - `server` - Local HTTP server for callbacks and commands
//! - `spotify` - Spotify Web API capability, client and PKCE flow
//! - `types` - Data structures and type definitions
//! - `utils` - PKCE helpers and URI normalisation
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tunectl::{config, management, spotify};
//!
//! #[tokio::main]
//! async fn main() -> tunectl::Res<()> {
//!     config::load_env().await?;
//!     let config = config::Config::from_env()?;
//!     let api = Arc::new(spotify::WebApiClient::new(config.spotify.clone()));
//!     let store = Arc::new(management::KeyringCredentialStore::default());
//!     let controller = management::SessionController::new(&config, api, store)?;
//!     controller.init().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod management;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

/// A convenient Result type alias for operations that may fail.
///
/// Used at the edges (binary, server, poll ticks) where failures are only
/// reported. The session core returns the typed errors from [`error`].
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```
/// info!("Polling now playing every {}s", 5);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only for unrecoverable startup failures of the binary; the library never
/// calls it.
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// Used for failures that are absorbed: poll ticks, credential storage,
/// command errors already published as last error.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
