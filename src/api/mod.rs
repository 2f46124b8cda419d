//! # API Module
//!
//! HTTP handlers of the local control server. Collaborators (menu bar
//! shells, hotkey daemons, scripts) drive the session core through these
//! routes instead of linking against it.
//!
//! ## Endpoints
//!
//! ### Authentication
//!
//! - [`callback`] - Completes the PKCE login from the provider redirect
//! - [`login`] - Redirects the browser to a fresh authorization URL
//! - [`sign_out`] - Forgets the session and its stored credentials
//!
//! ### Commands
//!
//! - [`remove_and_skip`], [`skip`], [`favorite`], [`add_to_playlist`],
//!   [`refresh_playlists`] - Answer `{"ok": bool, "error": string|null}`.
//!   Precondition failures (nothing playing, not signed in, no default
//!   playlist) map to `409 Conflict`, remote failures to `502 Bad Gateway`.
//!
//! ### Monitoring
//!
//! - [`health`] - Status and version
//! - [`state`] - The published state as JSON
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use tunectl::server::{AppState, router};
//!
//! let app = router(AppState { controller, redirect_uri });
//! ```

mod callback;
mod control;
mod health;

pub use callback::{callback, login};
pub use control::{
    AddOptions, CommandResponse, add_to_playlist, favorite, refresh_playlists, remove_and_skip, sign_out,
    skip, state, status_for,
};
pub use health::health;
