//! # Session Core
//!
//! Authentication state, credential persistence, the now-playing poll loop
//! and the playlist commands, composed by [`SessionController`].
//!
//! ```text
//! SessionController
//!     ├── PkceFlow            (spotify::auth)
//!     ├── TokenSession  ──→  CredentialStore
//!     ├── NowPlayingPoller ─┐
//!     ├── CommandCoordinator ┴→ StateManager → observers
//!     └── session events → poller start/stop
//! ```

mod auth;
mod commands;
mod controller;
mod credentials;
mod poller;
mod state;

pub use auth::TokenSession;
pub use commands::{
    CommandCoordinator, MUTATION_SETTLE_DELAY, PLAYLIST_PAGE_SIZE, SKIP_SETTLE_DELAY,
};
pub use controller::SessionController;
pub use credentials::{
    CREDENTIAL_ACCOUNT, CREDENTIAL_SERVICE, CredentialStore, KeyringCredentialStore,
    MemoryCredentialStore,
};
pub use poller::{DEFAULT_POLL_INTERVAL, NowPlayingPoller, classify};
pub use state::{ErrorCategory, LastError, LoadingGuard, PublishedState, StateManager};
