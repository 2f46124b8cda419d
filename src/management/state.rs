use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::{PlaybackSnapshot, PlaylistRef, TrackRef};

const CHANGE_CAPACITY: usize = 64;

/// Kind of operation a published error came from. A later success of the
/// same kind clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Auth,
    Command,
    Playlists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastError {
    pub category: ErrorCategory,
    pub message: String,
}

/// Everything observers may read. Only the session core mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishedState {
    pub authorized: bool,
    pub current_track: Option<TrackRef>,
    pub playlist_context: Option<String>,
    pub playlists: Vec<PlaylistRef>,
    pub loading: bool,
    pub last_error: Option<LastError>,
}

impl PublishedState {
    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            track: self.current_track.clone(),
            playlist_context: self.playlist_context.clone(),
        }
    }

    pub fn can_remove_and_skip(&self) -> bool {
        self.current_track.is_some() && self.playlist_context.is_some()
    }

    pub fn can_add(&self) -> bool {
        self.current_track.is_some()
    }

    pub fn last_error_message(&self) -> Option<&str> {
        self.last_error.as_ref().map(|e| e.message.as_str())
    }
}

struct Inner {
    published: PublishedState,
    /// Bumped on every session reset.
    generation: u64,
}

/// Holder of the published state.
///
/// Each committed change is broadcast while the lock is held, so subscribers
/// receive transitions in commit order. Updates that change nothing are not
/// broadcast.
pub struct StateManager {
    state: Mutex<Inner>,
    changes: broadcast::Sender<PublishedState>,
}

impl StateManager {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            state: Mutex::new(Inner {
                published: PublishedState::default(),
                generation: 0,
            }),
            changes,
        }
    }

    pub fn current(&self) -> PublishedState {
        self.state.lock().published.clone()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state.lock().published.snapshot()
    }

    /// Identifies the current session. Results fetched under an older
    /// generation must not be committed.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedState> {
        self.changes.subscribe()
    }

    pub fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut PublishedState),
    {
        let mut inner = self.state.lock();
        self.commit(&mut inner, mutate);
    }

    fn commit<F>(&self, inner: &mut Inner, mutate: F)
    where
        F: FnOnce(&mut PublishedState),
    {
        let mut next = inner.published.clone();
        mutate(&mut next);
        if next != inner.published {
            inner.published = next;
            let _ = self.changes.send(inner.published.clone());
        }
    }

    /// Replaces both playback fields at once.
    pub fn set_snapshot(&self, snapshot: PlaybackSnapshot) {
        self.update(|s| {
            s.current_track = snapshot.track;
            s.playlist_context = snapshot.playlist_context;
        });
    }

    pub fn set_authorized(&self, authorized: bool) {
        self.update(|s| s.authorized = authorized);
    }

    /// Commits `playlists` only while `generation` is still current. Returns
    /// whether they were committed.
    pub fn set_playlists_for(&self, generation: u64, playlists: Vec<PlaylistRef>) -> bool {
        let mut inner = self.state.lock();
        if inner.generation != generation {
            return false;
        }
        self.commit(&mut inner, |s| s.playlists = playlists);
        true
    }

    /// Drops everything tied to the session and starts a new generation.
    /// Errors stay visible.
    pub fn reset_session(&self) {
        let mut inner = self.state.lock();
        inner.generation += 1;
        self.commit(&mut inner, |s| {
            s.authorized = false;
            s.current_track = None;
            s.playlist_context = None;
            s.playlists.clear();
            s.loading = false;
        });
    }

    pub fn set_error(&self, category: ErrorCategory, message: impl Into<String>) {
        let message = message.into();
        self.update(|s| s.last_error = Some(LastError { category, message }));
    }

    pub fn clear_error(&self, category: ErrorCategory) {
        self.update(|s| {
            if s.last_error.as_ref().is_some_and(|e| e.category == category) {
                s.last_error = None;
            }
        });
    }

    /// Raises the loading flag until the guard is dropped, on every exit path.
    pub fn loading(&self) -> LoadingGuard<'_> {
        self.update(|s| s.loading = true);
        LoadingGuard { state: self }
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LoadingGuard<'a> {
    state: &'a StateManager,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.update(|s| s.loading = false);
    }
}
