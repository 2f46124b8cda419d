use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{
    Res,
    management::{StateManager, TokenSession},
    spotify::SpotifyApi,
    types::{CurrentPlayback, PlaybackSnapshot},
    utils, warning,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Cycle {
    id: u64,
    running: bool,
}

/// Recurring fetch of the current playback.
///
/// `Stopped -> Running -> Stopped`. Starting while running restarts the
/// cycle, so there is never more than one timer. Only one fetch is in flight
/// at a time: a tick that comes due while a fetch is still out is skipped.
/// Results of fetches that began before a `stop` are dropped.
pub struct NowPlayingPoller {
    api: Arc<dyn SpotifyApi>,
    session: Arc<TokenSession>,
    state: Arc<StateManager>,
    interval: Duration,
    in_flight: tokio::sync::Mutex<()>,
    cycle: Mutex<Cycle>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NowPlayingPoller {
    pub fn new(
        api: Arc<dyn SpotifyApi>,
        session: Arc<TokenSession>,
        state: Arc<StateManager>,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            session,
            state,
            interval,
            in_flight: tokio::sync::Mutex::new(()),
            cycle: Mutex::new(Cycle::default()),
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.cycle.lock().running
    }

    /// Starts polling, fetching once immediately. Restarts a running cycle.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let cycle_id = {
            let mut cycle = self.cycle.lock();
            cycle.id += 1;
            cycle.running = true;
            cycle.id
        };

        let poller = Arc::clone(self);
        *task = Some(tokio::spawn(async move { poller.run(cycle_id).await }));
    }

    pub fn stop(&self) {
        {
            let mut cycle = self.cycle.lock();
            cycle.id += 1;
            cycle.running = false;
        }
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    /// Fetches outside the regular schedule, waiting for a fetch already in
    /// flight instead of skipping. Used after mutating commands.
    ///
    /// # Errors
    ///
    /// Returns the auth or remote failure of the fetch.
    pub async fn refresh_now(&self) -> Res<()> {
        let cycle_id = self.cycle.lock().id;
        let _in_flight = self.in_flight.lock().await;
        self.poll_once(cycle_id).await
    }

    async fn run(self: Arc<Self>, cycle_id: u64) {
        // the first tick completes immediately
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick(cycle_id).await;
        }
    }

    async fn tick(&self, cycle_id: u64) {
        let Ok(_in_flight) = self.in_flight.try_lock() else {
            return;
        };

        if let Err(e) = self.poll_once(cycle_id).await {
            warning!("Failed to fetch now playing: {}", e);
        }
    }

    async fn poll_once(&self, cycle_id: u64) -> Res<()> {
        let token = self.session.access_token().await?;
        let playback = self.api.get_current_playback(&token).await?;
        let snapshot = classify(playback);

        let cycle = self.cycle.lock();
        if cycle.running && cycle.id == cycle_id {
            self.state.set_snapshot(snapshot);
        }
        Ok(())
    }
}

/// Reduces remote playback to a snapshot. The playlist context is kept only
/// for a track playing from a playlist, never for albums, radio or ads.
pub fn classify(playback: Option<CurrentPlayback>) -> PlaybackSnapshot {
    let Some(playback) = playback else {
        return PlaybackSnapshot::empty();
    };
    let Some(track) = playback.track else {
        return PlaybackSnapshot::empty();
    };

    let playlist_context = playback
        .context
        .filter(|context| context.kind == "playlist")
        .map(|context| utils::playlist_uri(&context.uri));

    PlaybackSnapshot {
        track: Some(track),
        playlist_context,
    }
}
