mod common;

use std::{sync::Arc, time::Duration};

use common::{FakeSpotify, Op, playing, playing_from_playlist, track, valid_state};
use tokio::time::sleep;
use tunectl::{
    error::RemoteError,
    management::{MemoryCredentialStore, NowPlayingPoller, StateManager, TokenSession, classify},
    types::PlaybackSnapshot,
};

struct Harness {
    api: Arc<FakeSpotify>,
    state: Arc<StateManager>,
    poller: Arc<NowPlayingPoller>,
}

async fn harness() -> Harness {
    let api = FakeSpotify::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let session = Arc::new(TokenSession::new(api.clone(), store));
    session.authorize(valid_state()).await;

    let state = Arc::new(StateManager::new());
    let poller = Arc::new(NowPlayingPoller::new(
        api.clone(),
        session,
        Arc::clone(&state),
        Duration::from_secs(5),
    ));

    Harness { api, state, poller }
}

#[test]
fn test_classify_nothing_playing() {
    assert_eq!(classify(None), PlaybackSnapshot::empty());
}

#[test]
fn test_classify_playlist_context() {
    let snapshot = classify(Some(playing_from_playlist("t1", "spotify:playlist:abc")));
    assert_eq!(snapshot.track, Some(track("t1")));
    assert_eq!(snapshot.playlist_context.as_deref(), Some("spotify:playlist:abc"));
}

#[test]
fn test_classify_legacy_playlist_context() {
    let snapshot = classify(Some(playing_from_playlist(
        "t1",
        "spotify:user:someone:playlist:abc",
    )));
    assert_eq!(snapshot.playlist_context.as_deref(), Some("spotify:playlist:abc"));
}

#[test]
fn test_classify_album_context_has_no_playlist() {
    let snapshot = classify(Some(playing("t1", Some(("album", "spotify:album:xyz")))));
    assert_eq!(snapshot.track, Some(track("t1")));
    assert_eq!(snapshot.playlist_context, None);
}

#[test]
fn test_classify_playback_without_track() {
    let mut playback = playing_from_playlist("t1", "spotify:playlist:abc");
    playback.track = None;

    // an ad or episode never carries a playlist context
    assert_eq!(classify(Some(playback)), PlaybackSnapshot::empty());
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_is_immediate() {
    let h = harness().await;
    h.api
        .set_playback(Some(playing_from_playlist("t1", "spotify:playlist:abc")));

    h.poller.start();
    sleep(Duration::from_millis(100)).await;

    assert!(h.poller.is_running());
    assert_eq!(h.api.playback_fetches(), 1);
    assert_eq!(h.state.current().current_track, Some(track("t1")));

    sleep(Duration::from_secs(5)).await;
    assert_eq!(h.api.playback_fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_is_not_overlapped() {
    let h = harness().await;
    h.api.delay(Op::Playback, Duration::from_secs(12));

    h.poller.start();
    sleep(Duration::from_secs(11)).await;

    // ticks at 5s and 10s came due while the first fetch was out
    assert_eq!(h.api.playback_fetches(), 1);

    sleep(Duration::from_secs(20)).await;
    assert!(h.api.playback_fetches() > 1);
    assert_eq!(h.api.max_concurrent_playback_fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_forced_refresh_waits_for_fetch_in_flight() {
    let h = harness().await;
    h.api.delay(Op::Playback, Duration::from_secs(2));

    h.poller.start();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(h.api.playback_fetches(), 1);

    h.api.set_playback(Some(playing("t2", None)));
    h.poller.refresh_now().await.unwrap();

    assert_eq!(h.api.playback_fetches(), 2);
    assert_eq!(h.api.max_concurrent_playback_fetches(), 1);
    assert_eq!(h.state.current().current_track, Some(track("t2")));
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_ticks() {
    let h = harness().await;

    h.poller.start();
    sleep(Duration::from_millis(100)).await;
    h.poller.stop();
    assert!(!h.poller.is_running());

    sleep(Duration::from_secs(30)).await;
    assert_eq!(h.api.playback_fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_result_after_stop_is_dropped() {
    let h = harness().await;
    h.poller.start();
    sleep(Duration::from_millis(100)).await;

    h.api.delay(Op::Playback, Duration::from_secs(2));
    h.api
        .set_playback(Some(playing_from_playlist("late", "spotify:playlist:abc")));

    let poller = Arc::clone(&h.poller);
    let refresh = tokio::spawn(async move { poller.refresh_now().await.is_ok() });
    sleep(Duration::from_millis(100)).await;

    h.poller.stop();
    assert!(refresh.await.unwrap());

    assert_eq!(h.state.current().current_track, None);
}

#[tokio::test(start_paused = true)]
async fn test_restart_keeps_a_single_timer() {
    let h = harness().await;

    h.poller.start();
    h.poller.start();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(h.api.playback_fetches(), 1);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(h.api.playback_fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_tick_keeps_polling() {
    let h = harness().await;
    h.api
        .fail(Op::Playback, RemoteError::Transport("offline".to_string()));

    h.poller.start();
    sleep(Duration::from_millis(100)).await;
    assert!(h.poller.refresh_now().await.is_err());

    h.api.succeed(Op::Playback);
    h.api.set_playback(Some(playing("t1", None)));
    sleep(Duration::from_secs(5)).await;

    assert!(h.poller.is_running());
    assert_eq!(h.state.current().current_track, Some(track("t1")));
    // poll failures are not user-visible
    assert_eq!(h.state.current().last_error, None);
}
