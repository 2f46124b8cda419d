mod common;

use std::{net::SocketAddr, sync::Arc};

use axum::http::{HeaderValue, StatusCode};
use common::{FakeSpotify, test_config, valid_state};
use reqwest::redirect::Policy;
use serde_json::Value;
use tunectl::{
    api::{CommandResponse, status_for},
    error::{AuthError, CommandError, CommandStep, RemoteError},
    management::{MemoryCredentialStore, SessionController},
    server::{AppState, is_loopback_origin, router},
};

async fn serve(controller: Arc<SessionController>) -> SocketAddr {
    let app = router(AppState {
        controller,
        redirect_uri: "http://127.0.0.1/callback".to_string(),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap()
}

#[test]
fn test_preconditions_are_conflicts() {
    assert_eq!(status_for(&CommandError::NoEligibleTrack), StatusCode::CONFLICT);
    assert_eq!(status_for(&CommandError::NoDefaultPlaylist), StatusCode::CONFLICT);
    assert_eq!(
        status_for(&CommandError::NotAuthorized(AuthError::NotAuthorized)),
        StatusCode::CONFLICT
    );
}

#[test]
fn test_remote_failures_are_bad_gateway() {
    let err = CommandError::RemoteCallFailed {
        step: CommandStep::SkipToNext,
        cause: RemoteError::Transport("connection reset".to_string()),
    };
    assert_eq!(status_for(&err), StatusCode::BAD_GATEWAY);
    assert_eq!(
        status_for(&CommandError::NotAuthorized(AuthError::RefreshUnavailable(
            "503".to_string()
        ))),
        StatusCode::BAD_GATEWAY
    );
}

#[tokio::test]
async fn test_health_and_state() {
    let api = FakeSpotify::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let controller = SessionController::new(&test_config(), api, store).unwrap();
    let addr = serve(controller).await;

    let health: Value = http()
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["authorized"], false);

    let state: Value = http()
        .get(format!("http://{addr}/state"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["authorized"], false);
    assert_eq!(state["current_track"], Value::Null);
    assert_eq!(state["playlists"], serde_json::json!([]));
}

#[tokio::test]
async fn test_command_without_track_is_conflict() {
    let api = FakeSpotify::new();
    let store = Arc::new(MemoryCredentialStore::with_blob(
        valid_state().to_bytes().unwrap(),
    ));
    let controller = SessionController::new(&test_config(), api, store).unwrap();
    let addr = serve(controller).await;

    let res = http()
        .post(format!("http://{addr}/remove-and-skip"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 409);
    let body: CommandResponse = res.json().await.unwrap();
    assert!(!body.ok);
    assert_eq!(body.error.as_deref(), Some("no eligible track playing"));
}

#[tokio::test]
async fn test_login_redirects_to_provider() {
    let api = FakeSpotify::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let controller = SessionController::new(&test_config(), api, store).unwrap();
    let addr = serve(controller).await;

    let res = http()
        .get(format!("http://{addr}/login"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 303);
    let location = res.headers()["location"].to_str().unwrap();
    assert!(location.starts_with("https://accounts.spotify.com/authorize?"));
}

#[tokio::test]
async fn test_callback_completes_login() {
    let api = FakeSpotify::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let controller = SessionController::new(&test_config(), api, store.clone()).unwrap();
    let addr = serve(Arc::clone(&controller)).await;

    let url = controller.authorize();
    let query = url.query().unwrap();
    let state = url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let res = http()
        .get(format!("http://{addr}/callback?code=abc&state={state}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert!(controller.is_authorized().await);
    assert!(store.contains());

    // replayed callbacks are rejected
    let res = http()
        .get(format!("http://{addr}/callback?code=abc&state={state}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);
}

fn state_of(authorize_url: &url::Url) -> String {
    authorize_url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

#[tokio::test]
async fn test_callback_error_page_escapes_markup() {
    let api = FakeSpotify::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let controller = SessionController::new(&test_config(), api, store).unwrap();
    let addr = serve(Arc::clone(&controller)).await;

    let state = state_of(&controller.authorize());
    let res = http()
        .get(format!("http://{addr}/callback"))
        .query(&[("error", "<script>alert(1)</script>"), ("state", &state)])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
    let body = res.text().await.unwrap();
    assert!(body.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(!body.contains("<script>"));
}

#[tokio::test]
async fn test_cross_site_command_is_forbidden() {
    let api = FakeSpotify::new();
    let store = Arc::new(MemoryCredentialStore::with_blob(
        valid_state().to_bytes().unwrap(),
    ));
    let controller = SessionController::new(&test_config(), api, store.clone()).unwrap();
    controller.init().await;
    let addr = serve(Arc::clone(&controller)).await;

    let res = http()
        .post(format!("http://{addr}/sign-out"))
        .header("Origin", "https://evil.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 403);
    assert!(controller.is_authorized().await);
    assert!(store.contains());
}

#[tokio::test]
async fn test_loopback_origin_is_accepted() {
    let api = FakeSpotify::new();
    let store = Arc::new(MemoryCredentialStore::with_blob(
        valid_state().to_bytes().unwrap(),
    ));
    let controller = SessionController::new(&test_config(), api, store.clone()).unwrap();
    controller.init().await;
    let addr = serve(Arc::clone(&controller)).await;

    let res = http()
        .post(format!("http://{addr}/sign-out"))
        .header("Origin", format!("http://{addr}"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 200);
    assert!(!controller.is_authorized().await);
    assert!(!store.contains());
}

#[test]
fn test_loopback_origins() {
    for origin in ["http://127.0.0.1:8888", "http://localhost:3000", "http://[::1]:8888"] {
        assert!(is_loopback_origin(&HeaderValue::from_static(origin)), "{origin}");
    }
    for origin in ["https://evil.example", "null", "http://10.0.0.1"] {
        assert!(!is_loopback_origin(&HeaderValue::from_static(origin)), "{origin}");
    }
}
