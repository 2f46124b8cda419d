use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use url::{Host, Url};

use crate::{Res, api, info, management::SessionController, warning};

/// Shared state of every route.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionController>,
    /// Redirect URI registered with Spotify; `/callback` rebuilds the full
    /// callback URL from it.
    pub redirect_uri: String,
}

pub fn router(state: AppState) -> Router {
    let commands = Router::new()
        .route("/remove-and-skip", post(api::remove_and_skip))
        .route("/skip", post(api::skip))
        .route("/favorite", post(api::favorite))
        .route("/playlists/refresh", post(api::refresh_playlists))
        .route("/playlists/{id}/add", post(api::add_to_playlist))
        .route("/sign-out", post(api::sign_out))
        .route_layer(middleware::from_fn(reject_foreign_origin));

    Router::new()
        .route("/health", get(api::health))
        .route("/callback", get(api::callback))
        .route("/login", get(api::login))
        .route("/state", get(api::state))
        .merge(commands)
        .with_state(state)
}

/// Browsers attach `Origin` to cross-site POSTs. Commands are only accepted
/// without one or from a loopback page.
async fn reject_foreign_origin(request: Request, next: Next) -> Response {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        if !is_loopback_origin(origin) {
            warning!("Rejected {} from origin {:?}", request.uri().path(), origin);
            return StatusCode::FORBIDDEN.into_response();
        }
    }
    next.run(request).await
}

pub fn is_loopback_origin(origin: &HeaderValue) -> bool {
    let Some(url) = origin.to_str().ok().and_then(|o| Url::parse(o).ok()) else {
        return false;
    };
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Serves the control API on `address` until the process ends.
///
/// # Errors
///
/// Fails when the address does not parse or cannot be bound.
pub async fn start_api_server(address: &str, state: AppState) -> Res<()> {
    let addr = SocketAddr::from_str(address)
        .map_err(|e| format!("Failed to parse server address {address}: {e}"))?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Control server listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
