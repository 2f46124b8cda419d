use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
};

use crate::{server::AppState, utils};

/// Completes the login started by `/login` or the binary.
///
/// The provider redirects here when the registered redirect URI is a
/// loopback address. The query is appended to the redirect URI unchanged so
/// the flow sees exactly what the provider sent.
pub async fn callback(
    State(app): State<AppState>,
    RawQuery(query): RawQuery,
) -> (StatusCode, Html<String>) {
    let callback_url = match query {
        Some(query) => format!("{}?{}", app.redirect_uri, query),
        None => app.redirect_uri.clone(),
    };

    match app.controller.handle_callback(&callback_url).await {
        Ok(()) => (
            StatusCode::OK,
            Html(
                "<h2>Authentication successful.</h2><p>You can close this window.</p>".to_string(),
            ),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Html(format!(
                "<h4>Login failed.</h4><p>{}</p>",
                utils::escape_html(&e.to_string())
            )),
        ),
    }
}

pub async fn login(State(app): State<AppState>) -> impl IntoResponse {
    Redirect::to(app.controller.authorize().as_str())
}
