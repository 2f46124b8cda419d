use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

pub const PLAYLIST_URI_PREFIX: &str = "spotify:playlist:";

const PLAYLIST_URI_INFIX: &str = ":playlist:";
const PLAYLIST_URL_PREFIX: &str = "https://open.spotify.com/playlist/";

pub const CODE_VERIFIER_LEN: usize = 64;
pub const STATE_LEN: usize = 32;

/// Random string drawn from the URL-safe alphanumeric alphabet.
pub fn generate_url_safe(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_code_verifier() -> String {
    generate_url_safe(CODE_VERIFIER_LEN)
}

pub fn generate_state() -> String {
    generate_url_safe(STATE_LEN)
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Canonical `spotify:playlist:<id>` form of a playlist identifier.
///
/// Already canonical URIs pass through unchanged. Legacy
/// `spotify:user:<user>:playlist:<id>` URIs and open.spotify.com links are
/// reduced to the canonical form; anything else is treated as a bare id.
pub fn playlist_uri(id: &str) -> String {
    let id = id.trim();
    if id.starts_with(PLAYLIST_URI_PREFIX) {
        return id.to_string();
    }
    if let Some((_, bare)) = id.rsplit_once(PLAYLIST_URI_INFIX) {
        return format!("{PLAYLIST_URI_PREFIX}{bare}");
    }
    if let Some(rest) = id.strip_prefix(PLAYLIST_URL_PREFIX) {
        let bare = rest.split(['?', '#', '/']).next().unwrap_or_default();
        return format!("{PLAYLIST_URI_PREFIX}{bare}");
    }
    format!("{PLAYLIST_URI_PREFIX}{id}")
}

/// Bare playlist id for REST paths, from any form `playlist_uri` accepts.
pub fn playlist_id(uri: &str) -> String {
    let canonical = playlist_uri(uri);
    canonical
        .strip_prefix(PLAYLIST_URI_PREFIX)
        .unwrap_or(&canonical)
        .to_string()
}

/// Escapes text for an HTML body.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
