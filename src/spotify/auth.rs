use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use url::Url;

use crate::{
    config::SpotifyConfig,
    error::{AuthError, ConfigError},
    spotify::SpotifyApi,
    types::{AuthorizationState, PendingAuthorization},
    utils,
};

/// OAuth 2.0 authorization code flow with PKCE.
///
/// At most one login can be in flight: every call to
/// [`begin_authorization`](Self::begin_authorization) replaces the pending
/// verifier and state, and the callback consumes them whatever its outcome.
///
/// # Flow
///
/// 1. **PKCE Setup**: a random verifier and state are generated and the
///    challenge is derived as `BASE64URL(SHA256(verifier))`
/// 2. **Authorization Request**: the returned URL is opened by a collaborator
/// 3. **Callback**: the provider redirects to `<redirect_uri>?code=..&state=..`
/// 4. **Validation**: the state must equal the pending one exactly, otherwise
///    the callback is rejected before any network call
/// 5. **Token Exchange**: code + verifier are exchanged for tokens
pub struct PkceFlow {
    config: SpotifyConfig,
    auth_url: Url,
    api: Arc<dyn SpotifyApi>,
    pending: Mutex<Option<PendingAuthorization>>,
}

impl PkceFlow {
    /// # Errors
    ///
    /// `ConfigError::Invalid` when the configured authorization endpoint is
    /// not a valid URL.
    pub fn new(config: SpotifyConfig, api: Arc<dyn SpotifyApi>) -> Result<Self, ConfigError> {
        let auth_url = Url::parse(&config.auth_url).map_err(|_| ConfigError::Invalid {
            key: "SPOTIFY_API_AUTH_URL",
            value: config.auth_url.clone(),
        })?;

        Ok(Self {
            config,
            auth_url,
            api,
            pending: Mutex::new(None),
        })
    }

    /// Starts a login and returns the provider URL the user has to visit.
    pub fn begin_authorization(&self) -> Url {
        let verifier = utils::generate_code_verifier();
        let challenge = utils::generate_code_challenge(&verifier);
        let state = utils::generate_state();

        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("code_challenge_method", "S256")
            .append_pair("code_challenge", &challenge)
            .append_pair("state", &state)
            .append_pair("scope", &self.config.scopes.join(" "));

        *self.pending.lock() = Some(PendingAuthorization {
            verifier,
            challenge,
            state,
            created_at: Utc::now().timestamp(),
        });

        url
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    pub fn cancel(&self) {
        self.pending.lock().take();
    }

    /// Validates the callback and exchanges its code for tokens.
    ///
    /// # Errors
    ///
    /// - `StateMismatch` when no login is pending or the state differs
    /// - `MissingCode` when the provider returned an error or no code
    /// - `ExchangeFailed` when the token endpoint rejects the exchange
    pub async fn complete_authorization(
        &self,
        callback_url: &str,
    ) -> Result<AuthorizationState, AuthError> {
        // single use, consumed whatever the outcome
        let pending = self.pending.lock().take();

        let Some(pending) = pending else {
            return Err(AuthError::StateMismatch);
        };

        let params = CallbackParams::parse(callback_url)?;
        if params.state.as_deref() != Some(pending.state.as_str()) {
            return Err(AuthError::StateMismatch);
        }

        if let Some(error) = params.error {
            return Err(AuthError::MissingCode(error));
        }
        let Some(code) = params.code.filter(|c| !c.is_empty()) else {
            return Err(AuthError::MissingCode("no code parameter".to_string()));
        };

        let grant = self
            .api
            .exchange_authorization_code(&code, &pending.verifier)
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        Ok(AuthorizationState::from_grant(grant, None))
    }
}

struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    fn parse(callback_url: &str) -> Result<Self, AuthError> {
        let url = Url::parse(callback_url)
            .map_err(|e| AuthError::MissingCode(format!("malformed callback url: {e}")))?;

        let mut params = Self {
            code: None,
            state: None,
            error: None,
        };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        Ok(params)
    }
}
