//! Login redirect and callback handling.

use rand::distributions::Alphanumeric;
use rand::Rng;
use url::Url;

use crate::backend::PlaylistBackend;
use crate::config::{SPOTIFY_AUTHORIZE_URL, SPOTIFY_SCOPES};
use crate::error::{FlowError, FlowResult};
use crate::logging;
use crate::model::{Navigation, Screen, TokenExchangeRequest};
use crate::session::SessionStore;

const STATE_LEN: usize = 24;

/// Parameters delivered to the callback screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Provider-reported error, e.g. `access_denied`.
    pub error: Option<String>,
}

impl CallbackParams {
    /// Accept either the full redirect URL or a bare authorization code.
    pub fn parse(input: &str) -> FlowResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::default());
        }
        if !input.contains("://") {
            return Ok(Self {
                code: Some(input.to_string()),
                ..Self::default()
            });
        }
        let url = Url::parse(input)
            .map_err(|e| FlowError::InvalidInput(format!("callback URL: {e}")))?;
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "error" => params.error = value,
                _ => {}
            }
        }
        Ok(params)
    }
}

/// Start a login: clear any session, remember a fresh `state` and return the
/// provider's authorize URL.
pub fn begin_login(session: &SessionStore, client_id: &str, redirect_uri: &str) -> FlowResult<Url> {
    let client_id = client_id.trim();
    if client_id.is_empty() {
        return Err(FlowError::InvalidInput("a Spotify client id is required".into()));
    }
    session.clear();

    let state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect();
    session.remember_oauth_state(&state);

    let mut url = Url::parse(SPOTIFY_AUTHORIZE_URL)
        .map_err(|e| FlowError::InvalidInput(format!("authorize URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &SPOTIFY_SCOPES.join(" "))
        .append_pair("state", &state);
    logging::report_event(Screen::Login, "redirecting to provider login");
    Ok(url)
}

/// Exchange the callback's code for a session.
///
/// Any failure clears the session before returning.
pub async fn complete_login<B: PlaylistBackend>(
    backend: &B,
    session: &SessionStore,
    redirect_uri: &str,
    params: CallbackParams,
) -> FlowResult<Navigation> {
    let expected_state = session.take_oauth_state();

    let Some(code) = params.code else {
        session.clear();
        let reason = params.error.as_deref().unwrap_or("missing code");
        logging::report_error(Screen::Callback, "no authorization code in callback", &reason);
        return Err(FlowError::MissingAuthorizationCode);
    };

    if let (Some(expected), Some(returned)) = (expected_state.as_deref(), params.state.as_deref()) {
        if expected != returned {
            session.clear();
            let err = FlowError::TokenExchangeFailure("state mismatch".into());
            logging::report_error(Screen::Callback, "login state did not match", &err);
            return Err(err);
        }
    }

    let request = TokenExchangeRequest {
        code,
        redirect_uri: Some(redirect_uri.to_string()),
    };
    let response = match backend.exchange_code(request).await {
        Ok(response) => response,
        Err(e) => {
            session.clear();
            logging::report_error(Screen::Callback, "token exchange failed", &e);
            return Err(FlowError::TokenExchangeFailure(
                e.user_message("token request was rejected"),
            ));
        }
    };

    match response.access_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => {
            session.save(token, response.expires_in, response.refresh_token.as_deref());
            logging::report_event(Screen::Callback, "login complete");
            Ok(Navigation::Navigate(Screen::Home))
        }
        None => {
            session.clear();
            let detail = response
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no access token in response".to_string());
            logging::report_error(Screen::Callback, "token exchange returned no token", &detail);
            Err(FlowError::TokenExchangeFailure(detail))
        }
    }
}

/// Drop the session. Run inputs are left in place.
pub fn logout(session: &SessionStore) -> Navigation {
    session.clear();
    logging::report_event(Screen::Home, "logged out");
    Navigation::Redirect(Screen::Login)
}
