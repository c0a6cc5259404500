//! Flow-level error taxonomy.

use crate::model::{Navigation, Screen};
use crate::storage::StorageError;

/// Errors surfaced by the client flows.
///
/// Authentication-class variants imply the session has already been cleared by
/// the time the error is returned.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// The login round-trip produced no authorization code.
    #[error("no authorization code was returned by the login redirect")]
    MissingAuthorizationCode,

    /// The code exchange failed or returned no access token.
    #[error("token exchange failed: {0}")]
    TokenExchangeFailure(String),

    /// A protected screen was opened without a valid session.
    #[error("not signed in or session expired")]
    SessionRequired,

    /// An authenticated call reported an expired or rejected token.
    #[error("session expired: {0}")]
    AuthExpired(String),

    /// The classification call failed. The session is left untouched.
    #[error("{0}")]
    ClassificationFailure(String),

    /// Inputs for a screen were never collected.
    #[error("missing prerequisite: {what}")]
    PrerequisiteMissing { what: &'static str, screen: Screen },

    #[error("playlist lookup failed: {0}")]
    PlaylistLookup(String),

    #[error("{0}")]
    SaveFailure(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl FlowError {
    /// Whether this error invalidated the session.
    pub fn is_auth_class(&self) -> bool {
        matches!(
            self,
            FlowError::MissingAuthorizationCode
                | FlowError::TokenExchangeFailure(_)
                | FlowError::SessionRequired
                | FlowError::AuthExpired(_)
        )
    }

    /// Where the host should send the user, if anywhere.
    pub fn navigation(&self) -> Option<Navigation> {
        match self {
            e if e.is_auth_class() => Some(Navigation::Redirect(Screen::Login)),
            FlowError::PrerequisiteMissing { screen, .. } => Some(Navigation::Redirect(*screen)),
            _ => None,
        }
    }
}

pub type FlowResult<T> = Result<T, FlowError>;
