//! Backend collaborators: classification, playlist lookup, token exchange and saving.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::model::{
    ClassificationRequest, ClassificationResult, PlaylistInfo, PlaylistInfoRequest,
    SavePlaylistsRequest, SavePlaylistsResponse, TokenExchangeRequest, TokenResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status. `detail` is the body's `detail` field when present,
    /// otherwise the whole body (JSON or text).
    #[error("backend returned {status}: {}", detail_text(.detail).unwrap_or("no detail"))]
    Status { status: u16, detail: Value },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

fn detail_text(detail: &Value) -> Option<&str> {
    detail.as_str().filter(|s| !s.trim().is_empty())
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            BackendError::Transport(e) => e.status().map(|s| s.as_u16()),
            BackendError::Decode(_) => None,
        }
    }

    pub fn detail(&self) -> Value {
        match self {
            BackendError::Status { detail, .. } => detail.clone(),
            other => Value::String(other.to_string()),
        }
    }

    /// Upstream message when the backend sent a textual `detail`, else `fallback`.
    /// Transport and decode errors use their own description.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            BackendError::Status { detail, .. } => detail_text(detail)
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string()),
            other => other.to_string(),
        }
    }
}

/// Long-running classification submission.
pub trait ClassifierBackend: Send + Sync + 'static {
    fn classify(
        &self,
        request: ClassificationRequest,
    ) -> impl Future<Output = Result<ClassificationResult, BackendError>> + Send;
}

/// One-shot calls used by the login, selection and save screens.
pub trait PlaylistBackend: Send + Sync {
    fn exchange_code(
        &self,
        request: TokenExchangeRequest,
    ) -> impl Future<Output = Result<TokenResponse, BackendError>> + Send;

    fn playlist_info(
        &self,
        request: PlaylistInfoRequest,
    ) -> impl Future<Output = Result<PlaylistInfo, BackendError>> + Send;

    fn save_playlists(
        &self,
        request: SavePlaylistsRequest,
    ) -> impl Future<Output = Result<SavePlaylistsResponse, BackendError>> + Send;
}

/// JSON-over-HTTP client for the classifier backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    http: reqwest::Client,
}

impl HttpBackend {
    /// `timeout` bounds each request; `None` leaves long classifications unbounded.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(format!("moodlist/{}", env!("CARGO_PKG_VERSION")));
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, BackendError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!(%url, "POST");
        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%url, status = status.as_u16(), bytes = text.len(), "response received");

        if !status.is_success() {
            return Err(status_error(status, &text));
        }
        serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

fn status_error(status: StatusCode, text: &str) -> BackendError {
    let detail = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(mut map)) => map
            .remove("detail")
            .unwrap_or(Value::Object(map)),
        Ok(other) => other,
        Err(_) => Value::String(text.to_string()),
    };
    BackendError::Status {
        status: status.as_u16(),
        detail,
    }
}

impl ClassifierBackend for HttpBackend {
    async fn classify(
        &self,
        request: ClassificationRequest,
    ) -> Result<ClassificationResult, BackendError> {
        self.post_json("classify", &request).await
    }
}

impl PlaylistBackend for HttpBackend {
    async fn exchange_code(
        &self,
        request: TokenExchangeRequest,
    ) -> Result<TokenResponse, BackendError> {
        self.post_json("spotify/token", &request).await
    }

    async fn playlist_info(
        &self,
        request: PlaylistInfoRequest,
    ) -> Result<PlaylistInfo, BackendError> {
        self.post_json("playlist_info", &request).await
    }

    async fn save_playlists(
        &self,
        request: SavePlaylistsRequest,
    ) -> Result<SavePlaylistsResponse, BackendError> {
        self.post_json("save_playlists", &request).await
    }
}
