use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Screens of the client flow. Also used to tag diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Home,
    Login,
    Callback,
    Emotions,
    Classify,
    Save,
    Success,
}

impl Screen {
    pub fn as_str(self) -> &'static str {
        match self {
            Screen::Home => "home",
            Screen::Login => "login",
            Screen::Callback => "callback",
            Screen::Emotions => "emotions",
            Screen::Classify => "classify",
            Screen::Save => "save",
            Screen::Success => "success",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Navigation signal emitted by flows. The host executes the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Navigation {
    /// A guard kicked the user out to another screen.
    Redirect(Screen),
    /// Forward progress to the next screen.
    Navigate(Screen),
}

impl Navigation {
    pub fn target(self) -> Screen {
        match self {
            Navigation::Redirect(s) | Navigation::Navigate(s) => s,
        }
    }
}

/// Opaque credential. `Debug` and `Display` never reveal the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw value, for the few call sites that must send it upstream.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl TrackItem {
    /// `"name - artist"`, the form shown while a run is in progress.
    pub fn display_label(&self) -> String {
        let name = self.name.as_deref().unwrap_or("");
        let artist = self.artist.as_deref().unwrap_or("");
        match (name.is_empty(), artist.is_empty()) {
            (false, false) => format!("{name} - {artist}"),
            (false, true) => name.to_string(),
            (true, false) => artist.to_string(),
            (true, true) => "Unknown track".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionStat {
    pub count: u32,
    pub percentage: f64,
}

/// One row of the per-category breakdown shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionSummary {
    pub emotion: String,
    pub count: u32,
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedBatch {
    #[serde(rename = "batch", alias = "batch_index")]
    pub batch_index: u32,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Ok,
    Fallback,
}

/// Per-batch record relayed by the backend for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    #[serde(rename = "batch", alias = "batch_index")]
    pub batch_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_batches: Option<u32>,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub playlist_url: String,
    pub emotions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(default)]
    pub playlist_id: String,
    #[serde(default)]
    pub total_songs: u32,
    #[serde(default)]
    pub total_batches: u32,
    #[serde(default)]
    pub emotion_stats: BTreeMap<String, EmotionStat>,
    #[serde(default)]
    pub grouped_tracks: BTreeMap<String, Vec<TrackItem>>,
    #[serde(default)]
    pub failed_batches: Vec<FailedBatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_logs: Option<Vec<BatchOutcome>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<serde_json::Value>>,
}

impl ClassificationResult {
    /// Batches where the backend substituted a fallback classification.
    ///
    /// Batch logs are authoritative when relayed; otherwise the failed batch list is used.
    pub fn failed_batch_count(&self) -> usize {
        match self.batch_logs.as_deref() {
            Some(logs) if !logs.is_empty() => logs
                .iter()
                .filter(|b| b.status == BatchStatus::Fallback)
                .count(),
            _ => self.failed_batches.len(),
        }
    }

    pub fn emotion_summary(&self) -> Vec<EmotionSummary> {
        self.emotion_stats
            .iter()
            .map(|(emotion, stat)| EmotionSummary {
                emotion: emotion.clone(),
                count: stat.count,
                percent: stat.percentage.max(0.0).round() as u32,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenExchangeRequest {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<f64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("error", &self.error)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistInfoRequest {
    pub playlist_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistInfo {
    #[serde(default)]
    pub playlist_id: String,
    #[serde(default)]
    pub total_songs: u32,
    #[serde(default)]
    pub example_batch: Vec<TrackItem>,
}

#[derive(Clone, Serialize)]
pub struct SavePlaylistsRequest {
    pub access_token: String,
    pub grouped_tracks: BTreeMap<String, Vec<TrackItem>>,
    pub playlist_names: BTreeMap<String, String>,
    pub public: bool,
}

impl fmt::Debug for SavePlaylistsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SavePlaylistsRequest")
            .field("access_token", &"***")
            .field("categories", &self.grouped_tracks.len())
            .field("playlist_names", &self.playlist_names)
            .field("public", &self.public)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedPlaylist {
    pub emotion: String,
    #[serde(default)]
    pub playlist_id: String,
    pub playlist_name: String,
    #[serde(default)]
    pub playlist_url: String,
    #[serde(default)]
    pub added_tracks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCategory {
    pub emotion: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavePlaylistsResponse {
    #[serde(default)]
    pub created_playlists: Vec<CreatedPlaylist>,
    #[serde(default)]
    pub skipped: Vec<SkippedCategory>,
}
