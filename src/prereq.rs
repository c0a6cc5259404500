//! Transient run inputs and results shared between screens.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::model::{
    ClassificationResult, CreatedPlaylist, PlaylistInfo, SkippedCategory, TrackItem,
};
use crate::storage::{keys, StoragePort};

// Keys only a full classification result carries.
const RESULT_FIELDS: &[&str] = &[
    "grouped_tracks",
    "emotion_stats",
    "total_songs",
    "failed_batches",
];

/// Inputs required before a classification run may start.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInputs {
    pub playlist_url: String,
    pub emotions: Vec<String>,
    pub total_songs_estimate: u32,
    pub example_items: Vec<String>,
}

/// Typed view over the run-related keys of client storage.
#[derive(Clone)]
pub struct PrerequisiteStore {
    storage: Arc<dyn StoragePort>,
}

impl PrerequisiteStore {
    pub fn new(storage: Arc<dyn StoragePort>) -> Self {
        Self { storage }
    }

    pub fn playlist_url(&self) -> Option<String> {
        self.storage
            .get(keys::PLAYLIST_URL)
            .filter(|u| !u.trim().is_empty())
    }

    pub fn emotions(&self) -> Vec<String> {
        self.read_json(keys::EMOTIONS).unwrap_or_default()
    }

    pub fn total_songs_estimate(&self) -> u32 {
        self.storage
            .get(keys::TOTAL_SONGS)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn example_items(&self) -> Vec<String> {
        self.read_json(keys::EXAMPLE_BATCH).unwrap_or_default()
    }

    /// Everything a run needs, or `None` when the playlist or categories are missing.
    pub fn run_inputs(&self) -> Option<RunInputs> {
        let playlist_url = self.playlist_url()?;
        let emotions = self.emotions();
        if emotions.is_empty() {
            return None;
        }
        Some(RunInputs {
            playlist_url,
            emotions,
            total_songs_estimate: self.total_songs_estimate(),
            example_items: self.example_items(),
        })
    }

    /// Record the chosen playlist and its lookup metadata.
    pub fn store_playlist(&self, playlist_url: &str, info: &PlaylistInfo) {
        self.storage.set(keys::PLAYLIST_URL, playlist_url);
        self.storage
            .set(keys::TOTAL_SONGS, &info.total_songs.to_string());
        let examples: Vec<String> = info.example_batch.iter().map(TrackItem::display_label).collect();
        self.write_json(keys::EXAMPLE_BATCH, &examples);
    }

    pub fn store_emotions(&self, emotions: &[String]) {
        self.write_json(keys::EMOTIONS, &emotions);
    }

    pub fn store_classification_result(&self, result: &ClassificationResult) {
        self.write_json(keys::CLASSIFICATION_RESULTS, result);
    }

    pub fn classification_result(&self) -> Option<ClassificationResult> {
        self.read_json(keys::CLASSIFICATION_RESULTS)
    }

    /// Categorized tracks from the stored result.
    ///
    /// Older clients stored the bare `{category: [track]}` map instead of the full
    /// result; that form is accepted only when none of the result's own fields are
    /// present.
    pub fn grouped_tracks(&self) -> Option<BTreeMap<String, Vec<TrackItem>>> {
        let raw: Value = self.read_json(keys::CLASSIFICATION_RESULTS)?;
        let Value::Object(map) = raw else {
            return Some(BTreeMap::new());
        };
        if RESULT_FIELDS.iter().any(|f| map.contains_key(*f)) {
            let grouped = map
                .get("grouped_tracks")
                .cloned()
                .and_then(|g| serde_json::from_value(g).ok())
                .unwrap_or_default();
            return Some(grouped);
        }
        let flat = map
            .into_iter()
            .filter_map(|(k, v)| serde_json::from_value::<Vec<TrackItem>>(v).ok().map(|t| (k, t)))
            .collect();
        Some(flat)
    }

    pub fn store_save_outcome(&self, created: &[CreatedPlaylist], skipped: &[SkippedCategory]) {
        self.write_json(keys::SAVED_PLAYLISTS, &created);
        self.write_json(keys::SAVE_SKIPPED, &skipped);
    }

    pub fn clear_save_outcome(&self) {
        self.storage.remove(keys::SAVED_PLAYLISTS);
        self.storage.remove(keys::SAVE_SKIPPED);
    }

    /// Saved playlists; also accepts the legacy `{emotion: playlist_name}` object.
    pub fn saved_playlists(&self) -> Vec<CreatedPlaylist> {
        let Some(raw) = self.read_json::<Value>(keys::SAVED_PLAYLISTS) else {
            return Vec::new();
        };
        match raw {
            Value::Array(_) => serde_json::from_value(raw).unwrap_or_default(),
            Value::Object(map) => map
                .into_iter()
                .map(|(emotion, name)| CreatedPlaylist {
                    emotion,
                    playlist_id: String::new(),
                    playlist_name: match name {
                        Value::String(s) => s,
                        other => other.to_string(),
                    },
                    playlist_url: String::new(),
                    added_tracks: 0,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn skipped_categories(&self) -> Vec<SkippedCategory> {
        self.read_json(keys::SAVE_SKIPPED).unwrap_or_default()
    }

    /// Forget every run key so the next run starts from the home screen.
    pub fn reset(&self) {
        for key in keys::RUN_KEYS {
            self.storage.remove(key);
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.storage.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "ignoring malformed stored value");
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(body) => self.storage.set(key, &body),
            Err(e) => warn!(key, error = %e, "failed to serialize value for storage"),
        }
    }
}
