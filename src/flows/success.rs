//! Success screen summary and starting over.

use crate::error::{FlowError, FlowResult};
use crate::logging;
use crate::model::{CreatedPlaylist, Navigation, Screen, SkippedCategory};
use crate::prereq::PrerequisiteStore;
use crate::session::SessionStore;

pub const PLAYLISTS_LIBRARY_URL: &str = "https://open.spotify.com/collection/playlists";

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub emotion: String,
    pub track_count: usize,
    pub playlist: Option<CreatedPlaylist>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuccessSummary {
    pub categories: Vec<CategorySummary>,
    pub total_tracks: usize,
    pub skipped: Vec<SkippedCategory>,
    /// Where "open in Spotify" leads: the first created playlist or the library.
    pub open_url: String,
}

impl SuccessSummary {
    pub fn saved(&self) -> usize {
        self.categories.iter().filter(|c| c.playlist.is_some()).count()
    }
}

pub fn load_summary(session: &SessionStore, prereqs: &PrerequisiteStore) -> FlowResult<SuccessSummary> {
    if session.guard(Screen::Success).is_some() {
        return Err(FlowError::SessionRequired);
    }
    let grouped = prereqs.grouped_tracks().ok_or(FlowError::PrerequisiteMissing {
        what: "classification results",
        screen: Screen::Home,
    })?;
    let saved = prereqs.saved_playlists();

    let categories: Vec<CategorySummary> = grouped
        .iter()
        .map(|(emotion, tracks)| CategorySummary {
            emotion: emotion.clone(),
            track_count: tracks.len(),
            playlist: saved.iter().find(|p| &p.emotion == emotion).cloned(),
        })
        .collect();
    let open_url = saved
        .iter()
        .map(|p| p.playlist_url.as_str())
        .find(|u| !u.is_empty())
        .unwrap_or(PLAYLISTS_LIBRARY_URL)
        .to_string();

    Ok(SuccessSummary {
        total_tracks: categories.iter().map(|c| c.track_count).sum(),
        categories,
        skipped: prereqs.skipped_categories(),
        open_url,
    })
}

/// Forget the run and go back to playlist selection. The session survives.
pub fn start_over(prereqs: &PrerequisiteStore) -> Navigation {
    prereqs.reset();
    logging::report_event(Screen::Success, "starting over");
    Navigation::Navigate(Screen::Home)
}
