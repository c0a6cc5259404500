//! Playlist and category selection (home and emotions screens).

use crate::backend::PlaylistBackend;
use crate::error::{FlowError, FlowResult};
use crate::logging;
use crate::model::{Navigation, PlaylistInfo, PlaylistInfoRequest, Screen};
use crate::prereq::PrerequisiteStore;
use crate::session::SessionStore;

/// Look up a playlist and remember it for the run.
pub async fn select_playlist<B: PlaylistBackend>(
    backend: &B,
    session: &SessionStore,
    prereqs: &PrerequisiteStore,
    playlist_url: &str,
) -> FlowResult<PlaylistInfo> {
    if session.guard(Screen::Home).is_some() {
        return Err(FlowError::SessionRequired);
    }
    let playlist_url = playlist_url.trim();
    if playlist_url.is_empty() {
        return Err(FlowError::InvalidInput("a playlist URL is required".into()));
    }

    let request = PlaylistInfoRequest {
        playlist_url: playlist_url.to_string(),
    };
    let info = backend.playlist_info(request).await.map_err(|e| {
        logging::report_error(Screen::Home, "playlist lookup failed", &e);
        FlowError::PlaylistLookup(e.user_message("playlist could not be read"))
    })?;

    prereqs.store_playlist(playlist_url, &info);
    logging::report_event(
        Screen::Home,
        &format!("playlist {} selected ({} songs)", info.playlist_id, info.total_songs),
    );
    Ok(info)
}

/// Trim, lowercase, drop empties and duplicates. First occurrence wins.
pub fn normalize_emotions<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for item in raw {
        let e = item.as_ref().trim().to_lowercase();
        if !e.is_empty() && !out.contains(&e) {
            out.push(e);
        }
    }
    out
}

/// Store the chosen categories and move on to the run screen.
pub fn choose_emotions<S: AsRef<str>>(
    session: &SessionStore,
    prereqs: &PrerequisiteStore,
    raw: &[S],
) -> FlowResult<Navigation> {
    if session.guard(Screen::Emotions).is_some() {
        return Err(FlowError::SessionRequired);
    }
    if prereqs.playlist_url().is_none() {
        return Err(FlowError::PrerequisiteMissing {
            what: "playlist",
            screen: Screen::Home,
        });
    }
    let emotions = normalize_emotions(raw);
    if emotions.is_empty() {
        return Err(FlowError::InvalidInput("select at least one category".into()));
    }
    prereqs.store_emotions(&emotions);
    logging::report_event(Screen::Emotions, &format!("categories: {}", emotions.join(", ")));
    Ok(Navigation::Navigate(Screen::Classify))
}
