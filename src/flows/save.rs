//! Save screen: turn classified categories into playlists.

use std::collections::BTreeMap;

use crate::backend::PlaylistBackend;
use crate::error::{FlowError, FlowResult};
use crate::logging;
use crate::model::{Navigation, SavePlaylistsRequest, Screen, TrackItem};
use crate::prereq::PrerequisiteStore;
use crate::session::{is_auth_failure, SessionStore};

#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Per-category playlist name overrides. Blank values are ignored.
    pub names: BTreeMap<String, String>,
    pub public: bool,
}

/// `"happy"` becomes `"Happy Songs"`.
pub fn default_playlist_name(emotion: &str) -> String {
    let mut chars = emotion.trim().chars();
    match chars.next() {
        Some(first) => format!("{}{} Songs", first.to_uppercase(), chars.as_str()),
        None => "Songs".to_string(),
    }
}

/// Names for every category, user overrides first.
pub fn playlist_names(
    grouped: &BTreeMap<String, Vec<TrackItem>>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    grouped
        .keys()
        .map(|emotion| {
            let name = overrides
                .get(emotion)
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| default_playlist_name(emotion));
            (emotion.clone(), name)
        })
        .collect()
}

/// Create one playlist per category.
///
/// An auth-class rejection clears the session before returning.
pub async fn save_playlists<B: PlaylistBackend>(
    backend: &B,
    session: &SessionStore,
    prereqs: &PrerequisiteStore,
    options: SaveOptions,
) -> FlowResult<Navigation> {
    if session.guard(Screen::Save).is_some() {
        return Err(FlowError::SessionRequired);
    }
    let Some(token) = session.access_token() else {
        session.clear();
        return Err(FlowError::SessionRequired);
    };
    let grouped = prereqs
        .grouped_tracks()
        .filter(|g| !g.is_empty())
        .ok_or(FlowError::PrerequisiteMissing {
            what: "classification results",
            screen: Screen::Home,
        })?;

    let playlist_names = playlist_names(&grouped, &options.names);
    let tracks: usize = grouped.values().map(Vec::len).sum();
    logging::report_event(
        Screen::Save,
        &format!("saving {} playlists ({tracks} tracks)", grouped.len()),
    );

    let request = SavePlaylistsRequest {
        access_token: token.expose().to_string(),
        grouped_tracks: grouped,
        playlist_names,
        public: options.public,
    };
    match backend.save_playlists(request).await {
        Ok(response) => {
            prereqs.store_save_outcome(&response.created_playlists, &response.skipped);
            logging::report_event(
                Screen::Save,
                &format!(
                    "{} playlists created, {} skipped",
                    response.created_playlists.len(),
                    response.skipped.len()
                ),
            );
            Ok(Navigation::Navigate(Screen::Success))
        }
        Err(e) if is_auth_failure(e.status(), &e.detail()) => {
            session.clear();
            let message = logging::scrub(&e.to_string(), token.expose());
            logging::report_error(Screen::Save, "session rejected while saving", &message);
            Err(FlowError::AuthExpired(message))
        }
        Err(e) => {
            let message = logging::scrub(&e.user_message("saving playlists failed"), token.expose());
            logging::report_error(Screen::Save, "saving playlists failed", &message);
            Err(FlowError::SaveFailure(message))
        }
    }
}

/// Leave without saving.
pub fn skip_save(prereqs: &PrerequisiteStore) -> Navigation {
    prereqs.clear_save_outcome();
    logging::report_event(Screen::Save, "save skipped");
    Navigation::Navigate(Screen::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::flows::fake::{valid_session, FakeBackend};
    use crate::model::{
        ClassificationResult, CreatedPlaylist, SavePlaylistsResponse, SkippedCategory,
    };
    use serde_json::json;

    fn track(name: &str) -> TrackItem {
        TrackItem {
            id: Some(name.into()),
            name: Some(name.into()),
            ..TrackItem::default()
        }
    }

    fn with_results(prereqs: &PrerequisiteStore) {
        let mut grouped = BTreeMap::new();
        grouped.insert("happy".to_string(), vec![track("a"), track("b")]);
        grouped.insert("sad".to_string(), vec![track("c")]);
        prereqs.store_classification_result(&ClassificationResult {
            grouped_tracks: grouped,
            ..ClassificationResult::default()
        });
    }

    fn created(emotion: &str) -> CreatedPlaylist {
        CreatedPlaylist {
            emotion: emotion.into(),
            playlist_id: format!("id-{emotion}"),
            playlist_name: default_playlist_name(emotion),
            playlist_url: format!("https://open.spotify.com/playlist/id-{emotion}"),
            added_tracks: 1,
        }
    }

    #[test]
    fn default_names_capitalize_the_category() {
        assert_eq!(default_playlist_name("happy"), "Happy Songs");
        assert_eq!(default_playlist_name("élan"), "Élan Songs");
        assert_eq!(default_playlist_name(""), "Songs");
    }

    #[test]
    fn overrides_win_unless_blank() {
        let mut grouped = BTreeMap::new();
        grouped.insert("happy".to_string(), vec![]);
        grouped.insert("sad".to_string(), vec![]);
        let mut overrides = BTreeMap::new();
        overrides.insert("happy".to_string(), " Sunshine ".to_string());
        overrides.insert("sad".to_string(), "  ".to_string());
        overrides.insert("angry".to_string(), "Unused".to_string());

        let names = playlist_names(&grouped, &overrides);
        assert_eq!(names.len(), 2);
        assert_eq!(names["happy"], "Sunshine");
        assert_eq!(names["sad"], "Sad Songs");
    }

    #[tokio::test]
    async fn successful_save_stores_outcome() {
        let (session, prereqs) = valid_session();
        with_results(&prereqs);
        let backend = FakeBackend::default().with_save(Ok(SavePlaylistsResponse {
            created_playlists: vec![created("happy")],
            skipped: vec![SkippedCategory {
                emotion: "sad".into(),
                reason: "no tracks".into(),
            }],
        }));

        let nav = save_playlists(&backend, &session, &prereqs, SaveOptions::default())
            .await
            .unwrap();
        assert_eq!(nav, Navigation::Navigate(Screen::Success));
        assert_eq!(prereqs.saved_playlists(), vec![created("happy")]);
        assert_eq!(prereqs.skipped_categories().len(), 1);

        let sent = backend.save_requests();
        assert_eq!(sent[0].access_token, "tok");
        assert_eq!(sent[0].playlist_names["sad"], "Sad Songs");
        assert!(!sent[0].public);
    }

    #[tokio::test]
    async fn auth_rejection_clears_session() {
        let (session, prereqs) = valid_session();
        with_results(&prereqs);
        let backend = FakeBackend::default().with_save(Err(BackendError::Status {
            status: 401,
            detail: json!("The access token expired"),
        }));

        let err = save_playlists(&backend, &session, &prereqs, SaveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::AuthExpired(_)));
        assert_eq!(err.navigation(), Some(Navigation::Redirect(Screen::Login)));
        assert!(session.read().is_empty());
    }

    #[tokio::test]
    async fn auth_heuristic_applies_without_status() {
        let (session, prereqs) = valid_session();
        with_results(&prereqs);
        let backend = FakeBackend::default().with_save(Err(BackendError::Status {
            status: 500,
            detail: json!("Spotify API hatası (401): Unauthorized"),
        }));
        let err = save_playlists(&backend, &session, &prereqs, SaveOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_auth_class());
        assert!(!session.is_valid());
    }

    #[tokio::test]
    async fn other_failures_keep_the_session_and_hide_the_token() {
        let (session, prereqs) = valid_session();
        with_results(&prereqs);
        let backend = FakeBackend::default().with_save(Err(BackendError::Status {
            status: 500,
            detail: json!("upstream rejected tok for quota"),
        }));
        let err = save_playlists(&backend, &session, &prereqs, SaveOptions::default())
            .await
            .unwrap_err();
        match err {
            FlowError::SaveFailure(msg) => assert_eq!(msg, "upstream rejected *** for quota"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(session.is_valid());
    }

    #[tokio::test]
    async fn missing_results_redirect_home() {
        let (session, prereqs) = valid_session();
        let backend = FakeBackend::default();
        let err = save_playlists(&backend, &session, &prereqs, SaveOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.navigation(), Some(Navigation::Redirect(Screen::Home)));
        assert!(backend.save_requests().is_empty());
    }

    #[tokio::test]
    async fn result_without_categories_redirects_home() {
        let (session, prereqs) = valid_session();
        prereqs.store_classification_result(&ClassificationResult {
            total_songs: 5,
            ..ClassificationResult::default()
        });
        let backend = FakeBackend::default();
        let err = save_playlists(&backend, &session, &prereqs, SaveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::PrerequisiteMissing { .. }));
        assert!(backend.save_requests().is_empty());
    }

    #[tokio::test]
    async fn invalid_session_never_reaches_backend() {
        let (session, prereqs) = valid_session();
        with_results(&prereqs);
        session.clear();
        let backend = FakeBackend::default();
        let err = save_playlists(&backend, &session, &prereqs, SaveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::SessionRequired));
        assert!(backend.save_requests().is_empty());
    }

    #[test]
    fn skip_forgets_previous_outcome() {
        let (_, prereqs) = valid_session();
        prereqs.store_save_outcome(&[created("happy")], &[]);
        assert_eq!(skip_save(&prereqs), Navigation::Navigate(Screen::Success));
        assert!(prereqs.saved_playlists().is_empty());
    }
}
