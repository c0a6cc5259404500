//! Text summary builder for CLI output.
//!
//! Formats human-readable lines for run progress, classification results and
//! the success screen.

use crate::flows::SuccessSummary;
use crate::model::ClassificationResult;
use crate::orchestrator::{ClassificationRun, RunPhase};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// One-line progress report for a run snapshot.
pub(crate) fn format_progress(run: &ClassificationRun) -> String {
    match run.phase {
        RunPhase::Failed => format!(
            "[fail] {}: {}",
            run.step_label,
            run.error_message().unwrap_or("-")
        ),
        _ if run.total_songs > 0 => format!(
            "[{:>3}%] {} ({}/{} songs) {}",
            run.simulated_progress,
            run.step_label,
            run.songs_processed_estimate,
            run.total_songs,
            run.current_example_item
        ),
        _ => format!(
            "[{:>3}%] {} {}",
            run.simulated_progress, run.step_label, run.current_example_item
        ),
    }
}

/// Build a text summary of a finished classification.
pub(crate) fn build_classification_summary(result: &ClassificationResult) -> TextSummary {
    let mut lines = Vec::new();
    if !result.playlist_id.is_empty() {
        lines.push(format!("Playlist: {}", result.playlist_id));
    }
    lines.push(format!(
        "Songs: {} in {} batches",
        result.total_songs, result.total_batches
    ));

    let summary = result.emotion_summary();
    if summary.is_empty() {
        for (emotion, tracks) in &result.grouped_tracks {
            lines.push(format!("  {emotion}: {}", tracks.len()));
        }
    } else {
        let width = summary.iter().map(|s| s.emotion.len()).max().unwrap_or(0);
        for row in &summary {
            lines.push(format!(
                "  {:<width$}  {:>4} ({}%)",
                row.emotion, row.count, row.percent
            ));
        }
    }

    let failed = result.failed_batch_count();
    if failed > 0 {
        lines.push(format!(
            "Fallback batches: {failed} (songs in these batches got default labels)"
        ));
    }
    TextSummary { lines }
}

/// Build a text summary of the success screen.
pub(crate) fn build_success_summary(summary: &SuccessSummary) -> TextSummary {
    let mut lines = vec![format!(
        "{} of {} categories saved ({} tracks)",
        summary.saved(),
        summary.categories.len(),
        summary.total_tracks
    )];
    for category in &summary.categories {
        match &category.playlist {
            Some(p) if !p.playlist_url.is_empty() => lines.push(format!(
                "  {}: {} tracks -> {} ({})",
                category.emotion, category.track_count, p.playlist_name, p.playlist_url
            )),
            Some(p) => lines.push(format!(
                "  {}: {} tracks -> {}",
                category.emotion, category.track_count, p.playlist_name
            )),
            None => lines.push(format!(
                "  {}: {} tracks (not saved)",
                category.emotion, category.track_count
            )),
        }
    }
    for skipped in &summary.skipped {
        lines.push(format!("Skipped {}: {}", skipped.emotion, skipped.reason));
    }
    lines.push(format!("Open: {}", summary.open_url));
    TextSummary { lines }
}
