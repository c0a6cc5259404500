//! Post-run processing.
//!
//! Persists the completed result for the save screen and relays the backend's
//! batch diagnostics into the log.

use tracing::{debug, info, warn};

use crate::model::{BatchStatus, ClassificationResult};
use crate::prereq::PrerequisiteStore;

/// Store the result for the next screen and log its batch diagnostics.
pub(crate) fn process_completion(prereqs: &PrerequisiteStore, result: &ClassificationResult) {
    prereqs.store_classification_result(result);

    let failed = result.failed_batch_count();
    info!(
        playlist_id = %result.playlist_id,
        total_songs = result.total_songs,
        total_batches = result.total_batches,
        failed_batches = failed,
        "classification completed"
    );

    for batch in &result.failed_batches {
        warn!(batch = batch.batch_index, reason = %batch.reason, "batch fell back to default labels");
    }
    if let Some(logs) = result.batch_logs.as_deref() {
        for outcome in logs.iter().filter(|b| b.status == BatchStatus::Fallback) {
            debug!(
                batch = outcome.batch_index,
                total = ?outcome.total_batches,
                reason = outcome.reason.as_deref().unwrap_or("-"),
                "backend batch log: fallback"
            );
        }
    }
    if let Some(events) = result.events.as_deref() {
        for event in events {
            debug!(%event, "backend event");
        }
    }
}
