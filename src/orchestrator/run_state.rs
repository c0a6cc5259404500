//! Classification run state and its reducer.
//!
//! Three independent sources (progress timer, example rotator, network call) feed
//! [`RunMachine::apply`]. The reducer owns every mutation, so the 90% ceiling,
//! overwrite-on-completion and post-cancellation silence are enforced in one place.

use serde::Serialize;
use std::time::Duration;

use crate::model::{ClassificationResult, EmotionSummary};

/// Simulated progress never passes this value before the real result arrives.
pub const PROGRESS_CEILING: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Idle,
    ValidatingPrereqs,
    Running,
    Complete,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Complete | RunPhase::Failed)
    }
}

/// Cadence of the run simulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTiming {
    pub progress_period: Duration,
    pub progress_step: u8,
    pub rotate_period: Duration,
    pub completion_delay: Duration,
}

impl Default for RunTiming {
    fn default() -> Self {
        Self {
            progress_period: Duration::from_millis(700),
            progress_step: 3,
            rotate_period: Duration::from_millis(1800),
            completion_delay: Duration::from_millis(1500),
        }
    }
}

/// Human-readable labels shown while a run progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLabels {
    /// Ordered steps; the last entry is the completion label.
    pub steps: Vec<String>,
    pub initial: String,
    pub awaiting: String,
    pub error: String,
    pub initial_item: String,
}

impl Default for StepLabels {
    fn default() -> Self {
        Self {
            steps: [
                "Fetching playlist data from Spotify...",
                "Grouping songs...",
                "Classifying emotions with AI...",
                "Preparing results...",
                "Done!",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            initial: "Analyzing playlist...".into(),
            awaiting: "Waiting for classification results...".into(),
            error: "Something went wrong".into(),
            initial_item: "Starting AI...".into(),
        }
    }
}

impl StepLabels {
    /// Step index for a progress value: linear buckets over `0..=90`, never
    /// reaching the completion label.
    pub fn bucket(&self, progress: u8) -> usize {
        let span = self.steps.len().saturating_sub(1);
        let raw = usize::from(progress) * span / usize::from(PROGRESS_CEILING);
        raw.min(self.steps.len().saturating_sub(2))
    }

    fn done(&self) -> &str {
        self.steps.last().map(String::as_str).unwrap_or("Done!")
    }
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunOutcome {
    Success(Box<ClassificationResult>),
    Failure(String),
}

/// Observable state of one classification attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationRun {
    pub phase: RunPhase,
    pub simulated_progress: u8,
    pub step_label: String,
    pub songs_processed_estimate: u32,
    pub total_songs: u32,
    pub current_example_item: String,
    pub outcome: Option<RunOutcome>,
    pub failed_batch_count: usize,
    pub emotion_stats: Vec<EmotionSummary>,
}

impl ClassificationRun {
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Some(RunOutcome::Failure(msg)) => Some(msg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RunEvent {
    ProgressTick,
    RotateTick,
    ClassificationSucceeded(Box<ClassificationResult>),
    ClassificationFailed(String),
    Cancelled,
}

/// What the reducer did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// No observable change.
    Ignored,
    Updated,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunMachine {
    run: ClassificationRun,
    labels: StepLabels,
    progress_step: u8,
    step_index: usize,
    example_items: Vec<String>,
    example_cursor: usize,
    cancelled: bool,
}

impl RunMachine {
    pub fn new(labels: StepLabels, progress_step: u8) -> Self {
        let run = ClassificationRun {
            phase: RunPhase::Idle,
            simulated_progress: 0,
            step_label: labels.initial.clone(),
            songs_processed_estimate: 0,
            total_songs: 0,
            current_example_item: labels.initial_item.clone(),
            outcome: None,
            failed_batch_count: 0,
            emotion_stats: Vec::new(),
        };
        Self {
            run,
            labels,
            progress_step,
            step_index: 0,
            example_items: Vec::new(),
            example_cursor: 0,
            cancelled: false,
        }
    }

    pub fn run(&self) -> &ClassificationRun {
        &self.run
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn begin_validation(&mut self) {
        if self.run.phase == RunPhase::Idle {
            self.run.phase = RunPhase::ValidatingPrereqs;
        }
    }

    /// Enter `Running` with the estimate and example items read from the prerequisites.
    pub fn start(&mut self, total_songs_estimate: u32, example_items: Vec<String>) {
        if self.run.phase != RunPhase::ValidatingPrereqs || self.cancelled {
            return;
        }
        self.run.phase = RunPhase::Running;
        self.run.total_songs = total_songs_estimate;
        self.example_items = example_items;
    }

    pub fn apply(&mut self, event: RunEvent) -> Step {
        if self.cancelled || self.run.phase != RunPhase::Running {
            return Step::Ignored;
        }
        match event {
            RunEvent::ProgressTick => self.advance_progress(),
            RunEvent::RotateTick => self.rotate_example(),
            RunEvent::ClassificationSucceeded(result) => self.complete(*result),
            RunEvent::ClassificationFailed(message) => self.fail(message),
            RunEvent::Cancelled => {
                self.cancelled = true;
                Step::Cancelled
            }
        }
    }

    fn advance_progress(&mut self) -> Step {
        let prev = self.run.simulated_progress;
        let next = prev
            .saturating_add(self.progress_step)
            .min(PROGRESS_CEILING);
        if next == prev {
            return Step::Ignored;
        }
        self.run.simulated_progress = next;

        let total = self.run.total_songs;
        if total > 0 {
            let estimate = (f64::from(next) / 100.0 * f64::from(total)).round() as u32;
            self.run.songs_processed_estimate = estimate.min(total);
        }

        let bucket = self.labels.bucket(next);
        if bucket != self.step_index {
            self.step_index = bucket;
            if let Some(label) = self.labels.steps.get(bucket) {
                self.run.step_label = label.clone();
            }
        }
        if next == PROGRESS_CEILING && prev < PROGRESS_CEILING {
            self.run.step_label = self.labels.awaiting.clone();
        }
        Step::Updated
    }

    fn rotate_example(&mut self) -> Step {
        if self.example_items.is_empty() {
            return Step::Ignored;
        }
        let index = self.example_cursor % self.example_items.len();
        self.run.current_example_item = self.example_items[index].clone();
        self.example_cursor = self.example_cursor.wrapping_add(1);
        Step::Updated
    }

    fn complete(&mut self, result: ClassificationResult) -> Step {
        if result.total_songs > 0 {
            self.run.total_songs = result.total_songs;
        }
        self.run.songs_processed_estimate = self.run.total_songs;
        self.run.simulated_progress = 100;
        self.run.step_label = self.labels.done().to_string();
        self.run.failed_batch_count = result.failed_batch_count();
        self.run.emotion_stats = result.emotion_summary();
        self.run.outcome = Some(RunOutcome::Success(Box::new(result)));
        self.run.phase = RunPhase::Complete;
        Step::Completed
    }

    fn fail(&mut self, message: String) -> Step {
        self.run.step_label = self.labels.error.clone();
        self.run.outcome = Some(RunOutcome::Failure(message));
        self.run.phase = RunPhase::Failed;
        Step::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EmotionStat;

    fn running(total: u32, examples: &[&str]) -> RunMachine {
        let mut machine = RunMachine::new(StepLabels::default(), 3);
        machine.begin_validation();
        machine.start(total, examples.iter().map(|s| s.to_string()).collect());
        machine
    }

    fn happy_sad_result() -> ClassificationResult {
        let mut result = ClassificationResult {
            total_songs: 40,
            ..Default::default()
        };
        result.emotion_stats.insert(
            "happy".into(),
            EmotionStat {
                count: 20,
                percentage: 50.0,
            },
        );
        result.emotion_stats.insert(
            "sad".into(),
            EmotionStat {
                count: 20,
                percentage: 50.0,
            },
        );
        result
    }

    #[test]
    fn progress_is_monotonic_and_capped() {
        let mut machine = running(40, &[]);
        let mut last = 0;
        for _ in 0..100 {
            machine.apply(RunEvent::ProgressTick);
            let p = machine.run().simulated_progress;
            assert!(p >= last, "progress went backwards: {last} -> {p}");
            assert!(p <= PROGRESS_CEILING);
            last = p;
        }
        assert_eq!(last, PROGRESS_CEILING);
        assert_eq!(machine.apply(RunEvent::ProgressTick), Step::Ignored);
    }

    #[test]
    fn songs_estimate_follows_progress() {
        let mut machine = running(40, &[]);
        for _ in 0..10 {
            machine.apply(RunEvent::ProgressTick);
        }
        // 30% of 40
        assert_eq!(machine.run().songs_processed_estimate, 12);

        let mut unknown = running(0, &[]);
        unknown.apply(RunEvent::ProgressTick);
        assert_eq!(unknown.run().songs_processed_estimate, 0);
    }

    #[test]
    fn labels_change_only_on_bucket_change() {
        let labels = StepLabels::default();
        let mut machine = running(10, &[]);

        machine.apply(RunEvent::ProgressTick);
        assert_eq!(machine.run().step_label, labels.initial);

        // 24% -> bucket 1
        for _ in 0..7 {
            machine.apply(RunEvent::ProgressTick);
        }
        assert_eq!(machine.run().simulated_progress, 24);
        assert_eq!(machine.run().step_label, labels.steps[1]);

        // 87% -> bucket 3
        for _ in 0..21 {
            machine.apply(RunEvent::ProgressTick);
        }
        assert_eq!(machine.run().simulated_progress, 87);
        assert_eq!(machine.run().step_label, labels.steps[3]);

        machine.apply(RunEvent::ProgressTick);
        assert_eq!(machine.run().simulated_progress, 90);
        assert_eq!(machine.run().step_label, labels.awaiting);
    }

    #[test]
    fn bucket_never_reaches_completion_label() {
        let labels = StepLabels::default();
        assert_eq!(labels.bucket(0), 0);
        assert_eq!(labels.bucket(22), 0);
        assert_eq!(labels.bucket(23), 1);
        assert_eq!(labels.bucket(90), 3);
        assert_eq!(labels.bucket(100), 3);
    }

    #[test]
    fn rotator_wraps_and_tolerates_empty_sequence() {
        let mut machine = running(0, &["a", "b"]);
        let seen: Vec<String> = (0..5)
            .map(|_| {
                machine.apply(RunEvent::RotateTick);
                machine.run().current_example_item.clone()
            })
            .collect();
        assert_eq!(seen, vec!["a", "b", "a", "b", "a"]);

        let mut empty = running(0, &[]);
        assert_eq!(empty.apply(RunEvent::RotateTick), Step::Ignored);
        assert_eq!(
            empty.run().current_example_item,
            StepLabels::default().initial_item
        );
    }

    #[test]
    fn success_overwrites_estimates() {
        let mut machine = running(25, &[]);
        for _ in 0..40 {
            machine.apply(RunEvent::ProgressTick);
        }
        let step = machine.apply(RunEvent::ClassificationSucceeded(Box::new(happy_sad_result())));

        assert_eq!(step, Step::Completed);
        let run = machine.run();
        assert_eq!(run.phase, RunPhase::Complete);
        assert_eq!(run.simulated_progress, 100);
        assert_eq!(run.total_songs, 40);
        assert_eq!(run.songs_processed_estimate, 40);
        assert_eq!(run.failed_batch_count, 0);
        assert_eq!(run.step_label, "Done!");
        assert_eq!(run.emotion_stats.len(), 2);
    }

    #[test]
    fn success_with_zero_total_keeps_estimate() {
        let mut machine = running(25, &[]);
        machine.apply(RunEvent::ClassificationSucceeded(Box::default()));
        assert_eq!(machine.run().total_songs, 25);
        assert_eq!(machine.run().songs_processed_estimate, 25);
    }

    #[test]
    fn failure_sets_error_label_and_keeps_progress() {
        let mut machine = running(10, &[]);
        machine.apply(RunEvent::ProgressTick);
        let step = machine.apply(RunEvent::ClassificationFailed("Playlist not found".into()));

        assert_eq!(step, Step::Failed);
        assert_eq!(machine.run().phase, RunPhase::Failed);
        assert_eq!(machine.run().simulated_progress, 3);
        assert_eq!(machine.run().step_label, StepLabels::default().error);
        assert_eq!(machine.run().error_message(), Some("Playlist not found"));
    }

    #[test]
    fn terminal_phases_ignore_further_events() {
        let mut machine = running(10, &["a"]);
        machine.apply(RunEvent::ClassificationFailed("x".into()));
        let frozen = machine.run().clone();

        assert_eq!(machine.apply(RunEvent::ProgressTick), Step::Ignored);
        assert_eq!(machine.apply(RunEvent::RotateTick), Step::Ignored);
        assert_eq!(
            machine.apply(RunEvent::ClassificationSucceeded(Box::default())),
            Step::Ignored
        );
        assert_eq!(machine.run(), &frozen);
    }

    #[test]
    fn late_result_after_cancel_is_discarded() {
        let mut machine = running(10, &["a"]);
        machine.apply(RunEvent::ProgressTick);
        assert_eq!(machine.apply(RunEvent::Cancelled), Step::Cancelled);
        let frozen = machine.run().clone();

        let step = machine.apply(RunEvent::ClassificationSucceeded(Box::new(happy_sad_result())));
        assert_eq!(step, Step::Ignored);
        assert_eq!(machine.apply(RunEvent::ProgressTick), Step::Ignored);
        assert_eq!(machine.run(), &frozen);
        assert!(machine.is_cancelled());
    }

    #[test]
    fn start_requires_validation_phase() {
        let mut machine = RunMachine::new(StepLabels::default(), 3);
        machine.start(10, Vec::new());
        assert_eq!(machine.run().phase, RunPhase::Idle);
        assert_eq!(machine.apply(RunEvent::ProgressTick), Step::Ignored);
    }
}
