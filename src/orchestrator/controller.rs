//! Classification run lifecycle controller.
//!
//! Owns the two simulator timers, the network task and the unmount token, and
//! emits state snapshots and navigation signals for presentation layers.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::post_process::process_completion;
use super::run_state::{
    ClassificationRun, RunEvent, RunMachine, RunOutcome, RunTiming, Step, StepLabels,
};
use crate::backend::{BackendError, ClassifierBackend};
use crate::logging;
use crate::model::{ClassificationRequest, ClassificationResult, Navigation, Screen};
use crate::prereq::PrerequisiteStore;
use crate::session::SessionStore;

const GENERIC_FAILURE: &str = "Classification failed";

/// Events emitted to the hosting UI.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    State(ClassificationRun),
    Navigate(Navigation),
}

/// How a mounted run ended.
#[derive(Debug, Clone)]
pub enum MountOutcome {
    /// Guards failed; no run was created.
    Redirected(Navigation),
    /// The run reached `Complete` or `Failed`.
    Finished(ClassificationRun),
    /// The screen was torn down first.
    Unmounted(ClassificationRun),
}

enum Exit {
    Completed,
    Failed,
    Unmounted,
}

/// Periodic simulators. Stopped exactly once, at the latest on drop.
struct Simulators {
    progress: Option<Interval>,
    rotate: Option<Interval>,
    stopped: bool,
}

impl Simulators {
    fn start(timing: &RunTiming) -> Self {
        let periodic = |period: std::time::Duration| {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        };
        Self {
            progress: Some(periodic(timing.progress_period)),
            rotate: Some(periodic(timing.rotate_period)),
            stopped: false,
        }
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.progress = None;
        self.rotate = None;
        self.stopped = true;
        debug!("run simulators stopped");
    }
}

impl Drop for Simulators {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tick_or_pending(timer: &mut Option<Interval>) {
    match timer {
        Some(t) => {
            t.tick().await;
        }
        None => futures::future::pending::<()>().await,
    }
}

// Dropping a JoinHandle does not cancel the task, so abort explicitly.
struct NetworkTask(JoinHandle<Result<ClassificationResult, BackendError>>);

impl Drop for NetworkTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Drives one classification attempt from mount to terminal outcome.
pub struct RunController<B> {
    backend: Arc<B>,
    session: SessionStore,
    prereqs: PrerequisiteStore,
    timing: RunTiming,
    labels: StepLabels,
}

impl<B: ClassifierBackend> RunController<B> {
    pub fn new(
        backend: Arc<B>,
        session: SessionStore,
        prereqs: PrerequisiteStore,
        timing: RunTiming,
    ) -> Self {
        Self {
            backend,
            session,
            prereqs,
            timing,
            labels: StepLabels::default(),
        }
    }

    pub fn with_labels(mut self, labels: StepLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Mount the run screen and drive it until a terminal outcome or `unmount` fires.
    ///
    /// Dropping the returned future also stops the simulators and aborts the request.
    pub async fn run(
        &self,
        event_tx: &UnboundedSender<ControllerEvent>,
        unmount: CancellationToken,
    ) -> MountOutcome {
        let mut machine = RunMachine::new(self.labels.clone(), self.timing.progress_step);
        machine.begin_validation();

        if let Some(nav) = self.session.guard(Screen::Classify) {
            let _ = event_tx.send(ControllerEvent::Navigate(nav));
            return MountOutcome::Redirected(nav);
        }
        let Some(inputs) = self.prereqs.run_inputs() else {
            logging::report_event(
                Screen::Classify,
                "playlist or categories missing, redirecting to category selection",
            );
            let nav = Navigation::Redirect(Screen::Emotions);
            let _ = event_tx.send(ControllerEvent::Navigate(nav));
            return MountOutcome::Redirected(nav);
        };

        machine.start(inputs.total_songs_estimate, inputs.example_items);
        publish(event_tx, &machine);
        info!(
            categories = inputs.emotions.len(),
            estimate = inputs.total_songs_estimate,
            "classification started"
        );

        let request = ClassificationRequest {
            playlist_url: inputs.playlist_url,
            emotions: inputs.emotions,
        };
        let backend = Arc::clone(&self.backend);
        let mut network = NetworkTask(tokio::spawn(async move { backend.classify(request).await }));
        let mut simulators = Simulators::start(&self.timing);

        let exit = loop {
            let event = tokio::select! {
                biased;
                _ = unmount.cancelled() => RunEvent::Cancelled,
                joined = &mut network.0 => match joined {
                    Ok(Ok(result)) => RunEvent::ClassificationSucceeded(Box::new(result)),
                    Ok(Err(e)) => {
                        logging::report_error(Screen::Classify, "classification request failed", &e);
                        RunEvent::ClassificationFailed(e.user_message(GENERIC_FAILURE))
                    }
                    Err(e) => {
                        logging::report_error(Screen::Classify, "classification task failed", &e);
                        RunEvent::ClassificationFailed(GENERIC_FAILURE.to_string())
                    }
                },
                _ = tick_or_pending(&mut simulators.progress) => RunEvent::ProgressTick,
                _ = tick_or_pending(&mut simulators.rotate) => RunEvent::RotateTick,
            };
            match machine.apply(event) {
                Step::Ignored => {}
                Step::Updated => publish(event_tx, &machine),
                Step::Completed => break Exit::Completed,
                Step::Failed => break Exit::Failed,
                Step::Cancelled => break Exit::Unmounted,
            }
        };
        simulators.stop();

        match exit {
            Exit::Unmounted => {
                debug!("run screen unmounted before a result arrived");
                MountOutcome::Unmounted(machine.run().clone())
            }
            Exit::Failed => {
                publish(event_tx, &machine);
                MountOutcome::Finished(machine.run().clone())
            }
            Exit::Completed => {
                publish(event_tx, &machine);
                if let Some(RunOutcome::Success(result)) = &machine.run().outcome {
                    process_completion(&self.prereqs, result);
                }
                tokio::select! {
                    biased;
                    _ = unmount.cancelled() => {
                        debug!("run screen unmounted during completion delay");
                        return MountOutcome::Unmounted(machine.run().clone());
                    }
                    _ = tokio::time::sleep(self.timing.completion_delay) => {}
                }
                let nav = Navigation::Navigate(Screen::Save);
                let _ = event_tx.send(ControllerEvent::Navigate(nav));
                MountOutcome::Finished(machine.run().clone())
            }
        }
    }
}

fn publish(event_tx: &UnboundedSender<ControllerEvent>, machine: &RunMachine) {
    let _ = event_tx.send(ControllerEvent::State(machine.run().clone()));
}
