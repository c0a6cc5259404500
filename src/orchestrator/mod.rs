//! Classification run orchestration.
//!
//! This module owns the run lifecycle (mount, simulate, reconcile, tear down) and
//! post-run processing. Presentation layers consume [`ControllerEvent`]s and never
//! touch the timers or the network task directly.

mod controller;
mod post_process;
mod run_state;

pub use controller::{ControllerEvent, MountOutcome, RunController};
pub use run_state::{
    ClassificationRun, RunEvent, RunMachine, RunOutcome, RunPhase, RunTiming, Step, StepLabels,
    PROGRESS_CEILING,
};
