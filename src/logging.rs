//! Tracing setup and the diagnostic channel.
//!
//! Every flow reports through [`report_event`] / [`report_error`], which tag the
//! entry with the originating screen. Callers holding a token pass messages
//! through [`scrub`] first.

use std::fmt::Display;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::model::Screen;

/// Install the global subscriber. Safe to call more than once.
pub fn init(verbose: bool) {
    let default = if verbose { "moodlist=debug" } else { "moodlist=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn report_event(screen: Screen, message: &str) {
    info!(screen = screen.as_str(), "{message}");
}

pub fn report_error(screen: Screen, message: &str, err: &dyn Display) {
    error!(screen = screen.as_str(), error = %err, "{message}");
}

/// Replace every occurrence of `secret` in `text`.
pub fn scrub(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, "***")
}
