//! Session lifecycle and classification-run orchestration for the moodlist client.
//!
//! The binary in `main.rs` is a thin shell over [`cli`]; everything else is usable
//! as a library by other hosts.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod flows;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod prereq;
pub mod session;
pub mod storage;
mod text_summary;
