#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Action log and deterministic replay of evacuation runs.
//!
//! A [`Recorder`] wraps the state controller and turns every successful
//! mutation into an [`Action`]. The resulting [`ActionLog`] can be replayed
//! with [`replay`] against an independently constructed state whose cells and
//! individuals correspond one to one with the recorded run.

mod action;
mod log;
mod playback;
mod recorder;

pub use action::Action;
pub use log::{ActionLog, StepRecord};
pub use playback::{replay, PlaybackError};
pub use recorder::Recorder;
