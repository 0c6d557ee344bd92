//! Re-applies a recorded log to an independently built state.

use evacsim_core::{EvacError, IdentityMapping, Step};
use evacsim_world::EvacuationStateController;
use thiserror::Error;
use tracing::{info, warn};

use crate::{action::Action, log::ActionLog};

/// Failures raised while encoding or replaying a log.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// A recorded action does not fit the history of the target state.
    #[error(
        "action {index} of step {} cannot be replayed (delayed phase: {delayed}): {source}",
        .step.get()
    )]
    InconsistentPlaybackState {
        /// Step the action was recorded in.
        step: Step,
        /// Position of the action within its step.
        index: usize,
        /// Whether the delayed phase failed.
        delayed: bool,
        /// Error reported by the controller.
        #[source]
        source: EvacError,
    },
    /// The target state is already past a recorded step.
    #[error(
        "target is at step {} but the log continues at step {}",
        .current.get(),
        .recorded.get()
    )]
    StepOutOfOrder {
        /// Step of the target controller.
        current: Step,
        /// Step found in the log.
        recorded: Step,
    },
    /// The log could not be encoded or decoded.
    #[error("failed to encode action log: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Replays `log` on `target`, translating identities through `mapping`.
///
/// The actions run on a copy of the target. The target is replaced only when
/// every action succeeded, so a failed replay leaves it untouched.
pub fn replay<M>(
    log: &ActionLog,
    target: &mut EvacuationStateController,
    mapping: &M,
) -> Result<(), PlaybackError>
where
    M: IdentityMapping + ?Sized,
{
    let mut working = target.clone();

    for record in log.steps() {
        advance(&mut working, record.step)?;
        let actions: Vec<Action> = record
            .actions
            .iter()
            .map(|action| action.remap(mapping))
            .collect();

        for (index, action) in actions.iter().enumerate() {
            action
                .execute(&mut working)
                .map_err(|source| inconsistent(record.step, index, false, action, source))?;
        }
        for (index, action) in actions.iter().enumerate() {
            action
                .execute_delayed(&mut working)
                .map_err(|source| inconsistent(record.step, index, true, action, source))?;
        }
        let _ = working.advance_step();
    }
    advance(&mut working, log.final_step())?;

    info!(
        actions = log.len(),
        steps = log.steps().len(),
        final_step = log.final_step().get(),
        "replay completed"
    );
    *target = working;
    Ok(())
}

fn advance(controller: &mut EvacuationStateController, step: Step) -> Result<(), PlaybackError> {
    let current = controller.step();
    controller.advance_to(step).map_err(|_| {
        warn!(
            current = current.get(),
            recorded = step.get(),
            "replay aborted"
        );
        PlaybackError::StepOutOfOrder {
            current,
            recorded: step,
        }
    })
}

fn inconsistent(
    step: Step,
    index: usize,
    delayed: bool,
    action: &Action,
    source: EvacError,
) -> PlaybackError {
    warn!(
        step = step.get(),
        index,
        kind = action.kind(),
        error = %source,
        "replay aborted"
    );
    PlaybackError::InconsistentPlaybackState {
        step,
        index,
        delayed,
        source,
    }
}
