//! Append-only log of the actions recorded during a run.

use evacsim_core::Step;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{action::Action, PlaybackError};

/// Actions recorded during one simulation step, in execution order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step the actions belong to.
    pub step: Step,
    /// Actions in the order they were executed.
    pub actions: Vec<Action>,
}

/// Ordered record of a complete run.
///
/// Steps without actions are not stored; replay advances the clock over them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    steps: Vec<StepRecord>,
    final_step: Step,
}

impl ActionLog {
    /// Creates an empty log starting at the provided step.
    #[must_use]
    pub fn starting_at(step: Step) -> Self {
        Self {
            steps: Vec::new(),
            final_step: step,
        }
    }

    /// Recorded steps in ascending order.
    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Step the recorded run ended on.
    #[must_use]
    pub const fn final_step(&self) -> Step {
        self.final_step
    }

    /// Total number of recorded actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.iter().map(|record| record.actions.len()).sum()
    }

    /// Reports whether no action was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.iter().all(|record| record.actions.is_empty())
    }

    /// Iterator over every action together with its step.
    pub fn iter(&self) -> impl Iterator<Item = (Step, &Action)> {
        self.steps
            .iter()
            .flat_map(|record| record.actions.iter().map(move |action| (record.step, action)))
    }

    /// Encodes the log with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PlaybackError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes a log previously produced by [`ActionLog::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PlaybackError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// SHA-256 of the bincode encoding; equal runs produce equal digests.
    pub fn digest(&self) -> Result<[u8; 32], PlaybackError> {
        let mut hasher = Sha256::new();
        hasher.update(self.to_bytes()?);
        Ok(hasher.finalize().into())
    }

    pub(crate) fn push(&mut self, record: StepRecord) {
        debug_assert!(
            self.steps.last().map_or(true, |last| last.step < record.step),
            "step records must be appended in ascending order"
        );
        self.steps.push(record);
    }

    pub(crate) fn close(&mut self, step: Step) {
        self.final_step = step;
    }
}
