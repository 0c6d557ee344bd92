//! Controller wrapper that records every successful mutation.

use std::mem;

use evacsim_core::{CellId, DeathCause, EvacError, IndividualId, InvalidArgument, PotentialId, Step};
use evacsim_world::{EvacuationState, EvacuationStateController};
use tracing::debug;

use crate::{
    action::Action,
    log::{ActionLog, StepRecord},
};

/// Drives a controller and keeps the action log of the run.
#[derive(Debug)]
pub struct Recorder {
    controller: EvacuationStateController,
    log: ActionLog,
    pending: Vec<Action>,
}

impl Recorder {
    /// Starts recording on top of the controller's current step.
    #[must_use]
    pub fn new(controller: EvacuationStateController) -> Self {
        let log = ActionLog::starting_at(controller.step());
        Self {
            controller,
            log,
            pending: Vec::new(),
        }
    }

    /// Wrapped controller.
    #[must_use]
    pub const fn controller(&self) -> &EvacuationStateController {
        &self.controller
    }

    /// State of the wrapped controller.
    #[must_use]
    pub const fn state(&self) -> &EvacuationState {
        self.controller.state()
    }

    /// Steps closed so far.
    #[must_use]
    pub const fn log(&self) -> &ActionLog {
        &self.log
    }

    /// Actions executed in the current step.
    #[must_use]
    pub fn pending(&self) -> &[Action] {
        &self.pending
    }

    /// Executes the action and keeps it when it succeeds.
    pub fn record(&mut self, action: Action) -> Result<(), EvacError> {
        action.execute(&mut self.controller)?;
        debug!(
            kind = action.kind(),
            step = self.controller.step().get(),
            "action recorded"
        );
        self.pending.push(action);
        Ok(())
    }

    /// Moves the occupant of `from` onto `to` and records the movement window.
    pub fn move_individual(
        &mut self,
        from: CellId,
        to: CellId,
        start_time: f64,
        arrival_time: f64,
        leaves_trace: bool,
    ) -> Result<IndividualId, EvacError> {
        let individual = self.occupant_of(from)?;
        self.record(Action::Move {
            individual,
            from,
            to,
            start_time,
            arrival_time,
            leaves_trace,
        })?;
        Ok(individual)
    }

    /// Exchanges the occupants of two cells.
    pub fn swap(&mut self, first: CellId, second: CellId) -> Result<(), EvacError> {
        let first_occupant = self.occupant_of(first)?;
        let second_occupant = self.occupant_of(second)?;
        self.record(Action::Swap {
            first,
            first_occupant,
            second,
            second_occupant,
        })
    }

    /// Kills the individual.
    pub fn die(&mut self, individual: IndividualId, cause: DeathCause) -> Result<(), EvacError> {
        let cell = self.cell_of(individual)?;
        self.record(Action::Die {
            individual,
            cell,
            cause,
        })
    }

    /// Marks the individual safe at the current step.
    pub fn set_safe(&mut self, individual: IndividualId) -> Result<(), EvacError> {
        self.record(Action::SetSafe { individual })
    }

    /// Removes the individual from the building.
    pub fn evacuate(&mut self, individual: IndividualId) -> Result<(), EvacError> {
        let cell = self.cell_of(individual)?;
        self.record(Action::Evacuate { individual, cell })
    }

    /// Alarms the individuals.
    pub fn start_reaction(&mut self, individuals: Vec<IndividualId>) -> Result<(), EvacError> {
        self.record(Action::ReactionStart { individuals })
    }

    /// Stores new decision inputs for the individual.
    pub fn change_state(
        &mut self,
        individual: IndividualId,
        panic: f64,
        exhaustion: f64,
        relative_speed: f64,
    ) -> Result<(), EvacError> {
        self.record(Action::StateChange {
            individual,
            panic,
            exhaustion,
            relative_speed,
        })
    }

    /// Switches the potential the individual follows.
    pub fn assign_potential(
        &mut self,
        individual: IndividualId,
        potential: PotentialId,
    ) -> Result<(), EvacError> {
        self.record(Action::AssignPotential {
            individual,
            potential,
        })
    }

    /// Adds one unit of congestion to the cell.
    pub fn increase_congestion(&mut self, cell: CellId) -> Result<(), EvacError> {
        self.record(Action::IncreaseCongestion { cell })
    }

    /// Runs a configured congestion pass and records the changes it made.
    ///
    /// Returns the number of changes.
    pub fn update_congestion(&mut self) -> Result<usize, EvacError> {
        let changes = self.controller.step_dynamic_potential()?;
        let count = changes.len();
        self.pending.push(Action::UpdateCongestion { changes });
        Ok(count)
    }

    /// Runs the delayed phases, closes the step and advances the clock.
    pub fn end_step(&mut self) -> Result<Step, EvacError> {
        for action in &self.pending {
            action.execute_delayed(&mut self.controller)?;
        }
        let step = self.controller.step();
        let actions = mem::take(&mut self.pending);
        debug!(step = step.get(), actions = actions.len(), "step closed");
        if !actions.is_empty() {
            self.log.push(StepRecord { step, actions });
        }
        let next = self.controller.advance_step();
        self.log.close(next);
        Ok(next)
    }

    /// Closes an unfinished step and hands back the controller and the log.
    pub fn finish(mut self) -> Result<(EvacuationStateController, ActionLog), EvacError> {
        if !self.pending.is_empty() {
            let _ = self.end_step()?;
        }
        self.log.close(self.controller.step());
        Ok((self.controller, self.log))
    }

    fn occupant_of(&self, cell: CellId) -> Result<IndividualId, InvalidArgument> {
        let floor = self.controller.state().floor();
        if floor.cell(cell).is_none() {
            return Err(InvalidArgument::UnknownCell(cell));
        }
        floor.occupant(cell).ok_or(InvalidArgument::VacantCell(cell))
    }

    fn cell_of(&self, individual: IndividualId) -> Result<Option<CellId>, InvalidArgument> {
        self.controller
            .state()
            .property(individual)
            .map(|property| property.cell())
            .ok_or(InvalidArgument::UnknownIndividual(individual))
    }
}
