//! Single writer of the evacuation state.
//!
//! Every operation validates its preconditions before touching the state, so
//! a failed call leaves the state exactly as it was.

use std::sync::Arc;

use evacsim_core::{
    CellId, DeathCause, EvacError, IllegalState, IndividualId, InvalidArgument, PotentialId, Step,
};
use evacsim_system_congestion::{CongestionChange, CongestionTuning};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::{config::SimulationConfig, state::EvacuationState};

/// Owns an evacuation state and performs every mutation on it.
#[derive(Clone, Debug)]
pub struct EvacuationStateController {
    state: EvacuationState,
    rng: ChaCha8Rng,
    congestion: CongestionTuning,
}

impl EvacuationStateController {
    /// Takes ownership of the state and seeds the random stream.
    #[must_use]
    pub fn new(state: EvacuationState, config: &SimulationConfig) -> Self {
        info!(
            seed = config.seed,
            individuals = state.initial.len(),
            cells = state.floor.cells().count(),
            "evacuation controller created"
        );
        Self {
            state,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            congestion: config.congestion,
        }
    }

    /// Read-only view of the controlled state.
    #[must_use]
    pub const fn state(&self) -> &EvacuationState {
        &self.state
    }

    /// Releases the controlled state.
    #[must_use]
    pub fn into_state(self) -> EvacuationState {
        self.state
    }

    /// Current simulation step.
    #[must_use]
    pub const fn step(&self) -> Step {
        self.state.step
    }

    /// Moves the clock one step forward and returns the new step.
    pub fn advance_step(&mut self) -> Step {
        self.state.step = self.state.step.next();
        self.state.step
    }

    /// Moves the clock forward to `step`. Staying on the current step is allowed.
    pub fn advance_to(&mut self, step: Step) -> Result<(), EvacError> {
        if step < self.state.step {
            return Err(IllegalState::StepRegression {
                current: self.state.step,
                requested: step,
            }
            .into());
        }
        self.state.step = step;
        Ok(())
    }

    /// Moves the occupant of `from` onto the empty cell `to`.
    ///
    /// Moving onto the same cell is a no-op.
    pub fn move_individual(&mut self, from: CellId, to: CellId) -> Result<IndividualId, EvacError> {
        let individual = self
            .state
            .floor
            .require(from)?
            .occupant()
            .ok_or(InvalidArgument::VacantCell(from))?;
        if from == to {
            return Ok(individual);
        }
        if let Some(occupant) = self.state.floor.require(to)?.occupant() {
            return Err(InvalidArgument::OccupiedCell { cell: to, occupant }.into());
        }

        let _ = self.state.floor.vacate(from);
        self.state.floor.place(to, individual);
        self.property_mut(individual)?.cell = Some(to);
        debug!(
            individual = individual.get(),
            from = from.get(),
            to = to.get(),
            "individual moved"
        );
        Ok(individual)
    }

    /// Exchanges the occupants of two cells.
    pub fn swap(&mut self, first: CellId, second: CellId) -> Result<(), EvacError> {
        let left = self
            .state
            .floor
            .require(first)?
            .occupant()
            .ok_or(InvalidArgument::VacantCell(first))?;
        let right = self
            .state
            .floor
            .require(second)?
            .occupant()
            .ok_or(InvalidArgument::VacantCell(second))?;
        if first == second {
            return Ok(());
        }

        let _ = self.state.floor.vacate(first);
        let _ = self.state.floor.vacate(second);
        self.state.floor.place(first, right);
        self.state.floor.place(second, left);
        self.property_mut(left)?.cell = Some(second);
        self.property_mut(right)?.cell = Some(first);
        debug!(
            first = first.get(),
            second = second.get(),
            "individuals swapped"
        );
        Ok(())
    }

    /// Kills an active individual and removes it from the floor.
    pub fn die(&mut self, individual: IndividualId, cause: DeathCause) -> Result<(), EvacError> {
        let property = self.state.require_property(individual)?;
        property.check_can_die(individual)?;
        let cell = property.cell();

        if let Some(cell) = cell {
            let _ = self.state.floor.vacate(cell);
        }
        self.property_mut(individual)?.die(cause);
        let _ = self.state.remaining.remove(&individual);
        let _ = self.state.dead.insert(individual);
        debug!(individual = individual.get(), ?cause, "individual died");
        Ok(())
    }

    /// Marks the individual safe at the current step.
    ///
    /// Repeating the call within the same step is allowed.
    pub fn set_safe(&mut self, individual: IndividualId) -> Result<(), EvacError> {
        let step = self.state.step;
        let fresh = self
            .state
            .require_property(individual)?
            .check_safety_time(individual, step)?;
        if !fresh {
            return Ok(());
        }

        self.property_mut(individual)?.set_safety_time(step);
        let _ = self.state.safe.insert(individual);
        debug!(
            individual = individual.get(),
            step = step.get(),
            "individual safe"
        );
        Ok(())
    }

    /// Removes the individual from the building at the current step.
    pub fn evacuate(&mut self, individual: IndividualId) -> Result<(), EvacError> {
        let step = self.state.step;
        let property = self.state.require_property(individual)?;
        property.check_evacuation(individual, step)?;
        let cell = property.cell();

        if let Some(cell) = cell {
            let _ = self.state.floor.vacate(cell);
        }
        self.property_mut(individual)?.evacuate(step);
        let _ = self.state.remaining.remove(&individual);
        let _ = self.state.evacuated.insert(individual);
        let _ = self.state.safe.insert(individual);
        debug!(
            individual = individual.get(),
            step = step.get(),
            "individual evacuated"
        );
        Ok(())
    }

    /// Stores the decision inputs computed for an individual.
    pub fn change_state(
        &mut self,
        individual: IndividualId,
        panic: f64,
        exhaustion: f64,
        relative_speed: f64,
    ) -> Result<(), EvacError> {
        let _ = self.state.require_remaining(individual)?;
        let max_speed = self
            .state
            .individual(individual)
            .map(|person| person.max_speed())
            .ok_or(InvalidArgument::UnknownIndividual(individual))?;
        bounded("panic", panic, 0.0, 1.0)?;
        bounded("exhaustion", exhaustion, 0.0, 1.0)?;
        if relative_speed <= 0.0 {
            return Err(out_of_range("relative_speed", relative_speed, 0.0, max_speed).into());
        }
        bounded("relative_speed", relative_speed, 0.0, max_speed)?;

        let property = self.property_mut(individual)?;
        property.panic = panic;
        property.exhaustion = exhaustion;
        property.relative_speed = relative_speed;
        Ok(())
    }

    /// Switches the static potential the individual follows.
    pub fn assign_potential(
        &mut self,
        individual: IndividualId,
        potential: PotentialId,
    ) -> Result<(), EvacError> {
        let _ = self.state.require_remaining(individual)?;
        let shared = Arc::clone(self.state.potentials.get(potential)?);

        self.property_mut(individual)?.static_potential = Some(shared);
        debug!(
            individual = individual.get(),
            potential = potential.get(),
            "potential assigned"
        );
        Ok(())
    }

    /// Marks the individuals as alarmed. Unknown identifiers reject the batch.
    pub fn start_reaction(&mut self, individuals: &[IndividualId]) -> Result<(), EvacError> {
        for &individual in individuals {
            let _ = self.state.require_property(individual)?;
        }
        for &individual in individuals {
            self.property_mut(individual)?.alarmed = true;
        }
        debug!(count = individuals.len(), "reaction started");
        Ok(())
    }

    /// Records the time window of the movement the individual is performing.
    pub fn set_step_timing(
        &mut self,
        individual: IndividualId,
        start: f64,
        end: f64,
    ) -> Result<(), EvacError> {
        let _ = self.state.require_property(individual)?;
        Self::check_step_timing(start, end)?;

        let property = self.property_mut(individual)?;
        property.step_start_time = start;
        property.step_end_time = end;
        Ok(())
    }

    /// Checks that a movement window is finite, non-negative and ordered.
    pub fn check_step_timing(start: f64, end: f64) -> Result<(), InvalidArgument> {
        if start.is_finite() && end.is_finite() && start >= 0.0 && start <= end {
            Ok(())
        } else {
            Err(InvalidArgument::InvalidTiming { start, end })
        }
    }

    /// Adds one unit of congestion to the cell.
    pub fn increase_dynamic_potential(&mut self, cell: CellId) -> Result<(), EvacError> {
        let _ = self.state.floor.require(cell)?;
        self.state.congestion.increase(cell);
        Ok(())
    }

    /// Runs one diffusion and decay pass with explicit probabilities.
    pub fn update_dynamic_potential(
        &mut self,
        diffusion: f64,
        decay: f64,
    ) -> Result<Vec<CongestionChange>, EvacError> {
        let EvacuationState {
            floor, congestion, ..
        } = &mut self.state;
        Ok(congestion.update(&*floor, diffusion, decay, &mut self.rng)?)
    }

    /// Runs one diffusion and decay pass with the configured probabilities.
    pub fn step_dynamic_potential(&mut self) -> Result<Vec<CongestionChange>, EvacError> {
        let CongestionTuning { diffusion, decay } = self.congestion;
        self.update_dynamic_potential(diffusion, decay)
    }

    /// Applies a recorded congestion change without drawing random numbers.
    pub fn apply_congestion_change(&mut self, change: CongestionChange) -> Result<(), EvacError> {
        self.apply_congestion_changes(&[change])
    }

    /// Applies a recorded batch of congestion changes.
    ///
    /// The field is left untouched when any change refers to an unknown cell
    /// or removes a unit that is not there.
    pub fn apply_congestion_changes(
        &mut self,
        changes: &[CongestionChange],
    ) -> Result<(), EvacError> {
        for &change in changes {
            let cells = match change {
                CongestionChange::Increased { cell } | CongestionChange::Decayed { cell } => {
                    [cell, cell]
                }
                CongestionChange::Diffused { from, to } => [from, to],
            };
            for cell in cells {
                let _ = self.state.floor.require(cell)?;
            }
        }
        Ok(self.state.congestion.apply_all(changes)?)
    }

    fn property_mut(
        &mut self,
        individual: IndividualId,
    ) -> Result<&mut crate::IndividualProperty, InvalidArgument> {
        self.state
            .properties
            .get_mut(&individual)
            .ok_or(InvalidArgument::UnknownIndividual(individual))
    }
}

fn out_of_range(name: &'static str, value: f64, min: f64, max: f64) -> InvalidArgument {
    InvalidArgument::OutOfRange {
        name,
        value,
        min,
        max,
    }
}

fn bounded(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), InvalidArgument> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(out_of_range(name, value, min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evacsim_core::{Biometrics, CellKind, Individual};
    use evacsim_system_potential::ExitGroup;

    use crate::floor::Floor;

    /// Five cell corridor with an exit on the east end and people on 0 and 1.
    fn controller() -> EvacuationStateController {
        let floor = Floor::grid(5, 1, |coord| {
            Some(if coord.column() == 4 {
                CellKind::Exit
            } else {
                CellKind::Floor
            })
        });
        let config = SimulationConfig::default();
        let mut builder = EvacuationState::builder(floor);
        let exits = builder.floor().cells_of_kind(CellKind::Exit);
        let potential = config
            .solver()
            .solve_exit_group(builder.floor(), &ExitGroup::new("east", exits))
            .expect("solve");
        let potential = builder.add_potential(potential).expect("register");
        for (id, cell) in [(1, 0), (2, 1)] {
            let person =
                Individual::new(IndividualId::new(id), Biometrics::default()).expect("person");
            builder
                .add_individual(person, CellId::new(cell), Some(potential))
                .expect("place");
        }
        EvacuationStateController::new(builder.build(), &config)
    }

    fn id(value: u32) -> IndividualId {
        IndividualId::new(value)
    }

    #[test]
    fn move_updates_slot_property_and_room() {
        let mut controller = controller();

        let moved = controller
            .move_individual(CellId::new(1), CellId::new(2))
            .expect("move");

        let state = controller.state();
        assert_eq!(moved, id(2));
        assert_eq!(state.floor().occupant(CellId::new(1)), None);
        assert_eq!(state.floor().occupant(CellId::new(2)), Some(id(2)));
        assert_eq!(
            state.property(id(2)).and_then(|p| p.cell()),
            Some(CellId::new(2))
        );
        let room = state.floor().rooms().next().expect("room");
        assert!(room.contains(id(2)));
    }

    #[test]
    fn rejected_move_leaves_state_untouched() {
        let mut controller = controller();
        let before = controller.state().snapshot();

        assert_eq!(
            controller.move_individual(CellId::new(0), CellId::new(1)),
            Err(InvalidArgument::OccupiedCell {
                cell: CellId::new(1),
                occupant: id(2),
            }
            .into())
        );
        assert_eq!(
            controller.move_individual(CellId::new(3), CellId::new(2)),
            Err(InvalidArgument::VacantCell(CellId::new(3)).into())
        );
        assert_eq!(
            controller.move_individual(CellId::new(0), CellId::new(40)),
            Err(InvalidArgument::UnknownCell(CellId::new(40)).into())
        );
        assert_eq!(controller.state().snapshot(), before);
    }

    #[test]
    fn move_onto_the_same_cell_is_a_no_op() {
        let mut controller = controller();
        let before = controller.state().snapshot();

        let moved = controller
            .move_individual(CellId::new(0), CellId::new(0))
            .expect("no-op move");

        assert_eq!(moved, id(1));
        assert_eq!(controller.state().snapshot(), before);
    }

    #[test]
    fn swap_exchanges_occupants() {
        let mut controller = controller();

        controller
            .swap(CellId::new(0), CellId::new(1))
            .expect("swap");

        let state = controller.state();
        assert_eq!(state.floor().occupant(CellId::new(0)), Some(id(2)));
        assert_eq!(state.floor().occupant(CellId::new(1)), Some(id(1)));
        assert_eq!(
            state.property(id(1)).and_then(|p| p.cell()),
            Some(CellId::new(1))
        );
        assert_eq!(
            controller.swap(CellId::new(0), CellId::new(3)),
            Err(InvalidArgument::VacantCell(CellId::new(3)).into())
        );
    }

    #[test]
    fn evacuation_records_safety_and_frees_the_cell() {
        let mut controller = controller();
        let _ = controller.advance_step();
        let _ = controller.advance_step();

        controller.evacuate(id(2)).expect("evacuate");

        let state = controller.state();
        let property = state.property(id(2)).expect("property");
        assert_eq!(property.evacuation_time(), Some(Step::new(2)));
        assert_eq!(property.safety_time(), Some(Step::new(2)));
        assert_eq!(state.floor().occupant(CellId::new(1)), None);
        assert!(state.evacuated().contains(&id(2)));
        assert!(state.safe().contains(&id(2)));
        assert!(!state.remaining().contains(&id(2)));
        assert_eq!(
            controller.evacuate(id(2)),
            Err(IllegalState::AlreadyEvacuated(id(2)).into())
        );
        assert_eq!(
            controller.die(id(2), DeathCause::NotEnoughTime),
            Err(IllegalState::NotActive(id(2)).into())
        );
    }

    #[test]
    fn safety_is_idempotent_within_a_step() {
        let mut controller = controller();
        let _ = controller.advance_step();

        controller.set_safe(id(1)).expect("first");
        controller.set_safe(id(1)).expect("repeat within step");
        let _ = controller.advance_step();

        let error = controller.set_safe(id(1)).unwrap_err();
        assert!(error.is_illegal_state());
        assert_eq!(
            controller.state().property(id(1)).and_then(|p| p.safety_time()),
            Some(Step::new(1))
        );
        assert!(controller.state().remaining().contains(&id(1)));
    }

    #[test]
    fn death_is_final() {
        let mut controller = controller();

        controller
            .die(id(1), DeathCause::ExitUnreachable)
            .expect("die");

        let state = controller.state();
        assert!(state.dead().contains(&id(1)));
        assert_eq!(state.floor().occupant(CellId::new(0)), None);
        assert_eq!(
            controller.die(id(1), DeathCause::NotEnoughTime),
            Err(IllegalState::AlreadyDead(id(1)).into())
        );
        assert_eq!(
            controller.set_safe(id(1)),
            Err(IllegalState::AlreadyDead(id(1)).into())
        );
        assert_eq!(
            controller.change_state(id(1), 0.1, 0.1, 1.0),
            Err(InvalidArgument::NotRemaining(id(1)).into())
        );
    }

    #[test]
    fn change_state_validates_ranges() {
        let mut controller = controller();

        controller
            .change_state(id(1), 0.4, 0.2, 1.2)
            .expect("valid change");
        assert!(controller.change_state(id(1), 1.4, 0.2, 1.2).is_err());
        assert!(controller.change_state(id(1), 0.4, -0.1, 1.2).is_err());
        assert!(controller.change_state(id(1), 0.4, 0.2, 0.0).is_err());
        assert!(controller.change_state(id(1), 0.4, 0.2, 1.6).is_err());

        let property = controller.state().property(id(1)).expect("property");
        assert_eq!(property.panic(), 0.4);
        assert_eq!(property.exhaustion(), 0.2);
        assert_eq!(property.relative_speed(), 1.2);
    }

    #[test]
    fn step_timing_and_reaction_validate_input() {
        let mut controller = controller();

        controller.set_step_timing(id(1), 0.5, 0.9).expect("timing");
        assert_eq!(
            controller.set_step_timing(id(1), 0.9, 0.5),
            Err(InvalidArgument::InvalidTiming {
                start: 0.9,
                end: 0.5,
            }
            .into())
        );
        assert_eq!(
            controller.start_reaction(&[id(1), id(8)]),
            Err(InvalidArgument::UnknownIndividual(id(8)).into())
        );
        assert!(!controller.state().property(id(1)).expect("p").is_alarmed());

        controller.start_reaction(&[id(1), id(2)]).expect("alarm");
        assert!(controller.state().property(id(2)).expect("p").is_alarmed());
    }

    #[test]
    fn clock_never_runs_backwards() {
        let mut controller = controller();
        controller.advance_to(Step::new(4)).expect("advance");
        controller.advance_to(Step::new(4)).expect("stay");

        assert_eq!(
            controller.advance_to(Step::new(3)),
            Err(IllegalState::StepRegression {
                current: Step::new(4),
                requested: Step::new(3),
            }
            .into())
        );
    }

    #[test]
    fn rejected_congestion_batch_changes_nothing() {
        let mut controller = controller();
        let before = controller.state().snapshot();

        let unmapped = controller.apply_congestion_changes(&[
            CongestionChange::Increased {
                cell: CellId::new(2),
            },
            CongestionChange::Decayed {
                cell: CellId::new(0),
            },
        ]);
        let unknown = controller.apply_congestion_changes(&[
            CongestionChange::Increased {
                cell: CellId::new(2),
            },
            CongestionChange::Increased {
                cell: CellId::new(12),
            },
        ]);

        assert_eq!(
            unmapped,
            Err(InvalidArgument::UnmappedCongestion(CellId::new(0)).into())
        );
        assert_eq!(
            unknown,
            Err(InvalidArgument::UnknownCell(CellId::new(12)).into())
        );
        assert_eq!(controller.state().snapshot(), before);
    }

    #[test]
    fn congestion_changes_replay_without_randomness() {
        let mut controller = controller();
        for _ in 0..3 {
            controller
                .increase_dynamic_potential(CellId::new(2))
                .expect("increase");
        }
        let mut mirror = controller.clone();

        let changes = controller
            .update_dynamic_potential(1.0, 0.5)
            .expect("update");
        for change in changes {
            mirror.apply_congestion_change(change).expect("apply");
        }

        assert_eq!(controller.state().congestion(), mirror.state().congestion());
        assert_eq!(
            controller.increase_dynamic_potential(CellId::new(12)),
            Err(InvalidArgument::UnknownCell(CellId::new(12)).into())
        );
        assert!(controller.update_dynamic_potential(1.2, 0.0).is_err());
    }
}
