//! Serializable record of one controller mutation.

use evacsim_core::{
    CellId, DeathCause, EvacError, IdentityMapping, IndividualId, InvalidArgument, PotentialId,
};
use evacsim_system_congestion::CongestionChange;
use evacsim_world::EvacuationStateController;
use serde::{Deserialize, Serialize};

/// One replayable mutation of the evacuation state.
///
/// Execution happens in two phases. [`Action::execute`] applies the core
/// mutation immediately; [`Action::execute_delayed`] applies effects that must
/// only become visible once every action of the same step has executed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// The individual walked from one cell onto an empty neighbour.
    Move {
        /// Individual that moved.
        individual: IndividualId,
        /// Cell that was vacated.
        from: CellId,
        /// Cell that was entered.
        to: CellId,
        /// Time in seconds at which the movement started.
        start_time: f64,
        /// Time in seconds at which the individual arrives.
        arrival_time: f64,
        /// Whether the vacated cell gains a unit of congestion.
        leaves_trace: bool,
    },
    /// The occupants of two cells traded places.
    Swap {
        /// First cell.
        first: CellId,
        /// Individual that stood on the first cell.
        first_occupant: IndividualId,
        /// Second cell.
        second: CellId,
        /// Individual that stood on the second cell.
        second_occupant: IndividualId,
    },
    /// The individual died where it stood.
    Die {
        /// Individual that died.
        individual: IndividualId,
        /// Cell the individual stood on.
        cell: Option<CellId>,
        /// Reason of death.
        cause: DeathCause,
    },
    /// The individual reached a safe area.
    SetSafe {
        /// Individual that became safe.
        individual: IndividualId,
    },
    /// The individual left the building.
    Evacuate {
        /// Individual that left.
        individual: IndividualId,
        /// Exit cell the individual left from.
        cell: Option<CellId>,
    },
    /// The individuals noticed the alarm.
    ReactionStart {
        /// Individuals that started reacting.
        individuals: Vec<IndividualId>,
    },
    /// New decision inputs were stored for the individual.
    StateChange {
        /// Individual whose state changed.
        individual: IndividualId,
        /// Panic in `[0, 1]`.
        panic: f64,
        /// Exhaustion in `[0, 1]`.
        exhaustion: f64,
        /// Speed for the next movement.
        relative_speed: f64,
    },
    /// The individual switched to another static potential.
    AssignPotential {
        /// Individual that switched.
        individual: IndividualId,
        /// Potential now followed.
        potential: PotentialId,
    },
    /// A unit of congestion was added to the cell.
    IncreaseCongestion {
        /// Cell that gained the unit.
        cell: CellId,
    },
    /// A diffusion and decay pass produced the listed changes.
    UpdateCongestion {
        /// Changes in the order they were applied.
        changes: Vec<CongestionChange>,
    },
}

impl Action {
    /// Short name of the action kind used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Swap { .. } => "swap",
            Self::Die { .. } => "die",
            Self::SetSafe { .. } => "set_safe",
            Self::Evacuate { .. } => "evacuate",
            Self::ReactionStart { .. } => "reaction_start",
            Self::StateChange { .. } => "state_change",
            Self::AssignPotential { .. } => "assign_potential",
            Self::IncreaseCongestion { .. } => "increase_congestion",
            Self::UpdateCongestion { .. } => "update_congestion",
        }
    }

    /// Applies the core mutation to the controller.
    ///
    /// Recorded positions are checked against the controller before anything
    /// changes, so a mismatching action leaves the state untouched.
    pub fn execute(&self, controller: &mut EvacuationStateController) -> Result<(), EvacError> {
        match self {
            Self::Move {
                individual,
                from,
                to,
                start_time,
                arrival_time,
                ..
            } => {
                expect_on_cell(controller, *individual, Some(*from))?;
                EvacuationStateController::check_step_timing(*start_time, *arrival_time)?;
                let _ = controller.move_individual(*from, *to)?;
                controller.set_step_timing(*individual, *start_time, *arrival_time)
            }
            Self::Swap {
                first,
                first_occupant,
                second,
                second_occupant,
            } => {
                expect_on_cell(controller, *first_occupant, Some(*first))?;
                expect_on_cell(controller, *second_occupant, Some(*second))?;
                controller.swap(*first, *second)
            }
            Self::Die {
                individual,
                cell,
                cause,
            } => {
                expect_on_cell(controller, *individual, *cell)?;
                controller.die(*individual, *cause)
            }
            Self::SetSafe { individual } => controller.set_safe(*individual),
            Self::Evacuate { individual, cell } => {
                expect_on_cell(controller, *individual, *cell)?;
                controller.evacuate(*individual)
            }
            Self::ReactionStart { individuals } => controller.start_reaction(individuals),
            Self::StateChange {
                individual,
                panic,
                exhaustion,
                relative_speed,
            } => controller.change_state(*individual, *panic, *exhaustion, *relative_speed),
            Self::AssignPotential {
                individual,
                potential,
            } => controller.assign_potential(*individual, *potential),
            Self::IncreaseCongestion { cell } => controller.increase_dynamic_potential(*cell),
            Self::UpdateCongestion { changes } => controller.apply_congestion_changes(changes),
        }
    }

    /// Applies the effects deferred to the end of the step.
    pub fn execute_delayed(
        &self,
        controller: &mut EvacuationStateController,
    ) -> Result<(), EvacError> {
        match self {
            Self::Move {
                from,
                leaves_trace: true,
                ..
            } => controller.increase_dynamic_potential(*from),
            _ => Ok(()),
        }
    }

    /// Translates every identifier through the mapping.
    #[must_use]
    pub fn remap<M>(&self, mapping: &M) -> Self
    where
        M: IdentityMapping + ?Sized,
    {
        match self {
            Self::Move {
                individual,
                from,
                to,
                start_time,
                arrival_time,
                leaves_trace,
            } => Self::Move {
                individual: mapping.individual(*individual),
                from: mapping.cell(*from),
                to: mapping.cell(*to),
                start_time: *start_time,
                arrival_time: *arrival_time,
                leaves_trace: *leaves_trace,
            },
            Self::Swap {
                first,
                first_occupant,
                second,
                second_occupant,
            } => Self::Swap {
                first: mapping.cell(*first),
                first_occupant: mapping.individual(*first_occupant),
                second: mapping.cell(*second),
                second_occupant: mapping.individual(*second_occupant),
            },
            Self::Die {
                individual,
                cell,
                cause,
            } => Self::Die {
                individual: mapping.individual(*individual),
                cell: cell.map(|cell| mapping.cell(cell)),
                cause: *cause,
            },
            Self::SetSafe { individual } => Self::SetSafe {
                individual: mapping.individual(*individual),
            },
            Self::Evacuate { individual, cell } => Self::Evacuate {
                individual: mapping.individual(*individual),
                cell: cell.map(|cell| mapping.cell(cell)),
            },
            Self::ReactionStart { individuals } => Self::ReactionStart {
                individuals: individuals
                    .iter()
                    .map(|&individual| mapping.individual(individual))
                    .collect(),
            },
            Self::StateChange {
                individual,
                panic,
                exhaustion,
                relative_speed,
            } => Self::StateChange {
                individual: mapping.individual(*individual),
                panic: *panic,
                exhaustion: *exhaustion,
                relative_speed: *relative_speed,
            },
            Self::AssignPotential {
                individual,
                potential,
            } => Self::AssignPotential {
                individual: mapping.individual(*individual),
                potential: mapping.potential(*potential),
            },
            Self::IncreaseCongestion { cell } => Self::IncreaseCongestion {
                cell: mapping.cell(*cell),
            },
            Self::UpdateCongestion { changes } => Self::UpdateCongestion {
                changes: changes.iter().map(|change| change.remap(mapping)).collect(),
            },
        }
    }
}

fn expect_on_cell(
    controller: &EvacuationStateController,
    individual: IndividualId,
    cell: Option<CellId>,
) -> Result<(), InvalidArgument> {
    let property = controller
        .state()
        .property(individual)
        .ok_or(InvalidArgument::UnknownIndividual(individual))?;
    match cell {
        Some(cell) if property.cell() != Some(cell) => {
            Err(InvalidArgument::NotOnCell { individual, cell })
        }
        _ => Ok(()),
    }
}
