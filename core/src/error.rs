//! Error taxonomy shared by every kernel crate.

use thiserror::Error;

use crate::{CellCoord, CellId, IndividualId, PotentialId, RoomId, Step};

/// Precondition violations. The caller passed something the kernel rejects.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum InvalidArgument {
    /// A potential was requested for an empty set of source cells.
    #[error("potential source set must not be empty")]
    EmptySourceSet,
    /// The cell is not part of the floor.
    #[error("cell {} does not exist", .0.get())]
    UnknownCell(CellId),
    /// Another cell already occupies the coordinate.
    #[error("a cell already exists at column {}, row {}", .0.column(), .0.row())]
    DuplicateCell(CellCoord),
    /// The room is not part of the floor.
    #[error("room {} does not exist", .0.get())]
    UnknownRoom(RoomId),
    /// The individual was never registered with the state.
    #[error("individual {} is not registered", .0.get())]
    UnknownIndividual(IndividualId),
    /// The individual is registered twice.
    #[error("individual {} is already registered", .0.get())]
    DuplicateIndividual(IndividualId),
    /// No potential with the identifier is registered.
    #[error("potential {} is not registered", .0.get())]
    UnknownPotential(PotentialId),
    /// A potential with the identifier is already registered.
    #[error("potential {} is already registered", .0.get())]
    DuplicatePotential(PotentialId),
    /// The operation requires an occupant but the cell is empty.
    #[error("cell {} has no occupant", .0.get())]
    VacantCell(CellId),
    /// The operation requires an empty cell but it is occupied.
    #[error("cell {} is occupied by individual {}", .cell.get(), .occupant.get())]
    OccupiedCell {
        /// Cell that was expected to be empty.
        cell: CellId,
        /// Individual currently standing on the cell.
        occupant: IndividualId,
    },
    /// The individual does not stand on the expected cell.
    #[error("individual {} is not located on cell {}", .individual.get(), .cell.get())]
    NotOnCell {
        /// Individual that was expected on the cell.
        individual: IndividualId,
        /// Cell the individual was expected on.
        cell: CellId,
    },
    /// The congestion field has no level for the cell.
    #[error("congestion level of cell {} cannot be decreased below zero", .0.get())]
    UnmappedCongestion(CellId),
    /// A probability was outside of `[0, 1]`.
    #[error("probability {value} of {name} must lie within [0, 1]")]
    ProbabilityOutOfRange {
        /// Name of the offending parameter.
        name: &'static str,
        /// Value that was supplied.
        value: f64,
    },
    /// A bounded state value was outside of its range.
    #[error("{name} value {value} lies outside [{min}, {max}]")]
    OutOfRange {
        /// Name of the offending value.
        name: &'static str,
        /// Value that was supplied.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// Movement timestamps were negative or reversed.
    #[error("movement timing {start}..{end} is invalid")]
    InvalidTiming {
        /// Start of the movement.
        start: f64,
        /// Expected arrival of the movement.
        end: f64,
    },
    /// The individual is no longer part of the remaining population.
    #[error("individual {} is no longer active in the simulation", .0.get())]
    NotRemaining(IndividualId),
}

/// Invariant violations. These indicate a bug in the driver and are fatal.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IllegalState {
    /// The death cause is write-once and was already set.
    #[error("individual {} is already dead", .0.get())]
    AlreadyDead(IndividualId),
    /// Only active individuals can die.
    #[error("individual {} is safe or evacuated and cannot die", .0.get())]
    NotActive(IndividualId),
    /// The safety time was already set to a different step.
    #[error(
        "individual {} was safe at step {}, cannot become safe again at step {}",
        .individual.get(),
        .existing.get(),
        .requested.get()
    )]
    SafetyTimeConflict {
        /// Individual whose safety time conflicts.
        individual: IndividualId,
        /// Step already recorded.
        existing: Step,
        /// Step requested by the caller.
        requested: Step,
    },
    /// The evacuation time is write-once and was already set.
    #[error("individual {} is already evacuated", .0.get())]
    AlreadyEvacuated(IndividualId),
    /// Evacuation must not precede reaching safety.
    #[error(
        "individual {} cannot evacuate at step {} before becoming safe at step {}",
        .individual.get(),
        .evacuation.get(),
        .safety.get()
    )]
    EvacuationBeforeSafety {
        /// Individual being evacuated.
        individual: IndividualId,
        /// Requested evacuation step.
        evacuation: Step,
        /// Previously recorded safety step.
        safety: Step,
    },
    /// The simulation clock cannot move backwards.
    #[error("cannot rewind the simulation from step {} to step {}", .current.get(), .requested.get())]
    StepRegression {
        /// Current step of the state.
        current: Step,
        /// Step that was requested.
        requested: Step,
    },
}

/// Union of every error a kernel operation can return.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EvacError {
    /// A precondition of the operation did not hold.
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),
    /// An invariant of the state would have been broken.
    #[error(transparent)]
    IllegalState(#[from] IllegalState),
}

impl EvacError {
    /// Reports whether the error is a fatal invariant violation.
    #[must_use]
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_identifiers() {
        let error = EvacError::from(InvalidArgument::OccupiedCell {
            cell: CellId::new(4),
            occupant: IndividualId::new(9),
        });
        assert_eq!(error.to_string(), "cell 4 is occupied by individual 9");
        assert!(!error.is_illegal_state());

        let fatal = EvacError::from(IllegalState::AlreadyDead(IndividualId::new(2)));
        assert_eq!(fatal.to_string(), "individual 2 is already dead");
        assert!(fatal.is_illegal_state());
    }
}
