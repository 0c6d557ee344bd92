#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative evacuation state for the cellular automaton.
//!
//! The crate owns the floor, the population and both potential fields. All
//! mutations run through [`EvacuationStateController`]; adapters and drivers
//! inspect the state through [`query`].

mod config;
mod controller;
mod floor;
mod property;
mod state;

pub use config::{ConfigError, SimulationConfig};
pub use controller::EvacuationStateController;
pub use floor::{Cell, Floor, FloorBuilder, Room};
pub use property::IndividualProperty;
pub use state::{EvacuationState, IndividualSnapshot, StateBuilder, StateSnapshot};

/// Read-only helpers that expose derived views of the state.
pub mod query {
    use evacsim_core::{CellGraph, CellId, IndividualId, RoomId};

    use super::EvacuationState;

    /// Individual standing on the cell.
    #[must_use]
    pub fn occupant(state: &EvacuationState, cell: CellId) -> Option<IndividualId> {
        state.floor().occupant(cell)
    }

    /// Static potential of the cell the individual stands on.
    #[must_use]
    pub fn static_potential_at(state: &EvacuationState, individual: IndividualId) -> Option<u32> {
        let property = state.property(individual)?;
        let cell = property.cell()?;
        property.static_potential()?.potential(cell)
    }

    /// Congestion level of the cell; unmapped cells report zero.
    #[must_use]
    pub fn congestion_at(state: &EvacuationState, cell: CellId) -> u32 {
        state.congestion().potential(cell)
    }

    /// Empty neighbours of the cell in adjacency order.
    #[must_use]
    pub fn free_neighbours(state: &EvacuationState, cell: CellId) -> Vec<CellId> {
        let floor = state.floor();
        floor
            .neighbours(cell)
            .iter()
            .copied()
            .filter(|&neighbour| floor.occupant(neighbour).is_none())
            .collect()
    }

    /// Individuals inside the room in identifier order.
    #[must_use]
    pub fn individuals_in_room(state: &EvacuationState, room: RoomId) -> Vec<IndividualId> {
        state
            .floor()
            .room(room)
            .map(|room| room.individuals().iter().copied().collect())
            .unwrap_or_default()
    }

    /// Reports whether nobody is left inside the building.
    #[must_use]
    pub fn is_finished(state: &EvacuationState) -> bool {
        state.remaining().is_empty()
    }

    /// Summarises how the population fared so far.
    #[must_use]
    pub fn outcome(state: &EvacuationState) -> Outcome {
        Outcome {
            initial: state.initial().len(),
            remaining: state.remaining().len(),
            evacuated: state.evacuated().len(),
            dead: state.dead().len(),
            safe: state.safe().len(),
        }
    }

    /// Head counts of the population partitions.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Outcome {
        /// Individuals present when the run started.
        pub initial: usize,
        /// Individuals that are neither dead nor evacuated.
        pub remaining: usize,
        /// Individuals that left the building.
        pub evacuated: usize,
        /// Individuals that died.
        pub dead: usize,
        /// Individuals that reached safety, including the evacuated.
        pub safe: usize,
    }

    impl Outcome {
        /// Reports whether every individual is accounted for exactly once.
        #[must_use]
        pub const fn is_consistent(&self) -> bool {
            self.remaining + self.evacuated + self.dead == self.initial
        }
    }
}
