//! Authoritative evacuation state and its serializable snapshot.

use std::collections::{BTreeMap, BTreeSet};

use evacsim_core::{
    CellId, DeathCause, IdentityMapping, Individual, IndividualId, InvalidArgument, PotentialId,
    Step,
};
use evacsim_system_congestion::DynamicPotential;
use evacsim_system_potential::{PotentialManager, StaticPotential};
use serde::{Deserialize, Serialize};

use crate::{floor::Floor, property::IndividualProperty};

/// Everything a running evacuation knows about the building and its people.
///
/// The state is read-only from the outside; every mutation goes through
/// [`EvacuationStateController`](crate::EvacuationStateController).
#[derive(Clone, Debug)]
pub struct EvacuationState {
    pub(crate) floor: Floor,
    pub(crate) individuals: BTreeMap<IndividualId, Individual>,
    pub(crate) properties: BTreeMap<IndividualId, IndividualProperty>,
    pub(crate) potentials: PotentialManager,
    pub(crate) congestion: DynamicPotential,
    pub(crate) step: Step,
    pub(crate) initial: BTreeSet<IndividualId>,
    pub(crate) remaining: BTreeSet<IndividualId>,
    pub(crate) dead: BTreeSet<IndividualId>,
    pub(crate) evacuated: BTreeSet<IndividualId>,
    pub(crate) safe: BTreeSet<IndividualId>,
}

impl EvacuationState {
    /// Starts assembling a state on top of the floor.
    #[must_use]
    pub fn builder(floor: Floor) -> StateBuilder {
        StateBuilder::new(floor)
    }

    /// Floor the evacuation takes place on.
    #[must_use]
    pub const fn floor(&self) -> &Floor {
        &self.floor
    }

    /// Static description of a registered individual.
    #[must_use]
    pub fn individual(&self, id: IndividualId) -> Option<&Individual> {
        self.individuals.get(&id)
    }

    /// Simulation properties of a registered individual.
    #[must_use]
    pub fn property(&self, id: IndividualId) -> Option<&IndividualProperty> {
        self.properties.get(&id)
    }

    /// Registered static potentials.
    #[must_use]
    pub const fn potentials(&self) -> &PotentialManager {
        &self.potentials
    }

    /// Dynamic congestion field.
    #[must_use]
    pub const fn congestion(&self) -> &DynamicPotential {
        &self.congestion
    }

    /// Current simulation step.
    #[must_use]
    pub const fn step(&self) -> Step {
        self.step
    }

    /// Everybody who was inside the building when the run started.
    #[must_use]
    pub const fn initial(&self) -> &BTreeSet<IndividualId> {
        &self.initial
    }

    /// Individuals that are neither dead nor evacuated.
    #[must_use]
    pub const fn remaining(&self) -> &BTreeSet<IndividualId> {
        &self.remaining
    }

    /// Individuals that died.
    #[must_use]
    pub const fn dead(&self) -> &BTreeSet<IndividualId> {
        &self.dead
    }

    /// Individuals that left the building.
    #[must_use]
    pub const fn evacuated(&self) -> &BTreeSet<IndividualId> {
        &self.evacuated
    }

    /// Individuals that reached safety, evacuated or not.
    #[must_use]
    pub const fn safe(&self) -> &BTreeSet<IndividualId> {
        &self.safe
    }

    /// Captures the observable state in a serializable form.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        let occupancy = self
            .floor
            .cells()
            .filter_map(|cell| cell.occupant().map(|individual| (cell.id(), individual)))
            .collect();
        let individuals = self
            .properties
            .iter()
            .map(|(&id, property)| IndividualSnapshot {
                id,
                cell: property.cell(),
                potential: property.static_potential().map(|potential| potential.id()),
                panic: property.panic(),
                exhaustion: property.exhaustion(),
                relative_speed: property.relative_speed(),
                alarmed: property.is_alarmed(),
                death_cause: property.death_cause(),
                safety_time: property.safety_time(),
                evacuation_time: property.evacuation_time(),
                step_start_time: property.step_start_time(),
                step_end_time: property.step_end_time(),
            })
            .collect();

        StateSnapshot {
            step: self.step,
            occupancy,
            remaining: self.remaining.iter().copied().collect(),
            dead: self.dead.iter().copied().collect(),
            evacuated: self.evacuated.iter().copied().collect(),
            safe: self.safe.iter().copied().collect(),
            individuals,
            congestion: self.congestion.mapped_cells().collect(),
        }
    }

    pub(crate) fn require_property(
        &self,
        id: IndividualId,
    ) -> Result<&IndividualProperty, InvalidArgument> {
        self.properties
            .get(&id)
            .ok_or(InvalidArgument::UnknownIndividual(id))
    }

    pub(crate) fn require_remaining(
        &self,
        id: IndividualId,
    ) -> Result<&IndividualProperty, InvalidArgument> {
        let property = self.require_property(id)?;
        if self.remaining.contains(&id) {
            Ok(property)
        } else {
            Err(InvalidArgument::NotRemaining(id))
        }
    }
}

/// Assembles the initial population of an evacuation.
#[derive(Debug)]
pub struct StateBuilder {
    floor: Floor,
    potentials: PotentialManager,
    individuals: BTreeMap<IndividualId, Individual>,
    properties: BTreeMap<IndividualId, IndividualProperty>,
}

impl StateBuilder {
    /// Starts with an empty population on the floor.
    #[must_use]
    pub fn new(floor: Floor) -> Self {
        Self {
            floor,
            potentials: PotentialManager::new(),
            individuals: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Floor being populated; potentials are solved against it.
    #[must_use]
    pub const fn floor(&self) -> &Floor {
        &self.floor
    }

    /// Registers a static potential individuals can follow.
    pub fn add_potential(
        &mut self,
        potential: StaticPotential,
    ) -> Result<PotentialId, InvalidArgument> {
        self.potentials.register(potential).map(|shared| shared.id())
    }

    /// Places an individual on an empty cell, optionally following a potential.
    pub fn add_individual(
        &mut self,
        individual: Individual,
        cell: CellId,
        potential: Option<PotentialId>,
    ) -> Result<(), InvalidArgument> {
        let id = individual.id();
        if self.individuals.contains_key(&id) {
            return Err(InvalidArgument::DuplicateIndividual(id));
        }
        if let Some(occupant) = self.floor.require(cell)?.occupant() {
            return Err(InvalidArgument::OccupiedCell { cell, occupant });
        }
        let potential = potential
            .map(|potential| self.potentials.get(potential).cloned())
            .transpose()?;

        self.floor.place(cell, id);
        let _ = self.properties.insert(
            id,
            IndividualProperty::new(cell, potential, individual.max_speed()),
        );
        let _ = self.individuals.insert(id, individual);
        Ok(())
    }

    /// Finishes the population. Everybody starts out remaining at step zero.
    #[must_use]
    pub fn build(self) -> EvacuationState {
        let initial: BTreeSet<IndividualId> = self.individuals.keys().copied().collect();
        EvacuationState {
            floor: self.floor,
            individuals: self.individuals,
            properties: self.properties,
            potentials: self.potentials,
            congestion: DynamicPotential::new(),
            step: Step::ZERO,
            remaining: initial.clone(),
            initial,
            dead: BTreeSet::new(),
            evacuated: BTreeSet::new(),
            safe: BTreeSet::new(),
        }
    }
}

/// Observable properties of one individual.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndividualSnapshot {
    /// Identifier of the individual.
    pub id: IndividualId,
    /// Cell the individual stands on.
    pub cell: Option<CellId>,
    /// Static potential the individual follows.
    pub potential: Option<PotentialId>,
    /// Panic in `[0, 1]`.
    pub panic: f64,
    /// Exhaustion in `[0, 1]`.
    pub exhaustion: f64,
    /// Speed for the next movement.
    pub relative_speed: f64,
    /// Whether the individual reacts to the alarm.
    pub alarmed: bool,
    /// Cause of death, if any.
    pub death_cause: Option<DeathCause>,
    /// Step the individual became safe.
    pub safety_time: Option<Step>,
    /// Step the individual left the building.
    pub evacuation_time: Option<Step>,
    /// Start of the current movement in seconds.
    pub step_start_time: f64,
    /// End of the current movement in seconds.
    pub step_end_time: f64,
}

/// Serializable view of an evacuation state.
///
/// Two states that went through the same sequence of operations produce
/// equal snapshots; every collection is kept sorted by identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Current step.
    pub step: Step,
    /// Occupied cells and their occupants.
    pub occupancy: Vec<(CellId, IndividualId)>,
    /// Individuals that are neither dead nor evacuated.
    pub remaining: Vec<IndividualId>,
    /// Individuals that died.
    pub dead: Vec<IndividualId>,
    /// Individuals that left the building.
    pub evacuated: Vec<IndividualId>,
    /// Individuals that reached safety.
    pub safe: Vec<IndividualId>,
    /// Per-individual properties.
    pub individuals: Vec<IndividualSnapshot>,
    /// Mapped congestion levels.
    pub congestion: Vec<(CellId, u32)>,
}

impl StateSnapshot {
    /// Translates every identifier through the mapping, keeping the sort order.
    #[must_use]
    pub fn remap<M>(&self, mapping: &M) -> Self
    where
        M: IdentityMapping + ?Sized,
    {
        let ids = |ids: &[IndividualId]| -> Vec<IndividualId> {
            let mut mapped: Vec<IndividualId> =
                ids.iter().map(|&id| mapping.individual(id)).collect();
            mapped.sort_unstable();
            mapped
        };

        let mut occupancy: Vec<(CellId, IndividualId)> = self
            .occupancy
            .iter()
            .map(|&(cell, individual)| (mapping.cell(cell), mapping.individual(individual)))
            .collect();
        occupancy.sort_unstable();

        let mut individuals: Vec<IndividualSnapshot> = self
            .individuals
            .iter()
            .map(|snapshot| IndividualSnapshot {
                id: mapping.individual(snapshot.id),
                cell: snapshot.cell.map(|cell| mapping.cell(cell)),
                potential: snapshot.potential.map(|potential| mapping.potential(potential)),
                ..snapshot.clone()
            })
            .collect();
        individuals.sort_by_key(|snapshot| snapshot.id);

        let mut congestion: Vec<(CellId, u32)> = self
            .congestion
            .iter()
            .map(|&(cell, level)| (mapping.cell(cell), level))
            .collect();
        congestion.sort_unstable();

        Self {
            step: self.step,
            occupancy,
            remaining: ids(&self.remaining),
            dead: ids(&self.dead),
            evacuated: ids(&self.evacuated),
            safe: ids(&self.safe),
            individuals,
            congestion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evacsim_core::{Biometrics, CellCoord, CellKind};
    use evacsim_system_potential::{ExitGroup, PotentialSolver};

    fn corridor() -> Floor {
        Floor::grid(4, 1, |coord| {
            Some(if coord.column() == 3 {
                CellKind::Exit
            } else {
                CellKind::Floor
            })
        })
    }

    fn person(id: u32) -> Individual {
        Individual::new(IndividualId::new(id), Biometrics::default()).expect("valid biometrics")
    }

    #[test]
    fn builder_rejects_invalid_placements() {
        let mut builder = EvacuationState::builder(corridor());
        builder
            .add_individual(person(1), CellId::new(0), None)
            .expect("first placement");

        assert_eq!(
            builder.add_individual(person(1), CellId::new(1), None),
            Err(InvalidArgument::DuplicateIndividual(IndividualId::new(1)))
        );
        assert_eq!(
            builder.add_individual(person(2), CellId::new(0), None),
            Err(InvalidArgument::OccupiedCell {
                cell: CellId::new(0),
                occupant: IndividualId::new(1),
            })
        );
        assert_eq!(
            builder.add_individual(person(2), CellId::new(9), None),
            Err(InvalidArgument::UnknownCell(CellId::new(9)))
        );
        assert_eq!(
            builder.add_individual(person(2), CellId::new(1), Some(PotentialId::new(5))),
            Err(InvalidArgument::UnknownPotential(PotentialId::new(5)))
        );
    }

    #[test]
    fn built_state_starts_with_everybody_remaining() {
        let mut builder = EvacuationState::builder(corridor());
        let exits = builder.floor().cells_of_kind(CellKind::Exit);
        let potential = PotentialSolver::default()
            .solve_exit_group(builder.floor(), &ExitGroup::new("east", exits))
            .expect("solve");
        let potential = builder.add_potential(potential).expect("register");
        builder
            .add_individual(person(4), CellId::new(1), Some(potential))
            .expect("place");
        builder
            .add_individual(person(2), CellId::new(0), None)
            .expect("place");

        let state = builder.build();
        let snapshot = state.snapshot();

        assert_eq!(state.step(), Step::ZERO);
        assert_eq!(
            snapshot.remaining,
            vec![IndividualId::new(2), IndividualId::new(4)]
        );
        assert_eq!(
            snapshot.occupancy,
            vec![
                (CellId::new(0), IndividualId::new(2)),
                (CellId::new(1), IndividualId::new(4)),
            ]
        );
        assert_eq!(snapshot.individuals[1].potential, Some(potential));
        assert_eq!(snapshot.individuals[1].relative_speed, 1.5);
        assert!(snapshot.congestion.is_empty());
        assert_eq!(
            state.floor().cell_at(CellCoord::new(1, 0)),
            Some(CellId::new(1))
        );
    }

    #[test]
    fn snapshots_survive_bincode() {
        let mut builder = EvacuationState::builder(corridor());
        builder
            .add_individual(person(7), CellId::new(2), None)
            .expect("place");
        let snapshot = builder.build().snapshot();

        let bytes = bincode::serialize(&snapshot).expect("serialize");
        let decoded: StateSnapshot = bincode::deserialize(&bytes).expect("deserialize");

        assert_eq!(decoded, snapshot);
    }
}
