//! Registry of the static potentials available to a run.

use std::{collections::BTreeMap, sync::Arc};

use evacsim_core::{CellId, InvalidArgument, PotentialId};

use crate::potential::StaticPotential;

/// Owns every registered static potential and shares them by reference count.
#[derive(Clone, Debug, Default)]
pub struct PotentialManager {
    potentials: BTreeMap<PotentialId, Arc<StaticPotential>>,
}

impl PotentialManager {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a potential and returns the shared handle.
    pub fn register(
        &mut self,
        potential: StaticPotential,
    ) -> Result<Arc<StaticPotential>, InvalidArgument> {
        let id = potential.id();
        if self.potentials.contains_key(&id) {
            return Err(InvalidArgument::DuplicatePotential(id));
        }
        let shared = Arc::new(potential);
        let _ = self.potentials.insert(id, Arc::clone(&shared));
        Ok(shared)
    }

    /// Shared handle of the potential with the provided identifier.
    pub fn get(&self, id: PotentialId) -> Result<&Arc<StaticPotential>, InvalidArgument> {
        self.potentials
            .get(&id)
            .ok_or(InvalidArgument::UnknownPotential(id))
    }

    /// Iterator over registered potentials in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<StaticPotential>> {
        self.potentials.values()
    }

    /// Number of registered potentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.potentials.len()
    }

    /// Reports whether no potential is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.potentials.is_empty()
    }

    /// Builds the cell-wise minimum over all registered potentials.
    ///
    /// Returns `None` when the registry is empty.
    #[must_use]
    pub fn merged(&self, id: PotentialId) -> Option<StaticPotential> {
        if self.potentials.is_empty() {
            return None;
        }
        Some(StaticPotential::merged(
            id,
            "merged",
            self.potentials.values().map(Arc::as_ref),
        ))
    }

    /// Potential with the lowest value at `cell`; ties prefer higher attractivity.
    #[must_use]
    pub fn best_for(&self, cell: CellId) -> Option<&Arc<StaticPotential>> {
        self.potentials
            .values()
            .filter_map(|potential| potential.potential(cell).map(|value| (value, potential)))
            .min_by(|(left_value, left), (right_value, right)| {
                left_value
                    .cmp(right_value)
                    .then_with(|| right.attractivity().cmp(&left.attractivity()))
            })
            .map(|(_, potential)| potential)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::solver::{ExitGroup, PotentialSolver};
    use evacsim_core::{CellCoord, CellGraph, CellKind};

    /// Straight corridor with exits at both ends.
    struct Corridor {
        neighbours: Vec<Vec<CellId>>,
    }

    impl Corridor {
        fn new(length: u32) -> Self {
            let neighbours = (0..length)
                .map(|index| {
                    let mut adjacent = Vec::new();
                    if index > 0 {
                        adjacent.push(CellId::new(index - 1));
                    }
                    if index + 1 < length {
                        adjacent.push(CellId::new(index + 1));
                    }
                    adjacent
                })
                .collect();
            Self { neighbours }
        }
    }

    impl CellGraph for Corridor {
        fn cell_count(&self) -> usize {
            self.neighbours.len()
        }

        fn neighbours(&self, cell: CellId) -> &[CellId] {
            self.neighbours
                .get(cell.index())
                .map(Vec::as_slice)
                .unwrap_or(&[])
        }

        fn coord(&self, cell: CellId) -> Option<CellCoord> {
            self.contains(cell).then(|| CellCoord::new(cell.get(), 0))
        }

        fn kind(&self, cell: CellId) -> Option<CellKind> {
            let last = u32::try_from(self.neighbours.len()).ok()?.checked_sub(1)?;
            match cell.get() {
                0 => Some(CellKind::Exit),
                index if index == last => Some(CellKind::Exit),
                index if index < last => Some(CellKind::Floor),
                _ => None,
            }
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let corridor = Corridor::new(3);
        let mut solver = PotentialSolver::default();
        let potential = solver
            .solve(&corridor, &BTreeSet::from([CellId::new(0)]))
            .expect("solve");
        let mut manager = PotentialManager::new();

        let _ = manager.register(potential.clone()).expect("first registration");
        let error = manager.register(potential).unwrap_err();

        assert_eq!(error, InvalidArgument::DuplicatePotential(PotentialId::new(0)));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn merged_and_best_choose_the_nearest_exit() {
        let corridor = Corridor::new(5);
        let mut solver = PotentialSolver::default();
        let mut manager = PotentialManager::new();
        let west = solver
            .solve_exit_group(&corridor, &ExitGroup::new("west", [CellId::new(0)]))
            .expect("solve west");
        let east = solver
            .solve_exit_group(&corridor, &ExitGroup::new("east", [CellId::new(4)]))
            .expect("solve east");
        let _ = manager.register(west).expect("register west");
        let _ = manager.register(east).expect("register east");

        let merged = manager.merged(PotentialId::new(99)).expect("merged");
        assert_eq!(merged.potential(CellId::new(1)), Some(10));
        assert_eq!(merged.potential(CellId::new(3)), Some(10));
        assert_eq!(merged.potential(CellId::new(2)), Some(20));

        let best = manager.best_for(CellId::new(3)).expect("best potential");
        assert_eq!(best.name(), "east");
        assert!(manager.get(PotentialId::new(7)).is_err());
    }
}
