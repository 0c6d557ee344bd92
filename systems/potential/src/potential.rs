//! Immutable static potential produced by the solver.

use std::collections::{BTreeSet, HashMap};

use evacsim_core::{CellId, PotentialId};

/// Attractivity assigned to exit groups that do not specify one.
pub const DEFAULT_ATTRACTIVITY: u32 = 100;

/// Potential and metric distance recorded for a single cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PotentialEntry {
    /// Integer potential in solver cost units.
    pub potential: u32,
    /// Approximate walking distance in metres.
    pub distance: f64,
}

/// Attractiveness field approximating the distance to an exit group.
///
/// Cells without an entry were never reached by the wavefront and answer
/// `None` to every query.
#[derive(Clone, Debug)]
pub struct StaticPotential {
    id: PotentialId,
    name: String,
    attractivity: u32,
    exits: BTreeSet<CellId>,
    entries: HashMap<CellId, PotentialEntry>,
}

impl StaticPotential {
    pub(crate) fn new(
        id: PotentialId,
        name: String,
        attractivity: u32,
        exits: BTreeSet<CellId>,
        entries: HashMap<CellId, PotentialEntry>,
    ) -> Self {
        Self {
            id,
            name,
            attractivity,
            exits,
            entries,
        }
    }

    /// Identifier of the potential.
    #[must_use]
    pub const fn id(&self) -> PotentialId {
        self.id
    }

    /// Human readable name of the exit group.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Weight describing how attractive the exit group is.
    #[must_use]
    pub const fn attractivity(&self) -> u32 {
        self.attractivity
    }

    /// Exit cells that seeded the potential.
    #[must_use]
    pub fn exits(&self) -> &BTreeSet<CellId> {
        &self.exits
    }

    /// Potential of the cell, or `None` when the cell is unknown.
    #[must_use]
    pub fn potential(&self, cell: CellId) -> Option<u32> {
        self.entries.get(&cell).map(|entry| entry.potential)
    }

    /// Distance of the cell in metres, or `None` when the cell is unknown.
    #[must_use]
    pub fn distance(&self, cell: CellId) -> Option<f64> {
        self.entries.get(&cell).map(|entry| entry.distance)
    }

    /// Full entry recorded for the cell.
    #[must_use]
    pub fn entry(&self, cell: CellId) -> Option<PotentialEntry> {
        self.entries.get(&cell).copied()
    }

    /// Reports whether the wavefront reached the cell.
    #[must_use]
    pub fn has_valid_potential(&self, cell: CellId) -> bool {
        self.entries.contains_key(&cell)
    }

    /// Largest potential stored in the field.
    #[must_use]
    pub fn max_potential(&self) -> Option<u32> {
        self.entries.values().map(|entry| entry.potential).max()
    }

    /// Largest distance stored in the field.
    #[must_use]
    pub fn max_distance(&self) -> Option<f64> {
        self.entries
            .values()
            .map(|entry| entry.distance)
            .reduce(f64::max)
    }

    /// Number of cells carrying a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no cell carries a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cells carrying a value in ascending identifier order.
    #[must_use]
    pub fn cells(&self) -> Vec<CellId> {
        let mut cells: Vec<CellId> = self.entries.keys().copied().collect();
        cells.sort_unstable();
        cells
    }

    /// Combines several potentials into one by taking the cell-wise minimum.
    ///
    /// The merged field is seeded by the union of all exits and carries the
    /// highest attractivity of its parts.
    #[must_use]
    pub fn merged<'a, I>(id: PotentialId, name: impl Into<String>, parts: I) -> Self
    where
        I: IntoIterator<Item = &'a StaticPotential>,
    {
        let mut exits = BTreeSet::new();
        let mut attractivity = 0;
        let mut entries: HashMap<CellId, PotentialEntry> = HashMap::new();

        for part in parts {
            exits.extend(part.exits.iter().copied());
            attractivity = attractivity.max(part.attractivity);
            for (&cell, &entry) in &part.entries {
                let merged = entries.entry(cell).or_insert(entry);
                merged.potential = merged.potential.min(entry.potential);
                merged.distance = merged.distance.min(entry.distance);
            }
        }

        Self::new(id, name.into(), attractivity, exits, entries)
    }
}
