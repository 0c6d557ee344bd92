//! Multi-source wavefront solver with directional smoothing.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use evacsim_core::{CellGraph, CellId, CellKind, InvalidArgument, PotentialId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::potential::{PotentialEntry, StaticPotential, DEFAULT_ATTRACTIVITY};

/// Step costs used while expanding the wavefront.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverTuning {
    /// Potential added for a step along one axis.
    pub orthogonal_cost: u32,
    /// Potential added for a step that changes both axes.
    pub diagonal_cost: u32,
    /// Edge length of a cell in metres; diagonal steps cover `sqrt(2)` of it.
    pub cell_length: f64,
}

impl Default for SolverTuning {
    fn default() -> Self {
        Self {
            orthogonal_cost: 10,
            diagonal_cost: 14,
            cell_length: 0.4,
        }
    }
}

/// Named, weighted set of exit cells that seeds one potential.
#[derive(Clone, Debug, PartialEq)]
pub struct ExitGroup {
    /// Human readable name of the group.
    pub name: String,
    /// Weight describing how attractive the group is.
    pub attractivity: u32,
    /// Cells the wavefront starts from.
    pub cells: BTreeSet<CellId>,
}

impl ExitGroup {
    /// Creates an exit group with the default attractivity.
    #[must_use]
    pub fn new(name: impl Into<String>, cells: impl IntoIterator<Item = CellId>) -> Self {
        Self {
            name: name.into(),
            attractivity: DEFAULT_ATTRACTIVITY,
            cells: cells.into_iter().collect(),
        }
    }

    /// Replaces the attractivity of the group.
    #[must_use]
    pub fn with_attractivity(mut self, attractivity: u32) -> Self {
        self.attractivity = attractivity;
        self
    }
}

/// Builds static potentials and hands out their identifiers.
#[derive(Clone, Debug, Default)]
pub struct PotentialSolver {
    tuning: SolverTuning,
    next_id: u32,
}

impl PotentialSolver {
    /// Creates a solver using the provided step costs.
    #[must_use]
    pub const fn new(tuning: SolverTuning) -> Self {
        Self { tuning, next_id: 0 }
    }

    /// Step costs used by the solver.
    #[must_use]
    pub const fn tuning(&self) -> &SolverTuning {
        &self.tuning
    }

    /// Solves an unnamed potential seeded by `sources`.
    pub fn solve<G>(
        &mut self,
        graph: &G,
        sources: &BTreeSet<CellId>,
    ) -> Result<StaticPotential, InvalidArgument>
    where
        G: CellGraph,
    {
        let name = format!("exit group {}", self.next_id);
        self.solve_exit_group(graph, &ExitGroup::new(name, sources.iter().copied()))
    }

    /// Solves the potential of a named exit group.
    pub fn solve_exit_group<G>(
        &mut self,
        graph: &G,
        group: &ExitGroup,
    ) -> Result<StaticPotential, InvalidArgument>
    where
        G: CellGraph,
    {
        let entries = expand(graph, &group.cells, &self.tuning)?;
        let id = PotentialId::new(self.next_id);
        self.next_id = self.next_id.saturating_add(1);

        info!(
            potential = id.get(),
            name = %group.name,
            exits = group.cells.len(),
            reached = entries.len(),
            "static potential solved"
        );

        Ok(StaticPotential::new(
            id,
            group.name.clone(),
            group.attractivity,
            group.cells.clone(),
            entries,
        ))
    }
}

fn expand<G>(
    graph: &G,
    sources: &BTreeSet<CellId>,
    tuning: &SolverTuning,
) -> Result<HashMap<CellId, PotentialEntry>, InvalidArgument>
where
    G: CellGraph,
{
    if sources.is_empty() {
        return Err(InvalidArgument::EmptySourceSet);
    }
    if let Some(unknown) = sources.iter().find(|cell| !graph.contains(**cell)) {
        return Err(InvalidArgument::UnknownCell(*unknown));
    }

    let mut entries: HashMap<CellId, PotentialEntry> = HashMap::with_capacity(graph.cell_count());
    for &source in sources {
        let _ = entries.insert(
            source,
            PotentialEntry {
                potential: 0,
                distance: 0.0,
            },
        );
    }

    let mut frontier: Vec<CellId> = sources.iter().copied().collect();
    let mut proposals: BTreeMap<CellId, Smoothing> = BTreeMap::new();

    while !frontier.is_empty() {
        proposals.clear();

        for &parent in &frontier {
            let Some(parent_entry) = entries.get(&parent).copied() else {
                continue;
            };

            for &child in graph.neighbours(parent) {
                if entries.contains_key(&child) {
                    continue;
                }
                if graph.kind(child) == Some(CellKind::Exit) {
                    continue;
                }

                let (cost, length) = step_cost(graph, parent, child, tuning);
                proposals
                    .entry(child)
                    .or_default()
                    .add_parent(
                        parent_entry.potential.saturating_add(cost),
                        parent_entry.distance + length,
                    );
            }
        }

        frontier.clear();
        for (&child, smoothing) in &proposals {
            let _ = entries.insert(child, smoothing.resolve());
            frontier.push(child);
        }
    }

    Ok(entries)
}

fn step_cost<G>(graph: &G, from: CellId, to: CellId, tuning: &SolverTuning) -> (u32, f64)
where
    G: CellGraph,
{
    let orthogonal = (tuning.orthogonal_cost, tuning.cell_length);
    if graph.kind(from) == Some(CellKind::Door) && graph.kind(to) == Some(CellKind::Door) {
        return orthogonal;
    }

    match (graph.coord(from), graph.coord(to)) {
        (Some(a), Some(b)) if a.is_diagonal_to(b) => (
            tuning.diagonal_cost,
            tuning.cell_length * std::f64::consts::SQRT_2,
        ),
        _ => orthogonal,
    }
}

/// Accumulates every proposal a child receives within one expansion round.
#[derive(Clone, Copy, Debug, Default)]
struct Smoothing {
    parents: u32,
    potential_sum: u64,
    distance_sum: f64,
    min_potential: u32,
    min_distance: f64,
}

impl Smoothing {
    fn add_parent(&mut self, potential: u32, distance: f64) {
        if self.parents == 0 {
            self.min_potential = potential;
            self.min_distance = distance;
        } else {
            self.min_potential = self.min_potential.min(potential);
            self.min_distance = self.min_distance.min(distance);
        }
        self.parents += 1;
        self.potential_sum += u64::from(potential);
        self.distance_sum += distance;
    }

    /// Blends the strict minimum with the mean of all proposals.
    fn resolve(&self) -> PotentialEntry {
        let parents = f64::from(self.parents.max(1));
        let mean_potential = self.potential_sum as f64 / parents;
        let mean_distance = self.distance_sum / parents;
        let potential = ((f64::from(self.min_potential) + mean_potential) / 2.0).round();

        PotentialEntry {
            potential: potential as u32,
            distance: (self.min_distance + mean_distance) / 2.0,
        }
    }
}
