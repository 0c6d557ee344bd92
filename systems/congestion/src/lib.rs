#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Dynamic congestion field layered on top of the static potentials.
//!
//! Individuals leave a trace behind them when they move. The trace diffuses
//! to random neighbours and decays over time, which lets crowds push back on
//! the people following them. Every mutation the field performs is reported
//! as a [`CongestionChange`] so a recorded run can reproduce the field without
//! drawing random numbers again.

use std::collections::BTreeMap;

use evacsim_core::{CellGraph, CellId, IdentityMapping, InvalidArgument};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default probabilities applied by a congestion update.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CongestionTuning {
    /// Probability that a cell hands one unit to a random neighbour.
    pub diffusion: f64,
    /// Probability that a cell loses one unit.
    pub decay: f64,
}

impl Default for CongestionTuning {
    fn default() -> Self {
        Self {
            diffusion: 0.3,
            decay: 0.1,
        }
    }
}

/// Single unit mutation applied to the congestion field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CongestionChange {
    /// The level of `cell` grew by one.
    Increased {
        /// Cell that gained a unit.
        cell: CellId,
    },
    /// One unit moved from `from` to its neighbour `to`.
    Diffused {
        /// Cell that lost the unit.
        from: CellId,
        /// Neighbour that received the unit.
        to: CellId,
    },
    /// The level of `cell` shrank by one.
    Decayed {
        /// Cell that lost a unit.
        cell: CellId,
    },
}

impl CongestionChange {
    /// Translates the cells of the change through `mapping`.
    #[must_use]
    pub fn remap<M>(self, mapping: &M) -> Self
    where
        M: IdentityMapping + ?Sized,
    {
        match self {
            Self::Increased { cell } => Self::Increased {
                cell: mapping.cell(cell),
            },
            Self::Diffused { from, to } => Self::Diffused {
                from: mapping.cell(from),
                to: mapping.cell(to),
            },
            Self::Decayed { cell } => Self::Decayed {
                cell: mapping.cell(cell),
            },
        }
    }
}

/// Sparse per-cell congestion levels. Absent cells have level zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DynamicPotential {
    levels: BTreeMap<CellId, u32>,
}

impl DynamicPotential {
    /// Creates an empty field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the level of `cell` by one, creating the mapping if needed.
    pub fn increase(&mut self, cell: CellId) {
        let level = self.levels.entry(cell).or_insert(0);
        *level = level.saturating_add(1);
    }

    /// Lowers the level of `cell` by one and drops the mapping at zero.
    pub fn decrease(&mut self, cell: CellId) -> Result<(), InvalidArgument> {
        let Some(level) = self.levels.get_mut(&cell) else {
            return Err(InvalidArgument::UnmappedCongestion(cell));
        };
        if *level <= 1 {
            let _ = self.levels.remove(&cell);
        } else {
            *level -= 1;
        }
        Ok(())
    }

    /// Level of `cell`; zero when the cell is not mapped.
    #[must_use]
    pub fn potential(&self, cell: CellId) -> u32 {
        self.levels.get(&cell).copied().unwrap_or(0)
    }

    /// Reports whether `cell` currently carries a level.
    #[must_use]
    pub fn has_valid_potential(&self, cell: CellId) -> bool {
        self.levels.contains_key(&cell)
    }

    /// Highest level in the field; zero when the field is empty.
    #[must_use]
    pub fn max_potential(&self) -> u32 {
        self.levels.values().copied().max().unwrap_or(0)
    }

    /// Mapped cells and their levels in ascending cell order.
    pub fn mapped_cells(&self) -> impl Iterator<Item = (CellId, u32)> + '_ {
        self.levels.iter().map(|(&cell, &level)| (cell, level))
    }

    /// Number of mapped cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Reports whether no cell is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Runs one diffusion and decay pass over the cells mapped before the call.
    ///
    /// Both coin flips of a cell are drawn before it is processed. When a cell
    /// holding its last unit would both diffuse and decay, decay wins and the
    /// neighbour receives nothing. The applied changes are returned in order.
    pub fn update<G, R>(
        &mut self,
        graph: &G,
        diffusion: f64,
        decay: f64,
        rng: &mut R,
    ) -> Result<Vec<CongestionChange>, InvalidArgument>
    where
        G: CellGraph + ?Sized,
        R: Rng,
    {
        probability("diffusion", diffusion)?;
        probability("decay", decay)?;

        let snapshot: Vec<CellId> = self.levels.keys().copied().collect();
        let mut changes = Vec::new();

        for cell in snapshot {
            let diffuses = rng.gen_bool(diffusion);
            let decays = rng.gen_bool(decay);

            if diffuses {
                let neighbours = graph.neighbours(cell);
                if !neighbours.is_empty() {
                    let target = neighbours[rng.gen_range(0..neighbours.len())];
                    if self.potential(cell) == 1 && decays {
                        if self.remove_unit(cell) {
                            changes.push(CongestionChange::Decayed { cell });
                        }
                        continue;
                    }
                    if self.remove_unit(cell) {
                        self.increase(target);
                        changes.push(CongestionChange::Diffused {
                            from: cell,
                            to: target,
                        });
                    }
                }
            }

            if decays && self.remove_unit(cell) {
                changes.push(CongestionChange::Decayed { cell });
            }
        }

        debug!(
            changes = changes.len(),
            mapped = self.levels.len(),
            "congestion field updated"
        );
        Ok(changes)
    }

    /// Applies a previously recorded change.
    pub fn apply(&mut self, change: CongestionChange) -> Result<(), InvalidArgument> {
        match change {
            CongestionChange::Increased { cell } => {
                self.increase(cell);
                Ok(())
            }
            CongestionChange::Diffused { from, to } => {
                self.decrease(from)?;
                self.increase(to);
                Ok(())
            }
            CongestionChange::Decayed { cell } => self.decrease(cell),
        }
    }

    /// Applies the changes in order, or none of them when one fails.
    pub fn apply_all(&mut self, changes: &[CongestionChange]) -> Result<(), InvalidArgument> {
        let mut staged = self.clone();
        for &change in changes {
            staged.apply(change)?;
        }
        *self = staged;
        Ok(())
    }

    fn remove_unit(&mut self, cell: CellId) -> bool {
        self.decrease(cell).is_ok()
    }
}

fn probability(name: &'static str, value: f64) -> Result<(), InvalidArgument> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(InvalidArgument::ProbabilityOutOfRange { name, value })
    }
}
