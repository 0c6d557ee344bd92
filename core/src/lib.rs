#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the evacuation kernel.
//!
//! This crate defines the vocabulary every other crate speaks: identifiers for
//! cells, rooms, individuals and potentials, the [`CellGraph`] capability the
//! field algorithms consume, the immutable [`Individual`] description, and the
//! error taxonomy returned by every fallible kernel call. The authoritative
//! state lives in the world crate; systems only see these contracts.

mod error;
mod individual;

use serde::{Deserialize, Serialize};

pub use error::{EvacError, IllegalState, InvalidArgument};
pub use individual::{Biometrics, Computation, DeathCause, Individual};

/// Unique identifier of a cell inside a floor's cell arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(u32);

impl CellId {
    /// Creates a new cell identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Arena slot addressed by the identifier.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Unique identifier assigned to an individual.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndividualId(u32);

impl IndividualId {
    /// Creates a new individual identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(u32);

impl RoomId {
    /// Creates a new room identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a static potential field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PotentialId(u32);

impl PotentialId {
    /// Creates a new potential identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Discrete simulation step. Life-event timestamps are measured in steps.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Step(u64);

impl Step {
    /// The first step of every run.
    pub const ZERO: Step = Step(0);

    /// Creates a step wrapper around the provided index.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the underlying step index.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Step that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Location of a single cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }

    /// Reports whether a step from `self` to `other` changes both axes.
    #[must_use]
    pub fn is_diagonal_to(self, other: CellCoord) -> bool {
        self.column != other.column && self.row != other.row
    }
}

/// Kinds of cells the kernel distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    /// Ordinary walkable room cell.
    Floor,
    /// Cell that belongs to a door between rooms.
    Door,
    /// Exit cell; seeds static potentials and is never assigned a value.
    Exit,
    /// Cell inside a safe area where individuals are considered rescued.
    Safe,
}

/// Capability exposing the adjacency structure of a floor.
///
/// The potential solver and the congestion field are generic over this trait
/// so they never depend on how the floor was built.
pub trait CellGraph {
    /// Number of cells contained in the graph.
    fn cell_count(&self) -> usize;

    /// Reports whether the identifier addresses a cell of this graph.
    fn contains(&self, cell: CellId) -> bool {
        cell.index() < self.cell_count()
    }

    /// Cells adjacent to `cell`. Unknown cells have no neighbours.
    fn neighbours(&self, cell: CellId) -> &[CellId];

    /// Position of the cell, if it exists.
    fn coord(&self, cell: CellId) -> Option<CellCoord>;

    /// Kind of the cell, if it exists.
    fn kind(&self, cell: CellId) -> Option<CellKind>;
}

/// Translates identities of one run into the identities of another.
///
/// Replay uses a mapping to apply a recorded run to an independently
/// constructed state whose cells and individuals correspond one to one.
pub trait IdentityMapping {
    /// Maps a recorded individual onto the target state.
    fn individual(&self, id: IndividualId) -> IndividualId;

    /// Maps a recorded cell onto the target state.
    fn cell(&self, id: CellId) -> CellId;

    /// Maps a recorded potential onto the target state.
    fn potential(&self, id: PotentialId) -> PotentialId {
        id
    }
}

/// Mapping used when source and target share identifiers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SameIdentity;

impl IdentityMapping for SameIdentity {
    fn individual(&self, id: IndividualId) -> IndividualId {
        id
    }

    fn cell(&self, id: CellId) -> CellId {
        id
    }
}
