//! Cells, rooms and the occupancy slots that make up a floor.

use std::collections::{BTreeSet, HashMap};

use evacsim_core::{
    CellCoord, CellGraph, CellId, CellKind, IndividualId, InvalidArgument, RoomId,
};

/// Single walkable cell of the floor.
#[derive(Clone, Debug)]
pub struct Cell {
    id: CellId,
    coord: CellCoord,
    kind: CellKind,
    room: RoomId,
    neighbours: Vec<CellId>,
    occupant: Option<IndividualId>,
}

impl Cell {
    /// Identifier of the cell.
    #[must_use]
    pub const fn id(&self) -> CellId {
        self.id
    }

    /// Position of the cell on the floor.
    #[must_use]
    pub const fn coord(&self) -> CellCoord {
        self.coord
    }

    /// Kind of the cell.
    #[must_use]
    pub const fn kind(&self) -> CellKind {
        self.kind
    }

    /// Room that contains the cell.
    #[must_use]
    pub const fn room(&self) -> RoomId {
        self.room
    }

    /// Cells adjacent to this one.
    #[must_use]
    pub fn neighbours(&self) -> &[CellId] {
        &self.neighbours
    }

    /// Individual currently standing on the cell.
    #[must_use]
    pub const fn occupant(&self) -> Option<IndividualId> {
        self.occupant
    }

    /// Reports whether nobody stands on the cell.
    #[must_use]
    pub const fn is_vacant(&self) -> bool {
        self.occupant.is_none()
    }
}

/// Named group of cells that tracks who is inside it.
#[derive(Clone, Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    individuals: BTreeSet<IndividualId>,
}

impl Room {
    /// Identifier of the room.
    #[must_use]
    pub const fn id(&self) -> RoomId {
        self.id
    }

    /// Human readable name of the room.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Individuals currently standing on a cell of the room.
    #[must_use]
    pub fn individuals(&self) -> &BTreeSet<IndividualId> {
        &self.individuals
    }

    /// Reports whether the individual is inside the room.
    #[must_use]
    pub fn contains(&self, individual: IndividualId) -> bool {
        self.individuals.contains(&individual)
    }

    pub(crate) fn add_individual(&mut self, individual: IndividualId) {
        let _ = self.individuals.insert(individual);
    }

    pub(crate) fn remove_individual(&mut self, individual: IndividualId) {
        let _ = self.individuals.remove(&individual);
    }
}

/// Immutable topology of the building plus its mutable occupancy slots.
///
/// Only the state controller writes occupancy. Every placement keeps the
/// cell slot and the membership of the containing room in lockstep.
#[derive(Clone, Debug)]
pub struct Floor {
    cells: Vec<Cell>,
    rooms: Vec<Room>,
    positions: HashMap<CellCoord, CellId>,
}

impl Floor {
    /// Starts an empty floor description.
    #[must_use]
    pub fn builder() -> FloorBuilder {
        FloorBuilder::default()
    }

    /// Builds a single room floor on a rectangular grid.
    ///
    /// `kind_at` decides the kind of every coordinate; `None` marks a wall and
    /// produces no cell. Cells connect to all eight surrounding cells.
    #[must_use]
    pub fn grid<F>(columns: u32, rows: u32, mut kind_at: F) -> Self
    where
        F: FnMut(CellCoord) -> Option<CellKind>,
    {
        let mut builder = Self::builder();
        let room = builder.add_room("room 0");
        let mut ids: HashMap<CellCoord, CellId> = HashMap::new();

        for row in 0..rows {
            for column in 0..columns {
                let coord = CellCoord::new(column, row);
                if let Some(kind) = kind_at(coord) {
                    let id = builder.push_cell(room, coord, kind);
                    let _ = ids.insert(coord, id);
                }
            }
        }

        for row in 0..rows {
            for column in 0..columns {
                let Some(&cell) = ids.get(&CellCoord::new(column, row)) else {
                    continue;
                };
                let mut candidates = vec![
                    CellCoord::new(column + 1, row),
                    CellCoord::new(column, row + 1),
                    CellCoord::new(column + 1, row + 1),
                ];
                if column > 0 {
                    candidates.push(CellCoord::new(column - 1, row + 1));
                }
                for coord in candidates {
                    if let Some(&other) = ids.get(&coord) {
                        builder.link(cell, other);
                    }
                }
            }
        }

        builder.build()
    }

    /// Cell addressed by the identifier.
    #[must_use]
    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.index())
    }

    /// Identifier of the cell at the coordinate.
    #[must_use]
    pub fn cell_at(&self, coord: CellCoord) -> Option<CellId> {
        self.positions.get(&coord).copied()
    }

    /// Iterator over all cells in identifier order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Room addressed by the identifier.
    #[must_use]
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id.get() as usize)
    }

    /// Iterator over all rooms in identifier order.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter()
    }

    /// Individual standing on the cell.
    #[must_use]
    pub fn occupant(&self, id: CellId) -> Option<IndividualId> {
        self.cell(id).and_then(Cell::occupant)
    }

    /// Cells of the requested kind in identifier order.
    #[must_use]
    pub fn cells_of_kind(&self, kind: CellKind) -> BTreeSet<CellId> {
        self.cells
            .iter()
            .filter(|cell| cell.kind == kind)
            .map(Cell::id)
            .collect()
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.is_vacant()).count()
    }

    pub(crate) fn require(&self, id: CellId) -> Result<&Cell, InvalidArgument> {
        self.cell(id).ok_or(InvalidArgument::UnknownCell(id))
    }

    /// Puts `individual` on an empty cell and enters the containing room.
    pub(crate) fn place(&mut self, id: CellId, individual: IndividualId) {
        let Some(cell) = self.cells.get_mut(id.index()) else {
            return;
        };
        debug_assert!(cell.occupant.is_none(), "placing onto an occupied cell");
        cell.occupant = Some(individual);
        let room = cell.room;
        if let Some(room) = self.rooms.get_mut(room.get() as usize) {
            room.add_individual(individual);
        }
    }

    /// Clears the cell and leaves the containing room.
    pub(crate) fn vacate(&mut self, id: CellId) -> Option<IndividualId> {
        let cell = self.cells.get_mut(id.index())?;
        let individual = cell.occupant.take()?;
        let room = cell.room;
        if let Some(room) = self.rooms.get_mut(room.get() as usize) {
            room.remove_individual(individual);
        }
        Some(individual)
    }
}

impl CellGraph for Floor {
    fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn neighbours(&self, cell: CellId) -> &[CellId] {
        self.cell(cell).map(Cell::neighbours).unwrap_or(&[])
    }

    fn coord(&self, cell: CellId) -> Option<CellCoord> {
        self.cell(cell).map(Cell::coord)
    }

    fn kind(&self, cell: CellId) -> Option<CellKind> {
        self.cell(cell).map(Cell::kind)
    }
}

/// Incrementally describes a floor with arbitrary rooms and connections.
#[derive(Debug, Default)]
pub struct FloorBuilder {
    cells: Vec<Cell>,
    rooms: Vec<Room>,
    positions: HashMap<CellCoord, CellId>,
}

impl FloorBuilder {
    /// Adds a room and returns its identifier.
    pub fn add_room(&mut self, name: impl Into<String>) -> RoomId {
        let id = RoomId::new(u32::try_from(self.rooms.len()).unwrap_or(u32::MAX));
        self.rooms.push(Room {
            id,
            name: name.into(),
            individuals: BTreeSet::new(),
        });
        id
    }

    /// Adds a cell to an existing room.
    pub fn add_cell(
        &mut self,
        room: RoomId,
        coord: CellCoord,
        kind: CellKind,
    ) -> Result<CellId, InvalidArgument> {
        if self.rooms.get(room.get() as usize).is_none() {
            return Err(InvalidArgument::UnknownRoom(room));
        }
        if self.positions.contains_key(&coord) {
            return Err(InvalidArgument::DuplicateCell(coord));
        }
        Ok(self.push_cell(room, coord, kind))
    }

    /// Connects two cells in both directions. Connecting twice is harmless.
    pub fn connect(&mut self, first: CellId, second: CellId) -> Result<(), InvalidArgument> {
        for id in [first, second] {
            if id.index() >= self.cells.len() {
                return Err(InvalidArgument::UnknownCell(id));
            }
        }
        self.link(first, second);
        Ok(())
    }

    /// Freezes the description into a floor.
    #[must_use]
    pub fn build(self) -> Floor {
        Floor {
            cells: self.cells,
            rooms: self.rooms,
            positions: self.positions,
        }
    }

    fn push_cell(&mut self, room: RoomId, coord: CellCoord, kind: CellKind) -> CellId {
        let id = CellId::new(u32::try_from(self.cells.len()).unwrap_or(u32::MAX));
        self.cells.push(Cell {
            id,
            coord,
            kind,
            room,
            neighbours: Vec::new(),
            occupant: None,
        });
        let _ = self.positions.insert(coord, id);
        id
    }

    fn link(&mut self, first: CellId, second: CellId) {
        if first == second {
            return;
        }
        for (from, to) in [(first, second), (second, first)] {
            if let Some(cell) = self.cells.get_mut(from.index()) {
                if !cell.neighbours.contains(&to) {
                    cell.neighbours.push(to);
                }
            }
        }
    }
}
