//! Fixed-topology cell graph with cached walkability.

use garrison_core::{CellCoord, Event};

use crate::occupancy::OccupancyStore;

/// Single node of the board graph.
#[derive(Clone, Debug)]
pub struct Cell {
    neighbors: Vec<CellCoord>,
    walkable: bool,
}

impl Cell {
    /// Orthogonal neighbours in north, south, east, west order.
    #[must_use]
    pub fn neighbors(&self) -> &[CellCoord] {
        &self.neighbors
    }

    /// Walkability observed at the last refresh.
    #[must_use]
    pub fn cached_walkable(&self) -> bool {
        self.walkable
    }
}

/// Dense row-major grid of cells whose neighbour lists never change.
///
/// Walkability is owned by the [`OccupancyStore`]; the graph only caches the
/// last observed value so it can report flips as
/// [`Event::WalkabilityChanged`].
#[derive(Clone, Debug, Default)]
pub struct CellGraph {
    columns: u32,
    rows: u32,
    cells: Vec<Cell>,
}

impl CellGraph {
    /// Builds a fully walkable graph with the provided dimensions.
    #[must_use]
    pub fn new(columns: u32, rows: u32) -> Self {
        let capacity = usize::try_from(u64::from(columns) * u64::from(rows)).unwrap_or(0);
        let mut cells = Vec::with_capacity(capacity);
        for row in 0..rows {
            for column in 0..columns {
                let coord = CellCoord::new(column, row);
                cells.push(Cell {
                    neighbors: orthogonal_neighbors(coord, columns, rows),
                    walkable: true,
                });
            }
        }

        Self {
            columns,
            rows,
            cells,
        }
    }

    /// Dimensions of the graph as `(columns, rows)`.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    /// Reports whether the cell lies on the board.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    /// Dense row-major index of the cell.
    #[must_use]
    pub fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(self.columns).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }

    /// Node stored for the cell.
    #[must_use]
    pub fn cell(&self, cell: CellCoord) -> Option<&Cell> {
        self.index(cell).and_then(|index| self.cells.get(index))
    }

    /// Orthogonal neighbours of the cell; empty when the cell is off the board.
    #[must_use]
    pub fn neighbors(&self, cell: CellCoord) -> &[CellCoord] {
        self.cell(cell).map_or(&[][..], Cell::neighbors)
    }

    /// Authoritative walkability, read straight from the store.
    #[must_use]
    pub fn walkable(&self, cell: CellCoord, store: &OccupancyStore) -> bool {
        self.contains(cell) && store.is_walkable(cell)
    }

    /// Recomputes every stale cell and reports the ones whose walkability flipped.
    pub fn refresh(&mut self, store: &mut OccupancyStore, out_events: &mut Vec<Event>) {
        for coord in store.take_stale() {
            let walkable = store.is_walkable(coord);
            let Some(index) = self.index(coord) else {
                continue;
            };
            let Some(cell) = self.cells.get_mut(index) else {
                continue;
            };
            if cell.walkable != walkable {
                cell.walkable = walkable;
                out_events.push(Event::WalkabilityChanged {
                    cell: coord,
                    walkable,
                });
            }
        }
    }
}

fn orthogonal_neighbors(cell: CellCoord, columns: u32, rows: u32) -> Vec<CellCoord> {
    let mut neighbors = Vec::with_capacity(4);

    if let Some(row) = cell.row().checked_sub(1) {
        neighbors.push(CellCoord::new(cell.column(), row));
    }

    if let Some(row) = cell.row().checked_add(1) {
        if row < rows {
            neighbors.push(CellCoord::new(cell.column(), row));
        }
    }

    if let Some(column) = cell.column().checked_add(1) {
        if column < columns {
            neighbors.push(CellCoord::new(column, cell.row()));
        }
    }

    if let Some(column) = cell.column().checked_sub(1) {
        neighbors.push(CellCoord::new(column, cell.row()));
    }

    neighbors
}

#[cfg(test)]
mod tests {
    use super::*;
    use garrison_core::{CellRectSize, Damage, EntityDescriptor, EntityId, EntityKind, Health, Speed};

    fn crate_descriptor() -> EntityDescriptor {
        EntityDescriptor {
            name: "Crate".to_owned(),
            kind: EntityKind::Building,
            size: CellRectSize::single(),
            health: Health::new(1),
            damage: Damage::new(0),
            speed: Speed::new(1),
            products: Vec::new(),
        }
    }

    #[test]
    fn corner_cells_have_two_neighbors() {
        let graph = CellGraph::new(3, 3);
        assert_eq!(
            graph.neighbors(CellCoord::new(0, 0)),
            &[CellCoord::new(0, 1), CellCoord::new(1, 0)]
        );
        assert_eq!(graph.neighbors(CellCoord::new(2, 2)).len(), 2);
    }

    #[test]
    fn interior_cells_list_north_south_east_west() {
        let graph = CellGraph::new(3, 3);
        assert_eq!(
            graph.neighbors(CellCoord::new(1, 1)),
            &[
                CellCoord::new(1, 0),
                CellCoord::new(1, 2),
                CellCoord::new(2, 1),
                CellCoord::new(0, 1),
            ]
        );
    }

    #[test]
    fn off_board_cells_have_no_neighbors() {
        let graph = CellGraph::new(2, 2);
        assert!(graph.neighbors(CellCoord::new(5, 0)).is_empty());
        assert_eq!(graph.index(CellCoord::new(2, 0)), None);
        assert_eq!(graph.index(CellCoord::new(1, 1)), Some(3));
    }

    #[test]
    fn refresh_reports_only_flips() {
        let mut graph = CellGraph::new(4, 4);
        let mut store = OccupancyStore::new();
        let cell = CellCoord::new(2, 1);
        let _ = store
            .add_placement(cell, CellRectSize::single(), crate_descriptor(), EntityId::new(0))
            .expect("placement");

        let mut events = Vec::new();
        graph.refresh(&mut store, &mut events);
        assert_eq!(
            events,
            vec![Event::WalkabilityChanged {
                cell,
                walkable: false
            }]
        );
        assert!(!graph.walkable(cell, &store));

        events.clear();
        graph.refresh(&mut store, &mut events);
        assert!(events.is_empty());

        let _ = store.remove_all_at(EntityId::new(0), cell);
        graph.refresh(&mut store, &mut events);
        assert_eq!(
            events,
            vec![Event::WalkabilityChanged {
                cell,
                walkable: true
            }]
        );
        assert!(graph.cell(cell).is_some_and(Cell::cached_walkable));
    }
}
