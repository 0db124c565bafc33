//! Authoritative map from board cells to the placements covering them.

use std::collections::{BTreeMap, BTreeSet};

use garrison_core::{CellCoord, CellRect, CellRectSize, EntityDescriptor, EntityId};
use thiserror::Error;

/// Bookkeeping failures that indicate a bug in the caller's occupancy accounting.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OccupancyError {
    /// An entity tried to release a cell that is not recorded for it.
    #[error("entity {} has no recorded occupancy at ({}, {})", entity.get(), cell.column(), cell.row())]
    UnrecordedRelease {
        /// Entity that attempted the release.
        entity: EntityId,
        /// Cell that was not recorded for the entity.
        cell: CellCoord,
    },
    /// A release would leave the entity without any covered cell.
    #[error("entity {} cannot release its last cell ({}, {})", entity.get(), cell.column(), cell.row())]
    LastCell {
        /// Entity that attempted the release.
        entity: EntityId,
        /// The only cell still covered by the entity.
        cell: CellCoord,
    },
    /// The entity has no placement in the store.
    #[error("entity {} has no placement", entity.get())]
    MissingPlacement {
        /// Entity that was looked up.
        entity: EntityId,
    },
    /// The entity already owns a placement.
    #[error("entity {} is already placed", entity.get())]
    DuplicateEntity {
        /// Entity that was placed twice.
        entity: EntityId,
    },
    /// The entity already covers the cell it tried to grow into.
    #[error("entity {} already covers ({}, {})", entity.get(), cell.column(), cell.row())]
    DuplicateCell {
        /// Entity that attempted to grow.
        entity: EntityId,
        /// Cell already covered by the entity.
        cell: CellCoord,
    },
}

/// Occupancy record binding an entity to the cells it covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    entity: EntityId,
    occupied: Vec<CellCoord>,
    anchor: CellCoord,
    descriptor: EntityDescriptor,
}

impl Placement {
    /// Identifier of the entity owning the placement.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Cells currently covered by the entity, in the order they were claimed.
    #[must_use]
    pub fn occupied(&self) -> &[CellCoord] {
        &self.occupied
    }

    /// Reference cell of the entity; the footprint origin or the latest step destination.
    #[must_use]
    pub fn anchor(&self) -> CellCoord {
        self.anchor
    }

    /// Static record supplied when the entity was spawned.
    #[must_use]
    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }
}

/// Coordinate to placement index with insertion-ordered layering.
///
/// Every cell key maps to the entities covering it, oldest first; the last
/// entry is the top occupant. Keys with no covering entity are removed so the
/// key set always equals the union of all placements' covered cells.
#[derive(Clone, Debug, Default)]
pub struct OccupancyStore {
    cells: BTreeMap<CellCoord, Vec<EntityId>>,
    placements: BTreeMap<EntityId, Placement>,
    stale: BTreeSet<CellCoord>,
}

impl OccupancyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells covered by a footprint anchored at `anchor`, in row-major order.
    #[must_use]
    pub fn footprint(anchor: CellCoord, size: CellRectSize) -> Vec<CellCoord> {
        CellRect::from_origin_and_size(anchor, size).cells()
    }

    /// Records a new placement, stacking it above anything already covering its cells.
    ///
    /// Overlap is not rejected here; callers decide whether a shared cell is
    /// acceptable before calling.
    pub fn add_placement(
        &mut self,
        anchor: CellCoord,
        size: CellRectSize,
        descriptor: EntityDescriptor,
        entity: EntityId,
    ) -> Result<&Placement, OccupancyError> {
        if self.placements.contains_key(&entity) {
            return Err(OccupancyError::DuplicateEntity { entity });
        }

        let occupied = Self::footprint(anchor, size);
        for cell in &occupied {
            self.cells.entry(*cell).or_default().push(entity);
            let _ = self.stale.insert(*cell);
        }

        let placement = Placement {
            entity,
            occupied,
            anchor,
            descriptor,
        };
        Ok(self.placements.entry(entity).or_insert(placement))
    }

    /// Reports whether every cell of the footprint is uncovered.
    #[must_use]
    pub fn can_place_at(&self, anchor: CellCoord, size: CellRectSize) -> bool {
        Self::footprint(anchor, size)
            .into_iter()
            .all(|cell| self.is_walkable(cell))
    }

    /// Returns the most recently stacked placement covering the cell.
    #[must_use]
    pub fn top_placement_at(&self, cell: CellCoord) -> Option<&Placement> {
        self.cells
            .get(&cell)
            .and_then(|entities| entities.last())
            .and_then(|entity| self.placements.get(entity))
    }

    /// Returns the placement of `entity` if it covers the cell.
    #[must_use]
    pub fn placement_at(&self, cell: CellCoord, entity: EntityId) -> Option<&Placement> {
        self.cells
            .get(&cell)
            .and_then(|entities| entities.iter().rev().find(|candidate| **candidate == entity))
            .and_then(|entity| self.placements.get(entity))
    }

    /// Returns the placement of `entity` wherever it is.
    #[must_use]
    pub fn placement_of(&self, entity: EntityId) -> Option<&Placement> {
        self.placements.get(&entity)
    }

    /// Entities covering the cell, bottom layer first.
    #[must_use]
    pub fn covering(&self, cell: CellCoord) -> &[EntityId] {
        self.cells.get(&cell).map_or(&[][..], Vec::as_slice)
    }

    /// Iterator over every placement ordered by entity identifier.
    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.placements.values()
    }

    /// Iterator over every covered cell.
    pub fn covered_cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.cells.keys().copied()
    }

    /// Extends the entity's footprint with `cell` and moves its anchor there.
    ///
    /// The entity keeps every cell it already covers, so a stepping unit
    /// holds both its origin and destination until the origin is released.
    pub fn move_occupied_coordinate(
        &mut self,
        entity: EntityId,
        cell: CellCoord,
    ) -> Result<(), OccupancyError> {
        let placement = self
            .placements
            .get_mut(&entity)
            .ok_or(OccupancyError::MissingPlacement { entity })?;

        if placement.occupied.contains(&cell) {
            return Err(OccupancyError::DuplicateCell { entity, cell });
        }

        placement.occupied.push(cell);
        placement.anchor = cell;
        self.cells.entry(cell).or_default().push(entity);
        let _ = self.stale.insert(cell);
        Ok(())
    }

    /// Removes a single cell from the entity's footprint.
    pub fn release_occupied_coordinate(
        &mut self,
        entity: EntityId,
        cell: CellCoord,
    ) -> Result<(), OccupancyError> {
        let recorded = self
            .cells
            .get(&cell)
            .is_some_and(|entities| entities.contains(&entity));
        if !recorded {
            return Err(OccupancyError::UnrecordedRelease { entity, cell });
        }

        let placement = self
            .placements
            .get_mut(&entity)
            .ok_or(OccupancyError::MissingPlacement { entity })?;
        if placement.occupied.len() <= 1 {
            return Err(OccupancyError::LastCell { entity, cell });
        }

        placement.occupied.retain(|covered| *covered != cell);
        if placement.anchor == cell {
            if let Some(last) = placement.occupied.last() {
                placement.anchor = *last;
            }
        }

        self.unindex(entity, cell);
        Ok(())
    }

    /// Removes every cell of the entity's placement, located through `cell`.
    ///
    /// Returns `None` without touching the store when the entity does not
    /// cover `cell`, so repeated removals are harmless.
    pub fn remove_all_at(&mut self, entity: EntityId, cell: CellCoord) -> Option<Placement> {
        let _ = self.placement_at(cell, entity)?;
        let placement = self.placements.remove(&entity)?;
        for covered in &placement.occupied {
            self.unindex(entity, *covered);
        }
        Some(placement)
    }

    /// Reports whether no placement covers the cell.
    #[must_use]
    pub fn is_walkable(&self, cell: CellCoord) -> bool {
        !self.cells.contains_key(&cell)
    }

    /// Drains the cells whose walkability may have changed since the last call.
    pub fn take_stale(&mut self) -> Vec<CellCoord> {
        std::mem::take(&mut self.stale).into_iter().collect()
    }

    /// Drops every placement, marking all previously covered cells stale.
    pub fn clear(&mut self) {
        let covered: Vec<CellCoord> = self.cells.keys().copied().collect();
        self.stale.extend(covered);
        self.cells.clear();
        self.placements.clear();
    }

    fn unindex(&mut self, entity: EntityId, cell: CellCoord) {
        let Some(entities) = self.cells.get_mut(&cell) else {
            return;
        };
        if let Some(position) = entities.iter().rposition(|candidate| *candidate == entity) {
            let _ = entities.remove(position);
        }
        if entities.is_empty() {
            let _ = self.cells.remove(&cell);
        }
        let _ = self.stale.insert(cell);
    }
}
