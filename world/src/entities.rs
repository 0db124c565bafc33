//! Authoritative per-entity state that does not belong to the occupancy index.

use std::collections::BTreeMap;

use garrison_core::{CellCoord, Damage, EntityId, EntityKind, Health, Speed, VisualHandle};

/// Mutable state of a placed entity.
#[derive(Clone, Debug)]
pub(crate) struct EntityState {
    /// Category of the entity.
    pub(crate) kind: EntityKind,
    /// Remaining health.
    pub(crate) health: Health,
    /// Damage dealt per attack.
    pub(crate) damage: Damage,
    /// Step speed multiplier.
    pub(crate) speed: Speed,
    /// Adapter handle used to remove the visual representation.
    pub(crate) handle: VisualHandle,
    /// Origin cell of a step in progress.
    pub(crate) step_origin: Option<CellCoord>,
}

/// Registry that stores entities and manages identifier allocation.
#[derive(Debug)]
pub(crate) struct EntityRegistry {
    entries: BTreeMap<EntityId, EntityState>,
    next_entity_id: EntityId,
}

impl EntityRegistry {
    /// Creates an empty registry with a reset identifier counter.
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_entity_id: EntityId::new(0),
        }
    }

    /// Reserves the next identifier; identifiers are never reused.
    pub(crate) fn allocate(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id = EntityId::new(id.get().wrapping_add(1));
        id
    }

    pub(crate) fn insert(&mut self, id: EntityId, state: EntityState) {
        let _ = self.entries.insert(id, state);
    }

    pub(crate) fn get(&self, id: EntityId) -> Option<&EntityState> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityState> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> Option<EntityState> {
        self.entries.remove(&id)
    }

    /// Drains every entity while keeping the identifier counter.
    pub(crate) fn drain(&mut self) -> Vec<(EntityId, EntityState)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&EntityId, &EntityState)> {
        self.entries.iter()
    }
}
