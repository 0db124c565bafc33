#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative board state management for Garrison.

mod entities;
pub mod graph;
pub mod occupancy;

use std::time::Duration;

use garrison_core::{
    CellCoord, CellRect, Command, Damage, EntityDescriptor, EntityId, Event, HeadlessFactory,
    PlacementError, RemovalError, StepError, VisualFactory,
};
use log::{debug, error, warn};
use thiserror::Error;

use crate::{
    entities::{EntityRegistry, EntityState},
    graph::CellGraph,
    occupancy::{OccupancyError, OccupancyStore},
};

const DEFAULT_GRID_COLUMNS: u32 = 16;
const DEFAULT_GRID_ROWS: u32 = 12;

/// Configuration parameters required to construct the world.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    columns: u32,
    rows: u32,
}

impl Config {
    /// Creates a new configuration with the provided board dimensions.
    #[must_use]
    pub const fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_COLUMNS, DEFAULT_GRID_ROWS)
    }
}

/// Failures raised while applying a command that indicate broken bookkeeping.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    /// The occupancy store rejected an update.
    #[error(transparent)]
    Occupancy(#[from] OccupancyError),
}

/// Represents the authoritative Garrison board state.
#[derive(Debug)]
pub struct World {
    graph: CellGraph,
    occupancy: OccupancyStore,
    entities: EntityRegistry,
    factory: Box<dyn VisualFactory>,
    elapsed: Duration,
}

impl World {
    /// Creates a new world with the default board and no visual adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a new world with the provided configuration and no visual adapter.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::with_factory(config, Box::new(HeadlessFactory::default()))
    }

    /// Creates a new world that materialises entities through `factory`.
    #[must_use]
    pub fn with_factory(config: Config, factory: Box<dyn VisualFactory>) -> Self {
        Self {
            graph: CellGraph::new(config.columns, config.rows),
            occupancy: OccupancyStore::new(),
            entities: EntityRegistry::new(),
            factory,
            elapsed: Duration::ZERO,
        }
    }

    fn fits(&self, region: CellRect) -> bool {
        let size = region.size();
        if size.is_empty() {
            return false;
        }
        let origin = region.origin();
        let last_column = origin.column().checked_add(size.width() - 1);
        let last_row = origin.row().checked_add(size.height() - 1);
        match (last_column, last_row) {
            (Some(column), Some(row)) => self.graph.contains(CellCoord::new(column, row)),
            _ => false,
        }
    }

    fn spawn_entity(
        &mut self,
        descriptor: EntityDescriptor,
        origin: CellCoord,
        out_events: &mut Vec<Event>,
    ) -> Result<EntityId, WorldError> {
        let entity = self.entities.allocate();
        let handle = self.factory.spawn(&descriptor, origin);
        let kind = descriptor.kind;
        let size = descriptor.size;
        let state = EntityState {
            kind,
            health: descriptor.health,
            damage: descriptor.damage,
            speed: descriptor.speed,
            handle,
            step_origin: None,
        };

        if let Err(err) = self
            .occupancy
            .add_placement(origin, size, descriptor, entity)
        {
            self.factory.despawn(handle);
            return Err(err.into());
        }
        self.entities.insert(entity, state);

        out_events.push(Event::EntityPlaced {
            entity,
            kind,
            region: CellRect::from_origin_and_size(origin, size),
        });
        Ok(entity)
    }

    fn despawn_entity(&mut self, entity: EntityId, cell: CellCoord, out_events: &mut Vec<Event>) {
        let Some(placement) = self.occupancy.remove_all_at(entity, cell) else {
            return;
        };
        if let Some(state) = self.entities.remove(entity) {
            self.factory.despawn(state.handle);
        }
        out_events.push(Event::EntityRemoved {
            entity,
            cells: placement.occupied().to_vec(),
        });
    }

    fn place(
        &mut self,
        descriptor: EntityDescriptor,
        origin: CellCoord,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        let region = CellRect::from_origin_and_size(origin, descriptor.size);
        let rejection = if descriptor.size.is_empty() {
            Some(PlacementError::EmptyFootprint)
        } else if !self.fits(region) {
            Some(PlacementError::OutOfBounds)
        } else if !self.occupancy.can_place_at(origin, descriptor.size) {
            Some(PlacementError::Occupied)
        } else {
            None
        };

        if let Some(reason) = rejection {
            debug!("rejected placement of {} at {origin:?}: {reason:?}", descriptor.name);
            out_events.push(Event::PlacementRejected {
                name: descriptor.name,
                origin,
                reason,
            });
            return Ok(());
        }

        let _ = self.spawn_entity(descriptor, origin, out_events)?;
        Ok(())
    }

    fn spawn_product(
        &mut self,
        producer: EntityId,
        product: EntityDescriptor,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        let producer_placement = self.occupancy.placement_of(producer);
        let anchor = producer_placement.map(|placement| placement.anchor());
        let listed = producer_placement
            .is_some_and(|placement| placement.descriptor().products.contains(&product.name));

        let rejection = match anchor.filter(|_| listed) {
            None => Some(PlacementError::InvalidProducer),
            Some(_) if product.size.is_empty() => Some(PlacementError::EmptyFootprint),
            Some(origin) if !self.fits(CellRect::from_origin_and_size(origin, product.size)) => {
                Some(PlacementError::OutOfBounds)
            }
            Some(origin) if self.covers_unit(origin, &product) => Some(PlacementError::Occupied),
            Some(_) => None,
        };

        let Some(origin) = anchor.filter(|_| rejection.is_none()) else {
            let reason = rejection.unwrap_or(PlacementError::InvalidProducer);
            if reason == PlacementError::InvalidProducer {
                warn!("entity {} cannot produce {}", producer.get(), product.name);
            } else {
                debug!("product {} held back at {anchor:?}: {reason:?}", product.name);
            }
            out_events.push(Event::ProductRejected {
                producer,
                name: product.name,
                origin: anchor,
                reason,
            });
            return Ok(());
        };

        let _ = self.spawn_entity(product, origin, out_events)?;
        Ok(())
    }

    fn covers_unit(&self, origin: CellCoord, product: &EntityDescriptor) -> bool {
        OccupancyStore::footprint(origin, product.size)
            .into_iter()
            .any(|cell| {
                self.occupancy
                    .top_placement_at(cell)
                    .is_some_and(|top| top.descriptor().kind.is_mobile())
            })
    }

    fn begin_step(
        &mut self,
        entity: EntityId,
        to: CellCoord,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        let from = self.occupancy.placement_of(entity).map(|placement| placement.anchor());
        let state = self.entities.get(entity);
        let rejection = match (state, from) {
            (Some(state), Some(from)) if state.kind.is_mobile() => {
                if state.step_origin.is_some() {
                    Some(StepError::AlreadyStepping)
                } else if !self.graph.contains(to) {
                    Some(StepError::OutOfBounds)
                } else if !from.is_adjacent_to(to) {
                    Some(StepError::NotAdjacent)
                } else if !self.graph.walkable(to, &self.occupancy) {
                    Some(StepError::Blocked)
                } else {
                    None
                }
            }
            _ => Some(StepError::UnknownEntity),
        };

        let Some(from) = from.filter(|_| rejection.is_none()) else {
            let reason = rejection.unwrap_or(StepError::UnknownEntity);
            debug!("entity {} cannot step to {to:?}: {reason:?}", entity.get());
            out_events.push(Event::StepRejected { entity, reason });
            return Ok(());
        };

        self.occupancy.move_occupied_coordinate(entity, to)?;
        if let Some(state) = self.entities.get_mut(entity) {
            state.step_origin = Some(from);
        }
        out_events.push(Event::StepStarted { entity, from, to });
        Ok(())
    }

    fn complete_step(
        &mut self,
        entity: EntityId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        let Some(from) = self
            .entities
            .get_mut(entity)
            .and_then(|state| state.step_origin.take())
        else {
            debug!("entity {} has no step to complete", entity.get());
            out_events.push(Event::StepRejected {
                entity,
                reason: StepError::NotStepping,
            });
            return Ok(());
        };

        self.occupancy.release_occupied_coordinate(entity, from)?;
        let to = self
            .occupancy
            .placement_of(entity)
            .map(|placement| placement.anchor())
            .ok_or(OccupancyError::MissingPlacement { entity })?;
        out_events.push(Event::StepCompleted { entity, from, to });
        Ok(())
    }

    fn attack(&mut self, attacker: EntityId, target: EntityId, out_events: &mut Vec<Event>) {
        let Some(damage) = self.entities.get(attacker).map(|state| state.damage) else {
            debug!("attacker {} is gone", attacker.get());
            return;
        };
        self.apply_damage(target, attacker, damage, out_events);
    }

    fn apply_damage(
        &mut self,
        target: EntityId,
        attacker: EntityId,
        damage: Damage,
        out_events: &mut Vec<Event>,
    ) {
        let Some(state) = self.entities.get_mut(target) else {
            debug!("attack target {} is gone", target.get());
            return;
        };
        if state.health.is_zero() {
            return;
        }

        state.health = state.health.saturating_sub(damage);
        let remaining = state.health;
        out_events.push(Event::EntityDamaged {
            entity: target,
            attacker,
            remaining,
        });

        if remaining.is_zero() {
            out_events.push(Event::EntityDestroyed { entity: target });
            if let Some(anchor) = self
                .occupancy
                .placement_of(target)
                .map(|placement| placement.anchor())
            {
                self.despawn_entity(target, anchor, out_events);
            }
        }
    }

    fn reset(&mut self, columns: u32, rows: u32) {
        for (_, state) in self.entities.drain() {
            self.factory.despawn(state.handle);
        }
        self.occupancy.clear();
        let _ = self.occupancy.take_stale();
        self.graph = CellGraph::new(columns, rows);
        self.elapsed = Duration::ZERO;
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Expected failures such as blocked placements or steps are reported as
/// rejection events. An `Err` means occupancy bookkeeping broke and the
/// session can no longer be trusted.
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), WorldError> {
    let result = match command {
        Command::ConfigureGrid { columns, rows } => {
            world.reset(columns, rows);
            out_events.push(Event::GridConfigured { columns, rows });
            Ok(())
        }
        Command::Tick { dt } => {
            world.elapsed = world.elapsed.saturating_add(dt);
            out_events.push(Event::TimeAdvanced { dt });
            Ok(())
        }
        Command::PlaceEntity { descriptor, origin } => world.place(descriptor, origin, out_events),
        Command::SpawnProduct { producer, product } => {
            world.spawn_product(producer, product, out_events)
        }
        Command::RemoveEntity { entity, cell } => {
            if world.occupancy.placement_at(cell, entity).is_none() {
                warn!("no entity {} at {cell:?} to remove", entity.get());
                out_events.push(Event::RemovalRejected {
                    entity,
                    reason: RemovalError::MissingEntity,
                });
            } else {
                world.despawn_entity(entity, cell, out_events);
            }
            Ok(())
        }
        Command::BeginStep { entity, to } => world.begin_step(entity, to, out_events),
        Command::CompleteStep { entity } => world.complete_step(entity, out_events),
        Command::Attack { attacker, target } => {
            world.attack(attacker, target, out_events);
            Ok(())
        }
    };

    world.graph.refresh(&mut world.occupancy, out_events);

    if let Err(err) = &result {
        error!("occupancy invariant violated: {err}");
    }
    result
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use garrison_core::{
        CellCoord, CellGraphView, CellRect, CellRectSize, EntityId, EntityKind, Health, Speed,
    };

    use super::World;
    use crate::{
        graph::CellGraph,
        occupancy::{OccupancyStore, Placement},
    };

    /// Dimensions of the board as `(columns, rows)`.
    #[must_use]
    pub fn dimensions(world: &World) -> (u32, u32) {
        world.graph.dimensions()
    }

    /// Total simulated time since the board was configured.
    #[must_use]
    pub fn elapsed(world: &World) -> Duration {
        world.elapsed
    }

    /// Provides read-only access to the occupancy store.
    #[must_use]
    pub fn occupancy(world: &World) -> &OccupancyStore {
        &world.occupancy
    }

    /// Captures a combined graph and occupancy view for planners.
    #[must_use]
    pub fn board_view(world: &World) -> BoardView<'_> {
        BoardView {
            graph: &world.graph,
            occupancy: &world.occupancy,
        }
    }

    /// Returns the top occupant of the cell, if any.
    #[must_use]
    pub fn top_placement_at(world: &World, cell: CellCoord) -> Option<&Placement> {
        world.occupancy.top_placement_at(cell)
    }

    /// Returns the placement of `entity` if it covers the cell.
    #[must_use]
    pub fn placement_at(world: &World, cell: CellCoord, entity: EntityId) -> Option<&Placement> {
        world.occupancy.placement_at(cell, entity)
    }

    /// Returns the placement of `entity`, if it is still on the board.
    #[must_use]
    pub fn placement_of(world: &World, entity: EntityId) -> Option<&Placement> {
        world.occupancy.placement_of(entity)
    }

    /// Reports whether a footprint is free of occupants.
    #[must_use]
    pub fn can_place_at(world: &World, origin: CellCoord, size: CellRectSize) -> bool {
        world.occupancy.can_place_at(origin, size)
    }

    /// Remaining health of the entity.
    #[must_use]
    pub fn health(world: &World, entity: EntityId) -> Option<Health> {
        world.entities.get(entity).map(|state| state.health)
    }

    /// Captures a read-only view of every entity on the board.
    #[must_use]
    pub fn entity_view(world: &World) -> EntityView {
        let snapshots = world
            .entities
            .iter()
            .filter_map(|(id, state)| {
                let placement = world.occupancy.placement_of(*id)?;
                Some(EntitySnapshot {
                    id: *id,
                    kind: state.kind,
                    anchor: placement.anchor(),
                    cells: placement.occupied().to_vec(),
                    health: state.health,
                    speed: state.speed,
                    stepping: state.step_origin.is_some(),
                })
            })
            .collect();
        EntityView { snapshots }
    }

    /// Read-only snapshot describing all entities on the board.
    #[derive(Clone, Debug, Default)]
    pub struct EntityView {
        snapshots: Vec<EntitySnapshot>,
    }

    impl EntityView {
        /// Iterator over the captured snapshots ordered by identifier.
        pub fn iter(&self) -> impl Iterator<Item = &EntitySnapshot> {
            self.snapshots.iter()
        }

        /// Consumes the view, yielding the underlying snapshots.
        #[must_use]
        pub fn into_vec(self) -> Vec<EntitySnapshot> {
            self.snapshots
        }
    }

    /// Immutable representation of a single entity used for queries.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct EntitySnapshot {
        /// Identifier allocated to the entity.
        pub id: EntityId,
        /// Category of the entity.
        pub kind: EntityKind,
        /// Reference cell of the entity.
        pub anchor: CellCoord,
        /// Cells currently covered by the entity.
        pub cells: Vec<CellCoord>,
        /// Remaining health.
        pub health: Health,
        /// Step speed multiplier.
        pub speed: Speed,
        /// Indicates whether the entity is between two cells.
        pub stepping: bool,
    }

    /// Borrowed view joining the cell graph with the occupancy store.
    #[derive(Clone, Copy, Debug)]
    pub struct BoardView<'a> {
        graph: &'a CellGraph,
        occupancy: &'a OccupancyStore,
    }

    impl<'a> BoardView<'a> {
        /// Returns the top occupant of the cell, if any.
        #[must_use]
        pub fn top_placement_at(&self, cell: CellCoord) -> Option<&'a Placement> {
            self.occupancy.top_placement_at(cell)
        }

        /// Returns the placement of `entity`, if it is still on the board.
        #[must_use]
        pub fn placement_of(&self, entity: EntityId) -> Option<&'a Placement> {
            self.occupancy.placement_of(entity)
        }

        /// Reports whether the footprint lies on the board and is free of occupants.
        #[must_use]
        pub fn can_place(&self, origin: CellCoord, size: CellRectSize) -> bool {
            let cells = CellRect::from_origin_and_size(origin, size).cells();
            !cells.is_empty()
                && u64::try_from(cells.len()).ok()
                    == Some(u64::from(size.width()) * u64::from(size.height()))
                && cells.iter().all(|cell| self.graph.contains(*cell))
                && self.occupancy.can_place_at(origin, size)
        }

        /// Reports whether the cell lies on the board.
        #[must_use]
        pub fn contains(&self, cell: CellCoord) -> bool {
            self.graph.contains(cell)
        }
    }

    impl CellGraphView for BoardView<'_> {
        fn dimensions(&self) -> (u32, u32) {
            self.graph.dimensions()
        }

        fn index(&self, cell: CellCoord) -> Option<usize> {
            self.graph.index(cell)
        }

        fn neighbors(&self, cell: CellCoord) -> &[CellCoord] {
            self.graph.neighbors(cell)
        }

        fn is_walkable(&self, cell: CellCoord) -> bool {
            self.graph.walkable(cell, self.occupancy)
        }
    }
}
