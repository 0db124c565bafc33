#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Garrison engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! views, and respond exclusively with new command batches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Rebuilds the board with the provided dimensions, discarding all entities.
    ConfigureGrid {
        /// Number of cell columns laid out on the board.
        columns: u32,
        /// Number of cell rows laid out on the board.
        rows: u32,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Requests placement of an entity anchored at the provided origin cell.
    PlaceEntity {
        /// Static record describing the entity to place.
        descriptor: EntityDescriptor,
        /// Upper-left cell that defines the entity's footprint.
        origin: CellCoord,
    },
    /// Requests that a building emit one of its products on its own anchor cell.
    SpawnProduct {
        /// Building producing the entity.
        producer: EntityId,
        /// Static record describing the produced entity.
        product: EntityDescriptor,
    },
    /// Requests removal of the entity covering the provided cell.
    RemoveEntity {
        /// Identifier of the entity targeted for removal.
        entity: EntityId,
        /// Any cell currently covered by the entity.
        cell: CellCoord,
    },
    /// Requests that a mobile entity begin a single-cell step.
    ///
    /// The entity occupies both its origin and destination until the matching
    /// [`Command::CompleteStep`] is applied.
    BeginStep {
        /// Identifier of the stepping entity.
        entity: EntityId,
        /// Orthogonally adjacent cell the entity is entering.
        to: CellCoord,
    },
    /// Requests that a mobile entity release the cell it is leaving.
    CompleteStep {
        /// Identifier of the stepping entity.
        entity: EntityId,
    },
    /// Requests that one entity apply its damage to another.
    Attack {
        /// Entity dealing the damage.
        attacker: EntityId,
        /// Entity receiving the damage.
        target: EntityId,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Confirms that the board was rebuilt with new dimensions.
    GridConfigured {
        /// Number of cell columns on the board.
        columns: u32,
        /// Number of cell rows on the board.
        rows: u32,
    },
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that an entity was placed onto the board.
    EntityPlaced {
        /// Identifier allocated to the entity by the world.
        entity: EntityId,
        /// Kind of entity that was placed.
        kind: EntityKind,
        /// Footprint covered by the entity.
        region: CellRect,
    },
    /// Reports that a placement was rejected.
    PlacementRejected {
        /// Name of the descriptor requested for placement.
        name: String,
        /// Origin cell of the rejected footprint.
        origin: CellCoord,
        /// Specific reason the placement failed.
        reason: PlacementError,
    },
    /// Reports that a producer could not emit a product.
    ProductRejected {
        /// Entity asked to produce.
        producer: EntityId,
        /// Name of the product descriptor.
        name: String,
        /// Anchor of the producer, when it is still on the board.
        origin: Option<CellCoord>,
        /// Specific reason the spawn failed.
        reason: PlacementError,
    },
    /// Reports that a removal request did not match any entity.
    RemovalRejected {
        /// Identifier of the entity targeted for removal.
        entity: EntityId,
        /// Specific reason the removal failed.
        reason: RemovalError,
    },
    /// Reports that the cached walkability of a cell flipped.
    WalkabilityChanged {
        /// Cell whose walkability changed.
        cell: CellCoord,
        /// Walkability after the change.
        walkable: bool,
    },
    /// Confirms that an entity now covers both its origin and destination.
    StepStarted {
        /// Identifier of the stepping entity.
        entity: EntityId,
        /// Cell the entity is leaving.
        from: CellCoord,
        /// Cell the entity is entering.
        to: CellCoord,
    },
    /// Reports that a step could not begin or complete.
    StepRejected {
        /// Identifier of the entity whose step failed.
        entity: EntityId,
        /// Specific reason the step failed.
        reason: StepError,
    },
    /// Confirms that an entity released its origin cell.
    StepCompleted {
        /// Identifier of the stepping entity.
        entity: EntityId,
        /// Cell the entity left.
        from: CellCoord,
        /// Cell the entity now occupies.
        to: CellCoord,
    },
    /// Reports that an entity lost health.
    EntityDamaged {
        /// Entity that received damage.
        entity: EntityId,
        /// Entity that dealt the damage.
        attacker: EntityId,
        /// Health remaining after the damage was applied.
        remaining: Health,
    },
    /// Announces that an entity's health reached zero.
    EntityDestroyed {
        /// Identifier of the destroyed entity.
        entity: EntityId,
    },
    /// Confirms that an entity and all of its covered cells left the board.
    EntityRemoved {
        /// Identifier of the removed entity.
        entity: EntityId,
        /// Cells the entity covered before removal.
        cells: Vec<CellCoord>,
    },
}

/// Unique identifier assigned to an entity placed on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
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

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
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

    /// Diagonal-aware cost estimate between two cells.
    ///
    /// Straight moves cost 10 and diagonal moves cost 14, so the estimate is
    /// `min(dx, dy) * 14 + (max(dx, dy) - min(dx, dy)) * 10`. Path costs are
    /// accumulated with the same function even though movement is
    /// orthogonal, which keeps costs comparable with the heuristic.
    #[must_use]
    pub fn octile_distance(self, other: CellCoord) -> u32 {
        let dx = self.column.abs_diff(other.column);
        let dy = self.row.abs_diff(other.row);
        let diagonal = dx.min(dy);
        let straight = dx.max(dy) - diagonal;
        diagonal
            .saturating_mul(DIAGONAL_COST)
            .saturating_add(straight.saturating_mul(STRAIGHT_COST))
    }

    /// Reports whether two cells share an edge.
    #[must_use]
    pub fn is_adjacent_to(self, other: CellCoord) -> bool {
        self.column.abs_diff(other.column) + self.row.abs_diff(other.row) == 1
    }
}

/// Cost of a single orthogonal move.
pub const STRAIGHT_COST: u32 = 10;
/// Cost of a single diagonal move, used by the heuristic.
pub const DIAGONAL_COST: u32 = 14;

/// Axis-aligned rectangle expressed in cell coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRect {
    origin: CellCoord,
    size: CellRectSize,
}

impl CellRect {
    /// Constructs a rectangle from an origin cell and size.
    #[must_use]
    pub const fn from_origin_and_size(origin: CellCoord, size: CellRectSize) -> Self {
        Self { origin, size }
    }

    /// Upper-left cell that anchors the rectangle.
    #[must_use]
    pub const fn origin(&self) -> CellCoord {
        self.origin
    }

    /// Dimensions of the rectangle measured in whole cells.
    #[must_use]
    pub const fn size(&self) -> CellRectSize {
        self.size
    }

    /// Expands the rectangle into its covered cells in row-major order.
    ///
    /// Cells whose coordinates would overflow `u32` are skipped.
    #[must_use]
    pub fn cells(&self) -> Vec<CellCoord> {
        let width = self.size.width();
        let height = self.size.height();
        let capacity = usize::try_from(u64::from(width) * u64::from(height)).unwrap_or(0);
        let mut cells = Vec::with_capacity(capacity);
        for row_offset in 0..height {
            let Some(row) = self.origin.row().checked_add(row_offset) else {
                continue;
            };
            for column_offset in 0..width {
                let Some(column) = self.origin.column().checked_add(column_offset) else {
                    continue;
                };
                cells.push(CellCoord::new(column, row));
            }
        }
        cells
    }
}

/// Size of a [`CellRect`] measured in whole cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRectSize {
    width: u32,
    height: u32,
}

impl CellRectSize {
    /// Creates a new size descriptor with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Footprint of a single cell.
    #[must_use]
    pub const fn single() -> Self {
        Self::new(1, 1)
    }

    /// Width of the rectangle in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the rectangle in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Reports whether the size covers no cells at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Broad category of an entity, which decides whether it can move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Stationary structure that may produce other entities.
    Building,
    /// Mobile unit that follows orders.
    Soldier,
}

impl EntityKind {
    /// Reports whether entities of this kind accept movement orders.
    #[must_use]
    pub const fn is_mobile(self) -> bool {
        matches!(self, Self::Soldier)
    }
}

/// Hit points carried by a damageable entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Health(u32);

impl Health {
    /// Creates a new health value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric health value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Reports whether no health remains.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Subtracts damage, clamping at zero.
    #[must_use]
    pub const fn saturating_sub(self, damage: Damage) -> Self {
        Self(self.0.saturating_sub(damage.get()))
    }
}

/// Flat damage applied by a single attack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Damage(u32);

impl Damage {
    /// Creates a new damage value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric damage value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Movement speed multiplier; a step lasts the base step duration divided by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Speed(u32);

impl Speed {
    /// Creates a new speed value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric speed value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Duration of a single step at this speed. Zero speed behaves as one.
    #[must_use]
    pub fn step_duration(self, base: Duration) -> Duration {
        base / self.0.max(1)
    }
}

/// Immutable record describing an entity, supplied at spawn time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Display name of the entity.
    pub name: String,
    /// Category of the entity.
    pub kind: EntityKind,
    /// Footprint measured in cells.
    pub size: CellRectSize,
    /// Starting health.
    pub health: Health,
    /// Damage dealt per attack. Zero for entities that never attack.
    #[serde(default = "no_damage")]
    pub damage: Damage,
    /// Movement speed. Ignored for stationary entities.
    #[serde(default = "default_speed")]
    pub speed: Speed,
    /// Names of descriptors this entity can produce.
    #[serde(default)]
    pub products: Vec<String>,
}

const fn no_damage() -> Damage {
    Damage::new(0)
}

const fn default_speed() -> Speed {
    Speed::new(1)
}

/// Reasons a placement or product spawn may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementError {
    /// The requested footprint extends beyond the configured grid bounds.
    OutOfBounds,
    /// The requested footprint overlaps an occupied cell.
    Occupied,
    /// The descriptor declares a footprint with no cells.
    EmptyFootprint,
    /// The producing entity does not exist or cannot produce.
    InvalidProducer,
}

/// Reasons a removal request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalError {
    /// No entity with the provided identifier covers the provided cell.
    MissingEntity,
}

/// Reasons a step request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepError {
    /// No mobile entity with the provided identifier exists.
    UnknownEntity,
    /// The destination does not share an edge with the entity's anchor.
    NotAdjacent,
    /// The destination lies outside the grid.
    OutOfBounds,
    /// The destination is covered by another placement.
    Blocked,
    /// The entity is already halfway through a step.
    AlreadyStepping,
    /// The entity has no step in progress to complete.
    NotStepping,
}

/// Opaque handle returned by a [`VisualFactory`] for later removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VisualHandle(u64);

impl VisualHandle {
    /// Wraps an adapter-defined value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the adapter-defined value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Adapter hook that materialises and removes the visual side of entities.
pub trait VisualFactory: std::fmt::Debug {
    /// Creates a representation for a freshly placed entity.
    fn spawn(&mut self, descriptor: &EntityDescriptor, anchor: CellCoord) -> VisualHandle;

    /// Removes a representation previously returned by [`VisualFactory::spawn`].
    fn despawn(&mut self, handle: VisualHandle);
}

/// Factory used when no adapter renders the board.
#[derive(Debug, Default)]
pub struct HeadlessFactory {
    next: u64,
}

impl VisualFactory for HeadlessFactory {
    fn spawn(&mut self, _descriptor: &EntityDescriptor, _anchor: CellCoord) -> VisualHandle {
        let handle = VisualHandle::new(self.next);
        self.next = self.next.wrapping_add(1);
        handle
    }

    fn despawn(&mut self, _handle: VisualHandle) {}
}

/// Read-only graph surface consumed by path searches.
pub trait CellGraphView {
    /// Dimensions of the board as `(columns, rows)`.
    fn dimensions(&self) -> (u32, u32);

    /// Dense row-major index of the cell, if it lies on the board.
    fn index(&self, cell: CellCoord) -> Option<usize>;

    /// Orthogonal neighbours of the cell that lie on the board.
    fn neighbors(&self, cell: CellCoord) -> &[CellCoord];

    /// Reports whether no placement covers the cell.
    fn is_walkable(&self, cell: CellCoord) -> bool;

    /// Number of cells on the board.
    fn cell_count(&self) -> usize {
        let (columns, rows) = self.dimensions();
        usize::try_from(u64::from(columns) * u64::from(rows)).unwrap_or(0)
    }
}
