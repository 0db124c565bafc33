#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Player interaction system that turns cell clicks into placement commands
//! and unit orders.

use garrison_core::{CellCoord, CellRect, Command, EntityDescriptor, EntityId, Event};
use garrison_world::query::BoardView;
use log::{debug, warn};

/// Declarative placement preview describing a potential construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacementPreview {
    /// Name of the descriptor proposed for placement.
    pub name: String,
    /// Region of cells the entity would cover.
    pub region: CellRect,
    /// Indicates whether the preview represents a valid placement location.
    pub placeable: bool,
}

/// Order for the selected unit produced by a secondary action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitOrder {
    /// Walk to the empty cell.
    MoveTo(CellCoord),
    /// Approach and attack the entity.
    Attack(EntityId),
}

/// Interaction mode selected by the player.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Clicks select entities and issue orders to the selected unit.
    #[default]
    Information,
    /// Clicks place copies of the descriptor.
    Placement(EntityDescriptor),
}

/// Interaction system tracking the active mode and the selected entity.
#[derive(Clone, Debug, Default)]
pub struct Interaction {
    mode: Mode,
    selected: Option<EntityId>,
}

impl Interaction {
    /// Creates a new interaction system in information mode.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: Mode::Information,
            selected: None,
        }
    }

    /// Switches to placement mode for the provided descriptor.
    pub fn start_placement(&mut self, descriptor: EntityDescriptor) {
        debug!("placement mode for {}", descriptor.name);
        self.mode = Mode::Placement(descriptor);
        self.selected = None;
    }

    /// Switches to information mode.
    pub fn start_information(&mut self) {
        self.mode = Mode::Information;
    }

    /// Active interaction mode.
    #[must_use]
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Entity selected in information mode.
    #[must_use]
    pub fn selected(&self) -> Option<EntityId> {
        self.selected
    }

    /// Drops the selection once the selected entity leaves the board.
    pub fn handle(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::EntityRemoved { entity, .. } if self.selected == Some(*entity) => {
                    self.selected = None;
                }
                Event::GridConfigured { .. } => self.selected = None,
                _ => {}
            }
        }
    }

    /// Describes what a primary action at `cell` would place.
    #[must_use]
    pub fn preview(&self, cell: CellCoord, board: &BoardView<'_>) -> Option<PlacementPreview> {
        let Mode::Placement(descriptor) = &self.mode else {
            return None;
        };
        Some(PlacementPreview {
            name: descriptor.name.clone(),
            region: CellRect::from_origin_and_size(cell, descriptor.size),
            placeable: board.can_place(cell, descriptor.size),
        })
    }

    /// Places the active descriptor or selects the entity at `cell`.
    pub fn primary_action(
        &mut self,
        cell: CellCoord,
        board: &BoardView<'_>,
        out: &mut Vec<Command>,
    ) {
        match &self.mode {
            Mode::Placement(descriptor) => {
                if board.can_place(cell, descriptor.size) {
                    out.push(Command::PlaceEntity {
                        descriptor: descriptor.clone(),
                        origin: cell,
                    });
                } else {
                    debug!("cannot place {} at {cell:?}", descriptor.name);
                }
            }
            Mode::Information => {
                self.selected = board.top_placement_at(cell).map(|top| top.entity());
            }
        }
    }

    /// Translates a secondary action at `cell` into an order for the selected unit.
    #[must_use]
    pub fn secondary_action(&self, cell: CellCoord, board: &BoardView<'_>) -> Option<UnitOrder> {
        if self.mode != Mode::Information {
            return None;
        }
        let Some(selected) = self.selected else {
            warn!("secondary action at {cell:?} without a selection");
            return None;
        };
        let is_unit = board
            .placement_of(selected)
            .is_some_and(|placement| placement.descriptor().kind.is_mobile());
        if !is_unit {
            warn!("entity {} cannot take orders", selected.get());
            return None;
        }
        if !board.contains(cell) {
            warn!("secondary action at {cell:?} lies off the board");
            return None;
        }

        match board.top_placement_at(cell).map(|top| top.entity()) {
            None => Some(UnitOrder::MoveTo(cell)),
            Some(entity) if entity == selected => None,
            Some(entity) => Some(UnitOrder::Attack(entity)),
        }
    }
}
