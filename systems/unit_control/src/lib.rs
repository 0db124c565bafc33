#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Unit movement and targeting controller.
//!
//! The controller keeps a small state machine per mobile unit. Orders record a
//! requested goal; a unit that is between two cells only adopts the latest
//! request once its current step completes. Every step is proposed to the
//! world as [`Command::BeginStep`] and finished with [`Command::CompleteStep`]
//! after the unit's step duration elapsed.

use std::{collections::BTreeMap, time::Duration};

use garrison_core::{CellCoord, Command, EntityId, Event, Speed, StepError};
use garrison_system_pathfinding::{PathEngine, PathError};
use garrison_world::query::BoardView;
use log::{debug, warn};
use thiserror::Error;

const DEFAULT_STEP_DURATION: Duration = Duration::from_millis(100);

/// Configuration parameters for the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    step_duration: Duration,
    path: garrison_system_pathfinding::Config,
}

impl Config {
    /// Creates a new configuration with the base duration of a single step.
    #[must_use]
    pub fn new(step_duration: Duration) -> Self {
        Self {
            step_duration,
            path: garrison_system_pathfinding::Config::default(),
        }
    }

    /// Replaces the path engine configuration.
    #[must_use]
    pub fn with_path_config(mut self, path: garrison_system_pathfinding::Config) -> Self {
        self.path = path;
        self
    }

    /// Duration of one step at unit speed.
    #[must_use]
    pub const fn step_duration(&self) -> Duration {
        self.step_duration
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_DURATION)
    }
}

/// Failures raised while steering units.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    /// The order addressed an entity that is not a registered unit.
    #[error("entity {} is not a controllable unit", unit.get())]
    UnknownUnit {
        /// Entity named by the order.
        unit: EntityId,
    },
    /// The path engine detected broken bookkeeping.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Movement phase of a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// The unit stands on a single cell and waits for orders.
    Idle,
    /// A step was proposed and awaits the world's verdict.
    Requested {
        /// Destination of the proposed step.
        to: CellCoord,
    },
    /// The unit holds both cells while walking between them.
    Stepping {
        /// Cell the step started from.
        from: CellCoord,
        /// Destination of the step.
        to: CellCoord,
        /// Time spent walking so far.
        elapsed: Duration,
        /// Time the step takes in total.
        duration: Duration,
    },
    /// The step finished walking and awaits the world's confirmation.
    Completing {
        /// Destination of the step.
        to: CellCoord,
    },
}

impl Phase {
    /// Reports whether the unit is between orders.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Steering state tracked for a single unit.
#[derive(Clone, Debug)]
pub struct UnitState {
    speed: Speed,
    requested_cell: Option<CellCoord>,
    requested_target: Option<EntityId>,
    committed_cell: Option<CellCoord>,
    committed_target: Option<EntityId>,
    path: Vec<CellCoord>,
    phase: Phase,
}

impl UnitState {
    fn new(speed: Speed) -> Self {
        Self {
            speed,
            requested_cell: None,
            requested_target: None,
            committed_cell: None,
            committed_target: None,
            path: Vec::new(),
            phase: Phase::Idle,
        }
    }

    /// Current movement phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Goal cell the unit is currently walking towards.
    #[must_use]
    pub fn target_cell(&self) -> Option<CellCoord> {
        self.committed_cell
    }

    /// Entity the unit is currently pursuing.
    #[must_use]
    pub fn target_entity(&self) -> Option<EntityId> {
        self.committed_target
    }

    /// Remaining cells of the planned route, excluding the current cell.
    #[must_use]
    pub fn path(&self) -> &[CellCoord] {
        &self.path
    }

    fn adopt_requests(&mut self) {
        self.committed_cell = self.requested_cell;
        self.committed_target = self.requested_target;
    }

    fn forget_target(&mut self, target: EntityId) -> bool {
        let mut forgot = false;
        if self.requested_target == Some(target) {
            self.requested_target = None;
            forgot = true;
        }
        if self.committed_target == Some(target) {
            self.committed_target = None;
            forgot = true;
        }
        forgot
    }
}

/// Pure system that steers units towards cells and hostile entities.
#[derive(Debug, Default)]
pub struct UnitControl {
    config: Config,
    engine: PathEngine,
    units: BTreeMap<EntityId, UnitState>,
}

impl UnitControl {
    /// Creates a new controller using the provided configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            engine: PathEngine::new(config.path),
            units: BTreeMap::new(),
        }
    }

    /// Steering state of the unit, if it is registered.
    #[must_use]
    pub fn unit(&self, unit: EntityId) -> Option<&UnitState> {
        self.units.get(&unit)
    }

    /// Remaining route of the unit, excluding its current cell.
    #[must_use]
    pub fn current_path(&self, unit: EntityId) -> Option<&[CellCoord]> {
        self.units.get(&unit).map(UnitState::path)
    }

    /// Identifiers of every registered unit in ascending order.
    pub fn units(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.units.keys().copied()
    }

    /// Orders the unit to walk to `cell`, dropping any pursued entity.
    pub fn set_target_cell(
        &mut self,
        unit: EntityId,
        cell: CellCoord,
        board: &BoardView<'_>,
        out: &mut Vec<Command>,
    ) -> Result<(), ControlError> {
        let state = self
            .units
            .get_mut(&unit)
            .ok_or(ControlError::UnknownUnit { unit })?;
        state.requested_cell = Some(cell);
        state.requested_target = None;

        if !state.phase.is_idle() {
            debug!("unit {} will head for {cell:?} after its step", unit.get());
            return Ok(());
        }

        state.adopt_requests();
        self.move_command(unit, board, out)
    }

    /// Orders the unit to approach and attack `target`.
    ///
    /// The order is dropped when no empty cell next to the target can be
    /// reached.
    pub fn set_target_entity(
        &mut self,
        unit: EntityId,
        target: EntityId,
        board: &BoardView<'_>,
        out: &mut Vec<Command>,
    ) -> Result<(), ControlError> {
        let state = self
            .units
            .get_mut(&unit)
            .ok_or(ControlError::UnknownUnit { unit })?;

        if target == unit {
            debug!("unit {} ignores an order to attack itself", unit.get());
            return Ok(());
        }
        let (Some(current), Some(footprint)) = (
            board.placement_of(unit).map(|placement| placement.anchor()),
            board.placement_of(target).map(|placement| placement.occupied()),
        ) else {
            debug!("unit {} cannot see target {}", unit.get(), target.get());
            return Ok(());
        };

        let Some(cell) = self
            .engine
            .find_closest_empty_tile(board, current, footprint)?
        else {
            debug!(
                "no empty cell next to {} reachable by unit {}",
                target.get(),
                unit.get()
            );
            return Ok(());
        };

        state.requested_target = Some(target);
        state.requested_cell = Some(cell);
        if !state.phase.is_idle() {
            return Ok(());
        }

        state.adopt_requests();
        self.move_command(unit, board, out)
    }

    /// Consumes world events and emits step and attack commands.
    pub fn handle(
        &mut self,
        events: &[Event],
        board: &BoardView<'_>,
        out: &mut Vec<Command>,
    ) -> Result<(), ControlError> {
        for event in events {
            match event {
                Event::GridConfigured { .. } => self.units.clear(),
                Event::EntityPlaced { entity, kind, .. } if kind.is_mobile() => {
                    let speed = board
                        .placement_of(*entity)
                        .map_or(Speed::new(1), |placement| placement.descriptor().speed);
                    let _ = self.units.insert(*entity, UnitState::new(speed));
                }
                Event::EntityRemoved { entity, .. } => self.forget(*entity),
                Event::TimeAdvanced { dt } => self.advance(*dt, out),
                Event::StepStarted { entity, from, to } => self.step_started(*entity, *from, *to),
                Event::StepRejected { entity, reason } => {
                    self.step_rejected(*entity, *reason, board, out)?;
                }
                Event::StepCompleted { entity, .. } => self.step_completed(*entity, board, out)?,
                _ => {}
            }
        }

        Ok(())
    }

    fn forget(&mut self, entity: EntityId) {
        if self.units.remove(&entity).is_some() {
            debug!("unit {} left the board", entity.get());
        }
        for (unit, state) in &mut self.units {
            if state.forget_target(entity) {
                debug!("unit {} lost target {}", unit.get(), entity.get());
            }
        }
    }

    fn advance(&mut self, dt: Duration, out: &mut Vec<Command>) {
        for (unit, state) in &mut self.units {
            let Phase::Stepping {
                to,
                elapsed,
                duration,
                ..
            } = &mut state.phase
            else {
                continue;
            };

            *elapsed = elapsed.saturating_add(dt);
            if *elapsed >= *duration {
                let to = *to;
                state.phase = Phase::Completing { to };
                out.push(Command::CompleteStep { entity: *unit });
            }
        }
    }

    fn step_started(&mut self, unit: EntityId, from: CellCoord, to: CellCoord) {
        let base = self.config.step_duration;
        let Some(state) = self.units.get_mut(&unit) else {
            return;
        };
        if state.phase != (Phase::Requested { to }) {
            warn!("unit {} started an unexpected step to {to:?}", unit.get());
        }
        if state.path.first() == Some(&to) {
            let _ = state.path.remove(0);
        }
        state.phase = Phase::Stepping {
            from,
            to,
            elapsed: Duration::ZERO,
            duration: state.speed.step_duration(base),
        };
    }

    fn step_rejected(
        &mut self,
        unit: EntityId,
        reason: StepError,
        board: &BoardView<'_>,
        out: &mut Vec<Command>,
    ) -> Result<(), ControlError> {
        let Some(state) = self.units.get_mut(&unit) else {
            return Ok(());
        };
        if !matches!(state.phase, Phase::Requested { .. }) {
            warn!("unit {} saw a stray step rejection: {reason:?}", unit.get());
            return Ok(());
        }

        debug!("unit {} replans after {reason:?}", unit.get());
        let reordered = state.requested_cell != state.committed_cell
            || state.requested_target != state.committed_target;
        state.phase = Phase::Idle;
        state.path.clear();
        state.adopt_requests();
        if reason != StepError::Blocked && !reordered {
            return Ok(());
        }
        self.pursue(unit, board, out)
    }

    fn step_completed(
        &mut self,
        unit: EntityId,
        board: &BoardView<'_>,
        out: &mut Vec<Command>,
    ) -> Result<(), ControlError> {
        let Some(state) = self.units.get_mut(&unit) else {
            return Ok(());
        };
        state.phase = Phase::Idle;
        state.adopt_requests();
        self.pursue(unit, board, out)
    }

    /// Refreshes the goal next to a pursued entity, then moves towards the goal.
    fn pursue(
        &mut self,
        unit: EntityId,
        board: &BoardView<'_>,
        out: &mut Vec<Command>,
    ) -> Result<(), ControlError> {
        let Some(state) = self.units.get_mut(&unit) else {
            return Ok(());
        };
        let Some(target) = state.committed_target else {
            return self.move_command(unit, board, out);
        };
        let (Some(current), Some(footprint)) = (
            board.placement_of(unit).map(|placement| placement.anchor()),
            board.placement_of(target).map(|placement| placement.occupied()),
        ) else {
            let _ = state.forget_target(target);
            return self.move_command(unit, board, out);
        };

        if let Some(cell) = self
            .engine
            .find_closest_empty_tile(board, current, footprint)?
        {
            state.committed_cell = Some(cell);
        }
        self.move_command(unit, board, out)
    }

    fn move_command(
        &mut self,
        unit: EntityId,
        board: &BoardView<'_>,
        out: &mut Vec<Command>,
    ) -> Result<(), ControlError> {
        let Some(state) = self.units.get_mut(&unit) else {
            return Ok(());
        };
        state.path.clear();

        let (Some(current), Some(goal)) = (
            board.placement_of(unit).map(|placement| placement.anchor()),
            state.committed_cell,
        ) else {
            return Ok(());
        };

        if current == goal {
            if let Some(target) = state
                .committed_target
                .filter(|target| board.placement_of(*target).is_some())
            {
                out.push(Command::Attack {
                    attacker: unit,
                    target,
                });
            }
            return Ok(());
        }

        let path = self
            .engine
            .find_path(board, current, goal)?
            .unwrap_or_default();
        let Some(&next) = path.first() else {
            debug!("unit {} has no route to {goal:?}", unit.get());
            return Ok(());
        };

        state.path = path;
        state.phase = Phase::Requested { to: next };
        out.push(Command::BeginStep {
            entity: unit,
            to: next,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_duration_scales_with_speed() {
        let config = Config::new(Duration::from_millis(300));
        assert_eq!(
            Speed::new(3).step_duration(config.step_duration()),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn forgetting_target_clears_requested_and_committed() {
        let target = EntityId::new(7);
        let mut state = UnitState::new(Speed::new(1));
        state.requested_target = Some(target);
        state.committed_target = Some(target);
        state.committed_cell = Some(CellCoord::new(1, 1));

        assert!(state.forget_target(target));
        assert_eq!(state.target_entity(), None);
        assert_eq!(state.target_cell(), Some(CellCoord::new(1, 1)));
        assert!(!state.forget_target(target));
    }

    #[test]
    fn orders_for_unknown_units_fail() {
        let world = garrison_world::World::new();
        let board = garrison_world::query::board_view(&world);
        let mut control = UnitControl::default();
        let mut out = Vec::new();

        assert_eq!(
            control.set_target_cell(EntityId::new(3), CellCoord::new(0, 0), &board, &mut out),
            Err(ControlError::UnknownUnit {
                unit: EntityId::new(3)
            })
        );
        assert!(out.is_empty());
    }
}
