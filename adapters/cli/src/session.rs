//! Headless session wiring the world to the player-facing systems.

use std::{fmt::Write as _, time::Duration};

use anyhow::{Context, Result};
use garrison_core::{CellCoord, Command, EntityKind, Event};
use garrison_system_interaction::{Interaction, UnitOrder};
use garrison_system_unit_control::{self as unit_control, UnitControl};
use garrison_world::{self as world, query, World};
use log::{debug, info, warn};

use crate::scenario::{Action, Scenario};

/// World plus the systems that react to its events.
#[derive(Debug)]
pub(crate) struct Session {
    world: World,
    control: UnitControl,
    interaction: Interaction,
    tick: Duration,
}

impl Session {
    /// Creates a session with an empty board sized for the scenario.
    pub(crate) fn new(scenario: &Scenario, config: unit_control::Config, tick: Duration) -> Self {
        Self {
            world: World::with_config(world::Config::new(scenario.columns, scenario.rows)),
            control: UnitControl::new(config),
            interaction: Interaction::new(),
            tick,
        }
    }

    /// Replays every scripted action in order.
    pub(crate) fn run(&mut self, scenario: &Scenario) -> Result<()> {
        for (index, action) in scenario.actions.iter().enumerate() {
            self.perform(scenario, action)
                .with_context(|| format!("action #{index} failed: {action:?}"))?;
        }
        Ok(())
    }

    fn perform(&mut self, scenario: &Scenario, action: &Action) -> Result<()> {
        match action {
            Action::Place { name, origin } => {
                let descriptor = scenario
                    .descriptor(name)
                    .with_context(|| format!("unknown catalog entry '{name}'"))?;
                self.interaction.start_placement(descriptor.clone());
                let mut commands = Vec::new();
                self.interaction.primary_action(
                    *origin,
                    &query::board_view(&self.world),
                    &mut commands,
                );
                self.interaction.start_information();
                if commands.is_empty() {
                    warn!("{name} does not fit at {origin:?}");
                }
                self.execute(commands)
            }
            Action::Select { cell } => {
                let mut commands = Vec::new();
                self.interaction.primary_action(
                    *cell,
                    &query::board_view(&self.world),
                    &mut commands,
                );
                self.execute(commands)
            }
            Action::Order { cell } => self.order(*cell),
            Action::Produce { cell, product } => {
                let product = scenario
                    .descriptor(product)
                    .with_context(|| format!("unknown catalog entry '{product}'"))?
                    .clone();
                let Some(producer) = query::top_placement_at(&self.world, *cell)
                    .map(|placement| placement.entity())
                else {
                    warn!("nothing at {cell:?} can produce {}", product.name);
                    return Ok(());
                };
                self.execute(vec![Command::SpawnProduct { producer, product }])
            }
            Action::Wait { ticks } => {
                for _ in 0..*ticks {
                    self.execute(vec![Command::Tick { dt: self.tick }])?;
                }
                Ok(())
            }
        }
    }

    fn order(&mut self, cell: CellCoord) -> Result<()> {
        let mut commands = Vec::new();
        {
            let board = query::board_view(&self.world);
            let (Some(unit), Some(order)) = (
                self.interaction.selected(),
                self.interaction.secondary_action(cell, &board),
            ) else {
                return Ok(());
            };
            match order {
                UnitOrder::MoveTo(cell) => {
                    self.control
                        .set_target_cell(unit, cell, &board, &mut commands)?;
                }
                UnitOrder::Attack(target) => {
                    self.control
                        .set_target_entity(unit, target, &board, &mut commands)?;
                }
            }
        }
        self.execute(commands)
    }

    fn execute(&mut self, commands: Vec<Command>) -> Result<()> {
        let mut events = Vec::new();
        for command in commands {
            world::apply(&mut self.world, command, &mut events)?;
        }
        self.pump(events)
    }

    fn pump(&mut self, mut events: Vec<Event>) -> Result<()> {
        while !events.is_empty() {
            for event in &events {
                log_event(event);
            }
            self.interaction.handle(&events);

            let mut commands = Vec::new();
            {
                let board = query::board_view(&self.world);
                self.control.handle(&events, &board, &mut commands)?;
            }

            events.clear();
            for command in commands {
                world::apply(&mut self.world, command, &mut events)?;
            }
        }
        Ok(())
    }

    /// Number of entities currently on the board.
    pub(crate) fn entity_count(&self) -> usize {
        query::entity_view(&self.world).iter().count()
    }

    /// Draws the board with one character per cell.
    pub(crate) fn render(&self) -> String {
        let (columns, rows) = query::dimensions(&self.world);
        let mut board = String::new();
        for row in 0..rows {
            for column in 0..columns {
                let glyph = match query::top_placement_at(&self.world, CellCoord::new(column, row))
                    .map(|placement| placement.descriptor().kind)
                {
                    None => '.',
                    Some(EntityKind::Building) => '#',
                    Some(EntityKind::Soldier) => 's',
                };
                board.push(glyph);
            }
            board.push('\n');
        }
        let _ = write!(
            board,
            "{} entities after {:?}",
            self.entity_count(),
            query::elapsed(&self.world)
        );
        board
    }
}

fn log_event(event: &Event) {
    match event {
        Event::EntityPlaced { entity, kind, region } => {
            info!("entity {} ({kind:?}) placed at {:?}", entity.get(), region.origin());
        }
        Event::EntityDestroyed { entity } => info!("entity {} destroyed", entity.get()),
        Event::PlacementRejected {
            name,
            origin,
            reason,
        } => warn!("{name} rejected at {origin:?}: {reason:?}"),
        Event::ProductRejected {
            producer,
            name,
            reason,
            ..
        } => warn!("entity {} could not produce {name}: {reason:?}", producer.get()),
        Event::EntityDamaged {
            entity,
            attacker,
            remaining,
        } => info!(
            "entity {} hit entity {}, {} health left",
            attacker.get(),
            entity.get(),
            remaining.get()
        ),
        other => debug!("{other:?}"),
    }
}
