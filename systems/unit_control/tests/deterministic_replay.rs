use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    time::Duration,
};

use garrison_core::{
    CellCoord, CellRectSize, Command, Damage, EntityDescriptor, EntityId, EntityKind, Event,
    Health, Speed,
};
use garrison_system_unit_control::UnitControl;
use garrison_world::{self as world, query, World};

#[test]
fn deterministic_replay_produces_identical_history() {
    let first = replay(scripted_steps());
    let second = replay(scripted_steps());

    assert_eq!(first, second, "replay diverged between runs");
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert!(
        first
            .events
            .iter()
            .any(|record| matches!(record, EventRecord::Damaged { .. })),
        "scripted raid should land at least one hit"
    );
}

enum Step {
    Apply(Command),
    MoveTo(EntityId, CellCoord),
    Attack(EntityId, EntityId),
}

fn replay(steps: Vec<Step>) -> ReplayOutcome {
    let mut world = World::new();
    let mut control = UnitControl::default();
    let mut log = Vec::new();

    for step in steps {
        let mut commands = Vec::new();
        {
            let board = query::board_view(&world);
            match step {
                Step::Apply(command) => commands.push(command),
                Step::MoveTo(unit, cell) => control
                    .set_target_cell(unit, cell, &board, &mut commands)
                    .expect("order"),
                Step::Attack(unit, target) => control
                    .set_target_entity(unit, target, &board, &mut commands)
                    .expect("order"),
            }
        }
        process(&mut world, &mut control, commands, &mut log);
    }

    let entities = query::entity_view(&world)
        .into_vec()
        .into_iter()
        .map(|snapshot| EntityState {
            id: snapshot.id,
            cells: snapshot.cells,
            health: snapshot.health.get(),
            stepping: snapshot.stepping,
        })
        .collect();

    ReplayOutcome {
        entities,
        events: log,
    }
}

fn process(
    world: &mut World,
    control: &mut UnitControl,
    mut commands: Vec<Command>,
    log: &mut Vec<EventRecord>,
) {
    loop {
        if commands.is_empty() {
            break;
        }

        let mut events = Vec::new();
        for command in commands.drain(..) {
            world::apply(world, command, &mut events).expect("apply");
        }
        log.extend(events.iter().filter_map(EventRecord::from_event));

        let board = query::board_view(world);
        control
            .handle(&events, &board, &mut commands)
            .expect("handle");
    }
}

fn descriptor(name: &str, kind: EntityKind, size: CellRectSize, health: u32) -> EntityDescriptor {
    EntityDescriptor {
        name: name.to_owned(),
        kind,
        size,
        health: Health::new(health),
        damage: Damage::new(2),
        speed: Speed::new(1),
        products: vec!["Soldier".to_owned()],
    }
}

fn scripted_steps() -> Vec<Step> {
    let soldier = descriptor("Soldier", EntityKind::Soldier, CellRectSize::single(), 6);
    let barracks = descriptor("Barracks", EntityKind::Building, CellRectSize::new(2, 2), 20);
    let wall = descriptor("Wall", EntityKind::Building, CellRectSize::new(1, 5), 50);
    let plant = descriptor("PowerPlant", EntityKind::Building, CellRectSize::new(2, 3), 4);
    let tick = || {
        Step::Apply(Command::Tick {
            dt: Duration::from_millis(100),
        })
    };

    let mut steps = vec![
        Step::Apply(Command::ConfigureGrid {
            columns: 12,
            rows: 8,
        }),
        Step::Apply(Command::PlaceEntity {
            descriptor: barracks,
            origin: CellCoord::new(1, 1),
        }),
        Step::Apply(Command::PlaceEntity {
            descriptor: wall,
            origin: CellCoord::new(5, 0),
        }),
        Step::Apply(Command::PlaceEntity {
            descriptor: plant,
            origin: CellCoord::new(9, 1),
        }),
        Step::Apply(Command::SpawnProduct {
            producer: EntityId::new(0),
            product: soldier.clone(),
        }),
        Step::Apply(Command::PlaceEntity {
            descriptor: soldier,
            origin: CellCoord::new(2, 6),
        }),
        Step::Attack(EntityId::new(3), EntityId::new(2)),
        Step::MoveTo(EntityId::new(4), CellCoord::new(10, 7)),
    ];
    steps.extend((0..8).map(|_| tick()));
    steps.push(Step::Attack(EntityId::new(4), EntityId::new(3)));
    steps.extend((0..30).map(|_| tick()));
    steps.push(Step::Attack(EntityId::new(3), EntityId::new(2)));
    steps.extend((0..4).map(|_| tick()));
    steps
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ReplayOutcome {
    entities: Vec<EntityState>,
    events: Vec<EventRecord>,
}

impl ReplayOutcome {
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct EntityState {
    id: EntityId,
    cells: Vec<CellCoord>,
    health: u32,
    stepping: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum EventRecord {
    Placed {
        entity: EntityId,
        origin: CellCoord,
    },
    Stepped {
        entity: EntityId,
        from: CellCoord,
        to: CellCoord,
    },
    Rejected {
        entity: EntityId,
    },
    Damaged {
        entity: EntityId,
        remaining: u32,
    },
    Removed {
        entity: EntityId,
        cells: Vec<CellCoord>,
    },
    Walkability {
        cell: CellCoord,
        walkable: bool,
    },
}

impl EventRecord {
    fn from_event(event: &Event) -> Option<Self> {
        let record = match event {
            Event::EntityPlaced { entity, region, .. } => Self::Placed {
                entity: *entity,
                origin: region.origin(),
            },
            Event::StepCompleted { entity, from, to } => Self::Stepped {
                entity: *entity,
                from: *from,
                to: *to,
            },
            Event::StepRejected { entity, .. } => Self::Rejected { entity: *entity },
            Event::EntityDamaged {
                entity, remaining, ..
            } => Self::Damaged {
                entity: *entity,
                remaining: remaining.get(),
            },
            Event::EntityRemoved { entity, cells } => Self::Removed {
                entity: *entity,
                cells: cells.clone(),
            },
            Event::WalkabilityChanged { cell, walkable } => Self::Walkability {
                cell: *cell,
                walkable: *walkable,
            },
            _ => return None,
        };
        Some(record)
    }
}
