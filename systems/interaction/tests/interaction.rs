use garrison_core::{
    CellCoord, CellRectSize, Command, Damage, EntityDescriptor, EntityId, EntityKind, Event,
    Health, Speed,
};
use garrison_system_interaction::{Interaction, Mode, UnitOrder};
use garrison_world::{self as world, query, Config, World};

fn descriptor(name: &str, kind: EntityKind, width: u32, height: u32) -> EntityDescriptor {
    EntityDescriptor {
        name: name.to_owned(),
        kind,
        size: CellRectSize::new(width, height),
        health: Health::new(4),
        damage: Damage::new(1),
        speed: Speed::new(1),
        products: Vec::new(),
    }
}

fn place(world: &mut World, descriptor: EntityDescriptor, column: u32, row: u32) -> EntityId {
    let mut events = Vec::new();
    world::apply(
        world,
        Command::PlaceEntity {
            descriptor,
            origin: CellCoord::new(column, row),
        },
        &mut events,
    )
    .expect("apply");
    events
        .into_iter()
        .find_map(|event| match event {
            Event::EntityPlaced { entity, .. } => Some(entity),
            _ => None,
        })
        .expect("placed")
}

fn select(interaction: &mut Interaction, world: &World, cell: CellCoord) {
    let mut commands = Vec::new();
    interaction.primary_action(cell, &query::board_view(world), &mut commands);
    assert!(commands.is_empty());
}

#[test]
fn placement_mode_emits_place_command_on_free_footprint() {
    let world = World::with_config(Config::new(6, 6));
    let mut interaction = Interaction::new();
    let barracks = descriptor("Barracks", EntityKind::Building, 2, 2);
    interaction.start_placement(barracks.clone());

    let mut commands = Vec::new();
    interaction.primary_action(CellCoord::new(1, 1), &query::board_view(&world), &mut commands);

    assert_eq!(
        commands,
        vec![Command::PlaceEntity {
            descriptor: barracks,
            origin: CellCoord::new(1, 1),
        }]
    );
}

#[test]
fn placement_mode_ignores_blocked_or_out_of_bounds_footprints() {
    let mut world = World::with_config(Config::new(6, 6));
    let _ = place(&mut world, descriptor("Hut", EntityKind::Building, 1, 1), 2, 2);
    let mut interaction = Interaction::new();
    interaction.start_placement(descriptor("Barracks", EntityKind::Building, 2, 2));

    let board = query::board_view(&world);
    let mut commands = Vec::new();
    interaction.primary_action(CellCoord::new(1, 1), &board, &mut commands);
    interaction.primary_action(CellCoord::new(5, 5), &board, &mut commands);
    assert!(commands.is_empty());

    let preview = interaction
        .preview(CellCoord::new(3, 3), &board)
        .expect("preview in placement mode");
    assert!(preview.placeable);
    assert_eq!(preview.region.cells().len(), 4);
    assert!(!interaction
        .preview(CellCoord::new(1, 2), &board)
        .expect("preview in placement mode")
        .placeable);
}

#[test]
fn information_mode_selects_top_occupant() {
    let mut world = World::with_config(Config::new(6, 6));
    let barracks = place(
        &mut world,
        descriptor("Barracks", EntityKind::Building, 2, 2),
        0,
        0,
    );
    let mut interaction = Interaction::new();
    assert_eq!(interaction.mode(), &Mode::Information);

    select(&mut interaction, &world, CellCoord::new(1, 1));
    assert_eq!(interaction.selected(), Some(barracks));

    select(&mut interaction, &world, CellCoord::new(4, 4));
    assert_eq!(interaction.selected(), None);
}

#[test]
fn secondary_action_orders_selected_unit() {
    let mut world = World::with_config(Config::new(6, 6));
    let soldier = place(&mut world, descriptor("Soldier", EntityKind::Soldier, 1, 1), 0, 5);
    let barracks = place(
        &mut world,
        descriptor("Barracks", EntityKind::Building, 2, 2),
        3,
        3,
    );
    let mut interaction = Interaction::new();
    select(&mut interaction, &world, CellCoord::new(0, 5));

    let board = query::board_view(&world);
    assert_eq!(
        interaction.secondary_action(CellCoord::new(2, 0), &board),
        Some(UnitOrder::MoveTo(CellCoord::new(2, 0)))
    );
    assert_eq!(
        interaction.secondary_action(CellCoord::new(4, 4), &board),
        Some(UnitOrder::Attack(barracks))
    );
    assert_eq!(interaction.secondary_action(CellCoord::new(0, 5), &board), None);
    assert_eq!(interaction.secondary_action(CellCoord::new(9, 9), &board), None);
    assert_eq!(interaction.selected(), Some(soldier));
}

#[test]
fn secondary_action_requires_a_selected_unit() {
    let mut world = World::with_config(Config::new(6, 6));
    let _ = place(
        &mut world,
        descriptor("Barracks", EntityKind::Building, 2, 2),
        0,
        0,
    );
    let mut interaction = Interaction::new();
    let board = query::board_view(&world);

    assert_eq!(interaction.secondary_action(CellCoord::new(4, 4), &board), None);

    let mut commands = Vec::new();
    interaction.primary_action(CellCoord::new(0, 0), &board, &mut commands);
    assert_eq!(interaction.secondary_action(CellCoord::new(4, 4), &board), None);
}

#[test]
fn removed_selection_is_dropped() {
    let mut world = World::with_config(Config::new(4, 4));
    let soldier = place(&mut world, descriptor("Soldier", EntityKind::Soldier, 1, 1), 1, 1);
    let mut interaction = Interaction::new();
    select(&mut interaction, &world, CellCoord::new(1, 1));

    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::RemoveEntity {
            entity: soldier,
            cell: CellCoord::new(1, 1),
        },
        &mut events,
    )
    .expect("apply");
    interaction.handle(&events);

    assert_eq!(interaction.selected(), None);
}
