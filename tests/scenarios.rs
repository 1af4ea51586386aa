use citysim::{
    actions::{self, ZONE_COST},
    components::{GridPos, PlayerId, ZoneType},
    engine::{Engine, EngineBuilder, EngineSettings},
    events::{ClientAction, Event, PlaceZone},
    hub::Hub,
    systems::{ConstructionSystem, GrowthSystem, LaborSystem},
    traffic::{spawn_citizen_groups, spawn_vehicles, update_citizens},
    world::World,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn engine(seed: u64) -> Engine {
    EngineBuilder::new(EngineSettings { seed: Some(seed) })
        .with_system(ConstructionSystem::new())
        .with_system(GrowthSystem::new())
        .with_system(LaborSystem::new())
        .build()
}

fn mayor(world: &mut World) -> PlayerId {
    world.add_player("mayor", 100_000)
}

#[test]
fn test_residential_zone_is_built_within_three_ticks() {
    let hub = Hub::new(World::new(16, 16), 100_000, 64);
    let mut session = hub.connect(Some("mayor")).expect("join");
    session.outbound.try_recv().expect("full state");

    let event = hub
        .apply(
            &session.player,
            ClientAction::PlaceZone(PlaceZone {
                x: 4,
                y: 4,
                zone: ZoneType::Residential,
            }),
        )
        .expect("zone placed");
    match event {
        Event::ZonePlaced { x, y, zone } => {
            assert_eq!((x, y), (4, 4));
            assert_eq!(zone.kind, ZoneType::Residential);
            assert_eq!(zone.owner, session.player);
        }
        other => panic!("unexpected event {other:?}"),
    }
    let balance = hub.with_world(|w| w.player(&session.player).map(|p| p.money));
    assert_eq!(balance, Some(100_000 - ZONE_COST));

    let mut engine = engine(1);
    for _ in 0..3 {
        hub.run_tick(&mut engine).expect("tick");
    }
    let built = hub.with_world(|w| {
        w.tile(GridPos::new(4, 4))
            .and_then(|t| t.building())
            .map(|b| (b.stage, b.is_final, b.completed_at.is_some()))
    });
    assert_eq!(built, Some((3, true, true)));
}

#[test]
fn test_idle_shop_is_abandoned_then_removed() {
    let mut world = World::new(8, 8);
    let owner = mayor(&mut world);
    let at = GridPos::new(2, 2);
    actions::place_zone(&mut world, &owner, at, ZoneType::Commercial, 0).expect("zone");

    let mut engine = engine(2);
    let mut phases = Vec::new();
    for _ in 0..20 {
        engine.step(&mut world, 0).expect("tick");
        let phase = world.tile(at).and_then(|t| t.building()).map(|b| b.abandon_phase);
        phases.push((world.tick(), phase));
    }

    // Final at tick 3, fifteen failing evaluations end on tick 17.
    assert_eq!(phases[15], (16, Some(0)));
    assert_eq!(phases[16], (17, Some(3)));
    assert_eq!(phases[17], (18, Some(2)));
    assert_eq!(phases[18], (19, Some(1)));
    assert_eq!(phases[19], (20, None));
    let tile = world.tile(at).expect("tile");
    assert!(tile.zone().is_none());
    assert!(tile.is_vacant());

    let countdown: Vec<u8> = phases[16..19].iter().filter_map(|(_, p)| *p).collect();
    assert!(countdown.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_lone_road_tile_spawns_no_vehicles() {
    let mut world = World::new(12, 12);
    let owner = mayor(&mut world);
    for x in [2, 4, 6] {
        actions::place_zone(&mut world, &owner, GridPos::new(x, 2), ZoneType::Residential, 0)
            .expect("zone");
    }
    actions::place_road(&mut world, &owner, GridPos::new(3, 3), 0).expect("road");

    let mut engine = engine(3);
    engine.run(&mut world, 15, 0).expect("ticks");
    assert!(world.population() >= 25, "population {}", world.population());

    let mut rng = ChaCha8Rng::seed_from_u64(3);
    assert_eq!(spawn_vehicles(&mut world, &mut rng), 0);
    assert!(world.vehicles().is_empty());

    actions::place_road(&mut world, &owner, GridPos::new(4, 3), 0).expect("road");
    assert_eq!(world.road_tiles().len(), 2);
    let mut spawned = 0;
    for _ in 0..30 {
        spawned += spawn_vehicles(&mut world, &mut rng);
    }
    assert!(spawned > 0);
}

#[test]
fn test_commuters_give_up_on_a_closed_shop() {
    let mut world = World::new(12, 6);
    let owner = mayor(&mut world);
    for x in 0..12 {
        actions::place_road(&mut world, &owner, GridPos::new(x, 2), 0).expect("road");
    }
    let home = GridPos::new(2, 1);
    let shop = GridPos::new(9, 3);
    actions::place_zone(&mut world, &owner, home, ZoneType::Residential, 0).expect("home");
    actions::place_zone(&mut world, &owner, shop, ZoneType::Commercial, 0).expect("shop");

    // Construction only, so the shop stays unstaffed and unsupplied.
    let mut engine = EngineBuilder::new(EngineSettings { seed: Some(4) })
        .with_system(ConstructionSystem::new())
        .build();
    engine.run(&mut world, 3, 0).expect("ticks");

    let mut rng = ChaCha8Rng::seed_from_u64(4);
    assert!(spawn_citizen_groups(&mut world, &mut rng));
    assert_eq!(world.citizen_groups().len(), 1);
    for _ in 0..100 {
        update_citizens(&mut world, &mut rng, 0.1, 1.5);
    }
    assert!(world.citizen_groups().is_empty());
    assert_eq!(world.tile(shop).map(|t| t.citizens), Some(0));
    assert_eq!(world.tile(home).map(|t| t.citizens), Some(0));
}
