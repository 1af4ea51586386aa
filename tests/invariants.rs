use std::time::Duration;

use citysim::{
    actions,
    components::{
        GridPos, ZoneType, COMMERCIAL_CAPACITY, FINAL_STAGE, INDUSTRIAL_CAPACITY,
        MAX_COMMERCIAL_SUPPLIES, RESIDENTIAL_CAPACITY,
    },
    config::{MapConfig, ServerConfig},
    hub::Hub,
    pathfinding::{road_path, ROUTE_NODE_CAP},
    systems::{standard_engine, ABANDON_PHASE_TICKS},
    traffic::{
        TrafficSimulator, TrafficSpeeds, MAX_CITIZEN_GROUPS, MAX_GOODS_IN_FLIGHT, MAX_VEHICLES,
    },
    world::World,
};
use proptest::prelude::*;

fn check_world(world: &World) {
    assert!(world.demand.in_range(), "demand {:?}", world.demand);
    for tile in world.tiles() {
        if let Some(b) = tile.building() {
            assert!(tile.zone().is_some());
            assert!(b.stage >= 1 && b.stage <= FINAL_STAGE);
            assert!(b.abandon_phase <= ABANDON_PHASE_TICKS);
            match b.kind {
                ZoneType::Residential => assert!(b.residents <= RESIDENTIAL_CAPACITY),
                ZoneType::Commercial => {
                    assert!(b.employees <= COMMERCIAL_CAPACITY);
                    assert!(b.supplies <= MAX_COMMERCIAL_SUPPLIES);
                }
                ZoneType::Industrial => assert!(b.employees <= INDUSTRIAL_CAPACITY),
            }
        }
    }
    assert!(world.vehicles().len() <= MAX_VEHICLES);
    assert!(world.goods_in_flight() <= MAX_GOODS_IN_FLIGHT);
    assert!(world.citizen_groups().len() <= MAX_CITIZEN_GROUPS);
}

fn small_server(seed: u64) -> Hub {
    Hub::from_config(&ServerConfig {
        seed: Some(seed),
        map: MapConfig {
            width: 24,
            height: 24,
        },
        ..ServerConfig::default()
    })
}

#[test]
fn test_bot_grows_a_city_without_breaking_invariants() {
    let hub = small_server(11);
    let mut engine = standard_engine(Some(11));
    let mut traffic =
        TrafficSimulator::new(TrafficSpeeds::default(), Duration::from_millis(100), Some(12));

    for _ in 0..80 {
        hub.run_tick(&mut engine).expect("tick");
        for _ in 0..10 {
            hub.run_traffic(&mut traffic, 0.1);
        }
        hub.with_world(|world| check_world(world));
    }

    hub.with_world(|world| {
        assert!(world.road_tiles().len() >= 13);
        assert!(world.tiles().iter().any(|t| t.zone().is_some()));
        let bot = world.bot().cloned().expect("bot");
        assert_eq!(world.player(&bot).map(|p| p.name.as_str()), Some("Planner"));
    });
}

#[test]
fn test_paths_between_bot_roads_are_adjacent_road_walks() {
    let hub = small_server(5);
    let mut engine = standard_engine(Some(5));
    for _ in 0..40 {
        hub.run_tick(&mut engine).expect("tick");
    }
    hub.with_world(|world| {
        let roads = world.road_tiles();
        let start = roads[0];
        for goal in roads.iter().copied() {
            let path = road_path(world, start, goal, ROUTE_NODE_CAP);
            if path.is_empty() {
                continue;
            }
            assert_eq!(path.first(), Some(&start));
            assert_eq!(path.last(), Some(&goal));
            assert!(path.iter().all(|p| world.is_road(*p)));
            assert!(path.windows(2).all(|w| w[0].is_adjacent(w[1])));
        }
    });
}

#[test]
fn test_bulldozing_nothing_changes_nothing() {
    let mut world = World::new(8, 8);
    world.add_player("mayor", 500);
    let before = world.snapshot();
    assert!(actions::bulldoze(&mut world, GridPos::new(3, 3)).is_err());
    assert_eq!(world.snapshot(), before);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn test_demand_stays_in_range_for_any_seed(seed in any::<u64>()) {
        let hub = small_server(seed);
        let mut engine = standard_engine(Some(seed));
        for _ in 0..40 {
            let summary = hub.run_tick(&mut engine).expect("tick");
            prop_assert!(summary.demand.in_range());
        }
    }
}
