//! Fast-cadence agent simulation: vehicles, goods shipments and commuting
//! citizen groups moving over the road network.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

use crate::components::{
    CitizenGroup, CitizenState, GoodShipment, GridPos, Position, Route, Vehicle, ZoneType,
};
use crate::events::TrafficSnapshot;
use crate::pathfinding::{road_path, LOCAL_NODE_CAP, ROUTE_NODE_CAP};
use crate::world::{AgentPosition, World};

pub const MAX_VEHICLES: usize = 120;
pub const MAX_GOODS_IN_FLIGHT: usize = 300;
pub const MAX_CITIZEN_GROUPS: usize = 200;
/// Residents per vehicle on the road.
const RESIDENTS_PER_VEHICLE: u32 = 25;
const MAX_VEHICLE_SPAWNS: usize = 8;
const SPAWN_TRIES: usize = 3;

const VEHICLE_SPAWN_EVERY: Duration = Duration::from_millis(1_000);
const GOODS_SPAWN_EVERY: Duration = Duration::from_millis(1_500);
const CITIZEN_SPAWN_EVERY: Duration = Duration::from_millis(2_000);

/// Movement speeds in cells per second.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrafficSpeeds {
    pub vehicle: f64,
    pub goods: f64,
    pub citizen: f64,
}

impl Default for TrafficSpeeds {
    fn default() -> Self {
        Self {
            vehicle: 2.4,
            goods: 2.0,
            citizen: 1.5,
        }
    }
}

#[derive(Debug, Default)]
struct SpawnClock {
    vehicles: Duration,
    goods: Duration,
    citizens: Duration,
}

impl SpawnClock {
    fn due(acc: &mut Duration, period: Duration, every: Duration) -> bool {
        *acc += period;
        if *acc >= every {
            *acc -= every;
            true
        } else {
            false
        }
    }
}

pub struct TrafficSimulator {
    rng: ChaCha8Rng,
    speeds: TrafficSpeeds,
    /// Nominal step length; spawn timers advance by this much per step
    /// regardless of the measured delta.
    period: Duration,
    clock: SpawnClock,
}

impl TrafficSimulator {
    pub fn new(speeds: TrafficSpeeds, period: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            rng,
            speeds,
            period,
            clock: SpawnClock::default(),
        }
    }

    /// Advances every agent by `dt` seconds, runs any spawn passes that came
    /// due and returns the snapshot to broadcast.
    pub fn step(&mut self, world: &mut World, dt: f64, ts: i64) -> TrafficSnapshot {
        move_vehicles(world, self.speeds.vehicle * dt);
        update_citizens(world, &mut self.rng, dt, self.speeds.citizen);
        move_goods(world, self.speeds.goods * dt);

        let period = self.period;
        if SpawnClock::due(&mut self.clock.vehicles, period, VEHICLE_SPAWN_EVERY) {
            spawn_vehicles(world, &mut self.rng);
        }
        if SpawnClock::due(&mut self.clock.citizens, period, CITIZEN_SPAWN_EVERY) {
            spawn_citizen_groups(world, &mut self.rng);
        }
        if SpawnClock::due(&mut self.clock.goods, period, GOODS_SPAWN_EVERY) {
            spawn_goods(world, &mut self.rng);
        }
        snapshot(world, ts)
    }
}

pub fn snapshot(world: &World, ts: i64) -> TrafficSnapshot {
    let goods = |list: &[GoodShipment]| -> Vec<AgentPosition> {
        list.iter()
            .map(|g| AgentPosition::new(g.id, g.pos))
            .collect()
    };
    TrafficSnapshot {
        ts,
        vehicles: world
            .vehicles()
            .iter()
            .map(|v| AgentPosition::new(v.id, v.pos))
            .collect(),
        goods_ic: goods(world.goods_ic()),
        goods_cc: goods(world.goods_cc()),
        citizens: world
            .citizen_groups()
            .iter()
            .filter(|g| g.state != CitizenState::Working)
            .map(|g| AgentPosition::new(g.id, g.pos))
            .collect(),
    }
}

fn move_vehicles(world: &mut World, budget: f64) {
    world
        .vehicles
        .retain_mut(|v| !v.route.advance(&mut v.pos, budget));
}

fn move_goods(world: &mut World, budget: f64) {
    world
        .goods_ic
        .retain_mut(|g| !g.route.advance(&mut g.pos, budget));
    world
        .goods_cc
        .retain_mut(|g| !g.route.advance(&mut g.pos, budget));
}

/// Spawns random road-to-road trips until traffic matches population.
pub fn spawn_vehicles(world: &mut World, rng: &mut impl Rng) -> usize {
    let desired = ((world.population() / RESIDENTS_PER_VEHICLE) as usize).min(MAX_VEHICLES);
    let deficit = desired
        .saturating_sub(world.vehicles.len())
        .min(MAX_VEHICLE_SPAWNS);
    if deficit == 0 {
        return 0;
    }
    let roads = world.road_tiles();
    if roads.len() < 2 {
        return 0;
    }
    let mut spawned = 0;
    for _ in 0..deficit {
        if world.vehicles.len() >= MAX_VEHICLES {
            break;
        }
        let a = roads[rng.gen_range(0..roads.len())];
        let b = roads[rng.gen_range(0..roads.len())];
        if a == b {
            continue;
        }
        let Some((start, route)) = depart(road_path(world, a, b, LOCAL_NODE_CAP)) else {
            continue;
        };
        let id = world.sequences.next_vehicle();
        world.vehicles.push(Vehicle {
            id,
            pos: start,
            route,
        });
        spawned += 1;
    }
    spawned
}

/// Splits a path of at least two cells into a start position and the route
/// still ahead.
fn depart(path: Vec<GridPos>) -> Option<(Position, Route)> {
    if path.len() < 2 {
        return None;
    }
    let start = Position::at(path[0]);
    Some((start, Route::new(path[1..].to_vec())))
}

fn final_positions(world: &World, kinds: &[ZoneType]) -> Vec<GridPos> {
    world
        .tiles()
        .iter()
        .filter(|t| t.final_building().is_some_and(|b| kinds.contains(&b.kind)))
        .map(|t| t.pos())
        .collect()
}

fn road_route(world: &World, from: GridPos, to: GridPos) -> Option<(Position, Route)> {
    let a = world.adjacent_road(from)?;
    let b = world.adjacent_road(to)?;
    depart(road_path(world, a, b, ROUTE_NODE_CAP))
}

/// One industrial-to-commercial and one commercial-to-commercial shipment
/// attempt. Returns how many shipments left.
pub fn spawn_goods(world: &mut World, rng: &mut impl Rng) -> usize {
    if world.goods_in_flight() >= MAX_GOODS_IN_FLIGHT {
        return 0;
    }
    let industrial = final_positions(world, &[ZoneType::Industrial]);
    let commercial = final_positions(world, &[ZoneType::Commercial]);
    let mut spawned = 0;

    if !industrial.is_empty() && !commercial.is_empty() {
        for _ in 0..SPAWN_TRIES {
            let a = industrial[rng.gen_range(0..industrial.len())];
            let b = commercial[rng.gen_range(0..commercial.len())];
            if let Some((pos, route)) = road_route(world, a, b) {
                let id = world.sequences.next_goods();
                world.goods_ic.push(GoodShipment {
                    id,
                    pos,
                    route,
                });
                spawned += 1;
                break;
            }
        }
    }

    if commercial.len() > 1 && world.goods_in_flight() < MAX_GOODS_IN_FLIGHT {
        for _ in 0..SPAWN_TRIES {
            let a = commercial[rng.gen_range(0..commercial.len())];
            let b = commercial[rng.gen_range(0..commercial.len())];
            if a == b {
                continue;
            }
            if let Some((pos, route)) = road_route(world, a, b) {
                let id = world.sequences.next_goods();
                world.goods_cc.push(GoodShipment {
                    id,
                    pos,
                    route,
                });
                spawned += 1;
                break;
            }
        }
    }
    spawned
}

/// Sends one group of commuters from a home to a job site, if a route exists.
pub fn spawn_citizen_groups(world: &mut World, rng: &mut impl Rng) -> bool {
    if world.citizen_groups.len() >= MAX_CITIZEN_GROUPS {
        return false;
    }
    let homes = final_positions(world, &[ZoneType::Residential]);
    let jobs = final_positions(world, &[ZoneType::Commercial, ZoneType::Industrial]);
    if homes.is_empty() || jobs.is_empty() {
        return false;
    }

    for _ in 0..SPAWN_TRIES {
        let origin = homes[rng.gen_range(0..homes.len())];
        let destination = jobs[rng.gen_range(0..jobs.len())];
        let (Some(a), Some(b)) = (world.adjacent_road(origin), world.adjacent_road(destination))
        else {
            continue;
        };
        let roads = road_path(world, a, b, ROUTE_NODE_CAP);
        if roads.is_empty() {
            continue;
        }
        let route: Vec<GridPos> = roads.into_iter().chain([destination]).collect();
        let count = rng.gen_range(3..=8);
        let id = world.sequences.next_citizens();
        if let Some(tile) = world.tile_mut(origin) {
            tile.citizens = tile.citizens.saturating_sub(count);
        }
        world.citizen_groups.push(CitizenGroup {
            id,
            count,
            pos: Position::at(origin),
            route: Route::new(route),
            state: CitizenState::Outbound,
            timer: 0.0,
            origin,
            destination,
        });
        return true;
    }
    false
}

/// Ticks work timers, moves commuters and settles arrivals.
pub fn update_citizens(world: &mut World, rng: &mut impl Rng, dt: f64, speed: f64) {
    let groups = std::mem::take(&mut world.citizen_groups);
    let mut kept = Vec::with_capacity(groups.len());
    for mut group in groups {
        if group.state == CitizenState::Working {
            group.timer -= dt;
            if group.timer > 0.0 {
                kept.push(group);
                continue;
            }
            if let Some(tile) = world.tile_mut(group.destination) {
                tile.citizens = tile.citizens.saturating_sub(group.count);
            }
            let Some(route) = return_route(world, &group) else {
                continue;
            };
            group.route = route;
            group.state = CitizenState::Return;
        }

        if !group.route.advance(&mut group.pos, speed * dt) {
            kept.push(group);
            continue;
        }

        match group.state {
            CitizenState::Outbound => {
                let Some(tile) = world.tile_mut(group.destination) else {
                    continue;
                };
                let closed_shop = tile.building().is_some_and(|b| {
                    b.kind == ZoneType::Commercial && b.supplies == 0 && b.employees == 0
                });
                if closed_shop {
                    continue;
                }
                tile.citizens += group.count;
                group.state = CitizenState::Working;
                group.timer = 5.0 + rng.gen::<f64>() * 10.0;
                kept.push(group);
            }
            CitizenState::Return => {
                if let Some(tile) = world.tile_mut(group.origin) {
                    tile.citizens += group.count;
                }
            }
            CitizenState::Working => kept.push(group),
        }
    }
    world.citizen_groups = kept;
}

fn return_route(world: &World, group: &CitizenGroup) -> Option<Route> {
    let a = world.adjacent_road(group.destination)?;
    let b = world.adjacent_road(group.origin)?;
    let roads = road_path(world, a, b, ROUTE_NODE_CAP);
    if roads.is_empty() {
        return None;
    }
    Some(Route::new(roads.into_iter().chain([group.origin]).collect()))
}
