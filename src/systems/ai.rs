use anyhow::Result;
use rand::Rng;
use tracing::trace;

use crate::{
    actions,
    components::{GridPos, PlayerId, ZoneType},
    engine::{System, SystemContext, TickOutput},
    planner::RoadPlanner,
    rng::StreamRng,
    world::World,
};

/// Minimum balance the scripted player keeps before it stops building.
pub const AI_MIN_BALANCE: i64 = 200;
/// Road tiles examined in shuffled order when looking for a zoning spot.
const ROAD_SAMPLE: usize = 32;
/// Half-length of the starter cross laid on an empty map.
const SEED_ARM: i32 = 3;

/// Drives the scripted player: keeps a road network growing and zones along
/// it according to demand.
pub struct AiControllerSystem {
    pub interval: u64,
    pub zone_attempts: u32,
    pub road_chance: f64,
    pub zone_after_road_chance: f64,
    planner: RoadPlanner,
}

impl AiControllerSystem {
    pub fn new() -> Self {
        Self {
            interval: 4,
            zone_attempts: 2,
            road_chance: 0.9,
            zone_after_road_chance: 0.35,
            planner: RoadPlanner::default(),
        }
    }
}

impl Default for AiControllerSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for AiControllerSystem {
    fn name(&self) -> &str {
        "ai"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut StreamRng<'_>,
        output: &mut TickOutput,
    ) -> Result<()> {
        let Some(bot) = world.bot().cloned() else {
            return Ok(());
        };
        if ctx.tick.saturating_sub(world.ai_last_action) < self.interval {
            return Ok(());
        }
        if world.player(&bot).map_or(true, |p| p.money < AI_MIN_BALANCE) {
            return Ok(());
        }
        world.ai_last_action = ctx.tick;

        seed_roads(world, &bot, ctx.now, output);

        let mut grew = false;
        if rng.gen::<f64>() < self.road_chance {
            let laid = self.planner.grow(world, &bot, rng, ctx.now, output);
            trace!(laid, "planner extended roads");
            grew = true;
        }
        if grew && rng.gen::<f64>() >= self.zone_after_road_chance {
            return Ok(());
        }

        let kind = pick_zone_type(world);
        for _ in 0..self.zone_attempts {
            let Some(spot) = find_zone_spot(world, rng) else {
                break;
            };
            if world.is_recently_roaded(spot) || encases_road(world, spot) {
                continue;
            }
            if let Ok(event) = actions::place_zone(world, &bot, spot, kind, ctx.now) {
                output.emit(event);
            }
        }
        Ok(())
    }
}

/// Lays a cross around the map centre when there is no road at all.
fn seed_roads(world: &mut World, bot: &PlayerId, now: i64, output: &mut TickOutput) {
    if !world.road_tiles().is_empty() {
        return;
    }
    let centre = GridPos::new(world.width() / 2, world.height() / 2);
    let arms = (-SEED_ARM..=SEED_ARM)
        .map(|d| centre.offset(d, 0))
        .chain((-SEED_ARM..=SEED_ARM).map(|d| centre.offset(0, d)));
    for at in arms {
        if let Ok(event) = actions::place_road(world, bot, at, now) {
            output.emit(event);
        }
    }
}

/// Scores each zone type from demand and housing/job slack. Ties go to
/// residential, then commercial.
pub fn pick_zone_type(world: &World) -> ZoneType {
    let demand = world.demand;
    let unemployed = world.population().saturating_sub(world.employed()) as i32;
    let (cap, used) = world.residential_slots();
    let open = cap as i32 - used as i32;

    let mut residential = demand.residential;
    let mut commercial = demand.commercial + 5;
    let mut industrial = demand.industrial;
    if unemployed < 5 {
        industrial -= 8;
    } else if unemployed < 15 {
        industrial -= 4;
    }
    if open <= 0 {
        residential += 10;
    } else if open < 10 {
        residential += 5;
    }
    if unemployed > 10 && open > 5 {
        commercial += 2;
    }

    let mut best = (ZoneType::Residential, residential);
    if commercial > best.1 {
        best = (ZoneType::Commercial, commercial);
    }
    if industrial > best.1 {
        best = (ZoneType::Industrial, industrial);
    }
    best.0
}

/// First free, dry tile next to a road, visiting roads in a partially
/// shuffled order.
fn find_zone_spot(world: &World, rng: &mut impl Rng) -> Option<GridPos> {
    let mut roads = world.road_tiles();
    let len = roads.len();
    for i in 0..len.min(ROAD_SAMPLE) {
        let j = rng.gen_range(0..len);
        roads.swap(i, j);
    }
    roads
        .iter()
        .flat_map(|road| road.neighbors())
        .find(|n| world.tile(*n).is_some_and(|t| t.is_vacant() && !t.is_water()))
}

/// True when zoning `at` would leave its only road neighbour without any
/// other open side.
fn encases_road(world: &World, at: GridPos) -> bool {
    let mut roads = 0;
    let mut open = 0;
    for n in at.neighbors() {
        let Some(tile) = world.tile(n) else {
            continue;
        };
        if tile.has_road() {
            roads += 1;
        } else if tile.is_vacant() && !tile.is_water() {
            open += 1;
        }
    }
    roads == 1 && open == 0
}
