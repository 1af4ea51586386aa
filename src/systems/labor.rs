use anyhow::Result;
use tracing::debug;

use crate::{
    components::{
        Building, GridPos, ZoneType, COMMERCIAL_CAPACITY, INDUSTRIAL_CAPACITY,
        MAX_COMMERCIAL_SUPPLIES,
    },
    engine::{System, SystemContext, TickOutput},
    rng::StreamRng,
    world::World,
};

/// Idle ticks after which a residential or industrial building starts to
/// decay. Commercial buildings get three times as long.
pub const ABANDON_IDLE_TICKS: u32 = 5;
pub const COMMERCIAL_ABANDON_FACTOR: u32 = 3;
/// Length of the countdown between being marked abandoned and removal.
pub const ABANDON_PHASE_TICKS: u8 = 3;
/// Residents the city needs before shops can open.
pub const COMMERCIAL_CUSTOMER_NEED: u32 = 5;
pub const COMMERCIAL_SUPPLY_NEED: u32 = 1;

/// Staffs job sites towards the available workforce, ships industrial output
/// into shops and runs the abandonment lifecycle.
pub struct LaborSystem;

impl LaborSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LaborSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for LaborSystem {
    fn name(&self) -> &str {
        "labor"
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        world: &mut World,
        _rng: &mut StreamRng<'_>,
        output: &mut TickOutput,
    ) -> Result<()> {
        let population = world.population();
        let finals: Vec<GridPos> = world
            .tiles()
            .iter()
            .filter(|t| t.final_building().is_some())
            .map(|t| t.pos())
            .collect();
        let of_kind = |world: &World, kind: ZoneType| -> Vec<GridPos> {
            finals
                .iter()
                .copied()
                .filter(|pos| building(world, *pos).is_some_and(|b| b.kind == kind))
                .collect()
        };
        let industrial = of_kind(world, ZoneType::Industrial);
        let commercial = of_kind(world, ZoneType::Commercial);
        let residential = of_kind(world, ZoneType::Residential);

        staff(world, &industrial, &commercial, population);
        supply(world, &industrial, &commercial);

        let customers: u32 = residential
            .iter()
            .filter_map(|pos| building(world, *pos))
            .map(|b| b.residents)
            .sum();
        for pos in finals {
            evaluate_abandonment(world, pos, customers);
            output.touch(pos);
        }
        Ok(())
    }
}

fn building(world: &World, pos: GridPos) -> Option<&Building> {
    world.tile(pos).and_then(|t| t.building())
}

fn building_mut(world: &mut World, pos: GridPos) -> Option<&mut Building> {
    world.tile_mut(pos).and_then(|t| t.building_mut())
}

fn staff(world: &mut World, industrial: &[GridPos], commercial: &[GridPos], population: u32) {
    let capacity = industrial.len() as u32 * INDUSTRIAL_CAPACITY
        + commercial.len() as u32 * COMMERCIAL_CAPACITY;
    let target = capacity.min(population);
    let current: u32 = industrial
        .iter()
        .chain(commercial)
        .filter_map(|pos| building(world, *pos))
        .filter(|b| !b.is_abandoning())
        .map(|b| b.employees)
        .sum();

    if current > target {
        let mut excess = current - target;
        while excess > 0 {
            let mut changed = false;
            // Shops lose staff before factories, newest scan positions first.
            for pos in commercial.iter().rev().chain(industrial.iter().rev()) {
                if excess == 0 {
                    break;
                }
                if let Some(b) = building_mut(world, *pos) {
                    if b.is_abandoning() || b.employees == 0 {
                        continue;
                    }
                    b.employees -= 1;
                    excess -= 1;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    } else if current < target {
        let mut shortfall = target - current;

        // One worker everywhere first so each site can operate at all.
        for pos in industrial.iter().chain(commercial) {
            if shortfall == 0 {
                break;
            }
            if let Some(b) = building_mut(world, *pos) {
                if !b.is_abandoning() && b.employees == 0 {
                    b.employees = 1;
                    shortfall -= 1;
                }
            }
        }

        while shortfall > 0 {
            let mut progress = false;
            for pos in industrial.iter().chain(commercial) {
                if shortfall == 0 {
                    break;
                }
                if let Some(b) = building_mut(world, *pos) {
                    if !b.is_abandoning() && b.employees < b.kind.capacity() {
                        b.employees += 1;
                        shortfall -= 1;
                        progress = true;
                    }
                }
            }
            if !progress {
                break;
            }
        }
    }
}

fn supply(world: &mut World, industrial: &[GridPos], commercial: &[GridPos]) {
    let mut produced: u32 = industrial
        .iter()
        .filter_map(|pos| building(world, *pos))
        .filter(|b| b.employees > 0)
        .map(|b| (b.employees / INDUSTRIAL_CAPACITY).max(1))
        .sum();
    if commercial.is_empty() {
        return;
    }
    while produced > 0 {
        let mut progress = false;
        for pos in commercial {
            if produced == 0 {
                break;
            }
            if let Some(b) = building_mut(world, *pos) {
                if b.supplies < MAX_COMMERCIAL_SUPPLIES {
                    b.supplies += 1;
                    produced -= 1;
                    progress = true;
                }
            }
        }
        if !progress {
            break;
        }
    }
}

fn evaluate_abandonment(world: &mut World, pos: GridPos, customers: u32) {
    let Some(tile) = world.tile_mut(pos) else {
        return;
    };
    let Some(b) = tile.building_mut() else {
        return;
    };

    if b.is_abandoning() {
        b.abandon_phase -= 1;
        if b.abandon_phase == 0 {
            debug!(x = pos.x, y = pos.y, kind = ?b.kind, "abandoned building removed");
            tile.clear();
        }
        return;
    }

    let failing = match b.kind {
        ZoneType::Residential => b.residents == 0,
        ZoneType::Industrial => b.employees == 0,
        ZoneType::Commercial => {
            let open = b.employees >= 1
                && b.supplies >= COMMERCIAL_SUPPLY_NEED
                && customers >= COMMERCIAL_CUSTOMER_NEED;
            !open
        }
    };
    if failing {
        b.idle_ticks += 1;
    } else {
        b.idle_ticks = 0;
    }

    let threshold = match b.kind {
        ZoneType::Commercial => ABANDON_IDLE_TICKS * COMMERCIAL_ABANDON_FACTOR,
        _ => ABANDON_IDLE_TICKS,
    };
    if b.idle_ticks >= threshold {
        b.idle_ticks = 0;
        b.abandon_phase = ABANDON_PHASE_TICKS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions;
    use crate::rng::RngStreams;
    use crate::systems::ConstructionSystem;

    fn built(zones: &[(i32, i32, ZoneType)]) -> World {
        let mut world = World::new(8, 8);
        let owner = world.add_player("mayor", 100_000);
        for &(x, y, kind) in zones {
            actions::place_zone(&mut world, &owner, GridPos::new(x, y), kind, 0).unwrap();
        }
        let mut rng = RngStreams::seeded(1);
        let mut construction = ConstructionSystem::new();
        for tick in 1..=3 {
            construction
                .run(
                    &SystemContext { tick, now: 0 },
                    &mut world,
                    &mut rng.stream("construction"),
                    &mut TickOutput::default(),
                )
                .unwrap();
        }
        world
    }

    fn run_labor(world: &mut World) -> TickOutput {
        let mut rng = RngStreams::seeded(1);
        let mut output = TickOutput::default();
        LaborSystem::new()
            .run(
                &SystemContext { tick: 1, now: 0 },
                world,
                &mut rng.stream("labor"),
                &mut output,
            )
            .unwrap();
        output
    }

    fn at(world: &World, x: i32, y: i32) -> Building {
        world
            .tile(GridPos::new(x, y))
            .and_then(|t| t.building())
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_shortfall_seeds_every_site_before_filling() {
        let mut world = built(&[
            (0, 0, ZoneType::Industrial),
            (1, 0, ZoneType::Industrial),
            (2, 0, ZoneType::Commercial),
        ]);
        world.population = 4;
        run_labor(&mut world);
        assert_eq!(at(&world, 0, 0).employees, 2);
        assert_eq!(at(&world, 1, 0).employees, 1);
        assert_eq!(at(&world, 2, 0).employees, 1);
    }

    #[test]
    fn test_staffing_respects_caps() {
        let mut world = built(&[(0, 0, ZoneType::Industrial), (1, 0, ZoneType::Commercial)]);
        world.population = 500;
        run_labor(&mut world);
        assert_eq!(at(&world, 0, 0).employees, INDUSTRIAL_CAPACITY);
        assert_eq!(at(&world, 1, 0).employees, COMMERCIAL_CAPACITY);
    }

    #[test]
    fn test_excess_trims_commercial_first() {
        let mut world = built(&[(0, 0, ZoneType::Industrial), (1, 0, ZoneType::Commercial)]);
        world.population = 500;
        run_labor(&mut world);
        world.population = 4;
        run_labor(&mut world);
        assert_eq!(at(&world, 1, 0).employees, 1);
        assert_eq!(at(&world, 0, 0).employees, 3);
    }

    #[test]
    fn test_production_fills_shop_shelves_up_to_cap() {
        let mut world = built(&[(0, 0, ZoneType::Industrial), (1, 0, ZoneType::Commercial)]);
        world.population = 6;
        for _ in 0..10 {
            run_labor(&mut world);
        }
        assert_eq!(at(&world, 1, 0).supplies, MAX_COMMERCIAL_SUPPLIES);
    }

    #[test]
    fn test_idle_residential_counts_down_then_disappears() {
        let mut world = built(&[(3, 3, ZoneType::Residential)]);
        for _ in 0..4 {
            run_labor(&mut world);
        }
        assert_eq!(at(&world, 3, 3).abandon_phase, 0);
        run_labor(&mut world);
        assert_eq!(at(&world, 3, 3).abandon_phase, ABANDON_PHASE_TICKS);
        run_labor(&mut world);
        run_labor(&mut world);
        assert_eq!(at(&world, 3, 3).abandon_phase, 1);
        let output = run_labor(&mut world);
        let tile = world.tile(GridPos::new(3, 3)).unwrap();
        assert!(tile.building().is_none());
        assert!(tile.zone().is_none());
        assert_eq!(output.touched, vec![GridPos::new(3, 3)]);
    }
}
