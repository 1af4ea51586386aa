//! Organic road growth for the scripted player: extends dead ends, bends them
//! now and then and branches off straight stretches, while never laying a
//! solid 2x2 block of road.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::actions::{self, ROAD_COST};
use crate::components::{GridPos, PlayerId};
use crate::engine::TickOutput;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Endpoint {
    at: GridPos,
    /// Unit step pointing away from the single connected neighbour.
    dx: i32,
    dy: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    at: GridPos,
    horizontal: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RoadPlanner {
    pub max_attempts: u32,
    pub branch_chance: f64,
    pub curve_chance: f64,
}

impl Default for RoadPlanner {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            branch_chance: 0.35,
            curve_chance: 0.25,
        }
    }
}

impl RoadPlanner {
    /// Runs up to `max_attempts` growth steps for `player`. Returns the number
    /// of road tiles laid; events go to `output` in the order they happened.
    pub fn grow(
        &self,
        world: &mut World,
        player: &PlayerId,
        rng: &mut impl Rng,
        now: i64,
        output: &mut TickOutput,
    ) -> u32 {
        let mut laid = 0;
        for _ in 0..self.max_attempts {
            let (endpoints, segments) = classify(world);
            if endpoints.is_empty() && segments.is_empty() {
                break;
            }

            let mut placed = false;
            if !segments.is_empty() && rng.gen::<f64>() < self.branch_chance {
                if let Some(seg) = segments.choose(rng) {
                    let mut sides = if seg.horizontal {
                        [(0, 1), (0, -1)]
                    } else {
                        [(1, 0), (-1, 0)]
                    };
                    sides.shuffle(rng);
                    placed = sides.iter().any(|&(dx, dy)| {
                        try_place(world, player, seg.at.offset(dx, dy), now, output)
                    });
                }
            }

            if !placed {
                if let Some(ep) = endpoints.choose(rng).copied() {
                    if rng.gen::<f64>() < self.curve_chance {
                        let mut turns = if ep.dx != 0 {
                            [(0, 1), (0, -1)]
                        } else {
                            [(1, 0), (-1, 0)]
                        };
                        turns.shuffle(rng);
                        placed = turns.iter().any(|&(dx, dy)| {
                            try_place(world, player, ep.at.offset(dx, dy), now, output)
                        });
                    }
                    if !placed {
                        placed = try_place(world, player, ep.at.offset(ep.dx, ep.dy), now, output);
                    }
                }
            }

            if !placed {
                break;
            }
            laid += 1;
        }
        laid
    }
}

fn classify(world: &World) -> (Vec<Endpoint>, Vec<Segment>) {
    let mut endpoints = Vec::new();
    let mut segments = Vec::new();
    for at in world.road_tiles() {
        let right = world.is_road(at.offset(1, 0));
        let left = world.is_road(at.offset(-1, 0));
        let down = world.is_road(at.offset(0, 1));
        let up = world.is_road(at.offset(0, -1));
        let count = [right, left, down, up].iter().filter(|r| **r).count();
        if count == 1 {
            let dx = if right { -1 } else if left { 1 } else { 0 };
            let dy = if down { -1 } else if up { 1 } else { 0 };
            endpoints.push(Endpoint { at, dx, dy });
        } else if count == 2 {
            if right && left {
                segments.push(Segment {
                    at,
                    horizontal: true,
                });
            }
            if up && down {
                segments.push(Segment {
                    at,
                    horizontal: false,
                });
            }
        }
    }
    (endpoints, segments)
}

/// True when a road at `at` would complete a 2x2 square of road.
pub fn would_thicken(world: &World, at: GridPos) -> bool {
    for dx in -1..=0 {
        for dy in -1..=0 {
            let corner = at.offset(dx, dy);
            if !world.in_bounds(corner) || !world.in_bounds(corner.offset(1, 1)) {
                continue;
            }
            let square = [
                corner,
                corner.offset(1, 0),
                corner.offset(0, 1),
                corner.offset(1, 1),
            ];
            if square
                .iter()
                .filter(|cell| **cell != at)
                .all(|cell| world.is_road(*cell))
            {
                return true;
            }
        }
    }
    false
}

/// Lays one road tile, demolishing a single non-road obstruction first.
fn try_place(
    world: &mut World,
    player: &PlayerId,
    at: GridPos,
    now: i64,
    output: &mut TickOutput,
) -> bool {
    let Some(tile) = world.tile(at) else {
        return false;
    };
    if tile.is_water() || tile.has_road() || would_thicken(world, at) {
        return false;
    }
    if !tile.is_vacant() {
        let affordable = world.player(player).is_some_and(|p| p.money >= ROAD_COST);
        if !affordable {
            return false;
        }
        if let Ok(event) = actions::bulldoze(world, at) {
            output.emit(event);
        }
    }
    match actions::place_road(world, player, at, now) {
        Ok(event) => {
            output.emit(event);
            true
        }
        Err(_) => false,
    }
}
