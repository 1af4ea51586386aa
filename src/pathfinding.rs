use std::collections::{HashMap, VecDeque};

use crate::components::GridPos;
use crate::world::World;

/// Exploration cap for short local trips (vehicles).
pub const LOCAL_NODE_CAP: usize = 200;
/// Exploration cap for freight and commute routing.
pub const ROUTE_NODE_CAP: usize = 400;

/// Breadth-first search over orthogonally adjacent road tiles.
///
/// Gives up once `node_cap` tiles have been discovered. The returned path runs
/// from `start` to `goal` inclusive; it is empty when the goal was not reached.
/// A trip to the current tile is the single-element path `[start]`.
pub fn road_path(world: &World, start: GridPos, goal: GridPos, node_cap: usize) -> Vec<GridPos> {
    if start == goal {
        return vec![start];
    }

    let mut queue = VecDeque::from([start]);
    let mut prev: HashMap<GridPos, GridPos> = HashMap::new();
    prev.insert(start, start);

    // `prev` also holds the start tile, so discoveries are `prev.len() - 1`.
    while prev.len() - 1 < node_cap {
        let Some(current) = queue.pop_front() else {
            break;
        };
        if current == goal {
            break;
        }
        for next in current.neighbors() {
            if !world.is_road(next) || prev.contains_key(&next) {
                continue;
            }
            prev.insert(next, current);
            queue.push_back(next);
        }
    }

    if !prev.contains_key(&goal) {
        return Vec::new();
    }

    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        current = prev[&current];
        path.push(current);
    }
    path.reverse();
    path
}
