//! Player-initiated world mutations. Every action either applies completely
//! and yields the event describing it, or leaves the world untouched.

use thiserror::Error;

use crate::components::{GridPos, PlayerId, Road, Structure, Zone, ZoneType};
use crate::events::Event;
use crate::world::World;

pub const ZONE_COST: i64 = 100;
pub const ROAD_COST: i64 = 20;
pub const POWER_PLANT_COST: i64 = 5_000;
pub const POWER_PLANT: &str = "power_plant";

/// Ticks during which a fresh road tile is shielded from AI zoning.
pub const ROAD_PROTECTION_TICKS: u64 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("tile ({}, {}) is out of bounds", .0.x, .0.y)]
    OutOfBounds(GridPos),
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },
    #[error("tile ({}, {}) is already occupied", .0.x, .0.y)]
    Occupied(GridPos),
    #[error("tile ({}, {}) is water", .0.x, .0.y)]
    Water(GridPos),
    #[error("unknown structure kind '{0}'")]
    UnknownStructure(String),
    #[error("nothing to bulldoze at ({}, {})", .0.x, .0.y)]
    NothingToBulldoze(GridPos),
}

fn buildable(world: &World, at: GridPos) -> Result<(), ActionError> {
    let tile = world.tile(at).ok_or(ActionError::OutOfBounds(at))?;
    if !tile.is_vacant() {
        return Err(ActionError::Occupied(at));
    }
    if tile.is_water() {
        return Err(ActionError::Water(at));
    }
    Ok(())
}

fn ensure_funds(world: &World, player: &PlayerId, cost: i64) -> Result<(), ActionError> {
    let available = world
        .player(player)
        .ok_or_else(|| ActionError::UnknownPlayer(player.clone()))?
        .money;
    if available < cost {
        return Err(ActionError::InsufficientFunds {
            needed: cost,
            available,
        });
    }
    Ok(())
}

fn charge(world: &mut World, player: &PlayerId, cost: i64) {
    if let Some(p) = world.player_mut(player) {
        p.money -= cost;
    }
}

pub fn place_zone(
    world: &mut World,
    player: &PlayerId,
    at: GridPos,
    kind: ZoneType,
    now: i64,
) -> Result<Event, ActionError> {
    buildable(world, at)?;
    ensure_funds(world, player, ZONE_COST)?;
    charge(world, player, ZONE_COST);

    let zone = Zone {
        kind,
        owner: player.clone(),
        placed_at: now,
    };
    if let Some(tile) = world.tile_mut(at) {
        tile.foliage = None;
        tile.set_zone(zone.clone());
    }
    Ok(Event::ZonePlaced {
        x: at.x,
        y: at.y,
        zone,
    })
}

pub fn place_road(
    world: &mut World,
    player: &PlayerId,
    at: GridPos,
    now: i64,
) -> Result<Event, ActionError> {
    buildable(world, at)?;
    ensure_funds(world, player, ROAD_COST)?;
    charge(world, player, ROAD_COST);

    let road = Road {
        owner: player.clone(),
        placed_at: now,
    };
    if let Some(tile) = world.tile_mut(at) {
        tile.set_road(road.clone());
    }
    let expires_at = world.tick() + ROAD_PROTECTION_TICKS;
    world.mark_recently_roaded(at, expires_at);
    Ok(Event::RoadPlaced {
        x: at.x,
        y: at.y,
        road,
    })
}

pub fn place_structure(
    world: &mut World,
    player: &PlayerId,
    at: GridPos,
    kind: &str,
    now: i64,
) -> Result<Event, ActionError> {
    if kind != POWER_PLANT {
        return Err(ActionError::UnknownStructure(kind.to_string()));
    }
    buildable(world, at)?;
    ensure_funds(world, player, POWER_PLANT_COST)?;
    charge(world, player, POWER_PLANT_COST);

    let structure = Structure {
        kind: kind.to_string(),
        owner: player.clone(),
        placed_at: now,
    };
    if let Some(tile) = world.tile_mut(at) {
        tile.set_structure(structure.clone());
    }
    Ok(Event::StructurePlaced {
        x: at.x,
        y: at.y,
        structure,
    })
}

/// Clears any zone, building, road or structure from the tile. Free of charge.
pub fn bulldoze(world: &mut World, at: GridPos) -> Result<Event, ActionError> {
    let tile = world.tile_mut(at).ok_or(ActionError::OutOfBounds(at))?;
    tile.clear().ok_or(ActionError::NothingToBulldoze(at))?;
    Ok(Event::Bulldozed { x: at.x, y: at.y })
}
