//! Wire payloads exchanged with clients as `{type, payload}` envelopes.

use serde::{Deserialize, Serialize};

use crate::components::{Building, Demand, Road, Structure, Zone, ZoneType};
use crate::world::{AgentPosition, WorldSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingUpdate {
    pub x: i32,
    pub y: i32,
    pub building: Option<Building>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickSummary {
    pub tick: u64,
    pub demand: Demand,
    pub population: u32,
    pub employed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficSnapshot {
    pub ts: i64,
    pub vehicles: Vec<AgentPosition>,
    #[serde(rename = "goodsIC")]
    pub goods_ic: Vec<AgentPosition>,
    #[serde(rename = "goodsCC")]
    pub goods_cc: Vec<AgentPosition>,
    pub citizens: Vec<AgentPosition>,
}

/// Server to client events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Event {
    FullState(Box<WorldSnapshot>),
    Tick(TickSummary),
    ZonePlaced { x: i32, y: i32, zone: Zone },
    RoadPlaced { x: i32, y: i32, road: Road },
    StructurePlaced { x: i32, y: i32, structure: Structure },
    BuildingUpdate { updates: Vec<BuildingUpdate> },
    Bulldozed { x: i32, y: i32 },
    Traffic(TrafficSnapshot),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::FullState(_) => "full_state",
            Event::Tick(_) => "tick",
            Event::ZonePlaced { .. } => "zone_placed",
            Event::RoadPlaced { .. } => "road_placed",
            Event::StructurePlaced { .. } => "structure_placed",
            Event::BuildingUpdate { .. } => "building_update",
            Event::Bulldozed { .. } => "bulldozed",
            Event::Traffic(_) => "traffic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TileTarget {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PlaceZone {
    pub x: i32,
    pub y: i32,
    #[serde(alias = "zoneType")]
    pub zone: ZoneType,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaceStructure {
    pub x: i32,
    pub y: i32,
    pub kind: String,
}

/// Client to server actions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientAction {
    PlaceZone(PlaceZone),
    PlaceRoad(TileTarget),
    Bulldoze(TileTarget),
    PlaceStructure(PlaceStructure),
}

impl ClientAction {
    /// Parses an envelope; anything malformed or unrecognised yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}
