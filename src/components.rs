use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

pub const RESIDENTIAL_CAPACITY: u32 = 10;
pub const COMMERCIAL_CAPACITY: u32 = 2;
pub const INDUSTRIAL_CAPACITY: u32 = 4;
pub const MAX_COMMERCIAL_SUPPLIES: u32 = 8;
pub const FINAL_STAGE: u8 = 3;

pub const DEMAND_MIN: i32 = -50;
pub const DEMAND_MAX: i32 = 120;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Integer grid coordinate. Signed so that client-supplied coordinates can be
/// bounds-checked without wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Orthogonal neighbours in the fixed order +x, -x, +y, -y.
    pub fn neighbors(self) -> [GridPos; 4] {
        [
            self.offset(1, 0),
            self.offset(-1, 0),
            self.offset(0, 1),
            self.offset(0, -1),
        ]
    }

    pub fn is_adjacent(self, other: GridPos) -> bool {
        (self.x - other.x).abs() + (self.y - other.y).abs() == 1
    }
}

impl Serialize for GridPos {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.x, self.y].serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneType {
    #[serde(rename = "R")]
    Residential,
    #[serde(rename = "C")]
    Commercial,
    #[serde(rename = "I")]
    Industrial,
}

impl ZoneType {
    /// Occupancy cap: residents for housing, employees for job sites.
    pub fn capacity(self) -> u32 {
        match self {
            ZoneType::Residential => RESIDENTIAL_CAPACITY,
            ZoneType::Commercial => COMMERCIAL_CAPACITY,
            ZoneType::Industrial => INDUSTRIAL_CAPACITY,
        }
    }

    pub fn is_job_site(self) -> bool {
        matches!(self, ZoneType::Commercial | ZoneType::Industrial)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terrain {
    #[default]
    Grass,
    Water,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    #[serde(rename = "type")]
    pub kind: ZoneType,
    pub owner: PlayerId,
    pub placed_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Road {
    pub owner: PlayerId,
    pub placed_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    #[serde(rename = "type")]
    pub kind: String,
    pub owner: PlayerId,
    pub placed_at: i64,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

fn is_zero_u8(value: &u8) -> bool {
    *value == 0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    #[serde(rename = "type")]
    pub kind: ZoneType,
    pub stage: u8,
    #[serde(rename = "final")]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub residents: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub employees: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub supplies: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "is_zero_u8")]
    pub abandon_phase: u8,
    #[serde(skip)]
    pub idle_ticks: u32,
}

impl Building {
    pub fn new(kind: ZoneType) -> Self {
        Self {
            kind,
            stage: 1,
            is_final: false,
            residents: 0,
            employees: 0,
            supplies: 0,
            completed_at: None,
            abandon_phase: 0,
            idle_ticks: 0,
        }
    }

    pub fn is_abandoning(&self) -> bool {
        self.abandon_phase > 0
    }

    /// Final and not counting down towards removal.
    pub fn is_active(&self) -> bool {
        self.is_final && !self.is_abandoning()
    }

    pub fn open_slots(&self) -> u32 {
        self.kind.capacity().saturating_sub(self.residents)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Zone {
        zone: Zone,
        building: Option<Building>,
    },
    Road(Road),
    Structure(Structure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub elevation: i32,
    pub terrain: Terrain,
    pub foliage: Option<String>,
    pub citizens: u32,
    feature: Option<Feature>,
}

impl Tile {
    pub fn new(x: i32, y: i32, terrain: Terrain) -> Self {
        Self {
            x,
            y,
            elevation: 0,
            terrain,
            foliage: None,
            citizens: 0,
            feature: None,
        }
    }

    pub fn pos(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }

    pub fn feature(&self) -> Option<&Feature> {
        self.feature.as_ref()
    }

    pub fn is_vacant(&self) -> bool {
        self.feature.is_none()
    }

    pub fn is_water(&self) -> bool {
        self.terrain == Terrain::Water
    }

    pub fn zone(&self) -> Option<&Zone> {
        match &self.feature {
            Some(Feature::Zone { zone, .. }) => Some(zone),
            _ => None,
        }
    }

    pub fn road(&self) -> Option<&Road> {
        match &self.feature {
            Some(Feature::Road(road)) => Some(road),
            _ => None,
        }
    }

    pub fn has_road(&self) -> bool {
        matches!(self.feature, Some(Feature::Road(_)))
    }

    pub fn structure(&self) -> Option<&Structure> {
        match &self.feature {
            Some(Feature::Structure(structure)) => Some(structure),
            _ => None,
        }
    }

    pub fn building(&self) -> Option<&Building> {
        match &self.feature {
            Some(Feature::Zone { building, .. }) => building.as_ref(),
            _ => None,
        }
    }

    pub fn building_mut(&mut self) -> Option<&mut Building> {
        match &mut self.feature {
            Some(Feature::Zone { building, .. }) => building.as_mut(),
            _ => None,
        }
    }

    pub fn final_building(&self) -> Option<&Building> {
        self.building().filter(|b| b.is_final)
    }

    pub(crate) fn set_zone(&mut self, zone: Zone) {
        self.feature = Some(Feature::Zone {
            zone,
            building: None,
        });
    }

    pub(crate) fn set_road(&mut self, road: Road) {
        self.feature = Some(Feature::Road(road));
    }

    pub(crate) fn set_structure(&mut self, structure: Structure) {
        self.feature = Some(Feature::Structure(structure));
    }

    /// Starts construction on a bare zone. Returns false when there is no zone
    /// or it already carries a building.
    pub(crate) fn start_building(&mut self) -> bool {
        match &mut self.feature {
            Some(Feature::Zone { zone, building }) if building.is_none() => {
                *building = Some(Building::new(zone.kind));
                true
            }
            _ => false,
        }
    }

    /// Removes whatever ground feature the tile holds.
    pub(crate) fn clear(&mut self) -> Option<Feature> {
        self.feature.take()
    }
}

#[derive(Serialize)]
struct TileView<'a> {
    x: i32,
    y: i32,
    elevation: i32,
    terrain: Terrain,
    #[serde(skip_serializing_if = "Option::is_none")]
    foliage: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zone: Option<&'a Zone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    road: Option<&'a Road>,
    #[serde(skip_serializing_if = "Option::is_none")]
    structure: Option<&'a Structure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    building: Option<&'a Building>,
    #[serde(skip_serializing_if = "is_zero")]
    citizens: u32,
}

impl Serialize for Tile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TileView {
            x: self.x,
            y: self.y,
            elevation: self.elevation,
            terrain: self.terrain,
            foliage: self.foliage.as_deref(),
            zone: self.zone(),
            road: self.road(),
            structure: self.structure(),
            building: self.building(),
            citizens: self.citizens,
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub money: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demand {
    pub residential: i32,
    pub commercial: i32,
    pub industrial: i32,
}

impl Demand {
    pub fn new(residential: i32, commercial: i32, industrial: i32) -> Self {
        Self {
            residential,
            commercial,
            industrial,
        }
    }

    pub fn values_mut(&mut self) -> [&mut i32; 3] {
        [
            &mut self.residential,
            &mut self.commercial,
            &mut self.industrial,
        ]
    }

    pub fn clamp(&mut self) {
        for value in self.values_mut() {
            *value = (*value).clamp(DEMAND_MIN, DEMAND_MAX);
        }
    }

    pub fn in_range(&self) -> bool {
        [self.residential, self.commercial, self.industrial]
            .iter()
            .all(|v| (DEMAND_MIN..=DEMAND_MAX).contains(v))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn at(cell: GridPos) -> Self {
        Self {
            x: cell.x as f64,
            y: cell.y as f64,
        }
    }
}

/// Remaining cells of an agent's trip and how far along it the agent is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Route {
    pub path: Vec<GridPos>,
    pub cursor: usize,
}

impl Route {
    pub fn new(path: Vec<GridPos>) -> Self {
        Self { path, cursor: 0 }
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.path.len()
    }

    /// Moves `pos` along the route by up to `budget` cells of Manhattan
    /// distance, carrying leftover budget across waypoints. Returns true once
    /// the last waypoint has been reached.
    pub fn advance(&mut self, pos: &mut Position, budget: f64) -> bool {
        let mut remain = budget;
        while remain > 0.0 && !self.is_finished() {
            let target = Position::at(self.path[self.cursor]);
            let dx = target.x - pos.x;
            let dy = target.y - pos.y;
            let dist = dx.abs() + dy.abs();
            if dist <= remain {
                *pos = target;
                self.cursor += 1;
                remain -= dist;
            } else {
                if dx != 0.0 {
                    pos.x += remain * dx.signum();
                } else if dy != 0.0 {
                    pos.y += remain * dy.signum();
                }
                remain = 0.0;
            }
        }
        self.is_finished()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: u64,
    pub pos: Position,
    pub route: Route,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoodShipment {
    pub id: u64,
    pub pos: Position,
    pub route: Route,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CitizenState {
    Outbound,
    Working,
    Return,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CitizenGroup {
    pub id: u64,
    pub count: u32,
    pub pos: Position,
    pub route: Route,
    pub state: CitizenState,
    /// Seconds of work left while in [`CitizenState::Working`].
    pub timer: f64,
    pub origin: GridPos,
    pub destination: GridPos,
}
