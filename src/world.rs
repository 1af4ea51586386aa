use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::components::{
    CitizenGroup, CitizenState, Demand, GoodShipment, GridPos, Player, PlayerId, Position, Terrain,
    Tile, Vehicle, ZoneType,
};

/// Id sequences for the three agent kinds.
#[derive(Debug, Default, Clone)]
pub struct AgentSequences {
    vehicles: u64,
    goods: u64,
    citizens: u64,
}

impl AgentSequences {
    pub fn next_vehicle(&mut self) -> u64 {
        self.vehicles += 1;
        self.vehicles
    }

    pub fn next_goods(&mut self) -> u64 {
        self.goods += 1;
        self.goods
    }

    pub fn next_citizens(&mut self) -> u64 {
        self.citizens += 1;
        self.citizens
    }
}

pub struct World {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    tick: u64,
    pub demand: Demand,
    pub(crate) players: BTreeMap<PlayerId, Player>,
    pub(crate) population: u32,
    pub(crate) employed: u32,
    pub(crate) bot: Option<PlayerId>,
    pub(crate) ai_last_action: u64,
    /// Wait counters of residential applicants, in arrival order.
    pub(crate) pending_residents: Vec<u32>,
    /// Freshly roaded tiles mapped to the tick at which protection expires.
    pub(crate) recently_roaded: HashMap<GridPos, u64>,
    pub(crate) sequences: AgentSequences,
    pub(crate) vehicles: Vec<Vehicle>,
    pub(crate) goods_ic: Vec<GoodShipment>,
    pub(crate) goods_cc: Vec<GoodShipment>,
    pub(crate) citizen_groups: Vec<CitizenGroup>,
}

impl World {
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut tiles = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                tiles.push(Tile::new(x, y, Terrain::Grass));
            }
        }
        Self {
            width,
            height,
            tiles,
            tick: 0,
            demand: Demand::new(10, 5, 5),
            players: BTreeMap::new(),
            population: 0,
            employed: 0,
            bot: None,
            ai_last_action: 0,
            pending_residents: Vec::new(),
            recently_roaded: HashMap::new(),
            sequences: AgentSequences::default(),
            vehicles: Vec::new(),
            goods_ic: Vec::new(),
            goods_cc: Vec::new(),
            citizen_groups: Vec::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| pos.y as usize * self.width as usize + pos.x as usize)
    }

    pub fn tile(&self, pos: GridPos) -> Option<&Tile> {
        self.index(pos).map(|idx| &self.tiles[idx])
    }

    pub fn tile_mut(&mut self, pos: GridPos) -> Option<&mut Tile> {
        self.index(pos).map(move |idx| &mut self.tiles[idx])
    }

    /// Tiles in row-major scan order.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub(crate) fn tiles_mut(&mut self) -> &mut [Tile] {
        &mut self.tiles
    }

    pub fn is_road(&self, pos: GridPos) -> bool {
        self.tile(pos).is_some_and(Tile::has_road)
    }

    pub fn road_tiles(&self) -> Vec<GridPos> {
        self.tiles
            .iter()
            .filter(|t| t.has_road())
            .map(Tile::pos)
            .collect()
    }

    /// First orthogonal neighbour (in +x, -x, +y, -y order) that carries a road.
    pub fn adjacent_road(&self, pos: GridPos) -> Option<GridPos> {
        pos.neighbors().into_iter().find(|n| self.is_road(*n))
    }

    /// Positions of final buildings of the given kind, in scan order.
    pub fn final_buildings(&self, kind: ZoneType) -> Vec<GridPos> {
        self.tiles
            .iter()
            .filter(|t| t.final_building().is_some_and(|b| b.kind == kind))
            .map(Tile::pos)
            .collect()
    }

    /// Capacity and occupancy over final, non-abandoning residential buildings.
    pub fn residential_slots(&self) -> (u32, u32) {
        self.tiles
            .iter()
            .filter_map(Tile::building)
            .filter(|b| b.is_active() && b.kind == ZoneType::Residential)
            .fold((0, 0), |(cap, used), b| {
                (cap + b.kind.capacity(), used + b.residents)
            })
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn advance_tick(&mut self) {
        self.tick += 1;
    }

    pub fn population(&self) -> u32 {
        self.population
    }

    pub fn employed(&self) -> u32 {
        self.employed
    }

    pub fn add_player(&mut self, name: impl Into<String>, money: i64) -> PlayerId {
        let id = PlayerId::random();
        self.insert_player(Player {
            id: id.clone(),
            name: name.into(),
            money,
        });
        id
    }

    pub fn insert_player(&mut self, player: Player) {
        self.players.insert(player.id.clone(), player);
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub(crate) fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn bot(&self) -> Option<&PlayerId> {
        self.bot.as_ref()
    }

    /// Creates the scripted planner player once; later calls return the
    /// existing id.
    pub fn ensure_bot(&mut self, name: &str, money: i64) -> PlayerId {
        if let Some(id) = &self.bot {
            return id.clone();
        }
        let id = self.add_player(name, money);
        self.bot = Some(id.clone());
        id
    }

    pub fn mark_recently_roaded(&mut self, pos: GridPos, expires_at: u64) {
        self.recently_roaded.insert(pos, expires_at);
    }

    pub fn is_recently_roaded(&self, pos: GridPos) -> bool {
        self.recently_roaded
            .get(&pos)
            .is_some_and(|expiry| *expiry > self.tick)
    }

    pub(crate) fn prune_recently_roaded(&mut self) {
        let tick = self.tick;
        self.recently_roaded.retain(|_, expiry| *expiry > tick);
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn goods_ic(&self) -> &[GoodShipment] {
        &self.goods_ic
    }

    pub fn goods_cc(&self) -> &[GoodShipment] {
        &self.goods_cc
    }

    pub fn goods_in_flight(&self) -> usize {
        self.goods_ic.len() + self.goods_cc.len()
    }

    pub fn citizen_groups(&self) -> &[CitizenGroup] {
        &self.citizen_groups
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let rows = self
            .tiles
            .chunks(self.width as usize)
            .map(<[Tile]>::to_vec)
            .collect();
        WorldSnapshot {
            width: self.width,
            height: self.height,
            tiles: rows,
            demand: self.demand,
            players: self.players.clone(),
            tick: self.tick,
            population: self.population,
            employed: self.employed,
            bot_id: self.bot.clone(),
            citizen_groups: self
                .citizen_groups
                .iter()
                .map(CitizenGroupView::from)
                .collect(),
            vehicles: self
                .vehicles
                .iter()
                .map(|v| AgentPosition::new(v.id, v.pos))
                .collect(),
            goods_ic: self
                .goods_ic
                .iter()
                .map(|g| AgentPosition::new(g.id, g.pos))
                .collect(),
            goods_cc: self
                .goods_cc
                .iter()
                .map(|g| AgentPosition::new(g.id, g.pos))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgentPosition {
    pub id: u64,
    pub x: f64,
    pub y: f64,
}

impl AgentPosition {
    pub fn new(id: u64, pos: Position) -> Self {
        Self {
            id,
            x: pos.x,
            y: pos.y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitizenGroupView {
    pub id: u64,
    pub count: u32,
    pub x: f64,
    pub y: f64,
    pub state: CitizenState,
}

impl From<&CitizenGroup> for CitizenGroupView {
    fn from(group: &CitizenGroup) -> Self {
        Self {
            id: group.id,
            count: group.count,
            x: group.pos.x,
            y: group.pos.y,
            state: group.state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub width: i32,
    pub height: i32,
    pub tiles: Vec<Vec<Tile>>,
    pub demand: Demand,
    pub players: BTreeMap<PlayerId, Player>,
    pub tick: u64,
    pub population: u32,
    pub employed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<PlayerId>,
    pub citizen_groups: Vec<CitizenGroupView>,
    pub vehicles: Vec<AgentPosition>,
    #[serde(rename = "goodsIC")]
    pub goods_ic: Vec<AgentPosition>,
    #[serde(rename = "goodsCC")]
    pub goods_cc: Vec<AgentPosition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiles_are_row_major() {
        let world = World::new(4, 3);
        let tile = world.tile(GridPos::new(2, 1)).unwrap();
        assert_eq!((tile.x, tile.y), (2, 1));
        assert_eq!(world.tiles()[6].pos(), GridPos::new(2, 1));
        assert!(world.tile(GridPos::new(4, 0)).is_none());
        assert!(world.tile(GridPos::new(-1, 0)).is_none());
    }

    #[test]
    fn test_recently_roaded_expires_with_ticks() {
        let mut world = World::new(4, 4);
        world.mark_recently_roaded(GridPos::new(1, 1), 2);
        assert!(world.is_recently_roaded(GridPos::new(1, 1)));
        world.advance_tick();
        world.advance_tick();
        assert!(!world.is_recently_roaded(GridPos::new(1, 1)));
        world.prune_recently_roaded();
        assert!(world.recently_roaded.is_empty());
    }

    #[test]
    fn test_bot_is_created_once() {
        let mut world = World::new(4, 4);
        let first = world.ensure_bot("Planner", 50_000);
        let second = world.ensure_bot("Planner", 50_000);
        assert_eq!(first, second);
        assert_eq!(world.players().count(), 1);
    }

    #[test]
    fn test_snapshot_serializes_rows_and_agents() {
        let world = World::new(3, 2);
        let value = serde_json::to_value(world.snapshot()).unwrap();
        assert_eq!(value["width"], 3);
        assert_eq!(value["tiles"].as_array().unwrap().len(), 2);
        assert_eq!(value["tiles"][0].as_array().unwrap().len(), 3);
        assert!(value["goodsIC"].as_array().unwrap().is_empty());
        assert_eq!(value["demand"]["residential"], 10);
    }
}
