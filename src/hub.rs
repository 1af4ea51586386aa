use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::{
    actions::{self, ActionError},
    components::{GridPos, PlayerId},
    config::ServerConfig,
    engine::Engine,
    events::{ClientAction, Event, TickSummary},
    publisher::{EventPublisher, SubscriberId},
    traffic::TrafficSimulator,
    world::{World, WorldSnapshot},
};

pub const DEFAULT_PLAYER_NAME: &str = "Player";

/// A joined client: its player, its publisher registration and the queue its
/// writer drains.
pub struct Session {
    pub player: PlayerId,
    pub subscriber: SubscriberId,
    pub outbound: mpsc::Receiver<String>,
}

/// Shared server context: the single world behind one lock plus the event
/// fan-out. Every mutation publishes while still holding the world lock so
/// clients observe events in mutation order.
pub struct Hub {
    world: Mutex<World>,
    publisher: EventPublisher,
    starting_balance: i64,
    queue_capacity: usize,
}

impl Hub {
    pub fn new(world: World, starting_balance: i64, queue_capacity: usize) -> Self {
        Self {
            world: Mutex::new(world),
            publisher: EventPublisher::new(),
            starting_balance,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Fresh grass map with the scripted planner player already present.
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut world = World::new(config.map.width, config.map.height);
        let bot = world.ensure_bot(&config.economy.bot_name, config.economy.bot_balance);
        info!(bot = %bot, name = %config.economy.bot_name, "AI bot created");
        Self::new(world, config.economy.starting_balance, config.outbound_queue)
    }

    fn lock(&self) -> MutexGuard<'_, World> {
        self.world.lock().expect("world lock poisoned")
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Creates a player and its subscription. The first queued message is the
    /// full state, taken under the same lock that registers the subscriber.
    pub fn connect(&self, name: Option<&str>) -> Result<Session> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_PLAYER_NAME);
        let mut world = self.lock();
        let player = world.add_player(name, self.starting_balance);

        let (tx, outbound) = mpsc::channel(self.queue_capacity);
        let full_state = serde_json::to_string(&Event::FullState(Box::new(world.snapshot())))?;
        tx.try_send(full_state)?;
        let subscriber = self.publisher.register(tx);
        drop(world);

        info!(player = %player, name, subscriber, "player joined");
        Ok(Session {
            player,
            subscriber,
            outbound,
        })
    }

    /// Stops delivery to the session. The player stays in the world.
    pub fn disconnect(&self, session: &Session) {
        self.publisher.unregister(session.subscriber);
        info!(player = %session.player, "player left");
    }

    /// Parses and applies one raw client message. Malformed input is ignored.
    pub fn handle_message(&self, player: &PlayerId, raw: &str) -> Option<Event> {
        let Some(action) = ClientAction::parse(raw) else {
            debug!(player = %player, "discarding malformed message");
            return None;
        };
        self.apply(player, action).ok()
    }

    pub fn apply(&self, player: &PlayerId, action: ClientAction) -> Result<Event, ActionError> {
        let mut world = self.lock();
        let now = Utc::now().timestamp();
        let result = match &action {
            ClientAction::PlaceZone(p) => {
                actions::place_zone(&mut world, player, GridPos::new(p.x, p.y), p.zone, now)
            }
            ClientAction::PlaceRoad(t) => {
                actions::place_road(&mut world, player, GridPos::new(t.x, t.y), now)
            }
            ClientAction::Bulldoze(t) => actions::bulldoze(&mut world, GridPos::new(t.x, t.y)),
            ClientAction::PlaceStructure(p) => {
                actions::place_structure(&mut world, player, GridPos::new(p.x, p.y), &p.kind, now)
            }
        };
        match &result {
            Ok(event) => {
                self.publisher.publish(event);
            }
            Err(err) => debug!(player = %player, ?action, %err, "action rejected"),
        }
        result
    }

    /// One slow-cadence tick, published in pipeline order.
    pub fn run_tick(&self, engine: &mut Engine) -> Result<TickSummary> {
        let mut world = self.lock();
        let outcome = engine.step(&mut world, Utc::now().timestamp())?;
        self.publisher.publish_all(&outcome.events);
        drop(world);

        for report in &outcome.reports {
            trace!(system = %report.name, duration_ms = report.duration_ms, "system run");
        }
        Ok(outcome.summary)
    }

    /// One fast-cadence traffic step of `dt` seconds.
    pub fn run_traffic(&self, simulator: &mut TrafficSimulator, dt: f64) {
        let mut world = self.lock();
        let ts = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let snapshot = simulator.step(&mut world, dt, ts);
        self.publisher.publish(&Event::Traffic(snapshot));
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.lock().snapshot()
    }

    /// Runs `f` with exclusive access to the world.
    pub fn with_world<R>(&self, f: impl FnOnce(&mut World) -> R) -> R {
        f(&mut self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ZoneType;
    use crate::events::{PlaceZone, TileTarget};
    use crate::systems::standard_engine;

    fn hub() -> Hub {
        Hub::from_config(&ServerConfig {
            map: crate::config::MapConfig {
                width: 16,
                height: 16,
            },
            ..ServerConfig::default()
        })
    }

    fn next_type(session: &mut Session) -> String {
        let raw = session.outbound.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        value["type"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_joining_sends_full_state_first() {
        let hub = hub();
        let mut session = hub.connect(None).unwrap();
        let raw = session.outbound.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "full_state");
        assert_eq!(value["payload"]["width"], 16);
        let me = &value["payload"]["players"][session.player.as_str()];
        assert_eq!(me["name"], DEFAULT_PLAYER_NAME);
        assert_eq!(me["money"], 100_000);
        assert!(value["payload"]["botId"].is_string());
    }

    #[test]
    fn test_actions_are_broadcast_to_everyone() {
        let hub = hub();
        let mut alice = hub.connect(Some("alice")).unwrap();
        let mut bob = hub.connect(Some("bob")).unwrap();
        next_type(&mut alice);
        next_type(&mut bob);

        hub.handle_message(
            &alice.player,
            r#"{"type":"place_zone","payload":{"x":3,"y":3,"zone":"R"}}"#,
        )
        .unwrap();
        assert_eq!(next_type(&mut alice), "zone_placed");
        assert_eq!(next_type(&mut bob), "zone_placed");
    }

    #[test]
    fn test_rejected_actions_publish_nothing() {
        let hub = hub();
        let mut session = hub.connect(None).unwrap();
        next_type(&mut session);

        assert!(hub.handle_message(&session.player, "garbage").is_none());
        let err = hub
            .apply(&session.player, ClientAction::Bulldoze(TileTarget { x: 1, y: 1 }))
            .unwrap_err();
        assert_eq!(err, ActionError::NothingToBulldoze(GridPos::new(1, 1)));
        assert!(session.outbound.try_recv().is_err());
    }

    #[test]
    fn test_tick_ends_with_summary() {
        let hub = hub();
        let mut session = hub.connect(None).unwrap();
        next_type(&mut session);
        hub.apply(
            &session.player,
            ClientAction::PlaceZone(PlaceZone {
                x: 2,
                y: 2,
                zone: ZoneType::Industrial,
            }),
        )
        .unwrap();
        next_type(&mut session);

        let mut engine = standard_engine(Some(1));
        let summary = hub.run_tick(&mut engine).unwrap();
        assert_eq!(summary.tick, 1);
        let mut kinds = Vec::new();
        while let Ok(raw) = session.outbound.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
            kinds.push(value["type"].as_str().unwrap().to_string());
        }
        assert_eq!(kinds.last().map(String::as_str), Some("tick"));
        assert!(kinds.iter().any(|k| k == "building_update"));
    }

    #[test]
    fn test_leaving_stops_delivery() {
        let hub = hub();
        let session = hub.connect(None).unwrap();
        assert_eq!(hub.publisher().subscriber_count(), 1);
        hub.disconnect(&session);
        assert_eq!(hub.publisher().subscriber_count(), 0);
    }
}
