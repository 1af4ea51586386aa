pub mod actions;
pub mod components;
pub mod config;
pub mod engine;
pub mod events;
pub mod hub;
pub mod pathfinding;
pub mod planner;
pub mod publisher;
pub mod rng;
pub mod scheduler;
pub mod systems;
pub mod traffic;
pub mod web;
pub mod world;

pub use config::{ConfigLoader, ServerConfig};
pub use engine::{Engine, EngineBuilder, TickOutcome};
pub use events::{ClientAction, Event};
pub use hub::Hub;
pub use world::{World, WorldSnapshot};
