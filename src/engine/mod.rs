use std::{collections::HashSet, time::Instant};

use anyhow::Result;

use crate::{
    components::GridPos,
    events::{BuildingUpdate, Event, TickSummary},
    rng::{RngStreams, StreamRng},
    world::World,
};

pub struct EngineSettings {
    pub seed: Option<u64>,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngStreams::from_optional_seed(self.settings.seed),
            systems: self.systems,
        }
    }
}

/// Runs the slow-cadence pipeline: one call to [`Engine::step`] is one tick.
pub struct Engine {
    rng: RngStreams,
    systems: Vec<Box<dyn System>>,
}

impl Engine {
    pub fn step(&mut self, world: &mut World, now: i64) -> Result<TickOutcome> {
        world.prune_recently_roaded();
        world.advance_tick();

        let ctx = SystemContext {
            tick: world.tick(),
            now,
        };
        let mut output = TickOutput::default();
        let mut reports = Vec::with_capacity(self.systems.len());
        for system in &mut self.systems {
            let mut rng_stream = self.rng.stream(system.name());
            let start = Instant::now();
            system.run(&ctx, world, &mut rng_stream, &mut output)?;
            reports.push(SystemRunReport {
                name: system.name().to_string(),
                duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
            });
        }

        let mut events = output.events;
        if !output.touched.is_empty() {
            // Resolved against the post-tick world; removed buildings report null.
            let mut seen = HashSet::new();
            let updates = output
                .touched
                .into_iter()
                .filter(|pos| seen.insert(*pos))
                .map(|pos| BuildingUpdate {
                    x: pos.x,
                    y: pos.y,
                    building: world.tile(pos).and_then(|t| t.building()).cloned(),
                })
                .collect();
            events.push(Event::BuildingUpdate { updates });
        }
        let summary = TickSummary {
            tick: world.tick(),
            demand: world.demand,
            population: world.population(),
            employed: world.employed(),
        };
        events.push(Event::Tick(summary));

        Ok(TickOutcome {
            summary,
            events,
            reports,
        })
    }

    pub fn run(&mut self, world: &mut World, ticks: u64, now: i64) -> Result<Vec<TickOutcome>> {
        (0..ticks).map(|_| self.step(world, now)).collect()
    }
}

pub struct SystemContext {
    pub tick: u64,
    /// Wall-clock unix seconds used for placement and completion timestamps.
    pub now: i64,
}

/// What the systems of one tick produced: tiles whose building changed and
/// events emitted by actions taken mid-tick.
#[derive(Debug, Default)]
pub struct TickOutput {
    pub touched: Vec<GridPos>,
    pub events: Vec<Event>,
}

impl TickOutput {
    pub fn touch(&mut self, pos: GridPos) {
        self.touched.push(pos);
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

#[derive(Clone, Debug)]
pub struct SystemRunReport {
    pub name: String,
    pub duration_ms: f64,
}

#[derive(Clone, Debug)]
pub struct TickOutcome {
    pub summary: TickSummary,
    /// Mid-tick action events in order, then the building update (if any),
    /// then the tick summary.
    pub events: Vec<Event>,
    pub reports: Vec<SystemRunReport>,
}

pub trait System: Send {
    fn name(&self) -> &str;
    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut StreamRng<'_>,
        output: &mut TickOutput,
    ) -> Result<()>;
}
