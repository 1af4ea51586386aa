use anyhow::Result;
use rand::Rng;

use crate::{
    engine::{System, SystemContext, TickOutput},
    rng::StreamRng,
    world::World,
};

/// Random walk applied to each demand value before the rest of the tick.
pub struct DemandDriftSystem {
    step: i32,
}

impl DemandDriftSystem {
    pub fn new() -> Self {
        Self { step: 2 }
    }
}

impl Default for DemandDriftSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for DemandDriftSystem {
    fn name(&self) -> &str {
        "demand_drift"
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        world: &mut World,
        rng: &mut StreamRng<'_>,
        _output: &mut TickOutput,
    ) -> Result<()> {
        for value in world.demand.values_mut() {
            *value += rng.gen_range(-self.step..=self.step);
        }
        world.demand.clamp();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Demand, DEMAND_MAX, DEMAND_MIN};
    use crate::rng::RngStreams;

    #[test]
    fn test_drift_is_bounded_per_tick() {
        let mut world = World::new(2, 2);
        let mut rng = RngStreams::seeded(3);
        let mut system = DemandDriftSystem::new();
        let ctx = SystemContext { tick: 1, now: 0 };
        for _ in 0..50 {
            let before = world.demand;
            system
                .run(&ctx, &mut world, &mut rng.stream("demand"), &mut TickOutput::default())
                .unwrap();
            assert!((world.demand.residential - before.residential).abs() <= 2);
            assert!((world.demand.commercial - before.commercial).abs() <= 2);
            assert!((world.demand.industrial - before.industrial).abs() <= 2);
        }
    }

    #[test]
    fn test_drift_never_leaves_range() {
        let mut world = World::new(2, 2);
        world.demand = Demand::new(DEMAND_MAX, DEMAND_MIN, DEMAND_MAX);
        let mut rng = RngStreams::seeded(9);
        let mut system = DemandDriftSystem::new();
        let ctx = SystemContext { tick: 1, now: 0 };
        for _ in 0..200 {
            system
                .run(&ctx, &mut world, &mut rng.stream("demand"), &mut TickOutput::default())
                .unwrap();
            assert!(world.demand.in_range());
        }
    }
}
