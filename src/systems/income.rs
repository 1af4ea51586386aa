use anyhow::Result;

use crate::{
    engine::{System, SystemContext, TickOutput},
    rng::StreamRng,
    world::World,
};

/// Pays every player a share of the city's workforce and population.
pub struct IncomeSystem;

impl IncomeSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IncomeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for IncomeSystem {
    fn name(&self) -> &str {
        "income"
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        world: &mut World,
        _rng: &mut StreamRng<'_>,
        _output: &mut TickOutput,
    ) -> Result<()> {
        let income = i64::from(world.employed() / 10 + world.population() / 20);
        for player in world.players.values_mut() {
            player.money += income;
        }
        Ok(())
    }
}
