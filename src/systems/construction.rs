use anyhow::Result;

use crate::{
    components::FINAL_STAGE,
    engine::{System, SystemContext, TickOutput},
    rng::StreamRng,
    world::World,
};

/// Starts buildings on bare zones and advances unfinished ones one stage per
/// tick until they complete.
pub struct ConstructionSystem;

impl ConstructionSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConstructionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ConstructionSystem {
    fn name(&self) -> &str {
        "construction"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        _rng: &mut StreamRng<'_>,
        output: &mut TickOutput,
    ) -> Result<()> {
        for tile in world.tiles_mut() {
            if tile.zone().is_none() {
                continue;
            }
            let pos = tile.pos();
            if tile.start_building() {
                output.touch(pos);
                continue;
            }
            let Some(building) = tile.building_mut() else {
                continue;
            };
            if building.is_final {
                continue;
            }
            building.stage = (building.stage + 1).min(FINAL_STAGE);
            if building.stage == FINAL_STAGE {
                building.is_final = true;
                building.completed_at = Some(ctx.now);
            }
            output.touch(pos);
        }
        Ok(())
    }
}
