use anyhow::Result;

use crate::{
    components::ZoneType,
    engine::{System, SystemContext, TickOutput},
    rng::StreamRng,
    world::World,
};

/// Residential applicants arriving each tick.
pub const APPLICANTS_PER_TICK: usize = 3;
/// Ticks an applicant keeps looking for housing before giving up.
pub const MAX_APPLICANT_WAIT: u32 = 5;

/// Moves applicants into housing and recomputes population afterwards.
pub struct GrowthSystem {
    applicants_per_tick: usize,
    max_wait: u32,
}

impl GrowthSystem {
    pub fn new() -> Self {
        Self {
            applicants_per_tick: APPLICANTS_PER_TICK,
            max_wait: MAX_APPLICANT_WAIT,
        }
    }
}

impl Default for GrowthSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for GrowthSystem {
    fn name(&self) -> &str {
        "growth"
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        world: &mut World,
        _rng: &mut StreamRng<'_>,
        output: &mut TickOutput,
    ) -> Result<()> {
        world
            .pending_residents
            .extend(std::iter::repeat(0).take(self.applicants_per_tick));

        let applicants = std::mem::take(&mut world.pending_residents);
        let mut still_waiting = Vec::with_capacity(applicants.len());
        for wait in applicants {
            let home = world.tiles_mut().iter_mut().find(|tile| {
                tile.building().is_some_and(|b| {
                    b.kind == ZoneType::Residential && b.is_active() && b.open_slots() > 0
                })
            });
            match home {
                Some(tile) => {
                    let pos = tile.pos();
                    if let Some(building) = tile.building_mut() {
                        building.residents += 1;
                    }
                    output.touch(pos);
                }
                None if wait < self.max_wait => still_waiting.push(wait + 1),
                None => {}
            }
        }
        world.pending_residents = still_waiting;

        world.population = world
            .tiles()
            .iter()
            .filter_map(|t| t.final_building())
            .filter(|b| b.kind == ZoneType::Residential)
            .map(|b| b.residents)
            .sum();
        Ok(())
    }
}
