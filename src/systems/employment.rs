use anyhow::Result;
use rand::Rng;

use crate::{
    components::ZoneType,
    engine::{System, SystemContext, TickOutput},
    rng::StreamRng,
    world::World,
};

/// Unemployment ratio above which job-site demand rises and residents may
/// leave.
pub const HIGH_UNEMPLOYMENT: f64 = 0.25;
/// Unemployment ratio below which residential demand eases.
pub const LOW_UNEMPLOYMENT: f64 = 0.05;

/// Recounts employment and feeds housing and job pressure back into demand.
pub struct EmploymentSystem;

impl EmploymentSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EmploymentSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for EmploymentSystem {
    fn name(&self) -> &str {
        "employment"
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        world: &mut World,
        rng: &mut StreamRng<'_>,
        output: &mut TickOutput,
    ) -> Result<()> {
        let (job_capacity, employees) = world
            .tiles()
            .iter()
            .filter_map(|t| t.building())
            .filter(|b| b.is_active())
            .fold((0u32, 0u32), |(cap, emp), b| {
                let cap = if b.kind.is_job_site() {
                    cap + b.kind.capacity()
                } else {
                    cap
                };
                (cap, emp + b.employees)
            });
        world.employed = employees;

        let population = world.population();
        if population == 0 {
            world.demand.clamp();
            return Ok(());
        }
        let unemployed = i64::from(population) - i64::from(employees);
        let ratio = unemployed as f64 / f64::from(population);

        let (res_cap, res_used) = world.residential_slots();
        let open_slots = i64::from(res_cap) - i64::from(res_used);
        let demand = &mut world.demand;
        if res_cap == 0 {
            demand.residential += 8;
        } else if open_slots <= 0 {
            demand.residential += 6;
        } else if open_slots < 8 {
            demand.residential += 3;
        } else if open_slots > 50 {
            demand.residential -= 4;
        } else if open_slots > 30 {
            demand.residential -= 2;
        }

        let unfilled = job_capacity.saturating_sub(employees);
        demand.residential += (unfilled / 10).min(6) as i32;

        if ratio > HIGH_UNEMPLOYMENT {
            demand.industrial += 2;
            demand.commercial += 1;
            if rng.gen::<f64>() < ratio * 0.1 {
                let target = rng.gen_range(2..=5);
                out_migrate(world, target, output);
            }
        } else if ratio < LOW_UNEMPLOYMENT {
            demand.residential -= 1;
        }
        world.demand.clamp();
        Ok(())
    }
}

/// Removes one resident per occupied home in scan order until `target` have
/// left.
fn out_migrate(world: &mut World, target: u32, output: &mut TickOutput) {
    let mut removed = 0;
    for tile in world.tiles_mut() {
        if removed >= target {
            break;
        }
        let pos = tile.pos();
        if let Some(b) = tile.building_mut() {
            if b.is_final && b.kind == ZoneType::Residential && b.residents > 0 {
                b.residents -= 1;
                removed += 1;
                output.touch(pos);
            }
        }
    }
}
