mod ai;
mod construction;
mod demand;
mod employment;
mod growth;
mod income;
mod labor;

pub use ai::{pick_zone_type, AiControllerSystem, AI_MIN_BALANCE};
pub use construction::ConstructionSystem;
pub use demand::DemandDriftSystem;
pub use employment::EmploymentSystem;
pub use growth::{GrowthSystem, APPLICANTS_PER_TICK, MAX_APPLICANT_WAIT};
pub use income::IncomeSystem;
pub use labor::{LaborSystem, ABANDON_IDLE_TICKS, ABANDON_PHASE_TICKS, COMMERCIAL_ABANDON_FACTOR};

use crate::engine::{Engine, EngineBuilder, EngineSettings};

/// The full slow-cadence pipeline in tick order.
pub fn standard_engine(seed: Option<u64>) -> Engine {
    EngineBuilder::new(EngineSettings { seed })
        .with_system(DemandDriftSystem::new())
        .with_system(ConstructionSystem::new())
        .with_system(GrowthSystem::new())
        .with_system(LaborSystem::new())
        .with_system(EmploymentSystem::new())
        .with_system(IncomeSystem::new())
        .with_system(AiControllerSystem::new())
        .build()
}
